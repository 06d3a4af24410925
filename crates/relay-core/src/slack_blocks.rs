//! Typed Slack Block Kit message builder.
//!
//! Blocks serialize in insertion order with `type` as the first key of every
//! block and text object, which is the layout Slack expects.

use serde::Serialize;

const RESPONSE_TYPE_IN_CHANNEL: &str = "in_channel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text } | Self::Mrkdwn { text } => text.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A `chat.postMessage`-shaped message body.
pub struct SlackMessage {
    pub response_type: String,
    pub channel: String,
    pub blocks: Vec<Block>,
}

impl SlackMessage {
    /// Starts a message visible to everyone in `channel`.
    pub fn in_channel(channel: impl Into<String>) -> Self {
        Self {
            response_type: RESPONSE_TYPE_IN_CHANNEL.to_string(),
            channel: channel.into(),
            blocks: Vec::new(),
        }
    }

    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header {
            text: TextObject::plain(text),
        });
        self
    }

    pub fn section_text(mut self, text: TextObject) -> Self {
        self.blocks.push(Block::Section {
            text: Some(text),
            fields: Vec::new(),
        });
        self
    }

    pub fn section_fields(mut self, fields: Vec<TextObject>) -> Self {
        self.blocks.push(Block::Section { text: None, fields });
        self
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
