//! Acknowledgment message returned to Slack for a translated command.

use relay_core::{Event, SlackMessage, TextObject};

const NO_EVENTS_HEADER: &str = "No Events Created";
const NO_SUBSCRIBERS_TEXT: &str = "There are no subscribers for this event.";
const EVENTS_HEADER: &str = "Events Created for Subscribed Projects:";

/// Builds the in-channel reply: a "no subscribers" notice when nothing was
/// created, otherwise one `(project, event)` row per created event in order.
pub fn acknowledgment_message(channel_id: &str, created: &[Event]) -> SlackMessage {
    if created.is_empty() {
        return SlackMessage::in_channel(channel_id)
            .header(NO_EVENTS_HEADER)
            .section_text(TextObject::plain(NO_SUBSCRIBERS_TEXT));
    }
    let message = SlackMessage::in_channel(channel_id)
        .header(EVENTS_HEADER)
        .section_fields(vec![
            TextObject::mrkdwn("*Project ID*"),
            TextObject::mrkdwn("*Event ID*"),
        ]);
    created.iter().fold(message, |message, event| {
        message.section_fields(vec![
            TextObject::plain(event.project_id.as_str()),
            TextObject::plain(event.id()),
        ])
    })
}

pub fn render_acknowledgment(
    channel_id: &str,
    created: &[Event],
) -> Result<Vec<u8>, serde_json::Error> {
    acknowledgment_message(channel_id, created).to_json_vec()
}
