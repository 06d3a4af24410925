//! Form decoding for inbound slash-command requests.

use url::form_urlencoded;

pub const FIELD_TEAM_ID: &str = "team_id";
pub const FIELD_TEAM_DOMAIN: &str = "team_domain";
pub const FIELD_ENTERPRISE_ID: &str = "enterprise_id";
pub const FIELD_ENTERPRISE_NAME: &str = "enterprise_name";
pub const FIELD_CHANNEL_ID: &str = "channel_id";
pub const FIELD_CHANNEL_NAME: &str = "channel_name";
pub const FIELD_USER_ID: &str = "user_id";
pub const FIELD_COMMAND: &str = "command";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_RESPONSE_URL: &str = "response_url";
pub const FIELD_TRIGGER_ID: &str = "trigger_id";
pub const FIELD_API_APP_ID: &str = "api_app_id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A decoded slash-command invocation. Missing fields decode as empty strings.
pub struct SlashCommand {
    pub team_id: String,
    pub team_domain: String,
    pub enterprise_id: String,
    pub enterprise_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub command: String,
    pub text: String,
    pub response_url: String,
    pub trigger_id: String,
    pub api_app_id: String,
}

impl SlashCommand {
    /// Decodes an `application/x-www-form-urlencoded` body. When a key repeats,
    /// the first value wins. Undecodable input yields empty fields.
    pub fn from_form_body(body: &[u8]) -> Self {
        let mut command = Self::default();
        let mut seen = Vec::<&'static str>::new();
        for (key, value) in form_urlencoded::parse(body) {
            let Some(slot) = command.field_mut(&key) else {
                continue;
            };
            if seen.contains(&slot.0) {
                continue;
            }
            seen.push(slot.0);
            *slot.1 = value.into_owned();
        }
        command
    }

    /// Enterprise id, absent for workspaces outside an Enterprise Grid.
    pub fn enterprise_id(&self) -> Option<&str> {
        Some(self.enterprise_id.as_str()).filter(|value| !value.is_empty())
    }

    fn field_mut(&mut self, key: &str) -> Option<(&'static str, &mut String)> {
        let field = match key {
            FIELD_TEAM_ID => (FIELD_TEAM_ID, &mut self.team_id),
            FIELD_TEAM_DOMAIN => (FIELD_TEAM_DOMAIN, &mut self.team_domain),
            FIELD_ENTERPRISE_ID => (FIELD_ENTERPRISE_ID, &mut self.enterprise_id),
            FIELD_ENTERPRISE_NAME => (FIELD_ENTERPRISE_NAME, &mut self.enterprise_name),
            FIELD_CHANNEL_ID => (FIELD_CHANNEL_ID, &mut self.channel_id),
            FIELD_CHANNEL_NAME => (FIELD_CHANNEL_NAME, &mut self.channel_name),
            FIELD_USER_ID => (FIELD_USER_ID, &mut self.user_id),
            FIELD_COMMAND => (FIELD_COMMAND, &mut self.command),
            FIELD_TEXT => (FIELD_TEXT, &mut self.text),
            FIELD_RESPONSE_URL => (FIELD_RESPONSE_URL, &mut self.response_url),
            FIELD_TRIGGER_ID => (FIELD_TRIGGER_ID, &mut self.trigger_id),
            FIELD_API_APP_ID => (FIELD_API_APP_ID, &mut self.api_app_id),
            _ => return None,
        };
        Some(field)
    }
}

/// First value of `key` in a form-encoded body, if any.
pub fn form_value(body: &[u8], key: &str) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(candidate, _)| candidate == key)
        .map(|(_, value)| value.into_owned())
}
