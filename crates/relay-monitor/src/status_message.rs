//! Slack status message rendered for a finished event.

use relay_core::{Event, SlackMessage, TextObject};

const STATUS_HEADER: &str = "Event Status Update";

/// Status update posted to the channel an event originated from.
pub fn status_message(event: &Event) -> SlackMessage {
    let message = SlackMessage::in_channel(event.channel_id())
        .header(STATUS_HEADER)
        .section_fields(vec![
            TextObject::mrkdwn("*Project ID*"),
            TextObject::mrkdwn("*Event ID*"),
        ])
        .section_fields(vec![
            TextObject::plain(event.project_id.as_str()),
            TextObject::plain(event.id()),
        ])
        .section_fields(vec![TextObject::mrkdwn("*Worker Phase*")])
        .section_fields(vec![TextObject::plain(event.worker_phase().as_str())]);
    match event.summary() {
        Some(summary) => message.section_text(TextObject::plain(summary)),
        None => message,
    }
}
