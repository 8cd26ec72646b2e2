//! Fixed notices and HTML renderings posted by the relay.
//!
//! All output uses HTML parse mode; user-provided values go through
//! [`escape_html`].

use chrono::{DateTime, Utc};

use crate::model::{LogField, UserId, UserLog, VALUE_EMPTY};

/// Sent in the staff thread when a reply carries content the relay cannot deliver.
pub const UNSUPPORTED_CONTENT: &str =
    "This kind of content cannot be delivered. Only text and photos are supported.";

/// Sent in the staff thread when the user has blocked the bot.
pub const USER_BLOCKED_BOT: &str = "The user has blocked the bot. The reply was not delivered.";

/// Sent to a banned user instead of relaying their message.
pub const USER_BANNED: &str = "You have been banned. Your messages are no longer delivered.";

/// Timestamp format of the change history.
pub const LOG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Escape special HTML characters in user-provided text.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Staff notification for a changed profile attribute.
pub fn field_changed(field: LogField, previous: &str, current: &str) -> String {
    format!(
        "User changed {}: <code>{}</code> -> <code>{}</code>",
        field.label(),
        escape_html(previous),
        escape_html(current),
    )
}

fn format_date(ts: &DateTime<Utc>) -> String {
    ts.format(LOG_DATE_FORMAT).to_string()
}

/// Render the user card: the first name and handle ever seen as the
/// baseline, then every later entry as a dated change list.
///
/// `logs` must be all of the user's entries in ascending order.
pub fn user_info(user_id: UserId, logs: &[UserLog]) -> String {
    let first_name = logs.iter().find(|l| l.field == LogField::FullName);
    let first_handle = logs.iter().find(|l| l.field == LogField::Username);

    let name = first_name.map_or(VALUE_EMPTY, |l| l.value.as_str());
    let handle = first_handle.map_or(VALUE_EMPTY, |l| l.value.as_str());

    let mut lines = vec![
        format!("User <code>{user_id}</code>"),
        String::new(),
        "<b>Initial info</b>".to_owned(),
        format!("Full name: {}", escape_html(name)),
        format!(
            "Username: <a href=\"tg://user?id={user_id}\">@{}</a>",
            escape_html(handle)
        ),
    ];

    let baseline = [first_name.map(|l| l.id), first_handle.map(|l| l.id)];
    let changes: Vec<&UserLog> = logs
        .iter()
        .filter(|l| !baseline.contains(&Some(l.id)))
        .collect();

    if !changes.is_empty() {
        lines.push(String::new());
        lines.push("<b>Change history</b>".to_owned());
        for entry in changes {
            lines.push(format!(
                "- {}: {} changed to <code>{}</code>",
                format_date(&entry.timestamp),
                entry.field.label(),
                escape_html(&entry.value),
            ));
        }
    }

    lines.join("\n")
}
