//! Durable records of the relay: users, their staff-side topics, the id
//! correspondence of relayed messages and replies, and the user change log.
//!
//! Identifiers are the chat transport's native ids: users are `i64`,
//! forum threads and messages are `i32`. A user's private chat with the bot
//! shares the user's id, so `User::id` doubles as the delivery chat id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// External user identifier (also the id of the user's private chat).
pub type UserId = i64;

/// Staff-side forum thread identifier.
pub type ThreadId = i32;

/// Transport message identifier, unique within one chat.
pub type MessageId = i32;

/// Log value recorded when a user is banned.
pub const VALUE_TRUE: &str = "yes";

/// Log value recorded when a user is not banned.
pub const VALUE_FALSE: &str = "no";

/// Log value recorded for an attribute that is absent (e.g. no username).
pub const VALUE_EMPTY: &str = "[empty]";

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// An end-user who has written to the relay at least once. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// External user id (primary key).
    pub id: UserId,
    /// Optimistic-concurrency counter, bumped on every update.
    pub version: i64,
    /// Whether the user's messages are refused.
    pub is_banned: bool,
}

/// A staff-side forum thread dedicated to one user.
///
/// A user may own several rows when the remote thread was deleted and
/// recreated; the current one is the row with the highest `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Remote thread id (primary key).
    pub id: ThreadId,
    /// Owning user.
    pub user_id: UserId,
    /// Optimistic-concurrency counter.
    pub version: i64,
    /// Informational open flag.
    pub is_open: bool,
}

/// An inbound user message that was mirrored into the user's topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Id of the original message in the user's private chat.
    pub id: MessageId,
    /// Topic the mirror was posted into.
    pub topic_id: ThreadId,
    /// Optimistic-concurrency counter.
    pub version: i64,
    /// Id of the forwarded copy inside the staff thread.
    pub bot_message_id: MessageId,
}

/// A staff reply that was delivered into a user's private chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Id of the staff-authored message in the staff thread.
    pub id: MessageId,
    /// Topic the reply was written in.
    pub topic_id: ThreadId,
    /// Optimistic-concurrency counter.
    pub version: i64,
    /// Id of the copy delivered into the user's private chat.
    pub bot_message_id: MessageId,
}

/// One append-only change-log entry for a tracked user attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLog {
    /// Surrogate key, auto-incremented.
    pub id: i64,
    /// User the attribute belongs to.
    pub user_id: UserId,
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
    /// Which attribute changed.
    pub field: LogField,
    /// The new value at that point in time.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Tracked fields
// ---------------------------------------------------------------------------

/// User attributes tracked by the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogField {
    /// First and last name as shown by the transport.
    FullName,
    /// Public handle, or [`VALUE_EMPTY`] when unset.
    Username,
    /// Ban status, [`VALUE_TRUE`] or [`VALUE_FALSE`].
    IsBanned,
}

impl LogField {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Username => "username",
            Self::IsBanned => "is_banned",
        }
    }

    /// Human-readable field name used in staff notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullName => "full name",
            Self::Username => "username",
            Self::IsBanned => "ban status",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised field.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "full_name" => Ok(Self::FullName),
            "username" => Ok(Self::Username),
            "is_banned" => Ok(Self::IsBanned),
            other => Err(StoreError::InvalidValue {
                field: "field",
                value: other.to_owned(),
            }),
        }
    }
}

/// Log value for a ban status.
pub fn ban_value(is_banned: bool) -> &'static str {
    if is_banned {
        VALUE_TRUE
    } else {
        VALUE_FALSE
    }
}
