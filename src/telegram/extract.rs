//! Extraction of domain values from Bot API updates.
//!
//! Routing decisions are made on [`ReplyContext`], a flattened view of the
//! replied-to message, so they can be tested without building updates.

use teloxide::types::{Message, User};

use crate::model::MessageId;
use crate::relay::messages::StaffMessage;
use crate::relay::Profile;
use crate::transport::Content;

/// Profile attributes of the sender.
///
/// Returns `None` for ids outside the signed range.
pub fn profile_of(user: &User) -> Option<Profile> {
    let id = i64::try_from(user.id.0).ok()?;
    Some(Profile {
        id,
        full_name: user.full_name(),
        username: user.username.clone(),
    })
}

/// Relayable content of a message. Photos use the largest size.
pub fn content_of(msg: &Message) -> Content {
    if let Some(text) = msg.text() {
        return Content::Text(text.to_owned());
    }
    if let Some(largest) = msg.photo().and_then(<[_]>::last) {
        return Content::Photo {
            file_id: largest.file.id.to_string(),
            caption: msg.caption().map(str::to_owned),
        };
    }
    Content::Unsupported
}

/// A staff-group message as the relay sees it.
pub fn staff_message_of(msg: &Message) -> StaffMessage {
    StaffMessage {
        id: msg.id.0,
        thread_id: msg.thread_id.map(|thread| thread.0 .0),
        content: content_of(msg),
    }
}

/// What a `/delete` reply points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// A relay-forwarded user message, by its mirror id.
    Forward(MessageId),
    /// The sender's own reply, by its id.
    OwnReply(MessageId),
}

/// The parts of a replied-to message routing depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyContext {
    /// Id of the replied-to message.
    pub message_id: MessageId,
    /// Whether it is a forward.
    pub is_forward: bool,
    /// Who posted it.
    pub author_id: Option<u64>,
}

impl ReplyContext {
    /// Context of the message `msg` replies to, if any.
    pub fn of(msg: &Message) -> Option<Self> {
        msg.reply_to_message().map(|target| Self {
            message_id: target.id.0,
            is_forward: target.forward_origin().is_some(),
            author_id: target.from.as_ref().map(|u| u.id.0),
        })
    }

    /// Posted by the relay bot itself.
    pub fn is_authored_by(&self, bot_id: u64) -> bool {
        self.author_id == Some(bot_id)
    }

    /// A user message the relay forwarded; only these are answered.
    pub fn is_relay_forward(&self, bot_id: u64) -> bool {
        self.is_forward && self.is_authored_by(bot_id)
    }

    /// Resolve the target of a `/delete` sent by `sender_id`.
    ///
    /// Forwards win over authorship; anything else cannot be deleted by
    /// the sender.
    pub fn delete_target(&self, sender_id: u64) -> Option<DeleteTarget> {
        if self.is_forward {
            Some(DeleteTarget::Forward(self.message_id))
        } else if self.author_id == Some(sender_id) {
            Some(DeleteTarget::OwnReply(self.message_id))
        } else {
            None
        }
    }
}
