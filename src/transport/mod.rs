//! Chat-transport boundary consumed by the relay engines.
//!
//! The engines never see a Bot API type: they talk to a [`ChatTransport`] in
//! terms of chat ids, thread ids and message ids, and receive failures as a
//! closed set of [`TransportError`] reasons. Anything the transport cannot
//! classify is [`TransportError::Request`] and is treated as fatal.

pub mod telegram;

use std::path::Path;

use async_trait::async_trait;

use crate::model::{MessageId, ThreadId};

pub use self::telegram::{TelegramTransport, ThrottledBot};

/// Chat identifier. Positive for private chats (equal to the user id),
/// negative for groups.
pub type ChatId = i64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reasons reported by the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The forum thread does not exist (deleted on the remote side).
    #[error("forum thread not found")]
    ThreadNotFound,

    /// The edit would not change anything.
    #[error("not modified")]
    NotModified,

    /// The recipient blocked the bot; direct delivery is impossible.
    #[error("recipient blocked the bot")]
    RecipientBlocked,

    /// The message to delete is already gone or too old to be deleted.
    #[error("message is gone")]
    MessageGone,

    /// Any other transport failure.
    #[error("transport request failed: {0}")]
    Request(String),

    /// Local file handling for an attachment failed.
    #[error("attachment i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Relayable message content. Everything the relay cannot carry is
/// [`Content::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// A photo, referenced by the transport's persistent file id of its
    /// largest size.
    Photo {
        /// Persistent file reference.
        file_id: String,
        /// Optional caption.
        caption: Option<String>,
    },
    /// Any other kind (stickers, documents, voice, ...).
    Unsupported,
}

/// Where an outgoing text goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// Target chat.
    pub chat_id: ChatId,
    /// Forum thread inside the chat, if any.
    pub thread_id: Option<ThreadId>,
    /// Message to reply to, if any.
    pub reply_to: Option<MessageId>,
}

impl Destination {
    /// A chat without thread or reply context.
    pub fn chat(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            thread_id: None,
            reply_to: None,
        }
    }

    /// A forum thread inside `chat_id`.
    pub fn thread(chat_id: ChatId, thread_id: ThreadId) -> Self {
        Self {
            chat_id,
            thread_id: Some(thread_id),
            reply_to: None,
        }
    }

    /// Reply to `message_id`, keeping the thread.
    pub fn replying_to(self, message_id: MessageId) -> Self {
        Self {
            reply_to: Some(message_id),
            ..self
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Operations the relay needs from the chat surface.
///
/// Every method returns the id of the message it produced where there is one.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Rename a forum thread. Fails with [`TransportError::ThreadNotFound`]
    /// when the thread is gone and [`TransportError::NotModified`] when the
    /// label is unchanged.
    async fn rename_thread(
        &self,
        chat_id: ChatId,
        thread_id: ThreadId,
        label: &str,
    ) -> Result<(), TransportError>;

    /// Create a forum thread and return its id.
    async fn create_thread(&self, chat_id: ChatId, label: &str)
        -> Result<ThreadId, TransportError>;

    /// Forward `message_id` from `from_chat` into `to`, keeping attribution.
    async fn forward(
        &self,
        to: Destination,
        from_chat: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId, TransportError>;

    /// Send plain text.
    async fn send_text(&self, to: Destination, text: &str) -> Result<MessageId, TransportError>;

    /// Send HTML-formatted text.
    async fn send_html(&self, to: Destination, html: &str) -> Result<MessageId, TransportError>;

    /// Upload a local file as a photo.
    async fn send_photo(
        &self,
        to: Destination,
        photo: &Path,
        caption: Option<&str>,
    ) -> Result<MessageId, TransportError>;

    /// Replace the text of a previously delivered message.
    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Replace the photo and caption of a previously delivered message,
    /// using a persistent file reference.
    async fn edit_photo(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Delete a message.
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError>;

    /// Pin a message in its chat.
    async fn pin_message(&self, chat_id: ChatId, message_id: MessageId)
        -> Result<(), TransportError>;

    /// Download the file behind `file_id` into `dest`, overwriting it.
    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), TransportError>;
}
