//! [`ChatTransport`] over the Telegram Bot API (teloxide).
//!
//! Bot API failures arrive as free-form descriptions; [`classify_api_error`]
//! folds the ones the relay reacts to into [`TransportError`] variants and
//! leaves everything else as a fatal [`TransportError::Request`].

use std::path::Path;

use async_trait::async_trait;
use teloxide::adaptors::Throttle;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    InputFile, InputMedia, InputMediaPhoto, MessageId as TgMessageId, ParseMode,
    ReplyParameters, ThreadId as TgThreadId,
};
use teloxide::RequestError;
use tracing::debug;

use super::{ChatId as RawChatId, ChatTransport, Destination, TransportError};
use crate::model::{MessageId, ThreadId};

/// Telegram caps forum topic names at this many characters.
pub const MAX_THREAD_LABEL_CHARS: usize = 128;

/// Icon colour for new forum topics (one of the Bot API's fixed palette).
const THREAD_ICON_COLOR: u32 = 0x6F_B9_F0;

/// Bot client shared by the transport and the dispatcher; all requests go
/// through one throttle queue.
pub type ThrottledBot = Throttle<Bot>;

/// Telegram Bot API transport.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    bot: ThrottledBot,
}

impl TelegramTransport {
    /// Wrap a configured bot client.
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

/// Map a Bot API error description to a transport failure reason.
pub fn classify_api_error(description: &str) -> TransportError {
    let lower = description.to_ascii_lowercase();
    if lower.contains("topic_not_modified") || lower.contains("message is not modified") {
        TransportError::NotModified
    } else if lower.contains("topic_id_invalid")
        || lower.contains("message thread not found")
        || lower.contains("topic_deleted")
    {
        TransportError::ThreadNotFound
    } else if lower.starts_with("forbidden") || lower.contains("bot was blocked by the user") {
        TransportError::RecipientBlocked
    } else if lower.contains("message to delete not found")
        || lower.contains("message can't be deleted")
    {
        TransportError::MessageGone
    } else {
        TransportError::Request(description.to_owned())
    }
}

fn map_request_error(err: RequestError) -> TransportError {
    match err {
        RequestError::Api(api) => classify_api_error(&api.to_string()),
        other => TransportError::Request(other.to_string()),
    }
}

/// Truncate a thread label to the transport's limit on a char boundary.
pub fn clamp_label(label: &str) -> String {
    label.chars().take(MAX_THREAD_LABEL_CHARS).collect()
}

fn tg_thread(thread_id: ThreadId) -> TgThreadId {
    TgThreadId(TgMessageId(thread_id))
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn rename_thread(
        &self,
        chat_id: RawChatId,
        thread_id: ThreadId,
        label: &str,
    ) -> Result<(), TransportError> {
        self.bot
            .edit_forum_topic(ChatId(chat_id), tg_thread(thread_id))
            .name(clamp_label(label))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn create_thread(
        &self,
        chat_id: RawChatId,
        label: &str,
    ) -> Result<ThreadId, TransportError> {
        let topic = self
            .bot
            .create_forum_topic(
                ChatId(chat_id),
                clamp_label(label),
                THREAD_ICON_COLOR,
                String::new(),
            )
            .await
            .map_err(map_request_error)?;
        Ok(topic.thread_id.0 .0)
    }

    async fn forward(
        &self,
        to: Destination,
        from_chat: RawChatId,
        message_id: MessageId,
    ) -> Result<MessageId, TransportError> {
        let mut req = self.bot.forward_message(
            ChatId(to.chat_id),
            ChatId(from_chat),
            TgMessageId(message_id),
        );
        if let Some(thread_id) = to.thread_id {
            req = req.message_thread_id(tg_thread(thread_id));
        }
        let sent = req.await.map_err(map_request_error)?;
        Ok(sent.id.0)
    }

    async fn send_text(&self, to: Destination, text: &str) -> Result<MessageId, TransportError> {
        let mut req = self.bot.send_message(ChatId(to.chat_id), text);
        if let Some(thread_id) = to.thread_id {
            req = req.message_thread_id(tg_thread(thread_id));
        }
        if let Some(reply_to) = to.reply_to {
            req = req.reply_parameters(ReplyParameters::new(TgMessageId(reply_to)));
        }
        let sent = req.await.map_err(map_request_error)?;
        Ok(sent.id.0)
    }

    async fn send_html(&self, to: Destination, html: &str) -> Result<MessageId, TransportError> {
        let mut req = self
            .bot
            .send_message(ChatId(to.chat_id), html)
            .parse_mode(ParseMode::Html);
        if let Some(thread_id) = to.thread_id {
            req = req.message_thread_id(tg_thread(thread_id));
        }
        if let Some(reply_to) = to.reply_to {
            req = req.reply_parameters(ReplyParameters::new(TgMessageId(reply_to)));
        }
        let sent = req.await.map_err(map_request_error)?;
        Ok(sent.id.0)
    }

    async fn send_photo(
        &self,
        to: Destination,
        photo: &Path,
        caption: Option<&str>,
    ) -> Result<MessageId, TransportError> {
        let mut req = self
            .bot
            .send_photo(ChatId(to.chat_id), InputFile::file(photo));
        if let Some(caption) = caption {
            req = req.caption(caption);
        }
        if let Some(thread_id) = to.thread_id {
            req = req.message_thread_id(tg_thread(thread_id));
        }
        let sent = req.await.map_err(map_request_error)?;
        Ok(sent.id.0)
    }

    async fn edit_text(
        &self,
        chat_id: RawChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        self.bot
            .edit_message_text(ChatId(chat_id), TgMessageId(message_id), text)
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn edit_photo(
        &self,
        chat_id: RawChatId,
        message_id: MessageId,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut media = InputMediaPhoto::new(InputFile::file_id(file_id));
        if let Some(caption) = caption {
            media = media.caption(caption);
        }
        self.bot
            .edit_message_media(
                ChatId(chat_id),
                TgMessageId(message_id),
                InputMedia::Photo(media),
            )
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: RawChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(chat_id), TgMessageId(message_id))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn pin_message(
        &self,
        chat_id: RawChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        self.bot
            .pin_chat_message(ChatId(chat_id), TgMessageId(message_id))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), TransportError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(map_request_error)?;

        let mut dst = tokio::fs::File::create(dest).await?;

        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .map_err(|e| TransportError::Request(format!("file download failed: {e}")))?;

        debug!(path = %dest.display(), "attachment downloaded");

        Ok(())
    }
}
