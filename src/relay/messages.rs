//! Mirroring of user messages into topics and of staff replies back to users.
//!
//! Each successfully mirrored item leaves a row linking the original id to
//! the copy's id; deletion relies on those rows. A row is written only after
//! the remote side succeeded.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{texts, RelayError, RelaySettings};
use crate::model::{Message, MessageId, Reply, ThreadId, Topic};
use crate::store::{MessageRepo, ReplyRepo, Repos, TopicRepo};
use crate::transport::{ChatTransport, Content, Destination, TransportError};

/// A message written by staff inside the staff group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffMessage {
    /// Id of the staff message.
    pub id: MessageId,
    /// Forum thread it was written in, if any.
    pub thread_id: Option<ThreadId>,
    /// What it carries.
    pub content: Content,
}

/// Outcome of relaying or editing a staff reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply reached the user and was recorded.
    Delivered(Reply),
    /// The previously delivered copy was updated.
    Edited(Reply),
    /// The thread or reply is not tracked; nothing happened.
    Untracked,
    /// Staff were told the content kind is not supported.
    Unsupported,
    /// Staff were told the user blocked the bot.
    Blocked,
}

/// Mirrors messages across the two surfaces.
#[derive(Clone)]
pub struct MessageRelay {
    transport: Arc<dyn ChatTransport>,
    topics: Arc<dyn TopicRepo>,
    messages: Arc<dyn MessageRepo>,
    replies: Arc<dyn ReplyRepo>,
    settings: RelaySettings,
}

impl MessageRelay {
    /// Create a relay over `transport` and `repos`.
    pub fn new(transport: Arc<dyn ChatTransport>, repos: Repos, settings: RelaySettings) -> Self {
        Self {
            transport,
            topics: repos.topics,
            messages: repos.messages,
            replies: repos.replies,
            settings,
        }
    }

    /// Forward the user's message `message_id` into `topic` and record the
    /// correspondence. Forwarding keeps the sender attribution and carries
    /// any content the transport supports.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the forward or the insert fails.
    pub async fn forward(&self, message_id: MessageId, topic: &Topic) -> Result<Message, RelayError> {
        let mirror_id = self
            .transport
            .forward(
                Destination::thread(self.settings.staff_chat_id, topic.id),
                topic.user_id,
                message_id,
            )
            .await?;
        let message = self.messages.create(message_id, mirror_id, topic.id).await?;
        debug!(message_id, mirror_id, topic_id = topic.id, "user message forwarded");
        Ok(message)
    }

    /// Deliver a staff reply to the owner of the thread it was written in.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] on transport failures other than a blocked
    /// recipient, or on storage failure.
    pub async fn reply(&self, staff: &StaffMessage) -> Result<ReplyOutcome, RelayError> {
        let Some(topic) = self.tracked_topic(staff).await? else {
            return Ok(ReplyOutcome::Untracked);
        };

        let delivered = match &staff.content {
            Content::Text(text) => {
                self.transport
                    .send_text(Destination::chat(topic.user_id), text)
                    .await
            }
            Content::Photo { file_id, caption } => {
                self.send_photo(topic.user_id, file_id, caption.as_deref())
                    .await
            }
            Content::Unsupported => {
                self.notify(staff, &topic, texts::UNSUPPORTED_CONTENT).await?;
                return Ok(ReplyOutcome::Unsupported);
            }
        };

        match delivered {
            Ok(copy_id) => {
                let reply = self.replies.create(staff.id, copy_id, topic.id).await?;
                debug!(reply_id = staff.id, copy_id, topic_id = topic.id, "reply delivered");
                Ok(ReplyOutcome::Delivered(reply))
            }
            Err(TransportError::RecipientBlocked) => {
                warn!(user_id = topic.user_id, "user blocked the bot, reply dropped");
                self.notify(staff, &topic, texts::USER_BLOCKED_BOT).await?;
                Ok(ReplyOutcome::Blocked)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-deliver an edited staff reply over the copy delivered earlier.
    ///
    /// Photos are re-sent by their persistent file reference. Never creates
    /// a reply row.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] on transport failures other than a blocked
    /// recipient or an unchanged message, or on storage failure.
    pub async fn edit_reply(&self, staff: &StaffMessage) -> Result<ReplyOutcome, RelayError> {
        let Some(topic) = self.tracked_topic(staff).await? else {
            return Ok(ReplyOutcome::Untracked);
        };
        let Some(reply) = self.replies.get(staff.id).await? else {
            debug!(message_id = staff.id, "not a tracked reply, edit ignored");
            return Ok(ReplyOutcome::Untracked);
        };

        let edited = match &staff.content {
            Content::Text(text) => {
                self.transport
                    .edit_text(topic.user_id, reply.bot_message_id, text)
                    .await
            }
            Content::Photo { file_id, caption } => {
                self.transport
                    .edit_photo(
                        topic.user_id,
                        reply.bot_message_id,
                        file_id,
                        caption.as_deref(),
                    )
                    .await
            }
            Content::Unsupported => {
                self.notify(staff, &topic, texts::UNSUPPORTED_CONTENT).await?;
                return Ok(ReplyOutcome::Unsupported);
            }
        };

        match edited {
            Ok(()) | Err(TransportError::NotModified) => {
                debug!(reply_id = reply.id, "reply edit relayed");
                Ok(ReplyOutcome::Edited(reply))
            }
            Err(TransportError::RecipientBlocked) => {
                warn!(user_id = topic.user_id, "user blocked the bot, edit dropped");
                self.notify(staff, &topic, texts::USER_BLOCKED_BOT).await?;
                Ok(ReplyOutcome::Blocked)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn tracked_topic(&self, staff: &StaffMessage) -> Result<Option<Topic>, RelayError> {
        let Some(thread_id) = staff.thread_id else {
            debug!(message_id = staff.id, "staff message outside any thread, ignored");
            return Ok(None);
        };
        let topic = self.topics.get(thread_id).await?;
        if topic.is_none() {
            debug!(thread_id, "not a tracked topic, skipping");
        }
        Ok(topic)
    }

    /// Download the photo into a scratch file, send it, and remove the file
    /// on every exit path.
    async fn send_photo(
        &self,
        user_chat: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, TransportError> {
        tokio::fs::create_dir_all(&self.settings.tmp_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("reply-")
            .suffix(".jpg")
            .tempfile_in(&self.settings.tmp_dir)?;

        self.transport.download(file_id, scratch.path()).await?;
        let sent = self
            .transport
            .send_photo(Destination::chat(user_chat), scratch.path(), caption)
            .await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove scratch attachment");
        }
        sent
    }

    async fn notify(&self, staff: &StaffMessage, topic: &Topic, text: &str) -> Result<(), RelayError> {
        self.transport
            .send_text(
                Destination::thread(self.settings.staff_chat_id, topic.id).replying_to(staff.id),
                text,
            )
            .await?;
        Ok(())
    }
}
