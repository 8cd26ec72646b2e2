//! Deletion of mirrored pairs.
//!
//! Only the copy living in the user's private chat is removed remotely; the
//! staff-side copy stays in the topic and staff clean it up by hand. Every
//! entry point is a logged no-op when the row is already gone, so deleting
//! twice never fails. The remote delete runs before the row is removed and a
//! remote failure keeps the row, except when the remote copy is already gone
//! or too old to delete: the row is dropped so bulk deletion can finish.

use std::sync::Arc;

use tracing::{debug, info};

use super::RelayError;
use crate::model::{MessageId, ThreadId, Topic, UserId};
use crate::store::{MessageRepo, MirrorFilter, ReplyRepo, Repos, StoreError, TopicRepo};
use crate::transport::{ChatTransport, TransportError};

/// Counts of pairs removed by [`Deleter::delete_history`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryReport {
    /// Relayed user messages removed.
    pub messages: usize,
    /// Staff replies removed.
    pub replies: usize,
}

/// Removes mirrored pairs from the user's chat and from storage.
#[derive(Clone)]
pub struct Deleter {
    transport: Arc<dyn ChatTransport>,
    topics: Arc<dyn TopicRepo>,
    messages: Arc<dyn MessageRepo>,
    replies: Arc<dyn ReplyRepo>,
}

impl Deleter {
    /// Create a deleter over `transport` and `repos`.
    pub fn new(transport: Arc<dyn ChatTransport>, repos: Repos) -> Self {
        Self {
            transport,
            topics: repos.topics,
            messages: repos.messages,
            replies: repos.replies,
        }
    }

    /// Staff deleted the mirror `mirror_id` of a user message: remove the
    /// user's original and its row.
    ///
    /// Returns whether a tracked message was found.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the remote delete or the row delete fails.
    pub async fn delete_by_staff_forward(&self, mirror_id: MessageId) -> Result<bool, RelayError> {
        let found = self
            .messages
            .filter(MirrorFilter::by_bot_message(mirror_id))
            .await?;
        let Some(message) = found.into_iter().next() else {
            debug!(mirror_id, "not a tracked message, delete ignored");
            return Ok(false);
        };

        let topic = self.owning_topic(message.topic_id).await?;
        self.delete_remote(topic.user_id, message.id).await?;
        self.messages.delete(&message).await?;
        debug!(message_id = message.id, topic_id = topic.id, "user message deleted");
        Ok(true)
    }

    /// Staff deleted their reply `staff_message_id`: remove the copy the
    /// user received and its row.
    ///
    /// Returns whether a tracked reply was found.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the remote delete or the row delete fails.
    pub async fn delete_reply(&self, staff_message_id: MessageId) -> Result<bool, RelayError> {
        let Some(reply) = self.replies.get(staff_message_id).await? else {
            debug!(message_id = staff_message_id, "not a tracked reply, delete ignored");
            return Ok(false);
        };

        let topic = self.owning_topic(reply.topic_id).await?;
        self.delete_remote(topic.user_id, reply.bot_message_id).await?;
        self.replies.delete(&reply).await?;
        debug!(reply_id = reply.id, topic_id = topic.id, "reply deleted");
        Ok(true)
    }

    /// Remove every relayed message and delivered reply of `topic_id` from
    /// the user's chat and from storage.
    ///
    /// An untracked topic removes nothing.
    ///
    /// # Errors
    ///
    /// Stops at the first failing remote or row delete; pairs already
    /// removed stay removed.
    pub async fn delete_history(&self, topic_id: ThreadId) -> Result<HistoryReport, RelayError> {
        let mut report = HistoryReport::default();
        let Some(topic) = self.topics.get(topic_id).await? else {
            debug!(topic_id, "not a tracked topic, history kept");
            return Ok(report);
        };

        for message in self.messages.filter(MirrorFilter::by_topic(topic.id)).await? {
            self.delete_remote(topic.user_id, message.id).await?;
            self.messages.delete(&message).await?;
            report.messages = report.messages.saturating_add(1);
        }

        for reply in self.replies.filter(MirrorFilter::by_topic(topic.id)).await? {
            self.delete_remote(topic.user_id, reply.bot_message_id).await?;
            self.replies.delete(&reply).await?;
            report.replies = report.replies.saturating_add(1);
        }

        info!(
            topic_id = topic.id,
            messages = report.messages,
            replies = report.replies,
            "topic history deleted"
        );
        Ok(report)
    }

    async fn delete_remote(
        &self,
        user_chat: UserId,
        message_id: MessageId,
    ) -> Result<(), RelayError> {
        match self.transport.delete_message(user_chat, message_id).await {
            Ok(()) => Ok(()),
            Err(TransportError::MessageGone) => {
                debug!(user_chat, message_id, "user-side copy already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn owning_topic(&self, topic_id: ThreadId) -> Result<Topic, RelayError> {
        self.topics.get(topic_id).await?.ok_or_else(|| {
            StoreError::NotFound {
                entity: "topics",
                key: i64::from(topic_id),
            }
            .into()
        })
    }
}
