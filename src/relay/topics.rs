//! Topic reconciliation: find the user's live forum thread or open a new one.
//!
//! The local table and the remote forum can disagree because staff may
//! delete a thread at any time. Renaming the newest recorded thread doubles
//! as an existence probe and keeps its label current; only an explicit
//! "thread not found" answer counts as evidence that it is gone.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{Profile, RelayError};
use crate::model::{Topic, User};
use crate::store::{Order, TopicRepo};
use crate::transport::{ChatId, ChatTransport, TransportError};

/// Resolves the staff-side topic for a user.
#[derive(Clone)]
pub struct TopicReconciler {
    transport: Arc<dyn ChatTransport>,
    topics: Arc<dyn TopicRepo>,
    staff_chat_id: ChatId,
}

impl TopicReconciler {
    /// Create a reconciler for topics in `staff_chat_id`.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        topics: Arc<dyn TopicRepo>,
        staff_chat_id: ChatId,
    ) -> Self {
        Self {
            transport,
            topics,
            staff_chat_id,
        }
    }

    /// Return `(created, topic)` for `user`.
    ///
    /// Reuses the newest recorded topic when the remote thread still exists
    /// (whether or not its label changed). When the thread was deleted
    /// remotely, or none was ever recorded, creates a new thread and row.
    /// Older rows are never touched.
    ///
    /// # Errors
    ///
    /// Any rename failure other than "not modified" or "thread not found"
    /// is returned as is; no duplicate thread is created in that case.
    pub async fn resolve(&self, profile: &Profile, user: &User) -> Result<(bool, Topic), RelayError> {
        let label = profile.display_label();
        let candidates = self.topics.filter_by_user(user.id, Order::Desc).await?;

        if let Some(candidate) = candidates.into_iter().next() {
            match self
                .transport
                .rename_thread(self.staff_chat_id, candidate.id, &label)
                .await
            {
                Ok(()) => {
                    debug!(topic_id = candidate.id, "topic label refreshed");
                    return Ok((false, candidate));
                }
                Err(TransportError::NotModified) => {
                    return Ok((false, candidate));
                }
                Err(TransportError::ThreadNotFound) => {
                    warn!(
                        topic_id = candidate.id,
                        user_id = user.id,
                        "topic deleted remotely, opening a new one"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let thread_id = self
            .transport
            .create_thread(self.staff_chat_id, &label)
            .await?;
        let topic = self.topics.create(thread_id, user.id).await?;
        info!(topic_id = topic.id, user_id = user.id, "topic created");
        Ok((true, topic))
    }
}
