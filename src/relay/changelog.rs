//! Append-only change log of tracked user attributes.
//!
//! The newest entry per `(user, field)` is the attribute's last known value.
//! A new value is appended whenever it differs; staff are notified only when
//! there was a previous value, so the first observation is silent.

use std::sync::Arc;

use tracing::debug;

use super::{texts, RelayError};
use crate::model::{LogField, MessageId, ThreadId, UserId};
use crate::store::{Order, UserLogRepo};
use crate::transport::{ChatId, ChatTransport, Destination};

/// Records attribute changes and renders the user card.
#[derive(Clone)]
pub struct ChangeLog {
    transport: Arc<dyn ChatTransport>,
    logs: Arc<dyn UserLogRepo>,
    staff_chat_id: ChatId,
}

impl ChangeLog {
    /// Create a change log posting notifications into `staff_chat_id`.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        logs: Arc<dyn UserLogRepo>,
        staff_chat_id: ChatId,
    ) -> Self {
        Self {
            transport,
            logs,
            staff_chat_id,
        }
    }

    /// Append `new_value` for `(user_id, field)` if it differs from the last
    /// recorded value, notifying `notify_topic` when a previous value existed.
    ///
    /// Returns whether an entry was appended.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the log cannot be read or written, or the
    /// notification cannot be posted.
    pub async fn record_if_changed(
        &self,
        user_id: UserId,
        field: LogField,
        new_value: &str,
        notify_topic: ThreadId,
    ) -> Result<bool, RelayError> {
        let history = self.logs.filter(user_id, Some(field), Order::Asc).await?;
        let previous = history.last().map(|entry| entry.value.as_str());

        if previous == Some(new_value) {
            return Ok(false);
        }

        if let Some(previous) = previous {
            self.transport
                .send_html(
                    Destination::thread(self.staff_chat_id, notify_topic),
                    &texts::field_changed(field, previous, new_value),
                )
                .await?;
        }

        self.logs.create(user_id, field, new_value).await?;
        debug!(user_id, field = field.as_str(), "user attribute logged");
        Ok(true)
    }

    /// Render the user card from the full log.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the log cannot be read.
    pub async fn user_info(&self, user_id: UserId) -> Result<String, RelayError> {
        let logs = self.logs.filter(user_id, None, Order::Asc).await?;
        Ok(texts::user_info(user_id, &logs))
    }

    /// Post the user card into `topic_id` and return its message id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the log cannot be read or the card cannot be sent.
    pub async fn post_user_info(
        &self,
        user_id: UserId,
        topic_id: ThreadId,
    ) -> Result<MessageId, RelayError> {
        let card = self.user_info(user_id).await?;
        let id = self
            .transport
            .send_html(Destination::thread(self.staff_chat_id, topic_id), &card)
            .await?;
        Ok(id)
    }
}
