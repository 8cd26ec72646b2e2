//! User rows: first-contact creation and ban status by topic.

use std::sync::Arc;

use tracing::{debug, info};

use super::changelog::ChangeLog;
use super::RelayError;
use crate::model::{ban_value, LogField, MessageId, ThreadId, User, UserId};
use crate::store::{StoreError, TopicRepo, UserRepo};

/// Creates users and flips their ban status.
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepo>,
    topics: Arc<dyn TopicRepo>,
    changelog: ChangeLog,
}

impl UserDirectory {
    /// Create a directory that logs ban changes through `changelog`.
    pub fn new(users: Arc<dyn UserRepo>, topics: Arc<dyn TopicRepo>, changelog: ChangeLog) -> Self {
        Self {
            users,
            topics,
            changelog,
        }
    }

    /// Fetch the user, creating an unbanned row on first contact.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] on database failure.
    pub async fn get_or_create(&self, id: UserId) -> Result<User, RelayError> {
        if let Some(user) = self.users.get(id).await? {
            return Ok(user);
        }
        let user = self.users.create(id).await?;
        info!(user_id = id, "new user registered");
        Ok(user)
    }

    /// Set the ban status of the user owning `topic_id`.
    ///
    /// Returns the updated user, or `None` when the thread is not a tracked
    /// topic. The ban-status change is recorded in the change log.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] with [`StoreError::Conflict`] when the
    /// user row changed concurrently.
    pub async fn set_ban_by_topic(
        &self,
        topic_id: ThreadId,
        is_banned: bool,
    ) -> Result<Option<User>, RelayError> {
        let Some(topic) = self.topics.get(topic_id).await? else {
            debug!(topic_id, "not a tracked topic, ban ignored");
            return Ok(None);
        };

        let Some(mut user) = self.users.get(topic.user_id).await? else {
            return Err(StoreError::NotFound {
                entity: "users",
                key: topic.user_id,
            }
            .into());
        };

        debug!(user_id = user.id, topic_id, is_banned, "setting ban status");
        user.is_banned = is_banned;
        let user = self.users.update(&user).await?;

        self.changelog
            .record_if_changed(user.id, LogField::IsBanned, ban_value(is_banned), topic.id)
            .await?;

        Ok(Some(user))
    }

    /// Post the user card of the owner of `topic_id` into that topic.
    ///
    /// Returns `None` when the thread is not a tracked topic.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] if the card cannot be built or sent.
    pub async fn send_user_info(&self, topic_id: ThreadId) -> Result<Option<MessageId>, RelayError> {
        let Some(topic) = self.topics.get(topic_id).await? else {
            debug!(topic_id, "not a tracked topic, user card skipped");
            return Ok(None);
        };
        let id = self.changelog.post_user_info(topic.user_id, topic.id).await?;
        Ok(Some(id))
    }
}
