//! Message-relay and topic-state synchronization engine.
//!
//! Keeps a user's private chat and their staff-side forum topic in step:
//! - [`topics::TopicReconciler`] finds or recreates the user's topic
//! - [`messages::MessageRelay`] mirrors user messages and staff replies
//! - [`deletion::Deleter`] removes mirrored pairs
//! - [`changelog::ChangeLog`] tracks profile attributes over time
//! - [`users::UserDirectory`] covers user rows and ban status
//!
//! Every entry point takes already-extracted domain values; nothing here
//! sees a transport envelope. Transport and storage failures other than the
//! handled cases propagate as [`RelayError`] and the event is dropped by the
//! caller. Nothing is retried.

pub mod changelog;
pub mod deletion;
pub mod messages;
pub mod texts;
pub mod topics;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::model::{LogField, Message, MessageId, Topic, UserId, VALUE_EMPTY};
use crate::store::{Repos, StoreError};
use crate::transport::{ChatId, ChatTransport, Destination, TransportError};

use self::changelog::ChangeLog;
use self::deletion::Deleter;
use self::messages::MessageRelay;
use self::topics::TopicReconciler;
use self::users::UserDirectory;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Chat transport failed in a way the relay does not handle.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RelayError {
    /// Whether the failure was a lost optimistic-concurrency race. The
    /// caller may retry the whole event; the relay itself never does.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict { .. }))
    }
}

// ---------------------------------------------------------------------------
// Settings and inputs
// ---------------------------------------------------------------------------

/// Deployment settings injected into the engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// The staff forum group every topic lives in.
    pub staff_chat_id: ChatId,
    /// Scratch directory for attachments in transit.
    pub tmp_dir: PathBuf,
}

/// Profile attributes of an end-user as seen on an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// External user id.
    pub id: UserId,
    /// First and last name.
    pub full_name: String,
    /// Public handle without the `@`.
    pub username: Option<String>,
}

impl Profile {
    /// Topic label: `"<full name> (<username>)"`.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.full_name, self.username_value())
    }

    /// Username as stored in the change log.
    pub fn username_value(&self) -> &str {
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => VALUE_EMPTY,
        }
    }
}

/// Result of handling one inbound user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The user is banned; they were told so and nothing was relayed.
    Banned,
    /// The message was mirrored into the user's topic.
    Forwarded {
        /// Topic the message landed in.
        topic: Topic,
        /// Whether the topic was created for this message.
        created: bool,
        /// The recorded correspondence.
        message: Message,
    },
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// All relay engines wired over one transport and one set of repositories.
#[derive(Clone)]
pub struct Relay {
    /// Topic reconciliation.
    pub topics: TopicReconciler,
    /// Profile change log.
    pub changelog: ChangeLog,
    /// User rows and bans.
    pub users: UserDirectory,
    /// Message and reply mirroring.
    pub messages: MessageRelay,
    /// Deletion of mirrored pairs.
    pub deleter: Deleter,
    transport: Arc<dyn ChatTransport>,
    settings: RelaySettings,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Build every engine over `transport` and `repos`.
    pub fn new(transport: Arc<dyn ChatTransport>, repos: Repos, settings: RelaySettings) -> Self {
        let changelog = ChangeLog::new(
            Arc::clone(&transport),
            Arc::clone(&repos.user_logs),
            settings.staff_chat_id,
        );
        Self {
            topics: TopicReconciler::new(
                Arc::clone(&transport),
                Arc::clone(&repos.topics),
                settings.staff_chat_id,
            ),
            users: UserDirectory::new(
                Arc::clone(&repos.users),
                Arc::clone(&repos.topics),
                changelog.clone(),
            ),
            changelog,
            messages: MessageRelay::new(Arc::clone(&transport), repos.clone(), settings.clone()),
            deleter: Deleter::new(Arc::clone(&transport), repos),
            transport,
            settings,
        }
    }

    /// Deployment settings the engines were built with.
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Handle one message a user sent to the bot.
    ///
    /// Creates the user on first contact, refuses banned users, resolves the
    /// topic, logs name and handle changes, pins a user card into a freshly
    /// created topic, and finally forwards the message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError`] on any unhandled transport or storage failure.
    pub async fn receive(
        &self,
        profile: &Profile,
        message_id: MessageId,
    ) -> Result<Inbound, RelayError> {
        let user = self.users.get_or_create(profile.id).await?;

        if user.is_banned {
            debug!(user_id = user.id, "message from banned user refused");
            self.transport
                .send_text(
                    Destination::chat(user.id).replying_to(message_id),
                    texts::USER_BANNED,
                )
                .await?;
            return Ok(Inbound::Banned);
        }

        let (created, topic) = self.topics.resolve(profile, &user).await?;

        self.changelog
            .record_if_changed(user.id, LogField::FullName, &profile.full_name, topic.id)
            .await?;
        self.changelog
            .record_if_changed(
                user.id,
                LogField::Username,
                profile.username_value(),
                topic.id,
            )
            .await?;

        if created {
            let card = self.changelog.post_user_info(user.id, topic.id).await?;
            self.transport
                .pin_message(self.settings.staff_chat_id, card)
                .await?;
            info!(user_id = user.id, topic_id = topic.id, "new topic opened");
        }

        let message = self.messages.forward(message_id, &topic).await?;

        Ok(Inbound::Forwarded {
            topic,
            created,
            message,
        })
    }
}
