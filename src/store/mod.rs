//! Repository interfaces over durable storage.
//!
//! Each entity gets a narrow CRUD-style trait: create, get by key, filter
//! with an optional ordering, update by key, delete by key. Every call runs
//! in its own transaction scope.
//!
//! Mutations on versioned rows are compare-and-swap on `version`: the caller
//! passes the row it read, and a concurrent writer that got there first makes
//! the call fail with [`StoreError::Conflict`] instead of being overwritten.
//! Deleting a row that is already gone is not an error.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{LogField, Message, MessageId, Reply, ThreadId, Topic, User, UserId, UserLog};

pub use self::sqlite::SqliteStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row changed since it was read; the write was rejected.
    #[error("{entity} {key} was modified concurrently")]
    Conflict {
        /// Table the conflicting row lives in.
        entity: &'static str,
        /// Primary key of the conflicting row.
        key: i64,
    },

    /// An update targeted a row that does not exist.
    #[error("{entity} {key} not found")]
    NotFound {
        /// Table that was searched.
        entity: &'static str,
        /// Primary key that was missing.
        key: i64,
    },

    /// A stored value could not be decoded.
    #[error("invalid {field} value: {value:?}")]
    InvalidValue {
        /// Which column contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Sort direction for filtered reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Oldest / lowest key first.
    #[default]
    Asc,
    /// Newest / highest key first.
    Desc,
}

impl Order {
    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Predicate for message and reply lookups. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorFilter {
    /// Match on the id of the mirrored copy.
    pub bot_message_id: Option<MessageId>,
    /// Match on the owning topic.
    pub topic_id: Option<ThreadId>,
}

impl MirrorFilter {
    /// Filter on the mirrored copy's id.
    pub fn by_bot_message(bot_message_id: MessageId) -> Self {
        Self {
            bot_message_id: Some(bot_message_id),
            topic_id: None,
        }
    }

    /// Filter on the owning topic.
    pub fn by_topic(topic_id: ThreadId) -> Self {
        Self {
            bot_message_id: None,
            topic_id: Some(topic_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

/// Accessor for [`User`] rows.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a new, unbanned user.
    async fn create(&self, id: UserId) -> Result<User, StoreError>;
    /// Fetch a user by id.
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError>;
    /// Persist `user.is_banned` if `user.version` is still current.
    ///
    /// Returns the stored row with its bumped version.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

/// Accessor for [`Topic`] rows.
#[async_trait]
pub trait TopicRepo: Send + Sync {
    /// Insert a new open topic for `user_id`.
    async fn create(&self, id: ThreadId, user_id: UserId) -> Result<Topic, StoreError>;
    /// Fetch a topic by thread id.
    async fn get(&self, id: ThreadId) -> Result<Option<Topic>, StoreError>;
    /// All topics owned by `user_id`, ordered by thread id.
    async fn filter_by_user(&self, user_id: UserId, order: Order)
        -> Result<Vec<Topic>, StoreError>;
}

/// Accessor for [`Message`] rows.
#[async_trait]
pub trait MessageRepo: Send + Sync {
    /// Record the correspondence of a relayed user message.
    async fn create(
        &self,
        id: MessageId,
        bot_message_id: MessageId,
        topic_id: ThreadId,
    ) -> Result<Message, StoreError>;
    /// Fetch by the original message id within `topic_id`.
    async fn get(&self, topic_id: ThreadId, id: MessageId)
        -> Result<Option<Message>, StoreError>;
    /// Rows matching `filter`, ordered by id.
    async fn filter(&self, filter: MirrorFilter) -> Result<Vec<Message>, StoreError>;
    /// Delete the row if `message.version` is still current.
    async fn delete(&self, message: &Message) -> Result<(), StoreError>;
}

/// Accessor for [`Reply`] rows.
#[async_trait]
pub trait ReplyRepo: Send + Sync {
    /// Record the correspondence of a delivered staff reply.
    async fn create(
        &self,
        id: MessageId,
        bot_message_id: MessageId,
        topic_id: ThreadId,
    ) -> Result<Reply, StoreError>;
    /// Fetch by the staff message id.
    async fn get(&self, id: MessageId) -> Result<Option<Reply>, StoreError>;
    /// Rows matching `filter`, ordered by id.
    async fn filter(&self, filter: MirrorFilter) -> Result<Vec<Reply>, StoreError>;
    /// Delete the row if `reply.version` is still current.
    async fn delete(&self, reply: &Reply) -> Result<(), StoreError>;
}

/// Accessor for the append-only [`UserLog`].
#[async_trait]
pub trait UserLogRepo: Send + Sync {
    /// Append an entry stamped with the current time.
    async fn create(
        &self,
        user_id: UserId,
        field: LogField,
        value: &str,
    ) -> Result<UserLog, StoreError>;
    /// Entries for `user_id` (optionally one field), ordered by timestamp then id.
    async fn filter(
        &self,
        user_id: UserId,
        field: Option<LogField>,
        order: Order,
    ) -> Result<Vec<UserLog>, StoreError>;
}

/// The full set of repositories the engines consume.
#[derive(Clone)]
pub struct Repos {
    /// User rows.
    pub users: Arc<dyn UserRepo>,
    /// Topic rows.
    pub topics: Arc<dyn TopicRepo>,
    /// Relayed user messages.
    pub messages: Arc<dyn MessageRepo>,
    /// Delivered staff replies.
    pub replies: Arc<dyn ReplyRepo>,
    /// User change log.
    pub user_logs: Arc<dyn UserLogRepo>,
}

impl Repos {
    /// Serve every repository from one SQLite store.
    pub fn sqlite(store: SqliteStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: Arc::clone(&store) as Arc<dyn UserRepo>,
            topics: Arc::clone(&store) as Arc<dyn TopicRepo>,
            messages: Arc::clone(&store) as Arc<dyn MessageRepo>,
            replies: Arc::clone(&store) as Arc<dyn ReplyRepo>,
            user_logs: store,
        }
    }
}

impl std::fmt::Debug for Repos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repos").finish_non_exhaustive()
    }
}
