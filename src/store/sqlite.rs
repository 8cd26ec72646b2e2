//! SQLite implementation of every repository trait.
//!
//! The schema is applied inline via `include_str!` on [`SqliteStore::open`]
//! (or explicitly with [`SqliteStore::migrate`] for pools built elsewhere).

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{
    MessageRepo, MirrorFilter, Order, ReplyRepo, StoreError, TopicRepo, UserLogRepo, UserRepo,
};
use crate::model::{LogField, Message, MessageId, Reply, ThreadId, Topic, User, UserId, UserLog};

const SCHEMA_SQL: &str = include_str!("../../migrations/001_schema.sql");

/// Tables in dependency order (parents first).
const TABLES: [&str; 5] = ["users", "topics", "messages", "replies", "user_logs"];

/// Relay state database backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool. The schema is not applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migration fails.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF")
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        let store = Self::new(pool);
        store.migrate().await?;
        info!(path = %path.display(), "relay database opened");
        Ok(store)
    }

    /// Apply the schema. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .context("failed to apply relay schema migration")?;
        Ok(())
    }

    /// Delete every row from every table, children first.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn clean(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin cleanup")?;
        for table in TABLES.iter().rev() {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to clean table {table}"))?;
            debug!(table, "table cleaned");
        }
        tx.commit().await.context("failed to commit cleanup")?;
        Ok(())
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidValue {
            field: "timestamp",
            value: raw.to_owned(),
        })
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[async_trait]
impl UserRepo for SqliteStore {
    async fn create(&self, id: UserId) -> Result<User, StoreError> {
        sqlx::query("INSERT INTO users (id, version, is_banned) VALUES (?1, 0, 0)")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(User {
            id,
            version: 0,
            is_banned: false,
        })
    }

    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<(i64, i64, bool)> =
            sqlx::query_as("SELECT id, version, is_banned FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, version, is_banned)| User {
            id,
            version,
            is_banned,
        }))
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE users SET is_banned = ?1, version = version + 1 \
             WHERE id = ?2 AND version = ?3",
        )
        .bind(user.is_banned)
        .bind(user.id)
        .bind(user.version)
        .execute(&mut *tx)
        .await?;

        let row: Option<(i64, i64, bool)> =
            sqlx::query_as("SELECT id, version, is_banned FROM users WHERE id = ?1")
                .bind(user.id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((id, version, is_banned)) = row else {
            return Err(StoreError::NotFound {
                entity: "users",
                key: user.id,
            });
        };
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict {
                entity: "users",
                key: user.id,
            });
        }

        tx.commit().await?;
        Ok(User {
            id,
            version,
            is_banned,
        })
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

#[async_trait]
impl TopicRepo for SqliteStore {
    async fn create(&self, id: ThreadId, user_id: UserId) -> Result<Topic, StoreError> {
        sqlx::query("INSERT INTO topics (id, user_id, version, is_open) VALUES (?1, ?2, 0, 1)")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(Topic {
            id,
            user_id,
            version: 0,
            is_open: true,
        })
    }

    async fn get(&self, id: ThreadId) -> Result<Option<Topic>, StoreError> {
        let row: Option<(i32, i64, i64, bool)> =
            sqlx::query_as("SELECT id, user_id, version, is_open FROM topics WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, user_id, version, is_open)| Topic {
            id,
            user_id,
            version,
            is_open,
        }))
    }

    async fn filter_by_user(
        &self,
        user_id: UserId,
        order: Order,
    ) -> Result<Vec<Topic>, StoreError> {
        let sql = format!(
            "SELECT id, user_id, version, is_open FROM topics \
             WHERE user_id = ?1 ORDER BY id {}",
            order.as_sql()
        );
        let rows: Vec<(i32, i64, i64, bool)> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, version, is_open)| Topic {
                id,
                user_id,
                version,
                is_open,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Messages and replies
// ---------------------------------------------------------------------------

/// Raw `(id, topic_id, version, bot_message_id)` row shared by both mirror tables.
type MirrorRow = (i32, i32, i64, i32);

impl SqliteStore {
    async fn insert_mirror(
        &self,
        table: &'static str,
        id: MessageId,
        bot_message_id: MessageId,
        topic_id: ThreadId,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {table} (id, topic_id, version, bot_message_id) VALUES (?1, ?2, 0, ?3)"
        ))
        .bind(id)
        .bind(topic_id)
        .bind(bot_message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `scope` narrows the lookup to one topic; messages need it because
    /// their ids repeat across private chats.
    async fn get_mirror(
        &self,
        table: &'static str,
        scope: Option<ThreadId>,
        id: MessageId,
    ) -> Result<Option<MirrorRow>, StoreError> {
        let row: Option<MirrorRow> = sqlx::query_as(&format!(
            "SELECT id, topic_id, version, bot_message_id FROM {table} \
             WHERE id = ?1 AND (?2 IS NULL OR topic_id = ?2)"
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn filter_mirrors(
        &self,
        table: &'static str,
        filter: MirrorFilter,
    ) -> Result<Vec<MirrorRow>, StoreError> {
        let rows: Vec<MirrorRow> = sqlx::query_as(&format!(
            "SELECT id, topic_id, version, bot_message_id FROM {table} \
             WHERE (?1 IS NULL OR bot_message_id = ?1) \
               AND (?2 IS NULL OR topic_id = ?2) \
             ORDER BY id ASC"
        ))
        .bind(filter.bot_message_id)
        .bind(filter.topic_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Compare-and-swap delete. A row that is already gone counts as deleted.
    async fn delete_mirror(
        &self,
        table: &'static str,
        topic_id: ThreadId,
        id: MessageId,
        version: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE topic_id = ?1 AND id = ?2 AND version = ?3"
        ))
        .bind(topic_id)
        .bind(id)
        .bind(version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let still_there: Option<(i64,)> = sqlx::query_as(&format!(
                "SELECT 1 FROM {table} WHERE topic_id = ?1 AND id = ?2"
            ))
            .bind(topic_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            if still_there.is_some() {
                return Err(StoreError::Conflict {
                    entity: table,
                    key: i64::from(id),
                });
            }
            debug!(table, id, "row already deleted");
        }

        tx.commit().await?;
        Ok(())
    }
}

fn message_from_row((id, topic_id, version, bot_message_id): MirrorRow) -> Message {
    Message {
        id,
        topic_id,
        version,
        bot_message_id,
    }
}

fn reply_from_row((id, topic_id, version, bot_message_id): MirrorRow) -> Reply {
    Reply {
        id,
        topic_id,
        version,
        bot_message_id,
    }
}

#[async_trait]
impl MessageRepo for SqliteStore {
    async fn create(
        &self,
        id: MessageId,
        bot_message_id: MessageId,
        topic_id: ThreadId,
    ) -> Result<Message, StoreError> {
        self.insert_mirror("messages", id, bot_message_id, topic_id)
            .await?;
        Ok(Message {
            id,
            topic_id,
            version: 0,
            bot_message_id,
        })
    }

    async fn get(
        &self,
        topic_id: ThreadId,
        id: MessageId,
    ) -> Result<Option<Message>, StoreError> {
        Ok(self
            .get_mirror("messages", Some(topic_id), id)
            .await?
            .map(message_from_row))
    }

    async fn filter(&self, filter: MirrorFilter) -> Result<Vec<Message>, StoreError> {
        let rows = self.filter_mirrors("messages", filter).await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn delete(&self, message: &Message) -> Result<(), StoreError> {
        self.delete_mirror("messages", message.topic_id, message.id, message.version)
            .await
    }
}

#[async_trait]
impl ReplyRepo for SqliteStore {
    async fn create(
        &self,
        id: MessageId,
        bot_message_id: MessageId,
        topic_id: ThreadId,
    ) -> Result<Reply, StoreError> {
        self.insert_mirror("replies", id, bot_message_id, topic_id)
            .await?;
        Ok(Reply {
            id,
            topic_id,
            version: 0,
            bot_message_id,
        })
    }

    async fn get(&self, id: MessageId) -> Result<Option<Reply>, StoreError> {
        Ok(self.get_mirror("replies", None, id).await?.map(reply_from_row))
    }

    async fn filter(&self, filter: MirrorFilter) -> Result<Vec<Reply>, StoreError> {
        let rows = self.filter_mirrors("replies", filter).await?;
        Ok(rows.into_iter().map(reply_from_row).collect())
    }

    async fn delete(&self, reply: &Reply) -> Result<(), StoreError> {
        self.delete_mirror("replies", reply.topic_id, reply.id, reply.version)
            .await
    }
}

// ---------------------------------------------------------------------------
// User log
// ---------------------------------------------------------------------------

#[async_trait]
impl UserLogRepo for SqliteStore {
    async fn create(
        &self,
        user_id: UserId,
        field: LogField,
        value: &str,
    ) -> Result<UserLog, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO user_logs (user_id, timestamp, field, value) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(format_timestamp(timestamp))
        .bind(field.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(UserLog {
            id: result.last_insert_rowid(),
            user_id,
            timestamp,
            field,
            value: value.to_owned(),
        })
    }

    async fn filter(
        &self,
        user_id: UserId,
        field: Option<LogField>,
        order: Order,
    ) -> Result<Vec<UserLog>, StoreError> {
        let dir = order.as_sql();
        let sql = format!(
            "SELECT id, user_id, timestamp, field, value FROM user_logs \
             WHERE user_id = ?1 AND (?2 IS NULL OR field = ?2) \
             ORDER BY timestamp {dir}, id {dir}"
        );
        let rows: Vec<(i64, i64, String, String, String)> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(field.map(|f| f.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, user_id, timestamp, field, value)| {
                Ok(UserLog {
                    id,
                    user_id,
                    timestamp: parse_timestamp(&timestamp)?,
                    field: LogField::parse(&field)?,
                    value,
                })
            })
            .collect()
    }
}
