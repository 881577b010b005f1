// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::{DeliveryOutcome, MailStore, StorageError};
use crate::config::DatabaseConfig;
use crate::models::{AttachmentDescriptor, Mailbox, StoredMessage, WebhookCredentials};

/// SQLite-backed store. Mailboxes and messages live in the tables created by
/// `migrations/`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SqliteStore {
    /// Connects, creating the database file and running migrations as needed.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        info!("Opening mail store at {}", config.url);

        if let Some(db_path) = config.url.strip_prefix("sqlite:") {
            let db_path = db_path.trim_start_matches("//");
            if !db_path.starts_with(":memory:") {
                let path = std::path::Path::new(db_path);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::OperationFailed(format!("Failed to create data directory: {}", e))
                    })?;
                }
                if !path.exists() {
                    info!("Database file doesn't exist, creating: {}", db_path);
                    std::fs::File::create(path).map_err(|e| {
                        StorageError::OperationFailed(format!("Failed to create database file: {}", e))
                    })?;
                }
            }
        }

        // How long SQLite itself waits on a held lock before reporting busy
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool, config);
        store.migrate().await?;
        Ok(store)
    }

    /// A private in-memory database with the schema applied. One connection,
    /// so every query sees the same database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self::from_pool(pool, &DatabaseConfig::default());
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            max_retries: config.max_retries.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Provisioning and inspection ---
    // The webhook never calls these; the front end owns mailbox lifecycle.

    pub async fn insert_mailbox(&self, mailbox: &Mailbox) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO mailboxes
                (id, user_id, email_address, created_at, expires_at, email_count, is_archived, is_starred)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mailbox.id)
        .bind(&mailbox.user_id)
        .bind(&mailbox.email_address)
        .bind(mailbox.created_at)
        .bind(mailbox.expires_at)
        .bind(mailbox.email_count)
        .bind(mailbox.is_archived)
        .bind(mailbox.is_starred)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_mailbox(&self, mailbox_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM mailboxes WHERE id = ?")
            .bind(mailbox_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_webhook_credentials(&self, credentials: &WebhookCredentials) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_credentials (id, header_name, secret, updated_at)
            VALUES (1, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                header_name = excluded.header_name,
                secret = excluded.secret,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&credentials.header_name)
        .bind(&credentials.secret)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_mailbox(&self, mailbox_id: &str) -> Result<Option<Mailbox>, StorageError> {
        let mailbox = sqlx::query_as::<_, Mailbox>(
            r#"
            SELECT id, user_id, email_address, created_at, expires_at, email_count, is_archived, is_starred
            FROM mailboxes WHERE id = ?
            "#,
        )
        .bind(mailbox_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(mailbox)
    }

    pub async fn count_messages(&self, mailbox_id: &str) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE mailbox_id = ?")
            .bind(mailbox_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_message(&self, mailbox_id: &str, message_id: &str) -> Result<Option<StoredMessage>, StorageError> {
        let row = sqlx::query_as::<_, (
            String, String, String, String, String,
            DateTime<Utc>, DateTime<Utc>,
            String, String, String, Option<String>,
            bool, bool, bool, bool,
        )>(
            r#"
            SELECT id, mailbox_id, user_id, from_text, subject,
                   received_at, created_at,
                   html_content, text_content, raw_content, upstream_message_id,
                   is_read, is_starred, is_archived, is_spam
            FROM messages WHERE mailbox_id = ? AND id = ?
            "#,
        )
        .bind(mailbox_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((
            id, inbox_id, user_id, from, subject,
            received_at, created_at,
            html_content, text_content, raw_content, upstream_message_id,
            is_read, is_starred, is_archived, is_spam,
        )) = row
        else {
            return Ok(None);
        };

        let attachments = sqlx::query_as::<_, (String, String, i64, Option<String>)>(
            r#"
            SELECT filename, content_type, size_bytes, storage_path
            FROM message_attachments
            WHERE mailbox_id = ? AND message_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(mailbox_id)
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(filename, content_type, size, storage_path)| AttachmentDescriptor {
            filename,
            content_type,
            size,
            storage_path,
        })
        .collect();

        Ok(Some(StoredMessage {
            id,
            inbox_id,
            user_id,
            from,
            subject,
            received_at,
            created_at,
            html_content,
            text_content,
            raw_content,
            upstream_message_id,
            is_read,
            is_starred,
            is_archived,
            is_spam,
            attachments,
        }))
    }

    /// One attempt at the delivery transaction. Counter first, so the write
    /// lock is taken up front and a vanished mailbox is detected before insert.
    async fn deliver_once(&self, mailbox: &Mailbox, message: &StoredMessage) -> Result<DeliveryOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE mailboxes SET email_count = email_count + 1 WHERE id = ?")
            .bind(&mailbox.id)
            .execute(&mut *tx)
            .await?;
        if bumped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(DeliveryOutcome::MailboxGone);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO messages
                (mailbox_id, id, user_id, from_text, subject, received_at, created_at,
                 html_content, text_content, raw_content, upstream_message_id,
                 is_read, is_starred, is_archived, is_spam)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(mailbox_id, id) DO NOTHING
            "#,
        )
        .bind(&mailbox.id)
        .bind(&message.id)
        .bind(&message.user_id)
        .bind(&message.from)
        .bind(&message.subject)
        .bind(message.received_at)
        .bind(message.created_at)
        .bind(&message.html_content)
        .bind(&message.text_content)
        .bind(&message.raw_content)
        .bind(&message.upstream_message_id)
        .bind(message.is_read)
        .bind(message.is_starred)
        .bind(message.is_archived)
        .bind(message.is_spam)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(DeliveryOutcome::Duplicate);
        }

        for (position, attachment) in message.attachments.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO message_attachments
                    (mailbox_id, message_id, position, filename, content_type, size_bytes, storage_path)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&mailbox.id)
            .bind(&message.id)
            .bind(position as i64)
            .bind(&attachment.filename)
            .bind(&attachment.content_type)
            .bind(attachment.size)
            .bind(&attachment.storage_path)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(DeliveryOutcome::Stored)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let busy_code = db_err
                .code()
                .map(|code| matches!(code.as_ref(), "5" | "6" | "261" | "262" | "517"))
                .unwrap_or(false);
            busy_code || db_err.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

#[async_trait]
impl MailStore for SqliteStore {
    async fn webhook_credentials(&self) -> Result<Option<WebhookCredentials>, StorageError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT header_name, secret FROM webhook_credentials WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(header_name, secret)| WebhookCredentials { header_name, secret }))
    }

    async fn find_mailbox_by_address(&self, address: &str) -> Result<Option<Mailbox>, StorageError> {
        let mailbox = sqlx::query_as::<_, Mailbox>(
            r#"
            SELECT id, user_id, email_address, created_at, expires_at, email_count, is_archived, is_starred
            FROM mailboxes
            WHERE email_address = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        debug!("Mailbox lookup for {}: {}", address, if mailbox.is_some() { "hit" } else { "miss" });
        Ok(mailbox)
    }

    async fn deliver(&self, mailbox: &Mailbox, message: &StoredMessage) -> Result<DeliveryOutcome, StorageError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.deliver_once(mailbox, message).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if is_contention(&e) => {
                    if attempt >= self.max_retries {
                        return Err(StorageError::Contention { attempts: attempt });
                    }
                    warn!(
                        "Delivery of {} to mailbox {} hit contention (attempt {}): {}",
                        message.id, mailbox.id, attempt, e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
