//! Persistence boundary for the inbound pipeline.
//!
//! The webhook needs exactly three things from storage: the credential
//! record, an equality lookup of a mailbox by address, and a transactional
//! delivery that writes the message and bumps the mailbox counter together.

pub mod sqlite;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::{Mailbox, StoredMessage, WebhookCredentials};

pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database busy after {attempts} attempts")]
    Contention { attempts: u32 },
    #[error("Storage operation failed: {0}")]
    OperationFailed(String),
}

/// Result of a delivery transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Message written and counter incremented.
    Stored,
    /// A message with the same key already exists; nothing changed.
    Duplicate,
    /// The mailbox disappeared between lookup and delivery; nothing changed.
    MailboxGone,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailStore: Send + Sync {
    /// The administrator-managed credential record, if one has been written.
    async fn webhook_credentials(&self) -> Result<Option<WebhookCredentials>, StorageError>;

    /// Exact-match lookup on the mailbox address. Returns the oldest match.
    async fn find_mailbox_by_address(&self, address: &str) -> Result<Option<Mailbox>, StorageError>;

    /// Writes `message` under `mailbox` and increments its counter atomically.
    async fn deliver(&self, mailbox: &Mailbox, message: &StoredMessage) -> Result<DeliveryOutcome, StorageError>;
}
