use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-owned, address-bound container for inbound messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    pub user_id: String,
    pub email_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub email_count: i64,
    pub is_archived: bool,
    pub is_starred: bool,
}

impl Mailbox {
    /// A fresh, empty mailbox. Used by fixtures and provisioning tools.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            email_address: email_address.into(),
            created_at: Utc::now(),
            expires_at: None,
            email_count: 0,
            is_archived: false,
            is_starred: false,
        }
    }
}
