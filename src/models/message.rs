use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attachment metadata kept alongside a stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    /// Path of the stored content relative to the attachment root, if it was kept.
    pub storage_path: Option<String>,
}

/// One inbound email as persisted under its mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub inbox_id: String,
    pub user_id: String,
    pub from: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub html_content: String,
    pub text_content: String,
    pub raw_content: String,
    pub upstream_message_id: Option<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_archived: bool,
    pub is_spam: bool,
    pub attachments: Vec<AttachmentDescriptor>,
}
