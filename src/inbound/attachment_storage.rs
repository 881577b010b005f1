use log::{debug, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use super::parser::ParsedAttachment;
use crate::models::AttachmentDescriptor;

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Sanitize a client-supplied filename for safe filesystem use
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(150)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

/// Attachment files written for one delivery attempt.
///
/// Every attempt gets its own directory, so a redelivery never touches the
/// files of a message that is already stored. The files are only referenced
/// once the delivery commits; otherwise `AttachmentStorage::discard` removes them.
#[derive(Debug)]
pub struct StagedAttachments {
    pub directory: PathBuf,
    pub descriptors: Vec<AttachmentDescriptor>,
}

/// Filesystem store for attachment content.
/// Layout: {root}/{mailbox_id}/{message_key}/{delivery_id}/{position}-{filename}
#[derive(Debug, Clone)]
pub struct AttachmentStorage {
    root: PathBuf,
}

impl AttachmentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage locator relative to the root.
    pub fn relative_path(
        mailbox_id: &str,
        message_key: &str,
        delivery_id: &str,
        position: usize,
        filename: &str,
    ) -> PathBuf {
        Path::new(mailbox_id)
            .join(message_key)
            .join(delivery_id)
            .join(format!("{}-{}", position, sanitize_filename(filename)))
    }

    /// Writes every attachment into a fresh delivery directory and returns
    /// descriptors pointing at them. A failed write removes what was written.
    pub async fn save_all(
        &self,
        mailbox_id: &str,
        message_key: &str,
        attachments: &[ParsedAttachment],
    ) -> Result<StagedAttachments, AttachmentError> {
        for key in [mailbox_id, message_key] {
            if key.is_empty() || key.contains(['/', '\\']) || key.chars().all(|c| c == '.') {
                return Err(AttachmentError::InvalidKey(key.to_string()));
            }
        }

        let delivery_id = Uuid::new_v4().simple().to_string();
        let directory = self.root.join(mailbox_id).join(message_key).join(&delivery_id);
        tokio::fs::create_dir_all(&directory).await?;

        let mut descriptors = Vec::with_capacity(attachments.len());
        for (position, attachment) in attachments.iter().enumerate() {
            let relative = Self::relative_path(mailbox_id, message_key, &delivery_id, position, &attachment.filename);
            let full_path = self.root.join(&relative);

            if let Err(e) = tokio::fs::write(&full_path, &attachment.content).await {
                self.discard(&directory).await;
                return Err(e.into());
            }
            debug!("Saved attachment {} to {:?}", attachment.filename, full_path);

            descriptors.push(AttachmentDescriptor {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                size: attachment.size() as i64,
                storage_path: Some(relative.to_string_lossy().to_string()),
            });
        }
        Ok(StagedAttachments { directory, descriptors })
    }

    /// Removes a delivery directory that no stored message references, and
    /// the message-key directory above it once that is empty.
    pub async fn discard(&self, directory: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(directory).await {
            warn!("Failed to remove unreferenced attachments at {:?}: {}", directory, e);
            return;
        }
        debug!("Removed unreferenced attachments at {:?}", directory);
        if let Some(parent) = directory.parent() {
            // Fails while another delivery of the same key still has files there.
            let _ = tokio::fs::remove_dir(parent).await;
        }
    }
}

/// Descriptors for attachments that are not kept on disk.
pub fn describe_only(attachments: &[ParsedAttachment]) -> Vec<AttachmentDescriptor> {
    attachments
        .iter()
        .map(|a| AttachmentDescriptor {
            filename: a.filename.clone(),
            content_type: a.content_type.clone(),
            size: a.size() as i64,
            storage_path: None,
        })
        .collect()
}
