//! Parse, resolve, persist. One call per webhook request.

use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

use super::attachment_storage::{describe_only, AttachmentError, AttachmentStorage, StagedAttachments};
use super::message_id::derive_message_key;
use super::parser::{normalize, NormalizedMessage, ParseError};
use super::payload::Payload;
use crate::models::{Mailbox, StoredMessage};
use crate::store::{DeliveryOutcome, MailStore, StorageError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Recipient could not be determined")]
    MissingRecipient,
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Attachment storage error: {0}")]
    Attachment(#[from] AttachmentError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoMailbox,
    MailboxGone,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoMailbox => "no mailbox for recipient",
            DropReason::MailboxGone => "mailbox removed during delivery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored { mailbox_id: String, message_id: String },
    Duplicate { mailbox_id: String, message_id: String },
    Dropped { recipient: String, reason: DropReason },
}

pub struct InboundService {
    store: Arc<dyn MailStore>,
    attachments: Option<AttachmentStorage>,
    max_raw_snapshot_bytes: usize,
}

impl InboundService {
    pub fn new(store: Arc<dyn MailStore>, max_raw_snapshot_bytes: usize) -> Self {
        Self {
            store,
            attachments: None,
            max_raw_snapshot_bytes,
        }
    }

    /// Keep attachment content on disk under `storage`.
    pub fn with_attachment_storage(mut self, storage: AttachmentStorage) -> Self {
        self.attachments = Some(storage);
        self
    }

    pub async fn ingest(&self, payload: &Payload) -> Result<IngestOutcome, IngestError> {
        let message = normalize(payload, self.max_raw_snapshot_bytes)?;
        let recipient = message.recipient.clone().ok_or(IngestError::MissingRecipient)?;

        let Some(mailbox) = self.store.find_mailbox_by_address(&recipient).await? else {
            info!("No mailbox for {}, dropping message", recipient);
            return Ok(IngestOutcome::Dropped {
                recipient,
                reason: DropReason::NoMailbox,
            });
        };
        debug!("Resolved {} to mailbox {}", recipient, mailbox.id);

        let message_key = derive_message_key(&recipient, &message);
        let (stored, staged) = self.build_message(&mailbox, &message_key, message).await?;

        let delivery = self.store.deliver(&mailbox, &stored).await;
        if !matches!(delivery, Ok(DeliveryOutcome::Stored)) {
            if let (Some(storage), Some(staged)) = (&self.attachments, &staged) {
                storage.discard(&staged.directory).await;
            }
        }

        let outcome = match delivery? {
            DeliveryOutcome::Stored => {
                info!(
                    "Stored message {} in mailbox {} ({} attachments)",
                    stored.id,
                    mailbox.id,
                    stored.attachments.len()
                );
                IngestOutcome::Stored {
                    mailbox_id: mailbox.id,
                    message_id: stored.id,
                }
            }
            DeliveryOutcome::Duplicate => {
                info!("Message {} already stored in mailbox {}", stored.id, mailbox.id);
                IngestOutcome::Duplicate {
                    mailbox_id: mailbox.id,
                    message_id: stored.id,
                }
            }
            DeliveryOutcome::MailboxGone => {
                info!("Mailbox {} removed before delivery, dropping message", mailbox.id);
                IngestOutcome::Dropped {
                    recipient,
                    reason: DropReason::MailboxGone,
                }
            }
        };
        Ok(outcome)
    }

    /// Builds the row to persist. Attachment content is written to a fresh
    /// delivery directory, returned so it can be discarded if nothing commits.
    async fn build_message(
        &self,
        mailbox: &Mailbox,
        message_key: &str,
        message: NormalizedMessage,
    ) -> Result<(StoredMessage, Option<StagedAttachments>), IngestError> {
        let (attachments, staged) = match &self.attachments {
            Some(storage) if !message.attachments.is_empty() => {
                let staged = storage.save_all(&mailbox.id, message_key, &message.attachments).await?;
                (staged.descriptors.clone(), Some(staged))
            }
            _ => (describe_only(&message.attachments), None),
        };

        let now = Utc::now();
        let stored = StoredMessage {
            id: message_key.to_string(),
            inbox_id: mailbox.id.clone(),
            user_id: mailbox.user_id.clone(),
            from: message.from,
            subject: message.subject,
            received_at: now,
            created_at: now,
            html_content: message.html_body,
            text_content: message.text_body,
            raw_content: message.raw_snapshot,
            upstream_message_id: message.upstream_message_id,
            is_read: false,
            is_starred: false,
            is_archived: false,
            is_spam: false,
            attachments,
        };
        Ok((stored, staged))
    }
}
