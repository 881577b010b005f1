//! Inbound email ingestion: payload shapes, normalization, message keys,
//! attachment storage and the pipeline that ties them to the store.

pub mod attachment_storage;
pub mod message_id;
pub mod parser;
pub mod payload;
pub mod service;

pub use attachment_storage::{AttachmentError, AttachmentStorage, StagedAttachments};
pub use parser::{normalize, NormalizedMessage, ParseError, ParsedAttachment};
pub use payload::{FormFields, Payload, PayloadError};
pub use service::{DropReason, InboundService, IngestError, IngestOutcome};
