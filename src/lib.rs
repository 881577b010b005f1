//! Library core for the tempinbox inbound webhook.

// --- Modules ---
pub mod api;
pub mod config;
pub mod inbound;
pub mod models;
pub mod store;

pub mod prelude {
    // Config
    pub use crate::config::Settings;

    // Pipeline
    pub use crate::inbound::{InboundService, IngestError, IngestOutcome, Payload};
    pub use crate::store::{DeliveryOutcome, MailStore, SqliteStore, StorageError};
    pub use crate::models::{Mailbox, StoredMessage, WebhookCredentials};

    // HTTP
    pub use crate::api::{ApiError, WebhookAuthenticator, WebhookState};

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
}
