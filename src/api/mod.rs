//! HTTP surface: the inbound webhook and its server.

pub mod auth;
pub mod errors;
pub mod rest;
pub mod webhook;

pub use auth::WebhookAuthenticator;
pub use errors::{ApiError, ErrorResponse};
pub use rest::{build_state, run_server};
pub use webhook::{configure_webhook, WebhookResponse, WebhookState};
