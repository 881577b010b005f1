//! The inbound-email webhook and the health probe.

use actix_web::{
    error::PayloadError,
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    web::{self, BytesMut, Data},
    HttpRequest, HttpResponse,
};
use futures::StreamExt;
use log::debug;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::api::auth::WebhookAuthenticator;
use crate::api::errors::ApiError;
use crate::inbound::{InboundService, IngestOutcome, Payload};

/// Everything a webhook worker needs, shared across actix workers.
pub struct WebhookState {
    pub authenticator: WebhookAuthenticator,
    pub service: Arc<InboundService>,
    pub timeout: Duration,
    pub path: String,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl From<IngestOutcome> for WebhookResponse {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Stored { mailbox_id, message_id } => WebhookResponse {
                status: "stored",
                message_id: Some(message_id),
                inbox_id: Some(mailbox_id),
                recipient: None,
                reason: None,
            },
            IngestOutcome::Duplicate { mailbox_id, message_id } => WebhookResponse {
                status: "duplicate",
                message_id: Some(message_id),
                inbox_id: Some(mailbox_id),
                recipient: None,
                reason: None,
            },
            IngestOutcome::Dropped { recipient, reason } => WebhookResponse {
                status: "dropped",
                message_id: None,
                inbox_id: None,
                recipient: Some(recipient),
                reason: Some(reason.as_str()),
            },
        }
    }
}

/// Registers the webhook resource and `/health` on an app.
pub fn configure_webhook(state: Data<WebhookState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.service(
            web::resource(state.path.as_str())
                .app_data(state.clone())
                .route(web::post().to(inbound_email))
                .default_service(web::to(method_not_allowed)),
        )
        .route("/health", web::get().to(health));
    }
}

async fn inbound_email(
    req: HttpRequest,
    body: web::Payload,
    state: Data<WebhookState>,
) -> Result<HttpResponse, ApiError> {
    state.authenticator.authenticate(req.headers())?;
    let body = read_body(&req, body, state.max_payload_bytes).await?;

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let payload = Payload::from_http(content_type, &body, query_recipient(req.query_string()))?;
    debug!("Inbound webhook payload: {} bytes, content type {:?}", body.len(), content_type);

    let outcome = tokio::time::timeout(state.timeout, state.service.ingest(&payload))
        .await
        .map_err(|_| ApiError::GatewayTimeout { seconds: state.timeout.as_secs() })??;

    Ok(HttpResponse::Ok().json(WebhookResponse::from(outcome)))
}

/// Collects the request body, refusing anything over `max_size` bytes.
async fn read_body(req: &HttpRequest, mut body: web::Payload, max_size: usize) -> Result<BytesMut, ApiError> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_size) {
        return Err(ApiError::PayloadTooLarge { max_size });
    }

    let mut bytes = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| match e {
            PayloadError::Overflow => ApiError::PayloadTooLarge { max_size },
            other => ApiError::BadRequest { message: format!("Failed to read request body: {}", other) },
        })?;
        if bytes.len() + chunk.len() > max_size {
            return Err(ApiError::PayloadTooLarge { max_size });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed { method: req.method().to_string() })
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// First non-blank `recipient` query parameter.
fn query_recipient(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == "recipient" && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}
