// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared-secret authentication for the inbound webhook
//!
//! The relay provider sends a static secret in a configurable header. The
//! credentials are resolved once at startup and handed to the authenticator;
//! if none can be resolved every request is refused with 503.

use actix_web::http::header::HeaderMap;
use log::{info, warn};
use sha2::{Digest, Sha256};

use crate::api::errors::ApiError;
use crate::config::WebhookConfig;
use crate::models::WebhookCredentials;
use crate::store::{MailStore, StorageError};

#[derive(Debug, Clone)]
pub struct WebhookAuthenticator {
    credentials: Option<WebhookCredentials>,
}

impl WebhookAuthenticator {
    /// Incomplete credentials are treated as absent.
    pub fn new(credentials: Option<WebhookCredentials>) -> Self {
        Self {
            credentials: credentials.filter(WebhookCredentials::is_complete),
        }
    }

    /// Settings win over the stored credential record.
    pub async fn resolve(config: &WebhookConfig, store: &dyn MailStore) -> Result<Self, StorageError> {
        if let Some(secret) = config.secret.as_deref().filter(|s| !s.is_empty()) {
            info!("Using webhook secret from configuration (header: {})", config.header_name);
            return Ok(Self::new(Some(WebhookCredentials::new(config.header_name.clone(), secret))));
        }

        let stored = store.webhook_credentials().await?;
        match &stored {
            Some(creds) if creds.is_complete() => {
                info!("Using webhook secret from credential record (header: {})", creds.header_name)
            }
            Some(_) => warn!("Webhook credential record is incomplete - all webhook calls will be refused"),
            None => warn!("No webhook credentials configured - all webhook calls will be refused"),
        }
        Ok(Self::new(stored))
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let credentials = self.credentials.as_ref().ok_or(ApiError::NotConfigured)?;

        let provided = headers
            .get(credentials.header_name.trim())
            .and_then(|value| value.to_str().ok());

        match provided {
            Some(value) if secrets_match(&credentials.secret, value) => Ok(()),
            Some(_) => {
                warn!("Webhook call with invalid secret in {}", credentials.header_name);
                Err(ApiError::Unauthorized { reason: "invalid secret".to_string() })
            }
            None => {
                warn!("Webhook call missing {} header", credentials.header_name);
                Err(ApiError::Unauthorized { reason: format!("missing {} header", credentials.header_name) })
            }
        }
    }
}

/// Compares fixed-length digests so timing reveals neither content nor length.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let provided = Sha256::digest(provided.as_bytes());

    let mut diff = 0u8;
    for (a, b) in expected.iter().zip(provided.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
