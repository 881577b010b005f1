use serde::{Deserialize, Serialize};

/// Shared-secret credentials the relay provider presents on every call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCredentials {
    pub header_name: String,
    pub secret: String,
}

impl WebhookCredentials {
    pub fn new(header_name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            secret: secret.into(),
        }
    }

    /// Both the header name and the secret must be non-empty to accept any request.
    pub fn is_complete(&self) -> bool {
        !self.header_name.trim().is_empty() && !self.secret.is_empty()
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for WebhookCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookCredentials")
            .field("header_name", &self.header_name)
            .field("secret", &"<redacted>")
            .finish()
    }
}
