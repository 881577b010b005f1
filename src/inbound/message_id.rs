//! Message keys. Redelivery of the same message must land on the same key.

use sha2::{Digest, Sha256};

use super::parser::NormalizedMessage;

const MAX_KEY_LEN: usize = 200;

/// Sanitize an upstream message-id for use as a storage key.
/// Removes angle brackets and replaces anything outside a conservative set.
pub fn sanitize_message_id(message_id: &str) -> String {
    let sanitized: String = message_id
        .trim()
        .trim_matches('<')
        .trim_matches('>')
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '@' | '+' | '=' | '-' => c,
            _ => '_',
        })
        .take(MAX_KEY_LEN)
        .collect();

    // "." and ".." are not valid path segments
    if sanitized.chars().all(|c| c == '.') && !sanitized.is_empty() {
        format!("_{}", sanitized)
    } else {
        sanitized
    }
}

/// Key derived from message content, for relays that send no message-id.
pub fn content_key(recipient: &str, message: &NormalizedMessage) -> String {
    let sent_at = message.sent_at.map(|d| d.timestamp().to_string()).unwrap_or_default();
    let mut hasher = Sha256::new();
    for part in [
        recipient,
        message.from.as_str(),
        message.subject.as_str(),
        sent_at.as_str(),
        message.text_body.as_str(),
        message.html_body.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("h-{}", hex::encode(hasher.finalize()))
}

/// The storage key for `message` delivered to `recipient`.
pub fn derive_message_key(recipient: &str, message: &NormalizedMessage) -> String {
    message
        .upstream_message_id
        .as_deref()
        .map(sanitize_message_id)
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| content_key(recipient, message))
}
