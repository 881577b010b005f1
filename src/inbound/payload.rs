//! The two shapes a relay provider delivers mail in.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PayloadError {
    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
}

/// Relay-style pre-parsed fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "body-plain", skip_serializing_if = "Option::is_none")]
    pub body_plain: Option<String>,
    #[serde(rename = "body-html", skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(rename = "Message-Id", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    FormFields(FormFields),
    RawMime {
        bytes: Vec<u8>,
        /// Envelope recipient supplied next to the MIME stream (query string or form field).
        envelope_recipient: Option<String>,
    },
}

impl Payload {
    /// Chooses the payload shape from the request's content type.
    pub fn from_http(
        content_type: Option<&str>,
        body: &[u8],
        query_recipient: Option<String>,
    ) -> Result<Payload, PayloadError> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let payload = match mime.as_str() {
            "application/x-www-form-urlencoded" => {
                let pairs = url::form_urlencoded::parse(body)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()));
                Payload::from_pairs(pairs)
            }
            "application/json" => {
                let fields: BTreeMap<String, serde_json::Value> = serde_json::from_slice(body)
                    .map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
                let pairs = fields.into_iter().filter_map(|(k, v)| match v {
                    serde_json::Value::String(s) => Some((k, s)),
                    serde_json::Value::Number(n) => Some((k, n.to_string())),
                    serde_json::Value::Bool(b) => Some((k, b.to_string())),
                    _ => None,
                });
                Payload::from_pairs(pairs)
            }
            "multipart/form-data" => return Err(PayloadError::UnsupportedMediaType(mime)),
            _ => Payload::RawMime {
                bytes: body.to_vec(),
                envelope_recipient: None,
            },
        };

        Ok(payload.with_query_recipient(query_recipient))
    }

    /// Builds a payload from decoded key/value pairs. A `body-mime` field
    /// carries a complete message and takes precedence over the other fields.
    pub fn from_pairs<I, K, V>(pairs: I) -> Payload
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut fields = FormFields::default();
        let mut to = None;
        let mut sender = None;
        let mut body_mime = None;

        for (key, value) in pairs {
            let value = value.into();
            match key.as_ref() {
                "recipient" => fields.recipient = Some(value),
                "to" | "To" => to = Some(value),
                "from" | "From" => fields.from = Some(value),
                "sender" => sender = Some(value),
                "subject" | "Subject" => fields.subject = Some(value),
                "body-plain" | "text" => fields.body_plain = Some(value),
                "body-html" | "html" => fields.body_html = Some(value),
                "Message-Id" | "message-id" | "Message-ID" | "messageId" => fields.message_id = Some(value),
                "timestamp" => fields.timestamp = Some(value),
                "body-mime" => body_mime = Some(value),
                _ => {}
            }
        }

        fields.recipient = fields.recipient.or(to);
        fields.from = fields.from.or(sender);

        match body_mime {
            Some(mime) => Payload::RawMime {
                bytes: mime.into_bytes(),
                envelope_recipient: fields.recipient,
            },
            None => Payload::FormFields(fields),
        }
    }

    fn with_query_recipient(self, query_recipient: Option<String>) -> Payload {
        let Some(query_recipient) = query_recipient.filter(|r| !r.trim().is_empty()) else {
            return self;
        };
        match self {
            Payload::RawMime { bytes, .. } => Payload::RawMime {
                bytes,
                envelope_recipient: Some(query_recipient),
            },
            Payload::FormFields(mut fields) => {
                if fields.recipient.is_none() {
                    fields.recipient = Some(query_recipient);
                }
                Payload::FormFields(fields)
            }
        }
    }
}
