// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Normalizes either payload shape into one `NormalizedMessage`.

use chrono::{DateTime, Utc};
use log::debug;
use mail_parser::{Addr, Message, MessageParser, MessagePartId, MimeHeaders, PartType};
use regex::Regex;
use thiserror::Error;

use super::payload::{FormFields, Payload};

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Empty MIME payload")]
    Empty,
    #[error("MIME payload does not start with a header field")]
    MissingHeaders,
    #[error("MIME payload could not be parsed")]
    Unparseable,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl ParsedAttachment {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// The canonical form every inbound message is reduced to before persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedMessage {
    pub recipient: Option<String>,
    pub from: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<ParsedAttachment>,
    pub upstream_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub raw_snapshot: String,
}

lazy_static::lazy_static! {
    // RFC 5322 field name: printable ASCII except colon, then a colon.
    static ref HEADER_LINE_RE: Regex = Regex::new(r"^[!-9;-~]+[ \t]*:").unwrap();
}

pub fn normalize(payload: &Payload, max_snapshot_bytes: usize) -> Result<NormalizedMessage, ParseError> {
    match payload {
        Payload::FormFields(fields) => normalize_fields(fields, max_snapshot_bytes),
        Payload::RawMime { bytes, envelope_recipient } => {
            normalize_mime(bytes, envelope_recipient.as_deref(), max_snapshot_bytes)
        }
    }
}

fn normalize_fields(fields: &FormFields, max_snapshot_bytes: usize) -> Result<NormalizedMessage, ParseError> {
    let snapshot = serde_json::to_string(fields).map_err(|e| ParseError::InvalidPayload(e.to_string()))?;

    Ok(NormalizedMessage {
        recipient: fields.recipient.as_deref().and_then(extract_address),
        from: fields.from.clone().unwrap_or_default(),
        subject: fields.subject.clone().unwrap_or_default(),
        text_body: fields.body_plain.clone().unwrap_or_default(),
        html_body: fields.body_html.clone().unwrap_or_default(),
        attachments: Vec::new(),
        upstream_message_id: fields.message_id.clone().filter(|id| !id.trim().is_empty()),
        sent_at: fields
            .timestamp
            .as_deref()
            .and_then(|ts| ts.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        raw_snapshot: truncate_snapshot(snapshot, max_snapshot_bytes),
    })
}

fn normalize_mime(
    bytes: &[u8],
    envelope_recipient: Option<&str>,
    max_snapshot_bytes: usize,
) -> Result<NormalizedMessage, ParseError> {
    let headers_start = skip_mbox_separator(bytes);
    let first_line = headers_start.split(|b| *b == b'\n').next().unwrap_or_default();
    if headers_start.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::Empty);
    }
    if !HEADER_LINE_RE.is_match(&String::from_utf8_lossy(first_line)) {
        return Err(ParseError::MissingHeaders);
    }

    let message = MessageParser::default().parse(headers_start).ok_or(ParseError::Unparseable)?;

    let recipient = envelope_recipient
        .and_then(extract_address)
        .or_else(|| message.header_raw("X-Original-To").and_then(extract_address))
        .or_else(|| message.header_raw("Delivered-To").and_then(extract_address))
        .or_else(|| {
            message
                .to()
                .and_then(|to| to.first())
                .and_then(|addr| addr.address())
                .and_then(extract_address)
        });

    let from = message.from().and_then(|from| from.first()).map(display_address).unwrap_or_default();

    let attachments: Vec<ParsedAttachment> = message
        .attachments()
        .enumerate()
        .map(|(idx, part)| ParsedAttachment {
            filename: part
                .attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment-{}", idx + 1)),
            content_type: part
                .content_type()
                .map(|ct| format!("{}/{}", ct.ctype(), ct.subtype().unwrap_or("octet-stream")))
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            content: part.contents().to_vec(),
        })
        .collect();

    debug!(
        "Parsed MIME message: {} bytes, {} attachments, message-id present: {}",
        bytes.len(),
        attachments.len(),
        message.message_id().is_some()
    );

    Ok(NormalizedMessage {
        recipient,
        from,
        subject: message.subject().unwrap_or_default().to_string(),
        text_body: first_body(&message, &message.text_body, false),
        html_body: first_body(&message, &message.html_body, true),
        upstream_message_id: message.message_id().map(String::from),
        sent_at: message.date().and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0)),
        attachments,
        raw_snapshot: truncate_snapshot(String::from_utf8_lossy(bytes).into_owned(), max_snapshot_bytes),
    })
}

/// The first body part of the wanted kind. The parser lists a text part under
/// both bodies when only one kind exists, so the part type is checked rather
/// than converting between HTML and text.
fn first_body(message: &Message<'_>, part_ids: &[MessagePartId], want_html: bool) -> String {
    part_ids
        .iter()
        .filter_map(|id| message.parts.get(*id as usize))
        .find_map(|part| match &part.body {
            PartType::Html(html) if want_html => Some(html.to_string()),
            PartType::Text(text) if !want_html => Some(text.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn display_address(addr: &Addr<'_>) -> String {
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) if !name.trim().is_empty() => format!("{} <{}>", name.trim(), address),
        (_, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

/// Reduces `Name <addr>` to `addr` and trims whitespace. Case is preserved
/// because mailbox lookup is an exact match.
pub fn extract_address(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let address = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    let address = address.trim();
    if address.is_empty() {
        None
    } else {
        Some(address.to_string())
    }
}

/// Drops a leading mbox `From sender date` envelope line, which is not a header field.
fn skip_mbox_separator(bytes: &[u8]) -> &[u8] {
    if !bytes.starts_with(b"From ") {
        return bytes;
    }
    match bytes.iter().position(|b| *b == b'\n') {
        Some(end) => &bytes[end + 1..],
        None => &[],
    }
}

fn truncate_snapshot(mut snapshot: String, max_bytes: usize) -> String {
    if snapshot.len() > max_bytes {
        let mut cut = max_bytes;
        while !snapshot.is_char_boundary(cut) {
            cut -= 1;
        }
        snapshot.truncate(cut);
    }
    snapshot
}
