//! Turns raw RFC 822 bytes into a [`MailboxMessage`].
//!
//! Decoding never fails. A malformed header or an undecodable part degrades to
//! a placeholder or an empty body so that one bad message cannot abort a batch.

use log::{debug, warn};
use mailparse::{MailHeaderMap, ParsedMail};
use crate::models::email::{MailboxMessage, MessageId};

pub const NO_SUBJECT: &str = "(no subject)";

/// Result of trying to read one MIME part as text.
#[derive(Debug, PartialEq)]
enum PartOutcome {
    Text(String),
    Skip(String),
}

pub fn decode(id: MessageId, raw: &[u8]) -> MailboxMessage {
    let parsed = match mailparse::parse_mail(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Message {} could not be parsed: {}", id, e);
            return MailboxMessage {
                id,
                subject: NO_SUBJECT.to_string(),
                sender: String::new(),
                body: String::new(),
            };
        }
    };

    let message = MailboxMessage {
        subject: decode_subject(&parsed),
        sender: raw_sender(&parsed),
        body: extract_body(&parsed, &id),
        id,
    };
    debug!("Decoded {}", message);
    message
}

/// RFC 2047 words are decoded with their declared charset; bare 8-bit bytes
/// are read as UTF-8 with a latin-1 fallback.
fn decode_subject(parsed: &ParsedMail) -> String {
    parsed.headers
        .get_first_header("Subject")
        .map(|header| header.get_value().trim().to_string())
        .unwrap_or_else(|| NO_SUBJECT.to_string())
}

fn raw_sender(parsed: &ParsedMail) -> String {
    parsed.headers
        .get_first_header("From")
        .map(|header| unfold(&String::from_utf8_lossy(header.get_value_raw())))
        .unwrap_or_default()
}

fn unfold(value: &str) -> String {
    value.split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_body(parsed: &ParsedMail, id: &MessageId) -> String {
    // A multipart type without a boundary parses to no subparts; read it whole.
    if is_multipart(parsed) && !parsed.subparts.is_empty() {
        return first_plain_text(parsed, id).unwrap_or_default();
    }
    match decode_payload(parsed) {
        PartOutcome::Text(text) => text,
        PartOutcome::Skip(reason) => {
            debug!("Message {}: body left empty ({})", id, reason);
            String::new()
        }
    }
}

fn is_multipart(part: &ParsedMail) -> bool {
    part.ctype.mimetype.to_ascii_lowercase().starts_with("multipart/")
}

/// Depth-first, root first. The first `text/plain` part that decodes wins.
/// Attached `message/rfc822` parts are parsed and walked in place.
fn first_plain_text(part: &ParsedMail, id: &MessageId) -> Option<String> {
    if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
        match decode_payload(part) {
            PartOutcome::Text(text) => return Some(text),
            PartOutcome::Skip(reason) => {
                debug!("Message {}: skipping text/plain part ({})", id, reason);
            }
        }
    }
    if part.ctype.mimetype.eq_ignore_ascii_case("message/rfc822") {
        match embedded_plain_text(part, id) {
            PartOutcome::Text(text) => return Some(text),
            PartOutcome::Skip(reason) => {
                debug!("Message {}: skipping attached message ({})", id, reason);
            }
        }
    }
    part.subparts.iter().find_map(|sub| first_plain_text(sub, id))
}

fn embedded_plain_text(part: &ParsedMail, id: &MessageId) -> PartOutcome {
    let bytes = match part.get_body_raw() {
        Ok(bytes) => bytes,
        Err(e) => return PartOutcome::Skip(format!("transfer decoding failed: {}", e)),
    };
    let inner = match mailparse::parse_mail(&bytes) {
        Ok(inner) => inner,
        Err(e) => return PartOutcome::Skip(format!("unparseable: {}", e)),
    };
    match first_plain_text(&inner, id) {
        Some(text) => PartOutcome::Text(text),
        None => PartOutcome::Skip("no text/plain part".to_string()),
    }
}

fn decode_payload(part: &ParsedMail) -> PartOutcome {
    let bytes = match part.get_body_raw() {
        Ok(bytes) => bytes,
        Err(e) => return PartOutcome::Skip(format!("transfer decoding failed: {}", e)),
    };

    if is_utf8_family(&part.ctype.charset) {
        return match String::from_utf8(bytes) {
            Ok(text) => PartOutcome::Text(text),
            Err(e) => PartOutcome::Skip(format!("invalid utf-8: {}", e)),
        };
    }

    match part.get_body() {
        Ok(text) => PartOutcome::Text(text),
        Err(e) => PartOutcome::Skip(format!("charset {} failed: {}", part.ctype.charset, e)),
    }
}

fn is_utf8_family(charset: &str) -> bool {
    matches!(
        charset.trim().to_ascii_lowercase().as_str(),
        "" | "utf-8" | "utf8" | "us-ascii" | "ascii"
    )
}
