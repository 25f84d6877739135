//! Minimal projection of raw RFC822 bytes into the fields the classifier
//! needs: subject, sender, and a length-bounded body snippet.
//!
//! This is not a general MIME implementation. Headers are unfolded, the first
//! `text/plain` part of a multipart body is preferred, and everything else is
//! passed through as-is.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("malformed multipart body: {0}")]
    Multipart(String),
}

/// The per-message projection handed to feature extraction and routing.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// Parse raw message bytes, truncating the body to at most `snippet_chars`
/// characters. Missing Subject/From headers come back as empty strings.
pub fn parse(raw: &[u8], snippet_chars: usize) -> Result<MessageRecord, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let text = String::from_utf8_lossy(raw);
    let (header_block, body) = split_headers(&text);
    let headers = unfold_headers(header_block);

    let subject = header_value(&headers, "subject").unwrap_or_default();
    let sender = header_value(&headers, "from").unwrap_or_default();
    let content_type = header_value(&headers, "content-type").unwrap_or_default();

    let body_text = if let Some(boundary) = multipart_boundary(&content_type) {
        first_text_part(body, &boundary)?
    } else {
        body.to_string()
    };

    Ok(MessageRecord {
        subject,
        sender,
        body: truncate_chars(&body_text, snippet_chars),
    })
}

/// Split at the first blank line. A message with no blank line is treated as
/// headers-only with an empty body.
fn split_headers(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        (text, "")
    }
}

/// Join folded continuation lines (leading space or tab) onto their header.
fn unfold_headers(block: &str) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = headers.last_mut() {
                last.push(' ');
                last.push_str(line.trim_start());
            }
        } else if !line.is_empty() {
            headers.push(line.to_string());
        }
    }
    headers
}

fn header_value(headers: &[String], name: &str) -> Option<String> {
    headers.iter().find_map(|h| {
        let (key, value) = h.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// Extract the boundary parameter from a multipart Content-Type value.
fn multipart_boundary(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    if !lower.starts_with("multipart/") {
        return None;
    }
    let idx = lower.find("boundary=")?;
    let raw = &content_type[idx + "boundary=".len()..];
    let raw = raw.split(';').next().unwrap_or(raw).trim();
    Some(raw.trim_matches('"').to_string())
}

/// Return the body of the first `text/plain` part, or an empty string when no
/// such part exists (matching the behavior of treating HTML-only mail as
/// having no usable body).
fn first_text_part(body: &str, boundary: &str) -> Result<String, ParseError> {
    let delimiter = format!("--{boundary}");
    if !body.contains(&delimiter) {
        return Err(ParseError::Multipart(format!("boundary {boundary} not found")));
    }
    let mut parts = body.split(delimiter.as_str());
    parts.next(); // preamble

    for part in parts {
        let part = part.trim_start_matches(['\r', '\n']);
        if part.starts_with("--") {
            break; // closing delimiter
        }
        let (part_headers, part_body) = split_headers(part);
        let headers = unfold_headers(part_headers);
        let content_type = header_value(&headers, "content-type").unwrap_or_default();
        if content_type.to_lowercase().starts_with("text/plain") {
            return Ok(part_body.to_string());
        }
    }

    Ok(String::new())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
