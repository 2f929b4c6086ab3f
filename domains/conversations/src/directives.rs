//! Directive extraction from model output
//!
//! The model embeds email actions in its answer text as marker tokens
//! (`DRAFT_CONTENT:` / `SEND_CONTENT:`) followed by a JSON object. Extraction
//! is a pure function of the text: the first occurrence of each marker is
//! honored, the payload is located with a balanced-brace scan (string- and
//! escape-aware), and malformed payloads silently yield no directive.

use serde::Deserialize;

/// Marker preceding a draft-email payload
pub const DRAFT_MARKER: &str = "DRAFT_CONTENT:";
/// Marker preceding a send-email payload
pub const SEND_MARKER: &str = "SEND_CONTENT:";

/// Kind of email action requested by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Draft,
    Send,
}

impl std::fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectiveKind::Draft => write!(f, "draft"),
            DirectiveKind::Send => write!(f, "send"),
        }
    }
}

/// A parsed email action directive
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct DirectivePayload {
    to: String,
    subject: String,
    body: String,
}

/// Extract the directives embedded in the final answer text.
///
/// At most one draft and one send directive are returned, draft first.
pub fn extract(text: &str) -> Vec<Directive> {
    let mut directives = Vec::new();
    if let Some(directive) = extract_kind(text, DRAFT_MARKER, DirectiveKind::Draft) {
        directives.push(directive);
    }
    if let Some(directive) = extract_kind(text, SEND_MARKER, DirectiveKind::Send) {
        directives.push(directive);
    }
    directives
}

fn extract_kind(text: &str, marker: &str, kind: DirectiveKind) -> Option<Directive> {
    let start = text.find(marker)? + marker.len();
    let payload = balanced_object(&text[start..])?;

    match serde_json::from_str::<DirectivePayload>(payload) {
        Ok(parsed) => Some(Directive {
            kind,
            to: parsed.to,
            subject: parsed.subject,
            body: parsed.body,
        }),
        Err(e) => {
            tracing::debug!(kind = %kind, error = %e, "Ignoring malformed directive payload");
            None
        }
    }
}

/// Locate the first balanced JSON object in `text`.
///
/// Braces inside string literals (and escaped quotes inside them) do not
/// count toward nesting. Leading content before the first `{` is skipped;
/// an unterminated object yields nothing.
fn balanced_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..open + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
