//! Reply envelope normalization
//!
//! The model is asked to answer with a JSON object, but its text is untrusted:
//! it may wrap the object in a markdown fence, drop fields, or not be JSON at
//! all. `parse` is the single boundary where that text becomes a typed
//! envelope; nothing downstream looks at partially parsed fields.

#[cfg(test)]
mod proptests;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FENCE: &str = "```";

/// Normalized `{message, function_call_used, function_call}` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub message: String,
    pub function_call_used: bool,
    pub function_call: Option<String>,
}

impl ResponseEnvelope {
    /// Plain text reply with no function call
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            function_call_used: false,
            function_call: None,
        }
    }
}

/// Outcome of parsing raw model text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Ok(ResponseEnvelope),
    /// The text was not a well-formed envelope; carries it verbatim
    Malformed(String),
}

impl Normalized {
    pub fn into_envelope(self) -> ResponseEnvelope {
        match self {
            Normalized::Ok(envelope) => envelope,
            Normalized::Malformed(raw) => ResponseEnvelope::text(raw),
        }
    }
}

/// Parse raw model text into an envelope, keeping malformed input distinguishable.
pub fn parse(raw: &str) -> Normalized {
    match decode(&strip_fence(raw)) {
        Some(envelope) => Normalized::Ok(envelope),
        None => Normalized::Malformed(raw.to_string()),
    }
}

/// Parse raw model text; malformed input becomes a plain text reply.
#[allow(dead_code)] // Callers that do not care about the distinction
pub fn normalize(raw: &str) -> ResponseEnvelope {
    parse(raw).into_envelope()
}

/// Drop a leading and a trailing markdown fence line, if present.
fn strip_fence(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.trim().lines().collect();
    if lines.first().is_some_and(|l| l.trim().starts_with(FENCE)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim().starts_with(FENCE)) {
        lines.pop();
    }
    lines.join("\n")
}

fn decode(text: &str) -> Option<ResponseEnvelope> {
    let object: Map<String, Value> = serde_json::from_str(text).ok()?;

    let message = match object.get("message") {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return None,
    };

    let function_call_used = match object.get("function_call_used") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return None,
    };

    // Whatever the payload says, no call is reported unless the flag is set.
    let function_call = if function_call_used {
        match object.get("function_call") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(_) => return None,
        }
    } else {
        None
    };

    Some(ResponseEnvelope {
        message,
        function_call_used,
        function_call,
    })
}
