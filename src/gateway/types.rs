//! Wire types for the Luffa robot API

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Gateway status code reported for transient failures
pub const TRANSIENT_ERROR_CODE: i64 = 500;

/// Where a message group came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    #[default]
    Direct,
    Group,
}

impl ChatKind {
    pub fn from_code(code: u8) -> Self {
        if code == 1 {
            ChatKind::Group
        } else {
            ChatKind::Direct
        }
    }
}

/// One group of messages in a fetch batch
///
/// Only the shape of `message` is required. The header fields fall back to
/// their defaults when missing or mistyped, and entries are decoded one at a
/// time by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupItem {
    /// 0 for a direct chat, 1 for a group chat
    #[serde(rename = "type", default, deserialize_with = "or_default")]
    pub kind: u8,
    #[serde(default, deserialize_with = "or_default")]
    pub uid: String,
    #[serde(default, deserialize_with = "or_default")]
    pub count: u32,
    /// Each entry should be a JSON document `{uid, text}` encoded as a string
    #[serde(default)]
    pub message: Vec<Value>,
}

/// Accept any JSON value, replacing one of the wrong type with the default.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl GroupItem {
    pub fn chat_kind(&self) -> ChatKind {
        ChatKind::from_code(self.kind)
    }
}

/// Decoded body of a single raw message string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub text: String,
}

/// Classified result of one fetch
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    /// Raw group items, decoded one at a time by the caller
    Batch(Vec<Value>),
    /// The gateway answered with an error object
    Failure { code: i64, message: String },
    /// Anything that is neither a list nor an error object
    Unexpected(&'static str),
}

impl GatewayReply {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => GatewayReply::Batch(items),
            Value::Object(map) if map.contains_key("code") => GatewayReply::Failure {
                code: map.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: map
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            other => GatewayReply::Unexpected(json_kind(&other)),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
