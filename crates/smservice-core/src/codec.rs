//! Message codec: MessagePack encoding of the two logical message parts.
//!
//! Every message on the wire is two frames:
//!
//! ```text
//! frame 1: MessagePack map    (headers)
//! frame 2: MessagePack value  (body, normally a map)
//! ```
//!
//! `serde_json::Value` is the dynamic value model on both sides, so maps,
//! arrays, strings, integers, floats, booleans and nil all round-trip.

use crate::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Cursor;

/// Header map of a message.
pub type Headers = Map<String, Value>;

pub const ACTION_KEY: &str = "action";
pub const SERVICE_KEY: &str = "service";
pub const REPLY_TO_KEY: &str = "reply_to";

/// Encode any serializable value to MessagePack bytes.
///
/// Structs are written as string-keyed maps so the output stays readable by
/// dynamic peers.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode exactly one MessagePack value from `bytes`.
///
/// Fails on empty, truncated or malformed input, and when bytes remain after
/// the first complete value.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Err(ServiceError::decode("empty frame"));
    }

    let mut cursor = Cursor::new(bytes);
    let value = {
        let mut deserializer = rmp_serde::Deserializer::new(&mut cursor);
        Value::deserialize(&mut deserializer)?
    };

    let consumed = cursor.position() as usize;
    if consumed != bytes.len() {
        return Err(ServiceError::decode(format!(
            "{} trailing bytes after value",
            bytes.len() - consumed
        )));
    }

    Ok(value)
}

/// A decoded two-part message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub headers: Headers,
    pub body: Value,
}

impl Message {
    pub fn new(headers: Headers, body: Value) -> Self {
        Self { headers, body }
    }

    /// Control request to the SM: `{"action": action}` + body.
    pub fn control(action: &str, body: Value) -> Self {
        let mut headers = Headers::new();
        headers.insert(ACTION_KEY.to_string(), Value::String(action.to_string()));
        Self { headers, body }
    }

    /// Peer call relayed by the SM: `{"service": target, "reply_to": reply_to}` + body.
    pub fn peer_call(target: &str, reply_to: &str, body: Value) -> Self {
        let mut headers = Headers::new();
        headers.insert(SERVICE_KEY.to_string(), Value::String(target.to_string()));
        headers.insert(REPLY_TO_KEY.to_string(), Value::String(reply_to.to_string()));
        Self { headers, body }
    }

    /// Routing key: `action`, falling back to `service`, lowercased.
    pub fn action_name(&self) -> Option<String> {
        action_name(&self.headers)
    }

    /// Encode into the (headers, body) frame pair.
    pub fn encode(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        Ok((encode(&self.headers)?, encode(&self.body)?))
    }

    /// Decode a (headers, body) frame pair. Headers must be a map.
    pub fn decode(headers: &[u8], body: &[u8]) -> Result<Self> {
        let headers = match decode(headers)? {
            Value::Object(map) => map,
            other => {
                return Err(ServiceError::decode(format!(
                    "headers must be a map, got {}",
                    type_name(&other)
                )))
            }
        };
        let body = decode(body)?;
        Ok(Self { headers, body })
    }
}

/// Derive the normalized routing key from a header map.
pub fn action_name(headers: &Headers) -> Option<String> {
    headers
        .get(ACTION_KEY)
        .or_else(|| headers.get(SERVICE_KEY))
        .and_then(|v| v.as_str())
        .map(str::to_lowercase)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
