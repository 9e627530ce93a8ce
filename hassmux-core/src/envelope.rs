//! The message envelope exchanged over the persistent connection.
//!
//! Every frame is a JSON object with a `type` discriminator, an optional
//! numeric `id` linking requests to their replies, and kind-specific fields:
//!
//! ```text
//! {"id": 7, "type": "result", "success": true, "result": {...}}
//! ```

use crate::error::{CodecError, Result};
use crate::kind;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tagged message with an optional correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id, present on requests and their replies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Message kind (the wire `type` field).
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Failure reported by the server in a `result` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    /// Server error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl Envelope {
    /// Creates an envelope of the given kind with no id and no fields.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Creates the authentication envelope sent after the socket opens.
    #[must_use]
    pub fn auth(access_token: impl Into<String>) -> Self {
        Self::new(kind::AUTH).with_field("access_token", access_token.into())
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Adds a kind-specific field.
    ///
    /// `type` replaces the kind when given a string. `id` is ignored: ids are
    /// allocated by the client when the request is sent.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            "type" => {
                if let Value::String(kind) = value {
                    self.kind = kind;
                }
            }
            "id" => {}
            _ => {
                self.fields.insert(name, value);
            }
        }
        self
    }

    /// Builds an envelope from a JSON object such as one made with `json!`.
    ///
    /// # Errors
    /// Returns `CodecError` if the value is not an object with a string `type`.
    pub fn from_value(value: Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| CodecError::invalid_envelope("envelope must be a JSON object"))?;
        match object.get("type") {
            Some(Value::String(kind)) if !kind.is_empty() => {}
            _ => return Err(CodecError::MissingKind),
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decodes one frame.
    ///
    /// # Errors
    /// Returns `CodecError` if the frame is not a well-formed envelope.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(frame)?;
        Self::from_value(value)
    }

    /// Encodes the envelope as a JSON frame.
    ///
    /// # Errors
    /// Returns `CodecError` if serialization fails.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Returns the envelope as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 2);
        if let Some(id) = self.id {
            object.insert("id".to_string(), Value::from(id));
        }
        object.insert("type".to_string(), Value::String(self.kind.clone()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Returns a kind-specific field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns true if this envelope belongs to the authentication phase.
    #[must_use]
    pub fn is_auth_phase(&self) -> bool {
        kind::is_auth_phase(&self.kind)
    }

    /// Returns true if this is a subscription event.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.kind == kind::EVENT
    }

    /// Returns the `success` flag of a `result` envelope.
    #[must_use]
    pub fn success(&self) -> Option<bool> {
        self.field("success").and_then(Value::as_bool)
    }

    /// Returns the reply payload (`result`, or `payload` for older servers).
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.field("result").or_else(|| self.field("payload"))
    }

    /// Turns a reply into the value handed back to the caller.
    ///
    /// A successful `result` yields its payload (`null` when absent). Any other
    /// kind, such as `pong`, yields the whole envelope.
    ///
    /// # Errors
    /// Returns the server's failure for a `result` with `success: false`.
    pub fn into_outcome(self) -> std::result::Result<Value, ServerFailure> {
        if self.kind != kind::RESULT {
            return Ok(self.to_value());
        }
        if self.success() == Some(false) {
            return Err(self.server_failure());
        }
        Ok(self.payload().cloned().unwrap_or(Value::Null))
    }

    fn server_failure(&self) -> ServerFailure {
        let error = self.field("error");
        let code = match error.and_then(|e| e.get("code")) {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Null) | None => "unknown_error".to_string(),
            Some(other) => other.to_string(),
        };
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string();
        ServerFailure { code, message }
    }
}
