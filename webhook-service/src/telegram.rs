//! Telegram update parsing and validation.
//!
//! Updates are checked field by field so that a failure can name the exact
//! path of the offending field (e.g. `message.chat.id`).
//!
//! ## Accepted shape
//!
//! ```text
//! {
//!   "update_id": 1,
//!   "message": {                      // or edited_message, channel_post,
//!     "message_id": 10,               //    edited_channel_post
//!     "date": 1700000000,
//!     "chat": { "id": 42, "type": "private" },
//!     "from": { "id": 7, "first_name": "Ann" },   // optional
//!     "text": "hello"                             // optional
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Update keys that carry a message, in order of preference.
const MESSAGE_KEYS: &[&str] = &[
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
];

/// JSON shape a content field must have.
#[derive(Debug, Clone, Copy)]
enum Shape {
    String,
    Array,
    Object,
}

/// Message content keys used to classify a message, in order of preference.
const CONTENT_KEYS: &[(&str, Shape)] = &[
    ("text", Shape::String),
    ("photo", Shape::Array),
    ("document", Shape::Object),
    ("audio", Shape::Object),
    ("video", Shape::Object),
    ("entities", Shape::Array),
];

/// A structural problem with a webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A signature-checked, schema-validated Telegram message.
///
/// Only [`parse_update`] constructs this type, and it exposes no mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedMessage {
    update_id: i64,
    message_id: i64,
    chat_id: i64,
    chat_type: String,
    sender_id: Option<i64>,
    sender_username: Option<String>,
    text: Option<String>,
    message_type: &'static str,
    sent_at: DateTime<Utc>,
}

impl ValidatedMessage {
    pub fn update_id(&self) -> i64 {
        self.update_id
    }

    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn chat_type(&self) -> &str {
        &self.chat_type
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.sender_id
    }

    pub fn sender_username(&self) -> Option<&str> {
        self.sender_username.as_deref()
    }

    /// Message text, falling back to the media caption.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }
}

/// Parse and validate a raw Telegram update body.
pub fn parse_update(body: &[u8]) -> Result<ValidatedMessage, ValidationError> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::new("body", format!("invalid JSON: {}", e)))?;

    let update = root
        .as_object()
        .ok_or_else(|| ValidationError::new("body", "expected a JSON object"))?;
    let update = Fields::new(update, "");

    let update_id = update.required_i64("update_id")?;

    let (message_key, message) = MESSAGE_KEYS
        .iter()
        .find_map(|key| update.present(key).map(|value| (*key, value)))
        .ok_or_else(|| ValidationError::new("message", "no message found in update"))?;

    let message = message
        .as_object()
        .ok_or_else(|| ValidationError::new(message_key, "expected an object"))?;
    let message = Fields::new(message, message_key);

    let message_id = message.required_i64("message_id")?;

    let date = message.required_i64("date")?;
    let sent_at = DateTime::<Utc>::from_timestamp(date, 0)
        .ok_or_else(|| ValidationError::new(message.path("date"), "timestamp out of range"))?;

    let chat = message.required_object("chat")?;
    let chat_id = chat.required_i64("id")?;
    let chat_type = chat.required_str("type")?.to_string();

    let (sender_id, sender_username) = match message.optional_object("from")? {
        Some(from) => {
            let id = from.required_i64("id")?;
            from.required_str("first_name")?;
            (Some(id), from.optional_str("username")?.map(str::to_string))
        }
        None => (None, None),
    };

    let text = match message.optional_str("text")? {
        Some(text) => Some(text.to_string()),
        None => message.optional_str("caption")?.map(str::to_string),
    };

    let message_type = classify(&message)?;

    Ok(ValidatedMessage {
        update_id,
        message_id,
        chat_id,
        chat_type,
        sender_id,
        sender_username,
        text,
        message_type,
        sent_at,
    })
}

/// Type-check every content field, then name the first one present.
fn classify(message: &Fields<'_>) -> Result<&'static str, ValidationError> {
    let mut message_type = None;
    for &(key, shape) in CONTENT_KEYS {
        if message.optional_shaped(key, shape)? && message_type.is_none() {
            message_type = Some(key);
        }
    }
    Ok(message_type.unwrap_or("other"))
}

/// A JSON object plus its path from the update root.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    prefix: String,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>, prefix: &str) -> Self {
        Self {
            map,
            prefix: prefix.to_string(),
        }
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> Result<&'a Value, ValidationError> {
        self.present(key)
            .ok_or_else(|| ValidationError::new(self.path(key), "field required"))
    }

    fn required_i64(&self, key: &str) -> Result<i64, ValidationError> {
        self.required(key)?
            .as_i64()
            .ok_or_else(|| ValidationError::new(self.path(key), "expected an integer"))
    }

    fn required_str(&self, key: &str) -> Result<&'a str, ValidationError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| ValidationError::new(self.path(key), "expected a string"))
    }

    fn required_object(&self, key: &str) -> Result<Fields<'a>, ValidationError> {
        let map = self
            .required(key)?
            .as_object()
            .ok_or_else(|| ValidationError::new(self.path(key), "expected an object"))?;
        Ok(Fields::new(map, &self.path(key)))
    }

    fn optional_str(&self, key: &str) -> Result<Option<&'a str>, ValidationError> {
        self.present(key)
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| ValidationError::new(self.path(key), "expected a string"))
            })
            .transpose()
    }

    /// Whether `key` is present, failing if it has the wrong shape.
    fn optional_shaped(&self, key: &str, shape: Shape) -> Result<bool, ValidationError> {
        let Some(value) = self.present(key) else {
            return Ok(false);
        };
        let (matches, reason) = match shape {
            Shape::String => (value.is_string(), "expected a string"),
            Shape::Array => (value.is_array(), "expected an array"),
            Shape::Object => (value.is_object(), "expected an object"),
        };
        if matches {
            Ok(true)
        } else {
            Err(ValidationError::new(self.path(key), reason))
        }
    }

    fn optional_object(&self, key: &str) -> Result<Option<Fields<'a>>, ValidationError> {
        match self.present(key) {
            None => Ok(None),
            Some(v) => {
                let map = v
                    .as_object()
                    .ok_or_else(|| ValidationError::new(self.path(key), "expected an object"))?;
                Ok(Some(Fields::new(map, &self.path(key))))
            }
        }
    }
}
