//! Causally tagged messages.

use crate::clock::{MessageId, VectorClock};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A message together with the causal context it was authored in.
///
/// `dependencies` is a snapshot of what the authoring connection had
/// delivered when the message was written: no destination may deliver this
/// message before it has delivered everything named there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity assigned at authoring time.
    #[serde(rename = "MessageID")]
    pub id: MessageId,
    /// Raw message body, without line terminator.
    #[serde(rename = "Body", with = "body")]
    pub body: Vec<u8>,
    /// Causal dependencies.
    #[serde(rename = "Dependencies", default)]
    pub dependencies: VectorClock,
}

impl Message {
    /// Create a message.
    pub fn new(id: MessageId, body: impl Into<Vec<u8>>, dependencies: VectorClock) -> Self {
        Self {
            id,
            body: body.into(),
            dependencies,
        }
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Encode as one JSON object (no trailing newline).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from one JSON object.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} deps {}", self.id, self.body_text(), self.dependencies)
    }
}

/// Bodies travel as base64 strings; `null` decodes as an empty body.
mod body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD.decode(encoded).map_err(D::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
