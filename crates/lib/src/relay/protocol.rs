//! Inbound frame parsing.

use serde::{Deserialize, Serialize};

/// Wire message: `{ "type"?, "payload"?, "image"? }`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type", default = "default_message_type")]
    pub typ: String,
    /// Question text.
    #[serde(default)]
    pub payload: Option<String>,
    /// Base64-encoded JPEG screen capture.
    #[serde(default)]
    pub image: Option<String>,
}

fn default_message_type() -> String {
    "question".to_string()
}

/// What the relay extracted from one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub image: Option<String>,
}

impl Question {
    /// Neither question text nor image: nothing to answer.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.as_deref().map_or(true, str::is_empty)
    }

    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|i| !i.is_empty())
    }
}

/// Parse a text frame. Anything that is not a JSON object of the expected shape is taken
/// wholesale as the question text, with no image.
pub fn parse_inbound(raw: &str) -> Question {
    match serde_json::from_str::<InboundMessage>(raw) {
        Ok(msg) => {
            if msg.typ != "question" {
                log::debug!("inbound message type {:?} handled as a question", msg.typ);
            }
            Question {
                text: msg.payload.unwrap_or_default(),
                image: msg.image,
            }
        }
        Err(_) => Question {
            text: raw.to_string(),
            image: None,
        },
    }
}
