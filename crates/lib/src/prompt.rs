//! Prompt construction and model selection for one generation request.

use crate::config::GeneratorConfig;
use crate::llm::{ChatMessage, ContentPart, ImageUrl};

const TEXT_SYSTEM_PROMPT: &str = "You are a helpful interview assistant. Keep answers concise, confident, and to the point. Use bullet points where appropriate.";

const VISION_SYSTEM_PROMPT: &str = "You are a fast, helpful interview assistant. You can see the user's screen. If code is visible, analyze it. Keep answers concise (under 2 sentences if possible) and confident.";

/// Image payloads are assumed to be JPEG; the bytes are never inspected.
const IMAGE_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// One question to answer: borrowed for the duration of a single generator call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub context: &'a str,
    /// Base64-encoded JPEG screen capture.
    pub image: Option<&'a str>,
}

impl<'a> GenerationRequest<'a> {
    /// The image, if present and non-empty.
    pub fn image(&self) -> Option<&'a str> {
        self.image.filter(|i| !i.is_empty())
    }

    pub fn model_kind(&self) -> ModelKind {
        ModelKind::for_image(self.image)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Text,
    Vision,
}

impl ModelKind {
    /// Vision iff a non-empty image is attached.
    pub fn for_image(image: Option<&str>) -> Self {
        match image {
            Some(i) if !i.is_empty() => ModelKind::Vision,
            _ => ModelKind::Text,
        }
    }
}

/// The two fixed model identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub text: String,
    pub vision: String,
}

impl ModelSet {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            text: config.text_model.clone(),
            vision: config.vision_model.clone(),
        }
    }

    pub fn select(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Text => &self.text,
            ModelKind::Vision => &self.vision,
        }
    }
}

impl Default for ModelSet {
    fn default() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }
}

fn user_text(req: &GenerationRequest<'_>) -> String {
    format!("Context: {}\n\nQuestion: {}", req.context, req.question)
}

/// Build the system + user message pair for the request.
pub fn build_messages(req: &GenerationRequest<'_>) -> Vec<ChatMessage> {
    match req.image() {
        None => vec![
            ChatMessage::system(TEXT_SYSTEM_PROMPT),
            ChatMessage::user(user_text(req)),
        ],
        Some(image) => vec![
            ChatMessage::system(VISION_SYSTEM_PROMPT),
            ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: user_text(req),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("{}{}", IMAGE_DATA_URI_PREFIX, image),
                    },
                },
            ]),
        ],
    }
}
