//! Reply payloads produced by the dialogue resolver.

use serde::{Deserialize, Serialize};

/// Inline LINE emoji rendered in place of the `$` at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Character index of the `$` placeholder in the reply text
    pub offset: usize,
    /// LINE emoji product id
    pub product_id: String,
    /// Emoji id within the product
    pub emoji_id: String,
}

/// Content to send back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyPayload {
    /// Plain text
    Text { text: String },
    /// Text with inline glyphs
    Annotated {
        text: String,
        annotations: Vec<Annotation>,
    },
}

impl ReplyPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Build a reply, falling back to plain text when there is nothing to annotate.
    pub fn annotated(text: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        if annotations.is_empty() {
            Self::text(text)
        } else {
            Self::Annotated {
                text: text.into(),
                annotations,
            }
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text { text } | Self::Annotated { text, .. } => text,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        match self {
            Self::Text { .. } => &[],
            Self::Annotated { annotations, .. } => annotations,
        }
    }
}
