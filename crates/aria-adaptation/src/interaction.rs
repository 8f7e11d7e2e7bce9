//! Interaction records fed to the engine.

use serde::{Deserialize, Serialize};

/// Interaction tag. Accepts English and Spanish spellings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InteractionKind {
    Greeting,
    Question,
    Feedback,
    Declaration,
    Farewell,
    Other(String),
}

impl InteractionKind {
    pub fn as_str(&self) -> &str {
        match self {
            InteractionKind::Greeting => "greeting",
            InteractionKind::Question => "question",
            InteractionKind::Feedback => "feedback",
            InteractionKind::Declaration => "declaration",
            InteractionKind::Farewell => "farewell",
            InteractionKind::Other(s) => s,
        }
    }
}

impl From<String> for InteractionKind {
    fn from(s: String) -> Self {
        match aria_core::normalize_keyword(&s).as_deref() {
            Some("greeting") | Some("saludo") => InteractionKind::Greeting,
            Some("question") | Some("pregunta") => InteractionKind::Question,
            Some("feedback") | Some("valoracion") => InteractionKind::Feedback,
            Some("declaration") | Some("declaracion") => InteractionKind::Declaration,
            Some("farewell") | Some("despedida") => InteractionKind::Farewell,
            Some(other) => InteractionKind::Other(other.to_string()),
            None => InteractionKind::Other(String::new()),
        }
    }
}

impl From<&str> for InteractionKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<InteractionKind> for String {
    fn from(kind: InteractionKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One observed exchange with a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub text: String,
    pub kind: InteractionKind,
    /// Explicit rating: negative, zero, or positive. Only the sign counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i8>,
    /// The user started the exchange rather than answering a prompt.
    #[serde(default)]
    pub user_initiative: bool,
}

impl InteractionRecord {
    pub fn new(text: impl Into<String>, kind: impl Into<InteractionKind>) -> Self {
        Self {
            text: text.into(),
            kind: kind.into(),
            rating: None,
            user_initiative: false,
        }
    }

    pub fn with_rating(mut self, rating: i8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_initiative(mut self) -> Self {
        self.user_initiative = true;
        self
    }
}
