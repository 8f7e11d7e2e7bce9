//! Text signals: topic detection and style markers.

use crate::config::AdaptationConfig;
use aria_core::tokenize;
use std::collections::BTreeSet;

/// Normalized text, kept both as tokens and as a space-padded phrase string
/// for multi-word matches.
pub struct NormalizedText {
    pub tokens: Vec<String>,
    padded: String,
}

impl NormalizedText {
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let padded = format!(" {} ", tokens.join(" "));
        Self { tokens, padded }
    }

    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    fn matches(&self, pattern: &Pattern) -> bool {
        match pattern {
            Pattern::Prefix(w) => self.tokens.iter().any(|t| t.starts_with(w.as_str())),
            Pattern::Word(w) => self.tokens.iter().any(|t| t == w),
            Pattern::Phrase(p) => self.padded.contains(p.as_str()),
        }
    }
}

enum Pattern {
    /// Any token starting with the word ("juego" matches "juegos").
    Prefix(String),
    /// Exactly this token.
    Word(String),
    /// Consecutive tokens.
    Phrase(String),
}

impl Pattern {
    fn compile(raw: &str, prefix: bool) -> Option<Self> {
        let mut tokens = tokenize(raw);
        match tokens.len() {
            0 => None,
            1 if prefix => tokens.pop().map(Pattern::Prefix),
            1 => tokens.pop().map(Pattern::Word),
            _ => Some(Pattern::Phrase(format!(" {} ", tokens.join(" ")))),
        }
    }

    fn compile_all(raw: &[String], prefix: bool) -> Vec<Self> {
        raw.iter().filter_map(|r| Self::compile(r, prefix)).collect()
    }
}

/// Fixed topic → keyword table.
pub struct TopicTable {
    topics: Vec<(String, Vec<Pattern>)>,
}

impl TopicTable {
    pub fn from_config(config: &AdaptationConfig) -> Self {
        let topics = config
            .topics
            .iter()
            .filter_map(|(topic, words)| {
                let name = aria_core::normalize_keyword(topic)?;
                Some((name, Pattern::compile_all(words, true)))
            })
            .collect();
        Self { topics }
    }

    /// Every topic whose keywords appear in `text`.
    pub fn detect(&self, text: &NormalizedText) -> BTreeSet<String> {
        self.topics
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| text.matches(p)))
            .map(|(topic, _)| topic.clone())
            .collect()
    }
}

/// Marker lists for style inference.
pub struct StyleSignals {
    emotional: Vec<Pattern>,
    formal: Vec<Pattern>,
    informal: Vec<Pattern>,
}

impl StyleSignals {
    pub fn from_config(config: &AdaptationConfig) -> Self {
        Self {
            emotional: Pattern::compile_all(&config.emotional_markers, false),
            formal: Pattern::compile_all(&config.formal_markers, false),
            informal: Pattern::compile_all(&config.informal_markers, false),
        }
    }

    pub fn is_emotional(&self, raw: &str, text: &NormalizedText) -> bool {
        raw.contains('!') || raw.contains('¡') || self.emotional.iter().any(|p| text.matches(p))
    }

    pub fn is_formal(&self, text: &NormalizedText) -> bool {
        self.formal.iter().any(|p| text.matches(p))
    }

    pub fn is_informal(&self, text: &NormalizedText) -> bool {
        self.informal.iter().any(|p| text.matches(p))
    }
}
