//! Adaptation configuration
//!
//! Every rate and threshold the engine uses, with defaults. Loaded as the
//! `[adaptation]` table of the system config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    /// Weight added to a topic each time it is mentioned.
    pub reinforcement: f64,
    /// Multiplier applied to a topic weight per elapsed decay interval (0-1).
    pub decay_factor: f64,
    /// Length of one decay step, in seconds.
    pub decay_interval_secs: u64,
    /// Step applied to a style score per observed signal.
    pub style_delta: f64,
    /// Step applied to engagement per explicit rating.
    pub engagement_delta: f64,
    /// Messages with more words than this nudge verbosity up.
    pub verbose_word_threshold: usize,
    /// Messages with fewer words than this nudge verbosity down.
    pub brief_word_threshold: usize,
    /// Topic weight at which a preference entry is recorded.
    pub preference_threshold: f64,
    /// Topic name → keywords. Keywords match word prefixes; multi-word
    /// keywords match as phrases.
    pub topics: BTreeMap<String, Vec<String>>,
    pub emotional_markers: Vec<String>,
    pub formal_markers: Vec<String>,
    pub informal_markers: Vec<String>,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            reinforcement: 1.0,
            decay_factor: 0.9,
            decay_interval_secs: 86_400,
            style_delta: 0.05,
            engagement_delta: 0.1,
            verbose_word_threshold: 20,
            brief_word_threshold: 4,
            preference_threshold: 3.0,
            topics: default_topics(),
            emotional_markers: strings(&[
                "genial", "increible", "encanta", "feliz", "triste", "odio", "maravilloso",
                "wow", "amazing", "love", "hate",
            ]),
            formal_markers: strings(&[
                "usted", "por favor", "disculpe", "le agradeceria", "estimado", "cordialmente",
            ]),
            informal_markers: strings(&["oye", "jaja", "vale", "tio", "guay", "hey"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_topics() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 5] = [
        (
            "tecnologia",
            &[
                "tecnologia", "computadora", "internet", "software", "app", "inteligencia artificial",
                "technology", "computer",
            ],
        ),
        (
            "ciencia",
            &["ciencia", "investigacion", "estudio", "descubrimiento", "science", "research"],
        ),
        ("arte", &["arte", "musica", "pintura", "creatividad", "painting", "music"]),
        ("deportes", &["deporte", "futbol", "ejercicio", "juego", "sport", "football"]),
        ("negocios", &["negocio", "empresa", "trabajo", "proyecto", "business"]),
    ];
    table
        .into_iter()
        .map(|(topic, words)| (topic.to_string(), strings(words)))
        .collect()
}

impl AdaptationConfig {
    /// Clamp rates into ranges that keep the engine's invariants: positive
    /// reinforcement, a decay factor strictly inside (0, 1), a non-zero
    /// interval, and deltas within [0, 1].
    pub fn sanitized(mut self) -> Self {
        if !(self.reinforcement > 0.0) {
            tracing::warn!("reinforcement {} is not positive, using 1.0", self.reinforcement);
            self.reinforcement = 1.0;
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            tracing::warn!("decay_factor {} outside (0, 1), using 0.9", self.decay_factor);
            self.decay_factor = 0.9;
        }
        self.decay_interval_secs = self.decay_interval_secs.max(1);
        self.style_delta = self.style_delta.clamp(0.0, 1.0);
        self.engagement_delta = self.engagement_delta.clamp(0.0, 1.0);
        self
    }
}
