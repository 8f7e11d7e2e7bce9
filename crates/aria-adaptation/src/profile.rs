//! User profiles: the engine's private state and the snapshots it hands out.

use aria_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleDimension {
    Formality,
    Verbosity,
    Emotionality,
    Proactivity,
}

/// Preferred interaction style. Every score stays in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleScores {
    pub formality: f64,
    pub verbosity: f64,
    pub emotionality: f64,
    pub proactivity: f64,
}

impl Default for StyleScores {
    fn default() -> Self {
        Self {
            formality: 0.5,
            verbosity: 0.5,
            emotionality: 0.5,
            proactivity: 0.5,
        }
    }
}

impl StyleScores {
    pub fn get(&self, dimension: StyleDimension) -> f64 {
        match dimension {
            StyleDimension::Formality => self.formality,
            StyleDimension::Verbosity => self.verbosity,
            StyleDimension::Emotionality => self.emotionality,
            StyleDimension::Proactivity => self.proactivity,
        }
    }

    fn slot(&mut self, dimension: StyleDimension) -> &mut f64 {
        match dimension {
            StyleDimension::Formality => &mut self.formality,
            StyleDimension::Verbosity => &mut self.verbosity,
            StyleDimension::Emotionality => &mut self.emotionality,
            StyleDimension::Proactivity => &mut self.proactivity,
        }
    }

    /// Move one score by `delta`, clamped to [0, 1]. Returns (before, after).
    pub(crate) fn adjust(&mut self, dimension: StyleDimension, delta: f64) -> (f64, f64) {
        let slot = self.slot(dimension);
        let before = *slot;
        *slot = (before + delta).clamp(0.0, 1.0);
        (before, *slot)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionStats {
    pub interaction_count: u64,
    pub last_interaction: Option<DateTime<Utc>>,
    /// Running engagement estimate in [0, 1].
    pub engagement: f64,
}

impl Default for InteractionStats {
    fn default() -> Self {
        Self {
            interaction_count: 0,
            last_interaction: None,
            engagement: 0.5,
        }
    }
}

/// Read-only copy of a profile, with topic decay applied as of the read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub topic_weights: BTreeMap<String, f64>,
    pub style: StyleScores,
    pub stats: InteractionStats,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Strongest current interest. Ties go to the alphabetically first topic.
    pub fn top_topic(&self) -> Option<(&str, f64)> {
        self.topic_weights
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (topic, &weight)| match best {
                Some((_, w)) if w >= weight => best,
                _ => Some((topic.as_str(), weight)),
            })
    }

    /// How long to wait in silence before taking the initiative. Scales
    /// `base` from 1.5x (proactivity 0) down to 0.5x (proactivity 1).
    pub fn proactive_after(&self, base: Duration) -> Duration {
        base.mul_f64(1.5 - self.style.proactivity)
    }
}

/// Interest in one topic, stored undecayed as of `last_reinforced`.
#[derive(Clone, Debug)]
pub(crate) struct TopicInterest {
    pub weight: f64,
    pub last_reinforced: DateTime<Utc>,
    pub preference_recorded: bool,
}

impl TopicInterest {
    /// Weight after whole decay intervals elapsed since last reinforcement.
    pub fn weight_at(&self, now: DateTime<Utc>, factor: f64, interval_secs: u64) -> f64 {
        let elapsed = (now - self.last_reinforced).num_seconds();
        if elapsed <= 0 {
            return self.weight;
        }
        let steps = (elapsed as u64 / interval_secs.max(1)).min(i32::MAX as u64) as i32;
        self.weight * factor.powi(steps)
    }
}

/// Engine-private mutable profile.
#[derive(Clone, Debug)]
pub(crate) struct ProfileState {
    pub user_id: UserId,
    pub topics: BTreeMap<String, TopicInterest>,
    pub style: StyleScores,
    pub stats: InteractionStats,
    pub created_at: DateTime<Utc>,
}

impl ProfileState {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            topics: BTreeMap::new(),
            style: StyleScores::default(),
            stats: InteractionStats::default(),
            created_at: now,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>, factor: f64, interval_secs: u64) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            topic_weights: self
                .topics
                .iter()
                .map(|(topic, interest)| {
                    (topic.clone(), interest.weight_at(now, factor, interval_secs))
                })
                .collect(),
            style: self.style,
            stats: self.stats.clone(),
            created_at: self.created_at,
        }
    }
}
