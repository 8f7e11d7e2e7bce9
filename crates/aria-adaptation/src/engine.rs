//! The adaptation engine: one mutable profile per user, updated from each
//! interaction and mirrored into the knowledge store.

use crate::config::AdaptationConfig;
use crate::interaction::InteractionRecord;
use crate::profile::{ProfileState, StyleDimension, TopicInterest, UserProfile};
use crate::signals::{NormalizedText, StyleSignals, TopicTable};
use aria_core::{Clock, EntryId, EntryKind, Error, Importance, UserId};
use aria_knowledge::{Content, KnowledgeStore};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One change the engine made to a profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adaptation {
    ProfileCreated,
    TopicReinforced { topic: String, weight: f64 },
    PreferenceRecorded { topic: String, entry_id: EntryId },
    StyleAdjusted { dimension: StyleDimension, from: f64, to: f64 },
    EngagementAdjusted { from: f64, to: f64 },
}

/// Everything `process_interaction` changed, for logging and tests.
#[derive(Clone, Debug, Serialize)]
pub struct AppliedAdaptations {
    pub user_id: UserId,
    pub adaptations: Vec<Adaptation>,
    /// The CONVERSATION entry recorded for this interaction, if the store
    /// accepted it.
    pub conversation_entry: Option<EntryId>,
}

impl AppliedAdaptations {
    pub fn profile_created(&self) -> bool {
        self.adaptations.contains(&Adaptation::ProfileCreated)
    }

    pub fn reinforced_topics(&self) -> impl Iterator<Item = &str> {
        self.adaptations.iter().filter_map(|a| match a {
            Adaptation::TopicReinforced { topic, .. } => Some(topic.as_str()),
            _ => None,
        })
    }

    pub fn style_change(&self, dimension: StyleDimension) -> Option<(f64, f64)> {
        self.adaptations.iter().find_map(|a| match a {
            Adaptation::StyleAdjusted { dimension: d, from, to } if *d == dimension => {
                Some((*from, *to))
            }
            _ => None,
        })
    }
}

pub struct UserAdaptationEngine {
    profiles: DashMap<UserId, ProfileState>,
    store: Arc<KnowledgeStore>,
    clock: Arc<dyn Clock>,
    config: AdaptationConfig,
    topics: TopicTable,
    signals: StyleSignals,
}

impl UserAdaptationEngine {
    pub fn new(store: Arc<KnowledgeStore>, clock: Arc<dyn Clock>, config: AdaptationConfig) -> Self {
        let config = config.sanitized();
        let topics = TopicTable::from_config(&config);
        let signals = StyleSignals::from_config(&config);
        Self {
            profiles: DashMap::new(),
            store,
            clock,
            config,
            topics,
            signals,
        }
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Update `user_id`'s profile from one interaction, creating the profile
    /// on first contact, and record the interaction as a CONVERSATION entry.
    ///
    /// Updates for one user are serialized; different users proceed in
    /// parallel. Store failures are logged and never undo the profile update.
    pub fn process_interaction(
        &self,
        user_id: &UserId,
        record: &InteractionRecord,
    ) -> AppliedAdaptations {
        let now = self.clock.now();
        let text = NormalizedText::new(&record.text);
        let detected = self.topics.detect(&text);
        let factor = self.config.decay_factor;
        let interval = self.config.decay_interval_secs;

        let mut adaptations = Vec::new();
        let mut new_preferences = Vec::new();
        {
            let mut created = false;
            let mut state = self.profiles.entry(user_id.clone()).or_insert_with(|| {
                created = true;
                ProfileState::new(user_id.clone(), now)
            });
            if created {
                info!("Created adaptation profile for {}", user_id);
                adaptations.push(Adaptation::ProfileCreated);
            }

            for topic in &detected {
                let interest = state.topics.entry(topic.clone()).or_insert(TopicInterest {
                    weight: 0.0,
                    last_reinforced: now,
                    preference_recorded: false,
                });
                interest.weight =
                    interest.weight_at(now, factor, interval) + self.config.reinforcement;
                interest.last_reinforced = now;
                adaptations.push(Adaptation::TopicReinforced {
                    topic: topic.clone(),
                    weight: interest.weight,
                });
                if !interest.preference_recorded
                    && interest.weight >= self.config.preference_threshold
                {
                    interest.preference_recorded = true;
                    new_preferences.push((topic.clone(), interest.weight));
                }
            }

            for (dimension, delta) in self.style_deltas(record, &text) {
                let (from, to) = state.style.adjust(dimension, delta);
                if from != to {
                    adaptations.push(Adaptation::StyleAdjusted { dimension, from, to });
                }
            }

            if let Some(sign) = record.rating.map(i8::signum).filter(|s| *s != 0) {
                let from = state.stats.engagement;
                let to = (from + f64::from(sign) * self.config.engagement_delta).clamp(0.0, 1.0);
                state.stats.engagement = to;
                if from != to {
                    adaptations.push(Adaptation::EngagementAdjusted { from, to });
                }
            }

            state.stats.interaction_count += 1;
            state.stats.last_interaction = Some(now);
        }

        let conversation_entry = self.record_conversation(user_id, record, &detected);
        for (topic, weight) in new_preferences {
            if let Some(entry_id) = self.record_preference(user_id, &topic, weight) {
                adaptations.push(Adaptation::PreferenceRecorded { topic, entry_id });
            }
        }

        debug!(
            "Processed {} interaction for {}: {} adaptations",
            record.kind.as_str(),
            user_id,
            adaptations.len()
        );
        AppliedAdaptations {
            user_id: user_id.clone(),
            adaptations,
            conversation_entry,
        }
    }

    /// Snapshot of a profile with decay applied as of now. Never mutates.
    pub fn get_profile(&self, user_id: &UserId) -> Option<UserProfile> {
        let now = self.clock.now();
        self.profiles.get(user_id).map(|state| {
            state.snapshot(now, self.config.decay_factor, self.config.decay_interval_secs)
        })
    }

    pub fn known_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.profiles.iter().map(|e| e.key().clone()).collect();
        users.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        users
    }

    fn style_deltas(
        &self,
        record: &InteractionRecord,
        text: &NormalizedText,
    ) -> Vec<(StyleDimension, f64)> {
        let step = self.config.style_delta;
        let mut deltas = Vec::new();

        let words = text.word_count();
        if words > self.config.verbose_word_threshold {
            deltas.push((StyleDimension::Verbosity, step));
        } else if words < self.config.brief_word_threshold {
            deltas.push((StyleDimension::Verbosity, -step));
        }

        if self.signals.is_emotional(&record.text, text) {
            deltas.push((StyleDimension::Emotionality, step));
        }

        match (self.signals.is_formal(text), self.signals.is_informal(text)) {
            (true, false) => deltas.push((StyleDimension::Formality, step)),
            (false, true) => deltas.push((StyleDimension::Formality, -step)),
            _ => {}
        }

        if record.user_initiative {
            deltas.push((StyleDimension::Proactivity, step));
        }
        match record.rating.map(i8::signum) {
            Some(1) => deltas.push((StyleDimension::Proactivity, step)),
            Some(-1) => deltas.push((StyleDimension::Proactivity, -step)),
            _ => {}
        }

        deltas
    }

    fn record_conversation(
        &self,
        user_id: &UserId,
        record: &InteractionRecord,
        topics: &BTreeSet<String>,
    ) -> Option<EntryId> {
        let mut content = Content::new();
        content.insert("text".into(), Value::from(record.text.clone()));
        content.insert("kind".into(), Value::from(record.kind.as_str()));
        if let Some(rating) = record.rating {
            content.insert("rating".into(), Value::from(rating));
        }
        self.store_logged(
            EntryKind::Conversation,
            content,
            Importance::Medium,
            user_id,
            topics.iter(),
        )
    }

    fn record_preference(&self, user_id: &UserId, topic: &str, weight: f64) -> Option<EntryId> {
        info!("{} shows a standing interest in {} ({:.2})", user_id, topic, weight);
        let mut content = Content::new();
        content.insert("topic".into(), Value::from(topic));
        content.insert("weight".into(), Value::from(weight));
        self.store_logged(
            EntryKind::Preference,
            content,
            Importance::High,
            user_id,
            [topic, "preferencia"],
        )
    }

    fn store_logged<I, S>(
        &self,
        kind: EntryKind,
        content: Content,
        importance: Importance,
        owner: &UserId,
        keywords: I,
    ) -> Option<EntryId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self
            .store
            .store(kind, content, importance, Some(owner.clone()), keywords)
        {
            Ok(id) => Some(id),
            Err(Error::Persistence { entry_id, reason }) => {
                warn!("Knowledge entry for {} not persisted: {}", owner, reason);
                entry_id
            }
            Err(e) => {
                warn!("Failed to record knowledge entry for {}: {}", owner, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::ManualClock;
    use chrono::Utc;

    fn engine() -> UserAdaptationEngine {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(KnowledgeStore::in_memory(clock.clone()));
        UserAdaptationEngine::new(store, clock, AdaptationConfig::default())
    }

    #[test]
    fn first_interaction_creates_profile() {
        let engine = engine();
        let user = UserId::from("u1");
        let applied = engine.process_interaction(&user, &InteractionRecord::new("hola", "saludo"));
        assert!(applied.profile_created());
        assert!(applied.conversation_entry.is_some());

        let again = engine.process_interaction(&user, &InteractionRecord::new("hola", "saludo"));
        assert!(!again.profile_created());
        assert_eq!(engine.get_profile(&user).unwrap().stats.interaction_count, 2);
    }

    #[test]
    fn short_message_lowers_verbosity() {
        let engine = engine();
        let applied = engine.process_interaction(&"u1".into(), &InteractionRecord::new("hola", "saludo"));
        let (from, to) = applied.style_change(StyleDimension::Verbosity).unwrap();
        assert_eq!(from, 0.5);
        assert!((to - 0.45).abs() < 1e-9);
    }

    #[test]
    fn neutral_rating_changes_nothing() {
        let engine = engine();
        let user = UserId::from("u1");
        let applied = engine.process_interaction(
            &user,
            &InteractionRecord::new("ok entonces seguimos asi", "feedback").with_rating(0),
        );
        assert!(!applied
            .adaptations
            .iter()
            .any(|a| matches!(a, Adaptation::EngagementAdjusted { .. })));
        assert_eq!(applied.style_change(StyleDimension::Proactivity), None);
    }

    #[test]
    fn known_users_sorted() {
        let engine = engine();
        for user in ["zoe", "ana", "luis"] {
            engine.process_interaction(&user.into(), &InteractionRecord::new("hola", "saludo"));
        }
        let users: Vec<String> = engine.known_users().iter().map(|u| u.to_string()).collect();
        assert_eq!(users, vec!["ana", "luis", "zoe"]);
    }
}
