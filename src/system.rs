//! The assembled assistant: store, adaptation engine, and coordinator wired
//! together through per-channel consumers.

use crate::config::AriaConfig;
use crate::intent::{proactive_prompt, IntentTable};
use crate::speech::{say, shape_reply, Speaker};
use aria_adaptation::{InteractionRecord, UserAdaptationEngine, UserProfile};
use aria_core::{
    Channel, Clock, EntryKind, Importance, PerceptionEvent, Result, SensoryEvent, UserId,
};
use aria_knowledge::{Content, KnowledgeStore, StoreStats};
use aria_sensorium::{CoordinatorStats, SensorFusionCoordinator};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub coordinator: CoordinatorStats,
    pub knowledge: StoreStats,
    pub active_user: Option<UserId>,
    pub active_profile: Option<UserProfile>,
    pub known_users: usize,
}

/// State shared between the system handle and its consumers.
struct Shared {
    store: Arc<KnowledgeStore>,
    engine: Arc<UserAdaptationEngine>,
    speaker: Arc<dyn Speaker>,
    intents: IntentTable,
    active_user: RwLock<Option<UserId>>,
    last_interaction: Mutex<Option<DateTime<Utc>>>,
    motion_threshold: f64,
}

impl Shared {
    fn active_user(&self) -> Option<UserId> {
        self.active_user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn touch(&self, at: DateTime<Utc>) {
        *self.last_interaction.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
    }

    /// Store an entry, treating a persistence failure as a warning: the entry
    /// is kept in memory either way.
    fn record(
        &self,
        kind: EntryKind,
        content: Content,
        importance: Importance,
        keywords: &[&str],
    ) -> anyhow::Result<()> {
        match self
            .store
            .store(kind, content, importance, self.active_user(), keywords)
        {
            Ok(id) => {
                debug!("Recorded entry {}", id);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!("Entry kept in memory only: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn on_audio(&self, event: &SensoryEvent) -> anyhow::Result<()> {
        let Some(text) = event
            .as_perception()
            .and_then(PerceptionEvent::text)
            .filter(|t| !t.trim().is_empty())
        else {
            return Ok(());
        };
        self.touch(event.timestamp());
        let kind = self.intents.classify(text);

        let profile = match self.active_user() {
            Some(user) => {
                let applied = self
                    .engine
                    .process_interaction(&user, &InteractionRecord::new(text, kind));
                debug!("{} adaptations for {}", applied.adaptations.len(), user);
                self.engine.get_profile(&user)
            }
            None => {
                let mut content = Content::new();
                content.insert("text".into(), Value::from(text));
                content.insert("kind".into(), Value::from(kind.as_str()));
                self.record(
                    EntryKind::Conversation,
                    content,
                    Importance::Medium,
                    &["audio", "conversacion"],
                )?;
                None
            }
        };

        let reply = self.intents.reply(text, profile.as_ref());
        let reply = match &profile {
            Some(p) => shape_reply(&reply, &p.style),
            None => reply,
        };
        say(self.speaker.as_ref(), &reply);
        Ok(())
    }

    fn on_visual(&self, event: &SensoryEvent) -> anyhow::Result<()> {
        let Some(visual) = event.as_perception() else {
            return Ok(());
        };
        let faces = visual.face_count();
        if faces > 0 {
            let mut content = Content::new();
            content.insert("event".into(), Value::from("face_detected"));
            content.insert("faces".into(), Value::from(faces));
            content.insert("timestamp".into(), Value::from(visual.timestamp.to_rfc3339()));
            self.record(
                EntryKind::Experience,
                content,
                Importance::High,
                &["visual", "rostro"],
            )?;
        }
        if let Some(intensity) = visual
            .motion_intensity()
            .filter(|m| *m > self.motion_threshold)
        {
            let mut content = Content::new();
            content.insert("event".into(), Value::from("motion_detected"));
            content.insert("intensity".into(), Value::from(intensity));
            content.insert("timestamp".into(), Value::from(visual.timestamp.to_rfc3339()));
            self.record(
                EntryKind::Experience,
                content,
                Importance::Medium,
                &["visual", "movimiento"],
            )?;
        }
        Ok(())
    }

    fn on_integrated(&self, event: &SensoryEvent) -> anyhow::Result<()> {
        let Some(fused) = event.as_fused() else {
            return Ok(());
        };
        let analysis = &fused.analysis;
        if !analysis.face_to_face_interaction {
            return Ok(());
        }
        let mut content = Content::new();
        content.insert("event".into(), Value::from("face_to_face_interaction"));
        content.insert(
            "text".into(),
            Value::from(analysis.audio.text().unwrap_or_default()),
        );
        content.insert("faces".into(), Value::from(analysis.visual.face_count()));
        content.insert(
            "attention_level".into(),
            serde_json::to_value(analysis.visual_attention_level)?,
        );
        content.insert("timestamp".into(), Value::from(fused.timestamp.to_rfc3339()));
        self.record(
            EntryKind::Experience,
            content,
            Importance::High,
            &["interaccion", "cara_a_cara"],
        )
    }
}

pub struct AriaSystem {
    config: AriaConfig,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    coordinator: Arc<SensorFusionCoordinator>,
}

impl AriaSystem {
    /// Build every layer from `config`. The store falls back to memory if its
    /// file cannot be opened.
    pub fn new(config: AriaConfig, speaker: Arc<dyn Speaker>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(config.knowledge.build(clock.clone()));
        Self::with_store(config, store, speaker, clock)
    }

    pub fn with_store(
        config: AriaConfig,
        store: Arc<KnowledgeStore>,
        speaker: Arc<dyn Speaker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = Arc::new(UserAdaptationEngine::new(
            store.clone(),
            clock.clone(),
            config.adaptation.clone(),
        ));
        let coordinator = Arc::new(SensorFusionCoordinator::new(
            config.fusion.clone(),
            clock.clone(),
        ));
        let shared = Arc::new(Shared {
            store,
            engine,
            speaker,
            intents: IntentTable::default(),
            active_user: RwLock::new(None),
            last_interaction: Mutex::new(None),
            motion_threshold: config.fusion.motion_threshold,
        });

        let system = Self {
            config,
            clock,
            shared,
            coordinator,
        };
        system.register_consumers();
        system
    }

    fn register_consumers(&self) {
        let shared = self.shared.clone();
        self.coordinator
            .register_fn(Channel::Audio, "conversation", move |e| shared.on_audio(e));
        let shared = self.shared.clone();
        self.coordinator
            .register_fn(Channel::Visual, "visual-experience", move |e| shared.on_visual(e));
        let shared = self.shared.clone();
        self.coordinator
            .register_fn(Channel::Integrated, "interaction-experience", move |e| {
                shared.on_integrated(e)
            });
    }

    pub fn config(&self) -> &AriaConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.shared.store
    }

    pub fn engine(&self) -> &Arc<UserAdaptationEngine> {
        &self.shared.engine
    }

    pub fn coordinator(&self) -> &Arc<SensorFusionCoordinator> {
        &self.coordinator
    }

    pub fn start(&self) -> Result<()> {
        self.coordinator.start()?;
        info!("Aria started");
        Ok(())
    }

    /// Drain queued perception and stop dispatching.
    pub async fn stop(&self) {
        self.coordinator.stop().await;
        info!("Aria stopped");
    }

    pub fn submit(&self, event: PerceptionEvent) -> Result<()> {
        self.coordinator.submit(event)
    }

    /// Attribute subsequent interactions to `user`, or to nobody.
    pub fn set_active_user(&self, user: Option<UserId>) {
        match &user {
            Some(u) => info!("Active user: {}", u),
            None => info!("No active user"),
        }
        *self
            .shared
            .active_user
            .write()
            .unwrap_or_else(|e| e.into_inner()) = user;
    }

    pub fn active_user(&self) -> Option<UserId> {
        self.shared.active_user()
    }

    /// Take the initiative if the user has been quiet for longer than their
    /// proactivity allows. Returns what was said.
    pub fn proactive_tick(&self) -> Option<String> {
        let now = self.clock.now();
        let profile = self
            .active_user()
            .and_then(|u| self.shared.engine.get_profile(&u));
        let base = self.config.system.proactive_base();
        let wait = match &profile {
            Some(p) => p.proactive_after(base),
            None => base,
        };

        let mut last = self
            .shared
            .last_interaction
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let quiet_since = (*last)?;
        let quiet = (now - quiet_since).to_std().unwrap_or_default();
        if quiet <= wait {
            return None;
        }
        *last = Some(now);
        drop(last);

        let prompt = proactive_prompt(profile.as_ref());
        let text = match &profile {
            Some(p) => shape_reply(prompt, &p.style),
            None => prompt.to_string(),
        };
        say(self.shared.speaker.as_ref(), &text);
        Some(text)
    }

    pub fn stats(&self) -> SystemStats {
        let active_user = self.active_user();
        let active_profile = active_user
            .as_ref()
            .and_then(|u| self.shared.engine.get_profile(u));
        SystemStats {
            coordinator: self.coordinator.stats(),
            knowledge: self.shared.store.stats(),
            active_user,
            active_profile,
            known_users: self.shared.engine.known_users().len(),
        }
    }
}
