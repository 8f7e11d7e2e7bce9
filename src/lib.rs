//! Aria - adaptive assistant core
//!
//! Wires the knowledge store, per-user adaptation, and sensor fusion into one
//! running system, with intent-driven replies shaped to each user's style.

pub mod config;
pub mod intent;
pub mod speech;
pub mod system;

pub use config::{AriaConfig, SystemConfig};
pub use intent::{proactive_prompt, IntentRule, IntentTable, Utterance};
pub use speech::{say, shape_reply, LogSpeaker, NullSpeaker, Speaker};
pub use system::{AriaSystem, SystemStats};

pub use aria_adaptation as adaptation;
pub use aria_core as core;
pub use aria_knowledge as knowledge;
pub use aria_sensorium as sensorium;
