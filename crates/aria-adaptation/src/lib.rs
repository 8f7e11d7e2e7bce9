//! aria-adaptation: per-user behavioral profiles
//!
//! Turns raw interaction records into a standing, decaying belief about a
//! user's topical interests and preferred interaction style. Pure statistical
//! bookkeeping: topic weights are reinforced by mention and decay with time,
//! style scores drift by bounded deltas toward observed behavior.

pub mod config;
pub mod engine;
pub mod interaction;
pub mod profile;
pub mod signals;

pub use config::AdaptationConfig;
pub use engine::{Adaptation, AppliedAdaptations, UserAdaptationEngine};
pub use interaction::{InteractionKind, InteractionRecord};
pub use profile::{InteractionStats, StyleDimension, StyleScores, UserProfile};
pub use signals::{StyleSignals, TopicTable};
