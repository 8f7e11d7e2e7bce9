//! aria-sensorium: perception intake, audio/visual fusion, and attention
//!
//! A `SensorFusionCoordinator` accepts perception events from any number of
//! producers, fuses audio and visual observations that land within a short
//! window, tracks the attention state machine, and dispatches every raw and
//! fused event to consumers registered per channel.

mod attention;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod fusion;

pub use config::FusionConfig;
pub use consumer::{EventConsumer, FnConsumer};
pub use coordinator::{ChannelCounts, CoordinatorStats, SensorFusionCoordinator};
pub use fusion::{analyze, visual_attention_level};
