//! Fusion and attention thresholds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Max distance between an audio and a visual timestamp for the two to
    /// be fused.
    pub fusion_window_ms: u64,
    /// Silence after which attention falls back to normal.
    pub idle_timeout_ms: u64,
    /// Faces needed for a visual event to count as presence.
    pub min_faces: u32,
    /// Motion intensity above which a visual event counts as presence.
    pub motion_threshold: f64,
    /// Faces at which visual attention is rated high on their own.
    pub high_attention_faces: u32,
    /// Capacity of the attention-change broadcast channel.
    pub notify_capacity: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            fusion_window_ms: 3_000,
            idle_timeout_ms: 30_000,
            min_faces: 1,
            motion_threshold: 0.5,
            high_attention_faces: 2,
            notify_capacity: 64,
        }
    }
}

impl FusionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms.max(1))
    }

    /// True when a visual event shows enough to wake attention.
    pub fn is_presence(&self, faces: u32, motion: Option<f64>) -> bool {
        faces >= self.min_faces.max(1) || motion.is_some_and(|m| m > self.motion_threshold)
    }
}
