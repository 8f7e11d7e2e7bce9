//! System configuration
//!
//! One TOML file covers every layer. Missing tables and keys fall back to
//! defaults, so an empty file is a valid config.

use aria_adaptation::AdaptationConfig;
use aria_core::Error;
use aria_knowledge::KnowledgeConfig;
use aria_sensorium::FusionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AriaConfig {
    /// Runtime behavior of the assembled system.
    pub system: SystemConfig,
    /// Knowledge store location.
    pub knowledge: KnowledgeConfig,
    /// Fusion window and attention thresholds.
    pub fusion: FusionConfig,
    /// Profile learning rates, topic table, and style markers.
    pub adaptation: AdaptationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Silence, in seconds, before a neutral-proactivity user is offered a
    /// topic. Scaled per user by their proactivity score.
    pub proactive_base_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            proactive_base_secs: 30,
        }
    }
}

impl SystemConfig {
    pub fn proactive_base(&self) -> Duration {
        Duration::from_secs(self.proactive_base_secs)
    }
}

impl AriaConfig {
    /// Parse TOML text.
    pub fn parse(text: &str) -> aria_core::Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Render as TOML, for writing out a starter config.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
