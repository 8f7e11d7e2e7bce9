//! Core types for Aria

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// User identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct UserId(Arc<str>);

impl UserId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0.to_string()
    }
}

/// Knowledge entry identifier. Assigned monotonically, never reused.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a knowledge entry records. Open-ended: unknown kinds round-trip
/// through `Other`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    Conversation,
    Preference,
    Experience,
    Other(String),
}

impl EntryKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Conversation => "conversation",
            EntryKind::Preference => "preference",
            EntryKind::Experience => "experience",
            EntryKind::Other(s) => s,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EntryKind {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "conversation" => EntryKind::Conversation,
            "preference" => EntryKind::Preference,
            "experience" => EntryKind::Experience,
            other => EntryKind::Other(other.to_string()),
        }
    }
}

impl From<&str> for EntryKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Entry importance, ordered LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
            Importance::Critical => "critical",
        }
    }
}

/// Capture channel. Perception events arrive on `Audio` or `Visual`;
/// `Integrated` carries fused events only.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Audio,
    Visual,
    Integrated,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Audio, Channel::Visual, Channel::Integrated];

    pub fn index(&self) -> usize {
        match self {
            Channel::Audio => 0,
            Channel::Visual => 1,
            Channel::Integrated => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Audio => "audio",
            Channel::Visual => "visual",
            Channel::Integrated => "integrated",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel-space rectangle reported by a detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub count: u32,
    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionDetection {
    /// Normalized motion intensity, 0.0 (still) to 1.0.
    pub intensity: f64,
    #[serde(default)]
    pub regions: Vec<BoundingBox>,
}

/// Channel-specific detection result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum PerceptionPayload {
    Audio {
        text: String,
    },
    Visual {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        faces: Option<FaceDetection>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        motion: Option<MotionDetection>,
    },
}

/// A single timestamped observation from one capture channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerceptionEvent {
    #[serde(flatten)]
    pub payload: PerceptionPayload,
    pub timestamp: DateTime<Utc>,
}

impl PerceptionEvent {
    pub fn audio(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            payload: PerceptionPayload::Audio { text: text.into() },
            timestamp,
        }
    }

    pub fn faces(count: u32, boxes: Vec<BoundingBox>, timestamp: DateTime<Utc>) -> Self {
        Self {
            payload: PerceptionPayload::Visual {
                faces: Some(FaceDetection { count, boxes }),
                motion: None,
            },
            timestamp,
        }
    }

    pub fn motion(intensity: f64, regions: Vec<BoundingBox>, timestamp: DateTime<Utc>) -> Self {
        Self {
            payload: PerceptionPayload::Visual {
                faces: None,
                motion: Some(MotionDetection { intensity, regions }),
            },
            timestamp,
        }
    }

    pub fn channel(&self) -> Channel {
        match self.payload {
            PerceptionPayload::Audio { .. } => Channel::Audio,
            PerceptionPayload::Visual { .. } => Channel::Visual,
        }
    }

    /// Recognized speech, if this is an audio event.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            PerceptionPayload::Audio { text } => Some(text),
            PerceptionPayload::Visual { .. } => None,
        }
    }

    /// True for audio events whose recognized text is not blank.
    pub fn has_speech(&self) -> bool {
        self.text().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn face_count(&self) -> u32 {
        match &self.payload {
            PerceptionPayload::Visual {
                faces: Some(faces), ..
            } => faces.count,
            _ => 0,
        }
    }

    pub fn motion_intensity(&self) -> Option<f64> {
        match &self.payload {
            PerceptionPayload::Visual {
                motion: Some(motion),
                ..
            } => Some(motion.intensity),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionLevel {
    Low,
    Medium,
    High,
}

/// Signals derived from an audio and a visual event observed within the
/// fusion window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionAnalysis {
    pub face_to_face_interaction: bool,
    pub visual_attention_level: AttentionLevel,
    pub audio: PerceptionEvent,
    pub visual: PerceptionEvent,
}

/// Event synthesized by the coordinator on the `Integrated` channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusedEvent {
    pub timestamp: DateTime<Utc>,
    pub analysis: FusionAnalysis,
}

impl FusedEvent {
    pub fn channel(&self) -> Channel {
        Channel::Integrated
    }
}

/// What consumers receive: a raw perception or a fused event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensoryEvent {
    Fused(FusedEvent),
    Perception(PerceptionEvent),
}

impl SensoryEvent {
    pub fn channel(&self) -> Channel {
        match self {
            SensoryEvent::Perception(e) => e.channel(),
            SensoryEvent::Fused(e) => e.channel(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SensoryEvent::Perception(e) => e.timestamp,
            SensoryEvent::Fused(e) => e.timestamp,
        }
    }

    pub fn as_perception(&self) -> Option<&PerceptionEvent> {
        match self {
            SensoryEvent::Perception(e) => Some(e),
            SensoryEvent::Fused(_) => None,
        }
    }

    pub fn as_fused(&self) -> Option<&FusedEvent> {
        match self {
            SensoryEvent::Fused(e) => Some(e),
            SensoryEvent::Perception(_) => None,
        }
    }
}

/// Coarse engagement the system believes is present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionState {
    #[default]
    Normal,
    Attentive,
    Focused,
}

impl AttentionState {
    pub fn as_u8(self) -> u8 {
        match self {
            AttentionState::Normal => 0,
            AttentionState::Attentive => 1,
            AttentionState::Focused => 2,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => AttentionState::Attentive,
            2 => AttentionState::Focused,
            _ => AttentionState::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionState::Normal => "normal",
            AttentionState::Attentive => "attentive",
            AttentionState::Focused => "focused",
        }
    }
}

impl std::fmt::Display for AttentionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// A visual event showed a face or strong motion.
    VisualPresence,
    /// A fused event showed face-to-face interaction or high visual attention.
    Interaction,
    /// No event arrived within the idle timeout.
    Idle,
}

/// Notification emitted on every attention transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttentionChange {
    pub from: AttentionState,
    pub to: AttentionState,
    pub at: DateTime<Utc>,
    pub reason: TransitionReason,
}
