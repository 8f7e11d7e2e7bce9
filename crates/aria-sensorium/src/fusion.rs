//! Audio/visual fusion over a short window of the latest event per channel.

use crate::config::FusionConfig;
use aria_core::{AttentionLevel, Channel, FusedEvent, FusionAnalysis, PerceptionEvent};

/// Rate how much visual attention an event shows.
pub fn visual_attention_level(visual: &PerceptionEvent, config: &FusionConfig) -> AttentionLevel {
    let faces = visual.face_count();
    let moving = visual
        .motion_intensity()
        .is_some_and(|m| m > config.motion_threshold);
    if faces >= config.high_attention_faces || (faces >= 1 && moving) {
        AttentionLevel::High
    } else if faces >= 1 || moving {
        AttentionLevel::Medium
    } else {
        AttentionLevel::Low
    }
}

/// Combine an audio and a visual observation into one analysis.
pub fn analyze(
    audio: PerceptionEvent,
    visual: PerceptionEvent,
    config: &FusionConfig,
) -> FusionAnalysis {
    FusionAnalysis {
        face_to_face_interaction: visual.face_count() >= 1 && audio.has_speech(),
        visual_attention_level: visual_attention_level(&visual, config),
        audio,
        visual,
    }
}

/// Most recent unfused event per perception channel.
///
/// Only the worker touches this, so it needs no locking.
#[derive(Default)]
pub(crate) struct FusionWindow {
    audio: Option<PerceptionEvent>,
    visual: Option<PerceptionEvent>,
}

impl FusionWindow {
    /// Record `event` and fuse it with the other channel's latest event if
    /// the two are within the window. A fused pair leaves the window, so
    /// neither half is fused twice.
    pub fn observe(&mut self, event: &PerceptionEvent, config: &FusionConfig) -> Option<FusedEvent> {
        let window_ms = config.fusion_window_ms.min(i64::MAX as u64) as i64;
        let (own, other) = match event.channel() {
            Channel::Audio => (&mut self.audio, &mut self.visual),
            Channel::Visual => (&mut self.visual, &mut self.audio),
            Channel::Integrated => return None,
        };

        // Blank transcripts carry nothing to pair with.
        if event.channel() == Channel::Audio && !event.has_speech() {
            return None;
        }

        let in_window = other.as_ref().is_some_and(|c| {
            (event.timestamp - c.timestamp).num_milliseconds().abs() <= window_ms
        });
        let counterpart = match other.take() {
            Some(c) if in_window => c,
            stale => {
                *other = stale;
                *own = Some(event.clone());
                return None;
            }
        };
        *own = None;

        let (audio, visual) = match event.channel() {
            Channel::Audio => (event.clone(), counterpart),
            _ => (counterpart, event.clone()),
        };
        let timestamp = audio.timestamp.max(visual.timestamp);
        Some(FusedEvent {
            timestamp,
            analysis: analyze(audio, visual, config),
        })
    }
}
