//! Tests for aria-sensorium: fusion, attention transitions, consumer
//! isolation, and lifecycle.

use aria_core::{
    AttentionState, Channel, Clock, Error, PerceptionEvent, SensoryEvent, SystemClock,
    TransitionReason,
};
use aria_sensorium::*;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn coordinator(config: FusionConfig) -> Arc<SensorFusionCoordinator> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Arc::new(SensorFusionCoordinator::new(config, clock))
}

/// Registers a consumer on `channel` that records every event it sees.
fn record(coord: &SensorFusionCoordinator, channel: Channel) -> Arc<Mutex<Vec<SensoryEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    coord.register_fn(channel, format!("recorder-{channel}"), move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    seen
}

// ===========================================================================
// Fusion and attention
// ===========================================================================

#[tokio::test]
async fn face_then_speech_fuses_once_and_focuses() {
    let coord = coordinator(FusionConfig::default());
    let integrated = record(&coord, Channel::Integrated);
    let visual = record(&coord, Channel::Visual);
    let audio = record(&coord, Channel::Audio);
    let mut changes = coord.subscribe_attention();
    coord.start().unwrap();

    let t0 = Utc::now();
    coord.submit(PerceptionEvent::faces(1, vec![], t0)).unwrap();
    coord
        .submit(PerceptionEvent::audio("hola", t0 + Duration::seconds(1)))
        .unwrap();
    coord.stop().await;

    assert_eq!(visual.lock().unwrap().len(), 1);
    assert_eq!(audio.lock().unwrap().len(), 1);
    let fused = integrated.lock().unwrap();
    assert_eq!(fused.len(), 1);
    let analysis = &fused[0].as_fused().unwrap().analysis;
    assert!(analysis.face_to_face_interaction);
    assert_eq!(analysis.audio.text(), Some("hola"));

    let first = changes.try_recv().unwrap();
    assert_eq!((first.from, first.to), (AttentionState::Normal, AttentionState::Attentive));
    assert_eq!(first.reason, TransitionReason::VisualPresence);
    let second = changes.try_recv().unwrap();
    assert_eq!((second.from, second.to), (AttentionState::Attentive, AttentionState::Focused));
    assert_eq!(second.reason, TransitionReason::Interaction);
    assert!(changes.try_recv().is_err());
    assert_eq!(coord.attention_state(), AttentionState::Focused);
}

#[tokio::test]
async fn pair_outside_window_is_not_fused() {
    let coord = coordinator(FusionConfig::default());
    let integrated = record(&coord, Channel::Integrated);
    coord.start().unwrap();

    let t0 = Utc::now();
    coord.submit(PerceptionEvent::faces(1, vec![], t0)).unwrap();
    coord
        .submit(PerceptionEvent::audio("hola", t0 + Duration::seconds(5)))
        .unwrap();
    coord.stop().await;

    assert!(integrated.lock().unwrap().is_empty());
    assert_eq!(coord.attention_state(), AttentionState::Attentive);
}

#[tokio::test]
async fn repeated_presence_notifies_once() {
    let coord = coordinator(FusionConfig::default());
    let mut changes = coord.subscribe_attention();
    coord.start().unwrap();

    let t0 = Utc::now();
    for i in 0..4 {
        coord
            .submit(PerceptionEvent::faces(1, vec![], t0 + Duration::milliseconds(i * 100)))
            .unwrap();
    }
    coord.stop().await;

    assert_eq!(changes.try_recv().unwrap().to, AttentionState::Attentive);
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn weak_motion_does_not_wake_attention() {
    let coord = coordinator(FusionConfig::default());
    coord.start().unwrap();
    coord
        .submit(PerceptionEvent::motion(0.3, vec![], Utc::now()))
        .unwrap();
    coord.stop().await;
    assert_eq!(coord.attention_state(), AttentionState::Normal);
}

#[tokio::test]
async fn strong_motion_wakes_attention() {
    let coord = coordinator(FusionConfig::default());
    coord.start().unwrap();
    coord
        .submit(PerceptionEvent::motion(0.8, vec![], Utc::now()))
        .unwrap();
    coord.stop().await;
    assert_eq!(coord.attention_state(), AttentionState::Attentive);
}

#[tokio::test(start_paused = true)]
async fn silence_returns_attention_to_normal() {
    let coord = coordinator(FusionConfig {
        idle_timeout_ms: 1_000,
        ..Default::default()
    });
    let mut changes = coord.subscribe_attention();
    coord.start().unwrap();

    coord.submit(PerceptionEvent::faces(1, vec![], Utc::now())).unwrap();
    assert_eq!(changes.recv().await.unwrap().to, AttentionState::Attentive);

    let idle = changes.recv().await.unwrap();
    assert_eq!((idle.from, idle.to), (AttentionState::Attentive, AttentionState::Normal));
    assert_eq!(idle.reason, TransitionReason::Idle);
    assert_eq!(coord.attention_state(), AttentionState::Normal);

    coord.stop().await;
}

#[tokio::test(start_paused = true)]
async fn activity_before_the_timeout_keeps_attention() {
    let coord = coordinator(FusionConfig {
        idle_timeout_ms: 1_000,
        ..Default::default()
    });
    let (done_tx, mut done) = tokio::sync::mpsc::unbounded_channel();
    coord.register_fn(Channel::Visual, "processed", move |_| {
        let _ = done_tx.send(());
        Ok(())
    });
    let mut changes = coord.subscribe_attention();
    coord.start().unwrap();
    let step = std::time::Duration::from_millis(800);

    coord.submit(PerceptionEvent::faces(1, vec![], Utc::now())).unwrap();
    done.recv().await.unwrap();
    assert_eq!(changes.recv().await.unwrap().to, AttentionState::Attentive);

    tokio::time::advance(step).await;
    coord.submit(PerceptionEvent::faces(1, vec![], Utc::now())).unwrap();
    done.recv().await.unwrap();

    tokio::time::advance(step).await;
    tokio::task::yield_now().await;
    assert!(changes.try_recv().is_err());
    assert_eq!(coord.attention_state(), AttentionState::Attentive);

    // The timer restarted at the second event and still fires.
    tokio::time::advance(std::time::Duration::from_millis(300)).await;
    let idle = changes.recv().await.unwrap();
    assert_eq!(idle.reason, TransitionReason::Idle);

    coord.stop().await;
}

// ===========================================================================
// Consumers
// ===========================================================================

#[tokio::test]
async fn failing_consumers_never_starve_the_others() {
    let coord = coordinator(FusionConfig::default());
    coord.register_fn(Channel::Audio, "always-fails", |_| anyhow::bail!("broken"));
    coord.register_fn(Channel::Audio, "always-panics", |_| panic!("boom"));
    let seen = record(&coord, Channel::Audio);
    coord.start().unwrap();

    for i in 0..3 {
        coord
            .submit(PerceptionEvent::audio(format!("mensaje {i}"), Utc::now()))
            .unwrap();
    }
    coord.stop().await;

    assert_eq!(seen.lock().unwrap().len(), 3);
    assert_eq!(coord.stats().consumer_failures, 6);
}

#[tokio::test]
async fn consumers_run_in_registration_order() {
    let coord = coordinator(FusionConfig::default());
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = order.clone();
        coord.register_fn(Channel::Visual, name, move |_| {
            order.lock().unwrap().push(name);
            Ok(())
        });
    }
    coord.start().unwrap();
    coord.submit(PerceptionEvent::faces(0, vec![], Utc::now())).unwrap();
    coord.stop().await;
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn stop_drains_queued_events_then_rejects() {
    let coord = coordinator(FusionConfig::default());
    let seen = record(&coord, Channel::Audio);

    for i in 0..5 {
        coord
            .submit(PerceptionEvent::audio(format!("evento {i}"), Utc::now()))
            .unwrap();
    }
    assert_eq!(coord.stats().queue_depth, 5);
    coord.stop().await;

    assert_eq!(seen.lock().unwrap().len(), 5);
    let err = coord
        .submit(PerceptionEvent::audio("tarde", Utc::now()))
        .unwrap_err();
    assert!(matches!(err, Error::CoordinatorStopped));
    assert!(matches!(coord.start(), Err(Error::CoordinatorStopped)));

    let stats = coord.stats();
    assert_eq!(stats.queue_depth, 0);
    assert_eq!(stats.events_processed.audio, 5);
    assert!(!stats.running);
}

#[tokio::test]
async fn stop_on_running_coordinator_drains() {
    let coord = coordinator(FusionConfig::default());
    let seen = record(&coord, Channel::Audio);
    coord.start().unwrap();
    coord.start().unwrap();
    for i in 0..5 {
        coord
            .submit(PerceptionEvent::audio(format!("evento {i}"), Utc::now()))
            .unwrap();
    }
    coord.stop().await;
    coord.stop().await;
    assert_eq!(seen.lock().unwrap().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_stops_both_wait_for_the_drain() {
    let coord = coordinator(FusionConfig::default());
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = seen.clone();
    coord.register_fn(Channel::Audio, "slow", move |_| {
        std::thread::sleep(std::time::Duration::from_millis(50));
        sink.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    coord.start().unwrap();
    for i in 0..5 {
        coord
            .submit(PerceptionEvent::audio(format!("evento {i}"), Utc::now()))
            .unwrap();
    }

    let first = tokio::spawn({
        let coord = coord.clone();
        async move { coord.stop().await }
    });
    // Let the spawned stop take the join handle first.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    coord.stop().await;
    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert!(!coord.stats().running);

    first.await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[test]
fn start_outside_a_runtime_is_an_error() {
    let coord = coordinator(FusionConfig::default());
    let seen = record(&coord, Channel::Audio);
    coord
        .submit(PerceptionEvent::audio("antes", Utc::now()))
        .unwrap();

    assert!(matches!(coord.start(), Err(Error::RuntimeUnavailable(_))));
    assert!(!coord.stats().running);
    assert_eq!(coord.stats().queue_depth, 1);

    // The queued event is still delivered once a runtime is available.
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        coord.start().unwrap();
        coord.stop().await;
    });
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_producers_are_all_processed() {
    let coord = coordinator(FusionConfig::default());
    coord.start().unwrap();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let coord = coord.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    coord
                        .submit(PerceptionEvent::audio(format!("{p}-{i}"), Utc::now()))
                        .unwrap();
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    coord.stop().await;

    let stats = coord.stats();
    assert_eq!(stats.events_processed.get(Channel::Audio), 100);
    assert_eq!(stats.events_processed.integrated, 0);
}
