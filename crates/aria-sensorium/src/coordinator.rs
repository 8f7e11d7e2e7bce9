//! Sensor fusion coordinator: the single consumer of the perception queue.
//!
//! Producers call `submit` from any thread. One worker task drains the queue
//! in arrival order, updates the fusion window and attention state, and
//! dispatches raw and fused events to registered consumers. Because all of
//! that happens on the worker, fusion and attention bookkeeping need no
//! locks.

use crate::attention::AttentionTracker;
use crate::config::FusionConfig;
use crate::consumer::{ConsumerRegistry, EventConsumer, FnConsumer};
use crate::fusion::FusionWindow;
use aria_core::{
    AttentionChange, AttentionLevel, AttentionState, Channel, Clock, Error, PerceptionEvent,
    Result, SensoryEvent,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelCounts {
    pub audio: u64,
    pub visual: u64,
    pub integrated: u64,
}

impl ChannelCounts {
    pub fn get(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Audio => self.audio,
            Channel::Visual => self.visual,
            Channel::Integrated => self.integrated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoordinatorStats {
    pub state: AttentionState,
    /// Events submitted but not yet picked up by the worker.
    pub queue_depth: u64,
    pub events_processed: ChannelCounts,
    pub consumer_failures: u64,
    pub running: bool,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    processed: [AtomicU64; 3],
    running: AtomicBool,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct SensorFusionCoordinator {
    config: FusionConfig,
    clock: Arc<dyn Clock>,
    consumers: Arc<ConsumerRegistry>,
    attention: Arc<AttentionTracker>,
    counters: Arc<Counters>,
    /// Admission side of the queue. `None` once stopped.
    queue_tx: Mutex<Option<mpsc::UnboundedSender<PerceptionEvent>>>,
    /// Held until `start` hands it to the worker.
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<PerceptionEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Flips to true when the worker has drained the queue and exited.
    finished: Arc<watch::Sender<bool>>,
    stopped: AtomicBool,
}

impl SensorFusionCoordinator {
    /// Create a stopped coordinator. Events may be submitted right away; they
    /// are processed once `start` is called.
    pub fn new(config: FusionConfig, clock: Arc<dyn Clock>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let attention = Arc::new(AttentionTracker::new(config.notify_capacity));
        Self {
            config,
            clock,
            consumers: Arc::new(ConsumerRegistry::default()),
            attention,
            counters: Arc::new(Counters::default()),
            queue_tx: Mutex::new(Some(queue_tx)),
            queue_rx: Mutex::new(Some(queue_rx)),
            worker: Mutex::new(None),
            finished: Arc::new(watch::channel(false).0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Add a consumer for `channel`. Consumers of one channel are called in
    /// registration order. Registering while running is allowed; the new
    /// consumer sees events dispatched after this returns.
    pub fn register_consumer(&self, channel: Channel, consumer: Arc<dyn EventConsumer>) {
        debug!("Registered consumer {} on {}", consumer.name(), channel);
        self.consumers.register(channel, consumer);
    }

    pub fn register_fn<F>(&self, channel: Channel, name: impl Into<String>, f: F)
    where
        F: Fn(&SensoryEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_consumer(channel, Arc::new(FnConsumer::new(name, f)));
    }

    pub fn consumer_count(&self, channel: Channel) -> usize {
        self.consumers.count(channel)
    }

    /// Enqueue an event. Never blocks beyond queue admission.
    pub fn submit(&self, event: PerceptionEvent) -> Result<()> {
        let guard = self.queue_tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(Error::CoordinatorStopped);
        };
        self.counters.queued.fetch_add(1, Ordering::AcqRel);
        tx.send(event).map_err(|_| {
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            Error::CoordinatorStopped
        })
    }

    /// Spawn the worker on the current tokio runtime. Starting twice is a
    /// no-op; starting after `stop` fails, as does starting outside a runtime.
    pub fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(Error::CoordinatorStopped);
        }
        let runtime =
            Handle::try_current().map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;
        let rx = self.queue_rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(rx) = rx {
            self.spawn_worker(&runtime, rx);
        }
        Ok(())
    }

    /// Close admission, drain everything already queued, and wait for the
    /// worker to finish. Once this returns no consumer is called again, for
    /// every caller when several stop concurrently.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let tx = self.queue_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if tx.is_none() {
            debug!("Coordinator already stopping");
        }
        drop(tx);

        // Never started: run a worker just long enough to drain.
        let rx = self.queue_rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(rx) = rx {
            match Handle::try_current() {
                Ok(runtime) => self.spawn_worker(&runtime, rx),
                Err(_) => {
                    debug!("No tokio runtime, draining on the caller");
                    self.new_worker().drain(rx);
                }
            }
        }

        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Sensor fusion worker ended abnormally: {}", e);
            }
        }

        // Another caller may hold the join handle; wait on the worker itself.
        let mut finished = self.finished.subscribe();
        if finished.wait_for(|done| *done).await.is_err() {
            debug!("Worker completion signal closed");
        }
    }

    pub fn attention_state(&self) -> AttentionState {
        self.attention.current()
    }

    pub fn subscribe_attention(&self) -> broadcast::Receiver<AttentionChange> {
        self.attention.subscribe()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let processed = |c: Channel| self.counters.processed[c.index()].load(Ordering::Acquire);
        CoordinatorStats {
            state: self.attention.current(),
            queue_depth: self.counters.queued.load(Ordering::Acquire),
            events_processed: ChannelCounts {
                audio: processed(Channel::Audio),
                visual: processed(Channel::Visual),
                integrated: processed(Channel::Integrated),
            },
            consumer_failures: self.consumers.failures(),
            running: self.counters.running.load(Ordering::Acquire),
        }
    }

    fn new_worker(&self) -> Worker {
        self.counters.running.store(true, Ordering::Release);
        Worker {
            config: self.config.clone(),
            clock: self.clock.clone(),
            consumers: self.consumers.clone(),
            attention: self.attention.clone(),
            counters: self.counters.clone(),
            finished: self.finished.clone(),
            window: FusionWindow::default(),
        }
    }

    fn spawn_worker(&self, runtime: &Handle, rx: mpsc::UnboundedReceiver<PerceptionEvent>) {
        let handle = runtime.spawn(self.new_worker().run(rx));
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    config: FusionConfig,
    clock: Arc<dyn Clock>,
    consumers: Arc<ConsumerRegistry>,
    attention: Arc<AttentionTracker>,
    counters: Arc<Counters>,
    finished: Arc<watch::Sender<bool>>,
    window: FusionWindow,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.counters.running.store(false, Ordering::Release);
        self.finished.send_replace(true);
    }
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PerceptionEvent>) {
        info!("Sensor fusion worker started");
        let idle = self.config.idle_timeout();
        loop {
            let next = if self.attention.current() == AttentionState::Normal {
                rx.recv().await
            } else {
                match tokio::time::timeout(idle, rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.attention.on_idle(self.clock.now());
                        continue;
                    }
                }
            };
            let Some(event) = next else {
                break;
            };
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            self.process(event);
        }
        info!("Sensor fusion worker stopped: queue closed and drained");
    }

    /// Process whatever is already queued, without waiting for more.
    fn drain(mut self, mut rx: mpsc::UnboundedReceiver<PerceptionEvent>) {
        rx.close();
        while let Ok(event) = rx.try_recv() {
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            self.process(event);
        }
    }

    fn process(&mut self, event: PerceptionEvent) {
        let channel = event.channel();
        if channel == Channel::Visual
            && self
                .config
                .is_presence(event.face_count(), event.motion_intensity())
        {
            self.attention.on_presence(event.timestamp);
        }

        let fused = self.window.observe(&event, &self.config);

        self.consumers.dispatch(&SensoryEvent::Perception(event));
        self.counters.processed[channel.index()].fetch_add(1, Ordering::AcqRel);

        if let Some(fused) = fused {
            let analysis = &fused.analysis;
            debug!(
                "Fused audio+visual: face_to_face={} attention={:?}",
                analysis.face_to_face_interaction, analysis.visual_attention_level
            );
            if analysis.face_to_face_interaction
                || analysis.visual_attention_level == AttentionLevel::High
            {
                self.attention.on_interaction(fused.timestamp);
            }
            self.consumers.dispatch(&SensoryEvent::Fused(fused));
            self.counters.processed[Channel::Integrated.index()].fetch_add(1, Ordering::AcqRel);
        }
    }
}
