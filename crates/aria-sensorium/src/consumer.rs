//! Event consumers and per-channel registration.
//!
//! Consumers run on the coordinator's single worker. A slow consumer delays
//! every later dispatch, so anything heavier than bookkeeping should be handed
//! to the consumer's own task (`tokio::spawn`) before returning.

use aria_core::{Channel, Error, SensoryEvent};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Receives dispatched events for the channel it was registered on.
pub trait EventConsumer: Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, event: &SensoryEvent) -> anyhow::Result<()>;
}

/// Adapter that turns a closure into a consumer.
pub struct FnConsumer<F> {
    name: String,
    f: F,
}

impl<F> FnConsumer<F>
where
    F: Fn(&SensoryEvent) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> EventConsumer for FnConsumer<F>
where
    F: Fn(&SensoryEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &SensoryEvent) -> anyhow::Result<()> {
        (self.f)(event)
    }
}

/// Consumers per channel, in registration order.
#[derive(Default)]
pub(crate) struct ConsumerRegistry {
    channels: [RwLock<Vec<Arc<dyn EventConsumer>>>; 3],
    failures: AtomicU64,
}

impl ConsumerRegistry {
    pub fn register(&self, channel: Channel, consumer: Arc<dyn EventConsumer>) {
        self.channels[channel.index()]
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(consumer);
    }

    pub fn count(&self, channel: Channel) -> usize {
        self.channels[channel.index()]
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver `event` to every consumer of its channel. A consumer that
    /// errors or panics is logged and skipped; the rest still run.
    pub fn dispatch(&self, event: &SensoryEvent) {
        let channel = event.channel();
        // Snapshot so consumers may register more consumers without deadlock.
        let consumers: Vec<Arc<dyn EventConsumer>> = self.channels[channel.index()]
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for consumer in consumers {
            let outcome = catch_unwind(AssertUnwindSafe(|| consumer.on_event(event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(panic) => panic_message(panic.as_ref()),
            };
            self.failures.fetch_add(1, Ordering::Relaxed);
            let err = Error::consumer_failure(consumer.name(), channel, message);
            warn!("{}", err);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
