//! Event Pump
//!
//! Couples the live subscriptions to the aggregator and forwards the
//! resulting updates to the surface. Waiting ([`EventPump::wait`]) and
//! handling ([`EventPump::handle`]) are split so callers can wait inside a
//! `select!` without losing an event: only the wait is cancel-safe.

use serde_json::Value;
use tokio::time::Instant;

use crate::aggregator::{AggregatorUpdate, EventAggregator, EventConfig, WorkerEvent};
use crate::messages::{Outbox, WizardMessage};
use crate::session::ExtractionSession;
use crate::subscriptions::EventSubscriptions;
use crate::worker::{EventChannel, TransportError, Worker};

/// Why the pump woke up
#[derive(Clone, Debug, PartialEq)]
pub enum Wake {
    /// A worker event arrived
    Event(EventChannel, Value),
    /// The pending log flush is due
    FlushDue,
}

/// Subscriptions, aggregation and publication of worker events
#[derive(Debug)]
pub struct EventPump {
    subscriptions: Option<EventSubscriptions>,
    aggregator: EventAggregator,
    outbox: Outbox,
}

impl EventPump {
    /// Create an unmounted pump
    #[must_use]
    pub fn new(config: &EventConfig, outbox: Outbox) -> Self {
        Self {
            subscriptions: None,
            aggregator: EventAggregator::new(config),
            outbox,
        }
    }

    /// Whether subscriptions are live
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.subscriptions.is_some()
    }

    /// Subscribe to the worker's channels; no-op when already mounted
    ///
    /// # Errors
    ///
    /// Returns the subscription failure; nothing stays subscribed.
    pub async fn mount<W: Worker + ?Sized>(&mut self, worker: &W) -> Result<(), TransportError> {
        if self.subscriptions.is_none() {
            self.subscriptions = Some(EventSubscriptions::mount(worker).await?);
        }
        Ok(())
    }

    /// Publish any pending log, then release the subscriptions in order
    ///
    /// # Errors
    ///
    /// Returns the first unsubscribe failure.
    pub async fn unmount(&mut self, session: &mut ExtractionSession) -> Result<(), TransportError> {
        if let Some(update) = self.aggregator.flush_now(session) {
            self.publish(update).await;
        }
        match self.subscriptions.take() {
            Some(subscriptions) => subscriptions.unmount().await,
            None => Ok(()),
        }
    }

    /// When the pump next needs attention without any event arriving
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.aggregator.next_flush_deadline()
    }

    /// Wait for an event or the log flush deadline
    ///
    /// Pends forever when there is nothing to wait for.
    pub async fn wait(&mut self) -> Wake {
        let deadline = self.aggregator.next_flush_deadline();
        let flush = async move {
            match deadline {
                Some(due) => tokio::time::sleep_until(due).await,
                None => std::future::pending().await,
            }
        };

        match self.subscriptions.as_mut() {
            Some(subscriptions) => tokio::select! {
                Some((channel, payload)) = subscriptions.next() => Wake::Event(channel, payload),
                () = flush => Wake::FlushDue,
            },
            None => {
                flush.await;
                Wake::FlushDue
            }
        }
    }

    /// An event that is already queued, if any
    pub fn try_event(&mut self) -> Option<Wake> {
        let (channel, payload) = self.subscriptions.as_mut()?.try_next()?;
        Some(Wake::Event(channel, payload))
    }

    /// Apply a wake-up to the session and publish the result
    ///
    /// Returns `true` when the bundle became ready.
    pub async fn handle(&mut self, wake: Wake, session: &mut ExtractionSession) -> bool {
        let now = Instant::now();
        let updates = match wake {
            Wake::Event(channel, payload) => match WorkerEvent::decode(channel, &payload) {
                Some(event) => self.aggregator.apply(event, session, now),
                None => Vec::new(),
            },
            Wake::FlushDue => self.aggregator.flush_due(session, now).into_iter().collect(),
        };

        let mut ready = false;
        for update in updates {
            ready |= self.publish(update).await;
        }
        ready
    }

    /// Reset log state for a new run
    pub fn begin_run(&mut self) {
        self.aggregator.begin_run();
    }

    async fn publish(&self, update: AggregatorUpdate) -> bool {
        let msg = match update {
            AggregatorUpdate::Progress(value) => WizardMessage::Progress { value },
            AggregatorUpdate::StepLabel(label) => WizardMessage::StepLabel { label },
            AggregatorUpdate::Log(contents) => WizardMessage::Log { contents },
            AggregatorUpdate::BundleReady => return true,
        };
        self.outbox.send(msg).await;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::InProcessWorker;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn pump(interval_ms: u64) -> (EventPump, mpsc::Receiver<WizardMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let config = EventConfig {
            log_flush_interval: Duration::from_millis(interval_ms),
            ..EventConfig::default()
        };
        (EventPump::new(&config, Outbox::new(tx)), rx)
    }

    #[tokio::test]
    async fn test_event_is_published() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();
        let (mut pump, mut rx) = pump(500);
        let mut session = ExtractionSession::new();

        pump.mount(&worker).await.unwrap();
        emitter.emit(EventChannel::Progress, json!(33.0)).await;

        let wake = pump.wait().await;
        assert_eq!(wake, Wake::Event(EventChannel::Progress, json!(33.0)));
        assert!(!pump.handle(wake, &mut session).await);
        assert_eq!(rx.recv().await, Some(WizardMessage::Progress { value: 33.0 }));
        assert_eq!(session.progress, 33.0);

        pump.unmount(&mut session).await.unwrap();
        assert!(!pump.is_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_flush_wakes_pump() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();
        let (mut pump, mut rx) = pump(500);
        let mut session = ExtractionSession::new();

        pump.mount(&worker).await.unwrap();
        emitter.emit(EventChannel::Message, json!("Extracting XCI...")).await;

        let wake = pump.wait().await;
        pump.handle(wake, &mut session).await;
        assert!(pump.next_wakeup().is_some());

        let wake = pump.wait().await;
        assert_eq!(wake, Wake::FlushDue);
        pump.handle(wake, &mut session).await;
        assert_eq!(
            rx.recv().await,
            Some(WizardMessage::Log {
                contents: "Extracting XCI...\n".to_string()
            })
        );

        pump.unmount(&mut session).await.unwrap();
    }

    #[tokio::test]
    async fn test_unmount_flushes_pending_log() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();
        let (mut pump, mut rx) = pump(60_000);
        let mut session = ExtractionSession::new();

        pump.mount(&worker).await.unwrap();
        emitter.emit(EventChannel::Message, json!("Finished")).await;
        let wake = pump.wait().await;
        pump.handle(wake, &mut session).await;

        pump.unmount(&mut session).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(WizardMessage::Log {
                contents: "Finished\n".to_string()
            })
        );
        assert_eq!(session.log, "Finished\n");
    }
}
