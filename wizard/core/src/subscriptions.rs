//! Event Subscriptions
//!
//! Scoped ownership of the wizard's three worker listeners. They are acquired
//! once on mount and released exactly once on unmount, one after another in
//! acquisition order, each release awaited before the next starts.
//!
//! Release happens on every exit path:
//!
//! - [`EventSubscriptions::unmount`] closes every receiver first, so no
//!   transport stays blocked on a full buffer, then releases in order and
//!   waits.
//! - A mount that fails part-way releases whatever it already acquired.
//! - Dropping the scope (including dropping a mount future mid-way) hands the
//!   releases, still in order, to a task on the current runtime.

use std::future::poll_fn;
use std::task::Poll;

use serde_json::Value;

use crate::worker::{EventChannel, Subscription, TransportError, Worker};

/// The live set of worker event listeners
#[derive(Debug, Default)]
pub struct EventSubscriptions {
    subscriptions: Vec<Subscription>,
    /// Channel polled first next time
    cursor: usize,
}

impl EventSubscriptions {
    /// Subscribe to every event channel, in [`EventChannel::ALL`] order
    ///
    /// # Errors
    ///
    /// Returns the first subscription failure, after releasing the listeners
    /// acquired before it.
    pub async fn mount<W: Worker + ?Sized>(worker: &W) -> Result<Self, TransportError> {
        let mut scope = Self::default();

        for channel in EventChannel::ALL {
            match worker.listen(channel).await {
                Ok(sub) => {
                    tracing::debug!(channel = %channel, "Subscribed");
                    scope.subscriptions.push(sub);
                }
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Subscribe failed, rolling back");
                    if let Err(release_err) = scope.unmount().await {
                        tracing::warn!(error = %release_err, "Rollback unlisten failed");
                    }
                    return Err(e);
                }
            }
        }

        Ok(scope)
    }

    /// Channels currently held, in acquisition order
    #[must_use]
    pub fn channels(&self) -> Vec<EventChannel> {
        self.subscriptions.iter().map(Subscription::channel).collect()
    }

    /// Wait for the next payload on any channel
    ///
    /// Polling starts after the channel that delivered last, so a busy channel
    /// cannot starve the others. Returns `None` once every channel has closed.
    pub async fn next(&mut self) -> Option<(EventChannel, Value)> {
        poll_fn(|cx| {
            let count = self.subscriptions.len();
            let mut open = false;
            for offset in 0..count {
                let index = (self.cursor + offset) % count;
                let sub = &mut self.subscriptions[index];
                match sub.poll_recv(cx) {
                    Poll::Ready(Some(payload)) => {
                        let channel = sub.channel();
                        self.cursor = (index + 1) % count;
                        return Poll::Ready(Some((channel, payload)));
                    }
                    Poll::Ready(None) => {}
                    Poll::Pending => open = true,
                }
            }
            if open {
                Poll::Pending
            } else {
                Poll::Ready(None)
            }
        })
        .await
    }

    /// Take an already-queued payload without waiting
    pub fn try_next(&mut self) -> Option<(EventChannel, Value)> {
        let count = self.subscriptions.len();
        for offset in 0..count {
            let index = (self.cursor + offset) % count;
            let sub = &mut self.subscriptions[index];
            if let Some(payload) = sub.try_recv() {
                self.cursor = (index + 1) % count;
                return Some((sub.channel(), payload));
            }
        }
        None
    }

    /// Release every listener in acquisition order
    ///
    /// All releases are attempted even if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first release failure.
    pub async fn unmount(mut self) -> Result<(), TransportError> {
        let mut first_error = None;

        for sub in &mut self.subscriptions {
            sub.close();
        }
        for sub in std::mem::take(&mut self.subscriptions) {
            let channel = sub.channel();
            match sub.unlisten().await {
                Ok(()) => tracing::debug!(channel = %channel, "Unsubscribed"),
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Unsubscribe failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for EventSubscriptions {
    fn drop(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }

        let releases: Vec<_> = self
            .subscriptions
            .iter_mut()
            .filter_map(|sub| sub.take_release().map(|release| (sub.channel(), release)))
            .collect();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(count = releases.len(), "Subscriptions dropped outside a runtime");
            return;
        };

        handle.spawn(async move {
            for (channel, release) in releases {
                if let Err(e) = release().await {
                    tracing::warn!(channel = %channel, error = %e, "Deferred unsubscribe failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::InProcessWorker;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mount_subscribes_every_channel() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();

        let subs = EventSubscriptions::mount(&worker).await.unwrap();
        assert_eq!(subs.channels(), EventChannel::ALL.to_vec());
        for channel in EventChannel::ALL {
            assert_eq!(emitter.listener_count(channel), 1);
        }

        subs.unmount().await.unwrap();
        for channel in EventChannel::ALL {
            assert_eq!(emitter.listener_count(channel), 0);
        }
    }

    #[tokio::test]
    async fn test_next_yields_payloads_with_channel() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();
        let mut subs = EventSubscriptions::mount(&worker).await.unwrap();

        emitter.emit(EventChannel::Step, json!("Bundling")).await;
        let next = tokio::time::timeout(Duration::from_secs(1), subs.next())
            .await
            .unwrap();
        assert_eq!(next, Some((EventChannel::Step, json!("Bundling"))));

        subs.unmount().await.unwrap();
    }

    #[tokio::test]
    async fn test_busy_channel_does_not_starve_others() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();
        let mut subs = EventSubscriptions::mount(&worker).await.unwrap();

        for value in [10.0, 20.0, 30.0] {
            emitter.emit(EventChannel::Progress, json!(value)).await;
        }
        emitter.emit(EventChannel::Step, json!("Bundling")).await;

        let first = tokio::time::timeout(Duration::from_secs(1), subs.next())
            .await
            .unwrap();
        assert_eq!(first, Some((EventChannel::Progress, json!(10.0))));
        assert_eq!(
            subs.try_next(),
            Some((EventChannel::Step, json!("Bundling")))
        );
        assert_eq!(
            subs.try_next(),
            Some((EventChannel::Progress, json!(20.0)))
        );

        subs.unmount().await.unwrap();
    }

    #[tokio::test]
    async fn test_unmount_wakes_sender_blocked_on_full_buffer() {
        let (worker, endpoint) = InProcessWorker::new_pair_with_capacity(1);
        let emitter = endpoint.emitter();
        let subs = EventSubscriptions::mount(&worker).await.unwrap();

        emitter.emit(EventChannel::Message, json!("line 1")).await;
        let blocked = {
            let emitter = emitter.clone();
            tokio::spawn(async move { emitter.emit(EventChannel::Message, json!("line 2")).await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(1), subs.unmount())
            .await
            .unwrap()
            .unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered, 0);
    }

    /// Worker whose channels are closed from the start
    struct ClosedWorker;

    #[async_trait::async_trait]
    impl Worker for ClosedWorker {
        async fn invoke(
            &self,
            _command: &str,
            _args: Value,
        ) -> Result<Value, crate::worker::InvokeError> {
            Ok(Value::Null)
        }

        async fn listen(&self, channel: EventChannel) -> Result<Subscription, TransportError> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(Subscription::new(channel, rx, || Box::pin(async { Ok::<(), TransportError>(()) })))
        }
    }

    #[tokio::test]
    async fn test_next_ends_when_all_channels_close() {
        let mut subs = EventSubscriptions::mount(&ClosedWorker).await.unwrap();

        let next = tokio::time::timeout(Duration::from_secs(1), subs.next())
            .await
            .unwrap();
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_drop_releases_on_runtime() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();

        let subs = EventSubscriptions::mount(&worker).await.unwrap();
        drop(subs);

        tokio::time::timeout(Duration::from_secs(1), async {
            while EventChannel::ALL
                .iter()
                .any(|c| emitter.listener_count(*c) > 0)
            {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
