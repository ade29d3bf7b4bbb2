//! Event Aggregator
//!
//! Turns raw worker events into UI updates. Progress and step labels are
//! republished as they arrive. Log lines can arrive thousands of times per
//! second, so they are accumulated and published at most once per flush
//! interval.
//!
//! # Log Debouncing
//!
//! ```text
//!   fragment ─► buffer += fragment + separator
//!                 │
//!                 ├─ no flush pending ─► flush_pending = true, deadline = now + interval
//!                 └─ flush pending    ─► absorbed, deadline unchanged
//!
//!   deadline reached ─► published = buffer, flush_pending = false
//! ```
//!
//! The buffer is never cleared by a flush: within a run it only grows, and
//! each publication is the whole log so far. Nothing is dropped. The
//! debouncer takes `now` as an argument and owns no timer; the caller sleeps
//! until [`EventAggregator::next_flush_deadline`].

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::session::ExtractionSession;
use crate::worker::{value_text, EventChannel};

/// Default log flush interval
pub const DEFAULT_LOG_FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Default progress value at which the bundle counts as ready
pub const DEFAULT_COMPLETION_THRESHOLD: f64 = 99.9;

/// Event handling settings
#[derive(Clone, Debug, PartialEq)]
pub struct EventConfig {
    /// Minimum time between log publications
    pub log_flush_interval: Duration,
    /// Appended after every log fragment
    pub log_separator: String,
    /// Progress at or above this, during a run, means the bundle is ready
    pub completion_threshold: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            log_flush_interval: DEFAULT_LOG_FLUSH_INTERVAL,
            log_separator: "\n".to_string(),
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
        }
    }
}

// =============================================================================
// Decoded Events
// =============================================================================

/// A worker event with its payload decoded
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    /// Percent complete, clamped to 0..=100
    Progress(f64),
    /// One log fragment
    Message(String),
    /// Current step label
    Step(String),
}

impl WorkerEvent {
    /// Decode a raw payload from `channel`
    ///
    /// Returns `None` for a progress payload that is not a finite number.
    #[must_use]
    pub fn decode(channel: EventChannel, payload: &Value) -> Option<Self> {
        match channel {
            EventChannel::Progress => match payload.as_f64() {
                Some(value) if value.is_finite() => Some(Self::Progress(value.clamp(0.0, 100.0))),
                _ => {
                    tracing::warn!(payload = %payload, "Dropping malformed progress event");
                    None
                }
            },
            EventChannel::Message => Some(Self::Message(value_text(payload))),
            EventChannel::Step => Some(Self::Step(value_text(payload))),
        }
    }
}

/// A change the UI should render
#[derive(Clone, Debug, PartialEq)]
pub enum AggregatorUpdate {
    /// New progress value
    Progress(f64),
    /// New step label
    StepLabel(String),
    /// Whole log so far
    Log(String),
    /// Progress crossed the completion threshold during a run
    BundleReady,
}

// =============================================================================
// Log Debouncer
// =============================================================================

/// Single-timer debouncer over a growing text buffer
#[derive(Debug)]
pub struct LogDebouncer {
    interval: Duration,
    separator: String,
    buffer: String,
    flush_pending: bool,
    deadline: Option<Instant>,
}

impl LogDebouncer {
    /// Create a debouncer publishing at most once per `interval`
    #[must_use]
    pub fn new(interval: Duration, separator: impl Into<String>) -> Self {
        Self {
            interval,
            separator: separator.into(),
            buffer: String::new(),
            flush_pending: false,
            deadline: None,
        }
    }

    /// Append a fragment
    ///
    /// Returns `true` when this fragment scheduled a new flush, `false` when
    /// it was absorbed into an already pending one.
    pub fn push(&mut self, fragment: &str, now: Instant) -> bool {
        self.buffer.push_str(fragment);
        self.buffer.push_str(&self.separator);

        if self.flush_pending {
            return false;
        }
        self.flush_pending = true;
        self.deadline = Some(now + self.interval);
        true
    }

    /// Whether a flush is scheduled
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.flush_pending
    }

    /// When the pending flush is due
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.filter(|_| self.flush_pending)
    }

    /// Publish the buffer if the pending flush is due
    pub fn poll_flush(&mut self, now: Instant) -> Option<String> {
        match self.deadline() {
            Some(due) if now >= due => self.flush_now(),
            _ => None,
        }
    }

    /// Publish the buffer immediately if a flush is pending
    pub fn flush_now(&mut self) -> Option<String> {
        if !self.flush_pending {
            return None;
        }
        self.flush_pending = false;
        self.deadline = None;
        Some(self.buffer.clone())
    }

    /// Everything accumulated so far, published or not
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Forget the buffer and any pending flush
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.flush_pending = false;
        self.deadline = None;
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Applies decoded worker events to the extraction session
#[derive(Debug)]
pub struct EventAggregator {
    log: LogDebouncer,
    completion_threshold: f64,
    ready_signalled: bool,
}

impl EventAggregator {
    /// Create an aggregator from settings
    #[must_use]
    pub fn new(config: &EventConfig) -> Self {
        Self {
            log: LogDebouncer::new(config.log_flush_interval, config.log_separator.clone()),
            completion_threshold: config.completion_threshold,
            ready_signalled: false,
        }
    }

    /// Apply one event, returning the updates to publish right away
    pub fn apply(
        &mut self,
        event: WorkerEvent,
        session: &mut ExtractionSession,
        now: Instant,
    ) -> Vec<AggregatorUpdate> {
        match event {
            WorkerEvent::Progress(value) => {
                session.progress = value;
                let mut updates = vec![AggregatorUpdate::Progress(value)];
                if session.active && !self.ready_signalled && value >= self.completion_threshold {
                    self.ready_signalled = true;
                    tracing::debug!(progress = value, "Completion threshold reached");
                    updates.push(AggregatorUpdate::BundleReady);
                }
                updates
            }
            WorkerEvent::Step(label) => {
                session.step_label.clone_from(&label);
                vec![AggregatorUpdate::StepLabel(label)]
            }
            WorkerEvent::Message(fragment) => {
                if self.log.push(&fragment, now) {
                    tracing::trace!("Log flush scheduled");
                }
                Vec::new()
            }
        }
    }

    /// When the next log flush is due, if one is pending
    #[must_use]
    pub fn next_flush_deadline(&self) -> Option<Instant> {
        self.log.deadline()
    }

    /// Publish the log if its flush is due
    pub fn flush_due(
        &mut self,
        session: &mut ExtractionSession,
        now: Instant,
    ) -> Option<AggregatorUpdate> {
        let text = self.log.poll_flush(now)?;
        session.log.clone_from(&text);
        Some(AggregatorUpdate::Log(text))
    }

    /// Publish the log now if a flush is pending
    pub fn flush_now(&mut self, session: &mut ExtractionSession) -> Option<AggregatorUpdate> {
        let text = self.log.flush_now()?;
        session.log.clone_from(&text);
        Some(AggregatorUpdate::Log(text))
    }

    /// Prepare for a new run
    pub fn begin_run(&mut self) {
        self.log.reset();
        self.ready_signalled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const INTERVAL: Duration = Duration::from_millis(500);

    fn aggregator() -> EventAggregator {
        EventAggregator::new(&EventConfig::default())
    }

    // =========================================================================
    // Debouncer
    // =========================================================================

    #[test]
    fn test_burst_yields_single_publication() {
        let start = Instant::now();
        let mut log = LogDebouncer::new(INTERVAL, "\n");

        assert!(log.push("one", start));
        assert!(!log.push("two", start + Duration::from_millis(10)));
        assert!(!log.push("three", start + Duration::from_millis(490)));

        assert_eq!(log.poll_flush(start + Duration::from_millis(499)), None);
        assert_eq!(
            log.poll_flush(start + INTERVAL),
            Some("one\ntwo\nthree\n".to_string())
        );
        assert_eq!(log.poll_flush(start + Duration::from_secs(5)), None);
        assert!(!log.is_pending());
    }

    #[test]
    fn test_spaced_fragments_publish_each_time() {
        let mut now = Instant::now();
        let mut log = LogDebouncer::new(INTERVAL, "\n");
        let mut publications = Vec::new();

        for fragment in ["a", "b", "c"] {
            log.push(fragment, now);
            now += INTERVAL + Duration::from_millis(1);
            publications.extend(log.poll_flush(now));
        }

        assert_eq!(publications, vec!["a\n", "a\nb\n", "a\nb\nc\n"]);
    }

    #[test]
    fn test_deadline_not_moved_by_later_fragments() {
        let start = Instant::now();
        let mut log = LogDebouncer::new(INTERVAL, "\n");
        log.push("first", start);
        log.push("second", start + Duration::from_millis(300));
        assert_eq!(log.deadline(), Some(start + INTERVAL));
    }

    #[test]
    fn test_flush_now_and_reset() {
        let start = Instant::now();
        let mut log = LogDebouncer::new(INTERVAL, " | ");
        assert_eq!(log.flush_now(), None);

        log.push("x", start);
        assert_eq!(log.flush_now(), Some("x | ".to_string()));
        assert_eq!(log.deadline(), None);

        log.reset();
        assert_eq!(log.buffer(), "");
        assert!(!log.is_pending());
    }

    // =========================================================================
    // Event Decoding
    // =========================================================================

    #[test]
    fn test_decode_progress() {
        assert_eq!(
            WorkerEvent::decode(EventChannel::Progress, &json!(42.5)),
            Some(WorkerEvent::Progress(42.5))
        );
        assert_eq!(
            WorkerEvent::decode(EventChannel::Progress, &json!(150)),
            Some(WorkerEvent::Progress(100.0))
        );
        assert_eq!(WorkerEvent::decode(EventChannel::Progress, &json!("50")), None);
    }

    #[test]
    fn test_decode_text_channels() {
        assert_eq!(
            WorkerEvent::decode(EventChannel::Message, &json!("Bundling")),
            Some(WorkerEvent::Message("Bundling".to_string()))
        );
        assert_eq!(
            WorkerEvent::decode(EventChannel::Step, &json!({ "n": 1 })),
            Some(WorkerEvent::Step(r#"{"n":1}"#.to_string()))
        );
    }

    // =========================================================================
    // Aggregator
    // =========================================================================

    #[test]
    fn test_progress_published_immediately_even_when_lower() {
        let mut agg = aggregator();
        let mut session = ExtractionSession::new();
        let now = Instant::now();

        for value in [40.0, 10.0] {
            let updates = agg.apply(WorkerEvent::Progress(value), &mut session, now);
            assert_eq!(updates, vec![AggregatorUpdate::Progress(value)]);
            assert_eq!(session.progress, value);
        }
    }

    #[test]
    fn test_threshold_signals_once_while_active() {
        let mut agg = aggregator();
        let mut session = ExtractionSession::new();
        session.active = true;
        let now = Instant::now();

        let mut ready = 0;
        for value in [10.0, 25.0, 99.9, 100.0] {
            let updates = agg.apply(WorkerEvent::Progress(value), &mut session, now);
            assert_eq!(updates[0], AggregatorUpdate::Progress(value));
            ready += updates
                .iter()
                .filter(|u| **u == AggregatorUpdate::BundleReady)
                .count();
        }
        assert_eq!(ready, 1);
    }

    #[test]
    fn test_threshold_ignored_when_idle() {
        let mut agg = aggregator();
        let mut session = ExtractionSession::new();
        let updates = agg.apply(WorkerEvent::Progress(100.0), &mut session, Instant::now());
        assert_eq!(updates, vec![AggregatorUpdate::Progress(100.0)]);
    }

    #[test]
    fn test_log_reaches_session_on_flush() {
        let mut agg = aggregator();
        let mut session = ExtractionSession::new();
        let start = Instant::now();

        assert!(agg
            .apply(WorkerEvent::Message("Bundling".into()), &mut session, start)
            .is_empty());
        assert_eq!(agg.next_flush_deadline(), Some(start + INTERVAL));
        assert_eq!(agg.flush_due(&mut session, start), None);
        assert_eq!(session.log, "");

        let update = agg.flush_due(&mut session, start + INTERVAL);
        assert_eq!(update, Some(AggregatorUpdate::Log("Bundling\n".to_string())));
        assert_eq!(session.log, "Bundling\n");
    }

    #[test]
    fn test_begin_run_rearms_threshold() {
        let mut agg = aggregator();
        let mut session = ExtractionSession::new();
        session.active = true;
        let now = Instant::now();

        agg.apply(WorkerEvent::Message("old".into()), &mut session, now);
        agg.apply(WorkerEvent::Progress(100.0), &mut session, now);
        agg.begin_run();

        assert_eq!(agg.next_flush_deadline(), None);
        let updates = agg.apply(WorkerEvent::Progress(100.0), &mut session, now);
        assert!(updates.contains(&AggregatorUpdate::BundleReady));
    }
}
