//! Asset Wizard Core - Headless Extraction Wizard
//!
//! This crate drives a three-step wizard that extracts game-resource archives
//! through an external worker process. It holds no UI code: a surface sends
//! [`WizardAction`]s in and renders the [`WizardMessage`]s that come out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Surface (TUI)                           │
//! └──────────────┬──────────────────────────────────▲────────────────┘
//!                │ WizardAction (up)                 │ WizardMessage (down)
//! ┌──────────────▼──────────────────────────────────┴────────────────┐
//! │                              Wizard                               │
//! │  ┌────────────────────┐      ┌──────────────────────────────────┐ │
//! │  │ CommandOrchestrator│─────►│ Flow                             │ │
//! │  │  add / remove /    │      │  WizardState   AssetSelection    │ │
//! │  │  keys / extract /  │      │  GatePolicy    ExtractionSession │ │
//! │  │  save              │      │  EventPump ─► EventAggregator    │ │
//! │  └─────────┬──────────┘      └───────────────────▲──────────────┘ │
//! └────────────┼─────────────────────────────────────┼────────────────┘
//!              │ invoke(command, args)               │ extract_progress
//!              │                                     │ extract_message
//!              │                                     │ extract_step
//! ┌────────────▼─────────────────────────────────────┴────────────────┐
//! │                Worker (Unix socket or in-process)                 │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Steps
//!
//! 1. **Intro**: always passable.
//! 2. **Asset selection**: forward needs at least one archive, plus a key
//!    when any archive is a `.xci` or `.nsp`. Forward starts extraction.
//! 3. **Extraction progress**: back is locked while extraction runs. Once
//!    the bundle is ready the wizard enters terminal mode and forward
//!    becomes "Save".
//!
//! # Module Overview
//!
//! - [`wizard`]: The controller surfaces talk to
//! - [`flow`]: Wizard state and event application
//! - [`orchestrator`]: Worker commands and their error handling
//! - [`state`]: Step index, terminal mode and derived controls
//! - [`steps`]: Step descriptors
//! - [`gates`]: Enable/disable predicates per step
//! - [`aggregator`]: Progress, step label and debounced log handling
//! - [`pump`]: Subscriptions feeding the aggregator
//! - [`subscriptions`]: Ordered subscribe/unsubscribe of event channels
//! - [`worker`]: The worker seam and its transports
//! - [`config`]: TOML/env/CLI configuration
//! - [`logging`]: File logging for surfaces that own the terminal
//!
//! # No TUI Dependencies
//!
//! This crate has no dependency on ratatui, crossterm, or any other UI
//! framework.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregator;
pub mod config;
pub mod events;
pub mod flow;
pub mod gates;
pub mod logging;
pub mod messages;
pub mod orchestrator;
pub mod pump;
pub mod selection;
pub mod session;
pub mod state;
pub mod steps;
pub mod subscriptions;
pub mod wizard;
pub mod worker;

// Re-exports for convenience
pub use aggregator::{AggregatorUpdate, EventAggregator, EventConfig, LogDebouncer, WorkerEvent};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, WizardConfig,
};
pub use events::WizardAction;
pub use flow::Flow;
pub use gates::GatePolicy;
pub use messages::{NotifyLevel, Outbox, WizardMessage};
pub use orchestrator::{CommandOrchestrator, ExtractionOutcome};
pub use selection::AssetSelection;
pub use session::ExtractionSession;
pub use state::{Button, Controls, ForwardAction, WizardState, SAVE_LABEL};
pub use steps::{default_steps, AdvanceAction, Icon, RenderedStep, Step, StepKind};
pub use wizard::Wizard;
pub use worker::{
    connect_worker, EventChannel, InProcessWorker, InvokeError, Subscription, TransportError,
    UnixSocketWorker, Worker, WorkerConfig,
};
