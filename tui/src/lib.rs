//! Asset Wizard TUI - Terminal front-end for the extraction wizard
//!
//! A full-screen, three-step wizard over the headless core in
//! `asset_wizard_core`.
//!
//! # Architecture
//!
//! - **Client**: runs the wizard on its own task, two channels in between
//! - **Display**: state derived from wizard messages
//! - **UI**: pure rendering of the display state
//! - **App**: terminal event loop and key bindings

pub mod app;
pub mod client;
pub mod display;
pub mod theme;
pub mod ui;

pub use app::App;
pub use client::WizardClient;
