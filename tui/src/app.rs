//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, resize)
//! - WizardClient for orchestration
//! - DisplayState for rendering
//!
//! Key presses become [`WizardAction`]s through [`map_key`], a pure function
//! of the display state, so the bindings are testable without a terminal.

use std::io;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use asset_wizard_core::{StepKind, WizardAction, WizardMessage};

use crate::client::WizardClient;
use crate::display::DisplayState;
use crate::ui;

/// Redraw interval when nothing happens
const TICK: Duration = Duration::from_millis(250);

/// What a key press means
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    /// Forward to the wizard
    Action(WizardAction),
    /// Open the archive path prompt
    OpenPrompt,
    /// Move the file highlight up
    HighlightUp,
    /// Move the file highlight down
    HighlightDown,
    /// Leave the application
    Quit,
    /// Unbound
    None,
}

/// Map a key press on the main screen to a command
#[must_use]
pub fn map_key(display: &DisplayState, key: KeyEvent) -> KeyCommand {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyCommand::Quit;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyCommand::Quit,
        KeyCode::Left | KeyCode::Char('b') => KeyCommand::Action(WizardAction::Back),
        KeyCode::Right | KeyCode::Enter => KeyCommand::Action(WizardAction::Forward),
        _ if display.step == StepKind::AssetSelect => map_asset_key(display, key.code),
        _ => KeyCommand::None,
    }
}

fn map_asset_key(display: &DisplayState, code: KeyCode) -> KeyCommand {
    match code {
        KeyCode::Char('a') => KeyCommand::OpenPrompt,
        KeyCode::Char('d') | KeyCode::Delete => match display.highlighted_file() {
            Some(name) => KeyCommand::Action(WizardAction::RemoveFile {
                name: name.to_string(),
            }),
            None => KeyCommand::None,
        },
        KeyCode::Up => KeyCommand::HighlightUp,
        KeyCode::Down => KeyCommand::HighlightDown,
        KeyCode::Char('k') => match display.next_key() {
            Some(key) => KeyCommand::Action(WizardAction::SelectKey {
                key: key.to_string(),
            }),
            None => KeyCommand::None,
        },
        KeyCode::Char('K') => KeyCommand::Action(WizardAction::SelectKeyManually),
        KeyCode::Char('f') => KeyCommand::Action(WizardAction::FindKeys),
        _ => KeyCommand::None,
    }
}

/// Parse the path prompt: comma-separated paths, empty means "use the picker"
#[must_use]
pub fn parse_path_prompt(input: &str) -> Option<Vec<String>> {
    let paths: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect();
    if paths.is_empty() {
        None
    } else {
        Some(paths)
    }
}

/// Main application state
pub struct App {
    /// Whether the app is running
    running: bool,
    /// Wizard task handle
    client: WizardClient,
    /// What is on screen
    display: DisplayState,
    /// Path prompt input, while open
    prompt: Option<String>,
}

impl App {
    /// Create the app over a started wizard
    #[must_use]
    pub fn new(client: WizardClient, completion_threshold: f64) -> Self {
        Self {
            running: true,
            client,
            display: DisplayState::new(completion_threshold),
            prompt: None,
        }
    }

    /// Main event loop
    ///
    /// # Errors
    ///
    /// Fails when drawing to the terminal fails.
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        self.draw(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            self.handle_key(key).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Terminal event error");
                        }
                        None => self.running = false,
                    }
                }

                msg = self.client.recv() => {
                    match msg {
                        Some(msg) => {
                            self.apply(msg);
                            for msg in self.client.recv_all() {
                                self.apply(msg);
                            }
                        }
                        None => {
                            tracing::info!("Wizard task stopped");
                            self.running = false;
                        }
                    }
                }

                () = tokio::time::sleep(TICK) => {}
            }

            self.draw(terminal)?;
        }

        Ok(())
    }

    /// Hand the wizard client back for shutdown
    #[must_use]
    pub fn into_client(self) -> WizardClient {
        self.client
    }

    fn apply(&mut self, msg: WizardMessage) {
        self.display.apply_message(msg);
    }

    fn draw(&self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        terminal.draw(|frame| ui::render(frame, &self.display, self.prompt.as_deref()))?;
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if let Some(input) = self.prompt.as_mut() {
            match key.code {
                KeyCode::Esc => self.prompt = None,
                KeyCode::Enter => {
                    let paths = parse_path_prompt(input);
                    self.prompt = None;
                    self.send(WizardAction::AddFiles { paths }).await;
                }
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return;
        }

        self.display.clear_notification();
        match map_key(&self.display, key) {
            KeyCommand::Action(action) => self.send(action).await,
            KeyCommand::OpenPrompt => self.prompt = Some(String::new()),
            KeyCommand::HighlightUp => self.display.highlight_previous(),
            KeyCommand::HighlightDown => self.display.highlight_next(),
            KeyCommand::Quit => self.running = false,
            KeyCommand::None => {}
        }
    }

    async fn send(&mut self, action: WizardAction) {
        tracing::debug!(?action, "Sending action");
        if let Err(e) = self.client.send(action).await {
            tracing::error!(error = %e, "Wizard rejected action");
            self.running = false;
        }
    }
}
