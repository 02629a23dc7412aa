// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::event::{self, Event as CrosstermEvent};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{event as tracing_event, Level};

use crate::config::Settings;
use crate::engine::{self, EngineCallback, EngineCommand, EngineParameters};
use crate::events::{normalize, TransferEvent};
use crate::state::DashboardState;
use crate::tui;

const ENGINE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusPanel {
    #[default]
    Overview,
    Files,
}

/// Everything the draw path reads: the authoritative transfer snapshot plus
/// UI-local interaction state (focus, scrolling, overlays).
pub struct AppState {
    pub dashboard: DashboardState,
    pub focus: FocusPanel,
    pub file_cursor: usize,
    pub show_help: bool,
    pub should_quit: bool,
    pub ui_needs_redraw: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            dashboard: DashboardState::new(),
            focus: FocusPanel::default(),
            file_cursor: 0,
            show_help: false,
            should_quit: false,
            ui_needs_redraw: true,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct App {
    pub app_state: AppState,
    pub settings: Arc<Settings>,

    engine_command_tx: mpsc::Sender<EngineCommand>,
    engine_callback_rx: mpsc::Receiver<EngineCallback>,
    engine_task: Option<tokio::task::JoinHandle<()>>,

    tui_event_tx: mpsc::Sender<CrosstermEvent>,
    tui_event_rx: mpsc::Receiver<CrosstermEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl App {
    /// Wires up the engine behind its channel pair and the input channel.
    /// Nothing here touches the terminal; that stays in `run`.
    pub fn new(settings: Settings, source: String, output_dir: PathBuf) -> Self {
        let settings = Arc::new(settings);

        let (callback_tx, engine_callback_rx) = mpsc::channel::<EngineCallback>(100);
        let (engine_command_tx, command_rx) = mpsc::channel::<EngineCommand>(10);
        let (tui_event_tx, tui_event_rx) = mpsc::channel::<CrosstermEvent>(100);
        let (shutdown_tx, _) = broadcast::channel(1);

        let engine_task = engine::spawn(EngineParameters {
            source,
            output_dir,
            callback_tx,
            command_rx,
            settings: settings.clone(),
        });

        Self {
            app_state: AppState::new(),
            settings,
            engine_command_tx,
            engine_callback_rx,
            engine_task: Some(engine_task),
            tui_event_tx,
            tui_event_rx,
            shutdown_tx,
        }
    }

    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // Input reading blocks, so it lives on its own task and feeds the
        // single consumer loop below through a channel.
        let tui_event_tx_clone = self.tui_event_tx.clone();
        let mut tui_shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tui_shutdown_rx.recv() => break,

                    result = tokio::task::spawn_blocking(event::read) => {
                        let event = match result {
                            Ok(Ok(e)) => e,
                            Ok(Err(e)) => {
                                tracing_event!(Level::ERROR, "Crossterm event read error: {}", e);
                                break;
                            }
                            Err(e) => {
                                tracing_event!(Level::ERROR, "Blocking TUI read task panicked: {}", e);
                                break;
                            }
                        };

                        if tui_event_tx_clone.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut draw_interval =
            time::interval(Duration::from_millis(self.settings.draw_interval_ms.max(10)));

        while !self.app_state.should_quit {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    self.app_state.should_quit = true;
                }

                Some(callback) = self.engine_callback_rx.recv() => {
                    self.process_callback(callback);
                }

                Some(event) = self.tui_event_rx.recv() => {
                    tui::events::handle_event(event, &mut self.app_state);
                }

                _ = draw_interval.tick() => {
                    if self.app_state.ui_needs_redraw {
                        terminal.draw(|f| {
                            tui::view::draw(f, &self.app_state);
                        })?;
                        self.app_state.ui_needs_redraw = false;
                    }
                }
            }
        }

        // Quit: stop the input task, release the engine, then leave. No
        // redraw happens past this point.
        let _ = self.shutdown_tx.send(());
        let _ = self.engine_command_tx.try_send(EngineCommand::Shutdown);
        if let Some(task) = self.engine_task.take() {
            if time::timeout(ENGINE_SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing_event!(Level::WARN, "Engine did not shut down in time. Forcing exit.");
            }
        }

        Ok(())
    }

    /// Normalizes one raw callback and applies it to the dashboard.
    pub fn process_callback(&mut self, callback: EngineCallback) {
        let event = normalize(callback);
        if let TransferEvent::Started { .. } = event {
            // A fresh manifest resets any stale scroll position.
            self.app_state.file_cursor = 0;
        }
        self.app_state.dashboard.apply(event);
        self.app_state.ui_needs_redraw = true;
    }
}
