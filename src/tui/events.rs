// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use ratatui::crossterm::event::{Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{AppState, FocusPanel};

const PAGE_STEP: usize = 10;

/// Applies one terminal event to UI-local state. Transfer state is never
/// touched here; only focus, scrolling and lifecycle flags.
pub fn handle_event(event: CrosstermEvent, app_state: &mut AppState) {
    match event {
        CrosstermEvent::Resize(_, _) => {
            // The next paint re-lays-out every widget from the new frame
            // area; queued events are unaffected.
            app_state.ui_needs_redraw = true;
        }
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
            handle_key(key, app_state);
            app_state.ui_needs_redraw = true;
        }
        _ => {}
    }
}

fn handle_key(key: KeyEvent, app_state: &mut AppState) {
    if app_state.show_help {
        match key.code {
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q') => {
                app_state.show_help = false;
            }
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app_state.should_quit = true;
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app_state.should_quit = true;
        }
        KeyCode::Char('h') => {
            app_state.show_help = true;
        }
        KeyCode::Tab => {
            app_state.focus = match app_state.focus {
                FocusPanel::Overview => FocusPanel::Files,
                FocusPanel::Files => FocusPanel::Overview,
            };
        }
        KeyCode::Up if app_state.focus == FocusPanel::Files => {
            app_state.file_cursor = app_state.file_cursor.saturating_sub(1);
        }
        KeyCode::Down if app_state.focus == FocusPanel::Files => {
            move_cursor_down(app_state, 1);
        }
        KeyCode::PageUp if app_state.focus == FocusPanel::Files => {
            app_state.file_cursor = app_state.file_cursor.saturating_sub(PAGE_STEP);
        }
        KeyCode::PageDown if app_state.focus == FocusPanel::Files => {
            move_cursor_down(app_state, PAGE_STEP);
        }
        KeyCode::Home if app_state.focus == FocusPanel::Files => {
            app_state.file_cursor = 0;
        }
        KeyCode::End if app_state.focus == FocusPanel::Files => {
            app_state.file_cursor = last_file_index(app_state);
        }
        _ => {}
    }
}

fn move_cursor_down(app_state: &mut AppState, step: usize) {
    let last = last_file_index(app_state);
    app_state.file_cursor = app_state.file_cursor.saturating_add(step).min(last);
}

fn last_file_index(app_state: &AppState) -> usize {
    app_state.dashboard.files.len().saturating_sub(1)
}
