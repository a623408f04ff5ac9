//! Event handling for the watch view.

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use super::app::App;

/// Terminal events the watch view reacts to.
#[derive(Debug)]
pub enum Event {
    /// A key was pressed.
    Key(KeyEvent),
    /// The terminal gained focus; treated as the view becoming visible.
    FocusGained,
    /// The terminal lost focus; treated as the view being hidden.
    FocusLost,
    /// Terminal was resized.
    Resize(u16, u16),
    /// Periodic tick for redraws.
    Tick,
}

/// Requests that must be forwarded to the pipeline.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Reconnect,
    Visibility(bool),
}

/// Spawns a task that polls for terminal events and sends them to a channel.
pub fn spawn_event_reader(tx: mpsc::UnboundedSender<Event>) {
    tokio::spawn(async move {
        loop {
            // Poll for events with a 50ms timeout
            let polled = tokio::task::spawn_blocking(|| {
                if event::poll(Duration::from_millis(50)).unwrap_or(false) {
                    event::read().ok()
                } else {
                    None
                }
            })
            .await;

            let event = match polled {
                Ok(Some(CrosstermEvent::Key(key))) => Event::Key(key),
                Ok(Some(CrosstermEvent::FocusGained)) => Event::FocusGained,
                Ok(Some(CrosstermEvent::FocusLost)) => Event::FocusLost,
                Ok(Some(CrosstermEvent::Resize(w, h))) => Event::Resize(w, h),
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });
}

/// Spawns a task that sends periodic tick events.
pub fn spawn_tick_timer(tx: mpsc::UnboundedSender<Event>, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            interval.tick().await;
            if tx.send(Event::Tick).is_err() {
                break;
            }
        }
    });
}

/// Updates application state for an event.
pub fn handle_event(app: &mut App, event: Event) -> Option<Action> {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::FocusGained => set_visible(app, true),
        Event::FocusLost => set_visible(app, false),
        Event::Resize(_, _) | Event::Tick => None,
    }
}

fn set_visible(app: &mut App, visible: bool) -> Option<Action> {
    if app.visible == visible {
        return None;
    }
    app.visible = visible;
    Some(Action::Visibility(visible))
}

fn handle_key(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
            None
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            None
        }
        KeyCode::Char('r') => Some(Action::Reconnect),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn q_quits_and_r_reconnects() {
        let mut app = App::new(Vec::new(), 14);

        assert_eq!(handle_event(&mut app, key(KeyCode::Char('r'))), Some(Action::Reconnect));
        assert!(!app.should_quit);

        assert_eq!(handle_event(&mut app, key(KeyCode::Char('q'))), None);
        assert!(app.should_quit);
    }

    #[test]
    fn focus_changes_map_to_visibility_once() {
        let mut app = App::new(Vec::new(), 14);

        assert_eq!(
            handle_event(&mut app, Event::FocusLost),
            Some(Action::Visibility(false))
        );
        assert_eq!(handle_event(&mut app, Event::FocusLost), None);
        assert_eq!(
            handle_event(&mut app, Event::FocusGained),
            Some(Action::Visibility(true))
        );
    }
}
