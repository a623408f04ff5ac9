//! Terminal watch view for a handful of markets.
//!
//! The view only reads from the cache. Terminal focus stands in for page
//! visibility: losing focus closes the stream, regaining it reconnects.

pub mod app;
pub mod event;
pub mod terminal;
pub mod ui;

use tokio::sync::mpsc;
use tracing::info;

use crate::pipeline::MarketPipeline;
use crate::{PulseError, Result};

pub use app::App;
pub use event::{Action, Event};
pub use terminal::{Tui, restore_terminal, setup_terminal};
pub use ui::render;

/// Redraw interval when nothing else happens.
const TICK_MS: u64 = 250;

/// Runs the watch view until the user quits.
///
/// # Errors
///
/// Returns [`PulseError::Io`] if the terminal cannot be set up, drawn or
/// restored.
pub async fn run(pipeline: &MarketPipeline, period: u32) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, pipeline, period).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn run_loop(terminal: &mut Tui, pipeline: &MarketPipeline, period: u32) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    event::spawn_event_reader(tx.clone());
    event::spawn_tick_timer(tx, TICK_MS);

    let ticker_key = pipeline.ticker_key();
    let indicator_key = pipeline.indicator_key();
    let mut changes = pipeline.cache().changes();
    let mut status = pipeline.subscription().watch_status();
    let mut app = App::new(pipeline.markets().to_vec(), period);

    loop {
        app.refresh(pipeline.cache(), &ticker_key, &indicator_key);
        app.connection = *status.borrow_and_update();
        app.frames = pipeline.stream().stats();

        terminal
            .draw(|frame| render(frame, &app))
            .map_err(|e| PulseError::Io(format!("failed to draw: {e}")))?;

        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                match event::handle_event(&mut app, event) {
                    Some(Action::Reconnect) => {
                        info!("Manual reconnect requested");
                        pipeline.subscription().reconnect();
                    }
                    Some(Action::Visibility(visible)) => pipeline.stream().set_visible(visible),
                    None => {}
                }
            }
            Ok(()) = changes.changed() => {}
            Ok(()) = status.changed() => {}
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
