//! Daemon event loop.
//!
//! Everything external funnels into one unbounded queue; the loop drains it
//! and drives the coordinator, with a one-second tick interleaved.

use crate::coordinator::{Coordinator, Event};
use crate::session::EngineSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Creates the coordinator event queue.
pub fn event_channel() -> (mpsc::UnboundedSender<Event>, mpsc::UnboundedReceiver<Event>) {
    mpsc::unbounded_channel()
}

/// Creates the engine signal channel.
pub fn signal_channel() -> (mpsc::UnboundedSender<EngineSignal>, mpsc::UnboundedReceiver<EngineSignal>)
{
    mpsc::unbounded_channel()
}

/// Runs the event loop until both channels close.
pub async fn run(
    coordinator: Arc<Coordinator>,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut signals: mpsc::UnboundedReceiver<EngineSignal>,
) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!("event loop running");
    loop {
        tokio::select! {
            _ = tick.tick() => coordinator.handle_event(Event::Tick),
            event = events.recv() => match event {
                Some(event) => coordinator.handle_event(event),
                None => break,
            },
            signal = signals.recv() => match signal {
                Some(signal) => coordinator.handle_event(Event::Engine(signal)),
                None => break,
            },
        }
    }
    info!("event loop stopped");
}
