// event.rs
use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use crate::app::{BackendEvent, TerminalEvent};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use tracing::error;

pub enum Event {
    Tick,
    Input(KeyEvent),
    Mouse(MouseEvent),
    TerminalEvent(TerminalEvent),
    Backend(BackendEvent),
}

/// Merges terminal input, ticks and request results into one channel.
pub struct EventHandler {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
    #[allow(dead_code)]
    event_thread: thread::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> EventHandler {
        let (sender, receiver) = mpsc::channel();
        let input_sender = sender.clone();
        let event_thread = thread::spawn(move || {
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or_else(|| Duration::from_secs(0));

                let polled = match event::poll(timeout) {
                    Ok(ready) => ready,
                    Err(e) => {
                        error!("unable to poll for terminal events: {e}");
                        return;
                    }
                };
                if polled {
                    let forwarded = match event::read() {
                        // Key releases and repeats are not interesting.
                        Ok(CrosstermEvent::Key(e)) if e.kind == KeyEventKind::Press => {
                            input_sender.send(Event::Input(e))
                        }
                        Ok(CrosstermEvent::Mouse(e)) => input_sender.send(Event::Mouse(e)),
                        Ok(CrosstermEvent::Resize(_, _)) => input_sender
                            .send(Event::TerminalEvent(TerminalEvent::Resize)),
                        Ok(_) => Ok(()),
                        Err(e) => {
                            error!("unable to read terminal event: {e}");
                            return;
                        }
                    };
                    if forwarded.is_err() {
                        return;
                    }
                }

                // If enough time has passed, send a `Tick` event.
                if last_tick.elapsed() >= tick_rate {
                    if input_sender.send(Event::Tick).is_err() {
                        return;
                    }
                    last_tick = Instant::now();
                }
            }
        });
        EventHandler {
            sender,
            receiver,
            event_thread,
        }
    }

    /// Handle for request workers to post their results.
    pub fn sender(&self) -> Sender<Event> {
        self.sender.clone()
    }

    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.receiver.recv()
    }
}
