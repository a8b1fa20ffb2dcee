use std::sync::mpsc::Sender;

use tracing::debug;

pub const DEFAULT_DURATION_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick(u32),
    Expired,
}

pub trait CountdownObserver {
    fn on_tick(&mut self, remaining: u32);
    fn on_complete(&mut self);
}

impl CountdownObserver for Sender<TimerEvent> {
    fn on_tick(&mut self, remaining: u32) {
        let _ = self.send(TimerEvent::Tick(remaining));
    }

    fn on_complete(&mut self) {
        let _ = self.send(TimerEvent::Expired);
    }
}

/// One-second countdown driven by external pulses.
///
/// The countdown does not own a clock: the runtime calls [`Countdown::tick`]
/// once per elapsed second. Expiry is reported once per armed run; the timer
/// is already stopped when `on_complete` fires, so late pulses are ignored.
pub struct Countdown {
    duration: u32,
    remaining: u32,
    running: bool,
    expired: bool,
    observers: Vec<Box<dyn CountdownObserver>>,
}

impl std::fmt::Debug for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Countdown")
            .field("duration", &self.duration)
            .field("remaining", &self.remaining)
            .field("running", &self.running)
            .field("expired", &self.expired)
            .finish()
    }
}

impl Countdown {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            duration: duration_secs,
            remaining: duration_secs,
            running: false,
            expired: false,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: impl CountdownObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn start(&mut self) {
        if self.running || self.expired {
            return;
        }
        debug!(remaining = self.remaining, "countdown started");
        self.running = true;
    }

    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.remaining = self.remaining.saturating_sub(1);
        let remaining = self.remaining;
        for observer in self.observers.iter_mut() {
            observer.on_tick(remaining);
        }

        if self.remaining == 0 {
            self.stop();
            self.expired = true;
            debug!("countdown expired");
            for observer in self.observers.iter_mut() {
                observer.on_complete();
            }
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Stop and rewind to the configured duration.
    pub fn reset(&mut self) {
        self.stop();
        self.remaining = self.duration;
        self.expired = false;
        let remaining = self.remaining;
        for observer in self.observers.iter_mut() {
            observer.on_tick(remaining);
        }
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }

    pub fn elapsed(&self) -> u32 {
        self.duration - self.remaining
    }
}
