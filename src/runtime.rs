use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Events consumed by the app loop
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// redraw opportunity, no input arrived within the tick interval
    Tick,
    /// one second of wall time has passed since the last pulse
    Second,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource {
    /// Wait up to `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source: a reader thread forwarding crossterm events
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                // Windows reports releases too; only presses are typing
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    tx.send(AppEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    tracing::warn!(error = %e, "terminal event reader stopped");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-fed event source for headless tests
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Advances the app one event at a time and interleaves one-second pulses.
///
/// Pulses are scheduled on a fixed grid from the last [`Runner::realign`],
/// so slow event handling delays a pulse but never drops one.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    pulse_period: Duration,
    next_pulse: Cell<Instant>,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self::with_pulse_period(event_source, ticker, Duration::from_secs(1))
    }

    pub fn with_pulse_period(event_source: E, ticker: T, pulse_period: Duration) -> Self {
        Self {
            event_source,
            ticker,
            pulse_period,
            next_pulse: Cell::new(Instant::now() + pulse_period),
        }
    }

    /// Restart the pulse grid from now, e.g. when a session starts.
    pub fn realign(&self) {
        self.next_pulse.set(Instant::now() + self.pulse_period);
    }

    /// Blocks up to the tick interval; yields a pulse when one is due.
    pub fn step(&self) -> AppEvent {
        let now = Instant::now();
        let due = self.next_pulse.get();
        if now >= due {
            self.next_pulse.set(due + self.pulse_period);
            return AppEvent::Second;
        }

        let wait = self.ticker.interval().min(due - now);
        match self.event_source.recv_timeout(wait) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );

        assert_matches!(runner.step(), AppEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );

        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn step_emits_pulses_on_schedule() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::with_pulse_period(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(5)),
            Duration::from_millis(20),
        );

        let mut pulses = 0;
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(110) {
            if let AppEvent::Second = runner.step() {
                pulses += 1;
            }
        }

        assert!((4..=6).contains(&pulses), "got {pulses} pulses");
    }

    #[test]
    fn realign_postpones_next_pulse() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::with_pulse_period(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
            Duration::from_millis(50),
        );

        std::thread::sleep(Duration::from_millis(60));
        runner.realign();

        assert_matches!(runner.step(), AppEvent::Tick);
    }
}
