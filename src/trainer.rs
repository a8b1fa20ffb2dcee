use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tracing::{info, warn};

use crate::history::{check_improvement, HistoryStore, Improvement, ResultRecord};
use crate::metrics::{compute_accuracy, compute_wpm, SessionResult};
use crate::session::{split_words, Session, SessionEvent, SessionPhase, SessionStats};
use crate::store::KeyValueStore;
use crate::text_source::{TextProvider, FALLBACK_PHRASE};
use crate::timer::{Countdown, TimerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveMetrics {
    pub wpm: u32,
    pub accuracy: u32,
}

/// Result of a finished session as shown on the results screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub record: ResultRecord,
    pub improvement: Improvement,
    pub persisted: bool,
    pub stats: SessionStats,
}

/// Owns one session, its countdown and the history store, and turns key
/// presses into raw input values for the session.
pub struct Trainer<S: KeyValueStore> {
    session: Session,
    countdown: Countdown,
    history: HistoryStore<S>,
    provider: TextProvider,
    input: String,
    session_events: Receiver<SessionEvent>,
    timer_events: Receiver<TimerEvent>,
    live: LiveMetrics,
    outcome: Option<Outcome>,
    records: Vec<ResultRecord>,
    state: AppState,
    started: bool,
}

impl<S: KeyValueStore> Trainer<S> {
    pub fn new(provider: TextProvider, history: HistoryStore<S>, duration_secs: u32) -> Self {
        let (session_tx, session_events) = mpsc::channel();
        let (timer_tx, timer_events) = mpsc::channel();

        let mut session = Session::new();
        session.subscribe(session_tx);
        let mut countdown = Countdown::new(duration_secs);
        countdown.subscribe(timer_tx);

        let records = history.get_all();
        let mut trainer = Self {
            session,
            countdown,
            history,
            provider,
            input: String::new(),
            session_events,
            timer_events,
            live: LiveMetrics::default(),
            outcome: None,
            records,
            state: AppState::Typing,
            started: false,
        };
        trainer.new_text();
        trainer
    }

    /// Fetch fresh words and start over
    pub fn new_text(&mut self) {
        let words = self.provider.load();
        let loaded = self.session.set_text(words).or_else(|e| {
            warn!(error = %e, "provider returned no usable words");
            self.session.set_text(split_words(FALLBACK_PHRASE))
        });
        if let Err(e) = loaded {
            warn!(error = %e, "fallback phrase rejected, keeping previous text");
        }
        self.restart();
    }

    /// Start over with the same words
    pub fn restart(&mut self) {
        self.session.reset();
        self.countdown.reset();
        self.input.clear();
        self.live = LiveMetrics::default();
        self.outcome = None;
        self.state = AppState::Typing;
        self.started = false;
        self.session_events.try_iter().for_each(drop);
        self.timer_events.try_iter().for_each(drop);
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return Flow::Quit;
        }

        match self.state {
            AppState::Typing => match key.code {
                KeyCode::Char(c) => self.type_char(c),
                KeyCode::Backspace => self.backspace(),
                KeyCode::Enter => self.submit_word(),
                KeyCode::Left => self.restart(),
                KeyCode::Right => self.new_text(),
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') => self.restart(),
                KeyCode::Char('n') => self.new_text(),
                KeyCode::Char('h') => self.show_history(),
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Char('r') => self.restart(),
                KeyCode::Char('n') => self.new_text(),
                KeyCode::Char('b') | KeyCode::Backspace => {
                    self.state = if self.outcome.is_some() {
                        AppState::Results
                    } else {
                        AppState::Typing
                    };
                }
                _ => {}
            },
        }
        Flow::Continue
    }

    pub fn type_char(&mut self, c: char) {
        if self.session.is_finished() {
            return;
        }
        self.input.push(c);
        self.feed_input();
    }

    pub fn backspace(&mut self) {
        if self.session.is_finished() || self.input.pop().is_none() {
            return;
        }
        self.feed_input();
    }

    /// Commit the current word without a terminator keystroke
    pub fn submit_word(&mut self) {
        if self.session.phase() != SessionPhase::Active {
            return;
        }
        self.session.advance_word();
        self.input.clear();
        self.process_events();
    }

    /// One second of wall time has passed
    pub fn on_second(&mut self) {
        self.countdown.tick();
        self.process_events();
    }

    pub fn show_history(&mut self) {
        self.records = self.history.get_all();
        self.state = AppState::History;
    }

    /// True once after the first keystroke of a session
    pub fn take_started(&mut self) -> bool {
        std::mem::take(&mut self.started)
    }

    fn feed_input(&mut self) {
        self.session.handle_input(&self.input);
        // terminators consumed by the session leave only the in-progress word
        self.input = self.session.current_input().to_owned();
        self.process_events();
    }

    fn process_events(&mut self) {
        loop {
            let session_events: Vec<SessionEvent> = self.session_events.try_iter().collect();
            let timer_events: Vec<TimerEvent> = self.timer_events.try_iter().collect();
            if session_events.is_empty() && timer_events.is_empty() {
                break;
            }

            for event in session_events {
                match event {
                    SessionEvent::Started => {
                        self.started = true;
                        self.countdown.start();
                    }
                    SessionEvent::Updated(stats) => self.update_live(&stats),
                    SessionEvent::Completed(stats) => {
                        self.countdown.stop();
                        self.finish(stats);
                    }
                }
            }

            for event in timer_events {
                if event == TimerEvent::Expired {
                    // completion arrives as a session event on the next pass
                    self.session.expire();
                }
            }
        }
    }

    fn update_live(&mut self, stats: &SessionStats) {
        let elapsed = self.session.elapsed().unwrap_or_default();
        let correct = stats.correct_chars + stats.pending.correct;
        let total = stats.total_chars + stats.pending.total;
        self.live = LiveMetrics {
            wpm: compute_wpm(correct, elapsed.as_secs_f64()),
            accuracy: compute_accuracy(correct, total),
        };
    }

    fn finish(&mut self, stats: SessionStats) {
        let elapsed = if self.countdown.has_expired() {
            Duration::from_secs(self.countdown.elapsed() as u64)
        } else {
            self.session.elapsed().unwrap_or_default()
        };

        let record = SessionResult::from_stats(&stats, elapsed);
        let prior = self.history.get_all();
        let improvement = check_improvement(&record, &prior);
        let appended = self.history.append(record);

        info!(
            wpm = appended.record.words_per_minute,
            accuracy = appended.record.accuracy_percent,
            elapsed_secs = elapsed.as_secs_f64(),
            persisted = appended.persisted,
            "session finished"
        );

        self.records = prior;
        self.records.push(appended.record.clone());
        self.live = LiveMetrics {
            wpm: appended.record.words_per_minute,
            accuracy: appended.record.accuracy_percent,
        };
        self.outcome = Some(Outcome {
            record: appended.record,
            improvement,
            persisted: appended.persisted,
            stats,
        });
        self.input.clear();
        self.state = AppState::Results;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn live(&self) -> LiveMetrics {
        self.live
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }
}
