use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Active,
    Completed,
}

/// Character-level score of a single word attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordScore {
    pub correct: u32,
    pub total: u32,
}

impl WordScore {
    /// Score of a word still being typed: only what has been typed so far counts.
    pub fn live(target: &str, typed: &str) -> Self {
        Self {
            correct: matching_positions(target, typed),
            total: typed.chars().count() as u32,
        }
    }

    /// Score of a submitted word: untyped target characters and overtyped
    /// characters both count toward the total.
    pub fn committed(target: &str, typed: &str) -> Self {
        let typed_len = typed.chars().count();
        let target_len = target.chars().count();
        Self {
            correct: matching_positions(target, typed),
            total: typed_len.max(target_len) as u32,
        }
    }
}

fn matching_positions(target: &str, typed: &str) -> u32 {
    target
        .chars()
        .zip(typed.chars())
        .filter(|(expected, actual)| expected == actual)
        .count() as u32
}

/// Snapshot of the session counters handed to observers and the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub correct_chars: u32,
    pub total_chars: u32,
    pub current_word_index: usize,
    pub total_words: usize,
    /// live score of the word currently being typed, not yet in the totals
    pub pending: WordScore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    Updated(SessionStats),
    Completed(SessionStats),
}

/// Subscriber interface for session notifications
pub trait SessionObserver {
    fn on_start(&mut self) {}
    fn on_update(&mut self, _stats: &SessionStats) {}
    fn on_complete(&mut self, _stats: &SessionStats) {}
}

// A disconnected receiver just means nobody is listening anymore.
impl SessionObserver for Sender<SessionEvent> {
    fn on_start(&mut self) {
        let _ = self.send(SessionEvent::Started);
    }

    fn on_update(&mut self, stats: &SessionStats) {
        let _ = self.send(SessionEvent::Updated(*stats));
    }

    fn on_complete(&mut self, stats: &SessionStats) {
        let _ = self.send(SessionEvent::Completed(*stats));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharOutcome {
    Correct,
    Incorrect,
    Pending,
    Extra,
}

/// Split free text into the word sequence a session is typed against.
pub fn split_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

/// State machine for one typing attempt over a fixed word list.
///
/// Raw input values are scored position by position against the current
/// word. Any whitespace in the raw value terminates the word: the word is
/// committed whether or not it matches and the session moves on.
pub struct Session {
    words: Vec<String>,
    current_word_index: usize,
    current_input: String,
    per_word_inputs: BTreeMap<usize, String>,
    correct_chars: u32,
    total_chars: u32,
    phase: SessionPhase,
    started_at: Option<Instant>,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("words", &self.words)
            .field("current_word_index", &self.current_word_index)
            .field("current_input", &self.current_input)
            .field("correct_chars", &self.correct_chars)
            .field("total_chars", &self.total_chars)
            .field("phase", &self.phase)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            current_word_index: 0,
            current_input: String::new(),
            per_word_inputs: BTreeMap::new(),
            correct_chars: 0,
            total_chars: 0,
            phase: SessionPhase::Idle,
            started_at: None,
            observers: Vec::new(),
        }
    }

    pub fn with_words<I, S>(words: I) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut session = Self::new();
        session.set_text(words)?;
        Ok(session)
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Replace the word list and return to `Idle`.
    ///
    /// Entries are re-split on whitespace so every stored word is a single
    /// non-empty token. Fails if nothing remains.
    pub fn set_text<I, S>(&mut self, words: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words
            .into_iter()
            .flat_map(|w| split_words(w.as_ref()))
            .collect();

        if words.is_empty() {
            return Err(SessionError::EmptyText);
        }

        debug!(words = words.len(), "session text set");
        self.words = words;
        self.reset();
        Ok(())
    }

    /// Feed the full current value of the input buffer.
    pub fn handle_input(&mut self, raw: &str) {
        if self.words.is_empty() || self.phase == SessionPhase::Completed {
            return;
        }
        if self.phase == SessionPhase::Idle {
            self.activate();
        }

        let mut rest = raw;
        while let Some(pos) = rest.find(char::is_whitespace) {
            let (word, tail) = rest.split_at(pos);
            let terminator_len = tail.chars().next().map_or(1, char::len_utf8);
            rest = &tail[terminator_len..];

            // a stray terminator on an empty buffer does not skip a word
            if word.is_empty() {
                continue;
            }

            self.current_input = word.to_owned();
            self.commit(true);
            if self.phase == SessionPhase::Completed {
                return;
            }
        }

        self.current_input = rest.to_owned();
        let stats = self.stats();
        self.notify(|o| o.on_update(&stats));
    }

    /// Submit the current word as typed, matching or not.
    pub fn advance_word(&mut self) {
        if self.words.is_empty() || self.phase == SessionPhase::Completed {
            return;
        }
        if self.phase == SessionPhase::Idle {
            self.activate();
        }

        self.commit(false);
        if self.phase == SessionPhase::Active {
            let stats = self.stats();
            self.notify(|o| o.on_update(&stats));
        }
    }

    /// Timer-driven completion. Only an active session can expire.
    pub fn expire(&mut self) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }

        debug!(word = self.current_word_index, "session expired");
        self.complete();
        true
    }

    /// Back to the `Idle` baseline, keeping the loaded words.
    pub fn reset(&mut self) {
        self.current_word_index = 0;
        self.current_input.clear();
        self.per_word_inputs.clear();
        self.correct_chars = 0;
        self.total_chars = 0;
        self.phase = SessionPhase::Idle;
        self.started_at = None;
    }

    pub fn stats(&self) -> SessionStats {
        let pending = match self.words.get(self.current_word_index) {
            Some(target) if self.phase != SessionPhase::Completed => {
                WordScore::live(target, &self.current_input)
            }
            _ => WordScore::default(),
        };

        SessionStats {
            correct_chars: self.correct_chars,
            total_chars: self.total_chars,
            current_word_index: self.current_word_index,
            total_words: self.words.len(),
            pending,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn current_input(&self) -> &str {
        &self.current_input
    }

    pub fn current_word_index(&self) -> usize {
        self.current_word_index
    }

    pub fn submitted(&self, index: usize) -> Option<&str> {
        self.per_word_inputs.get(&index).map(String::as_str)
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Per-character outcome of the word at `index`, for highlighting.
    ///
    /// Overtyped characters come back as `Extra` carrying the typed char.
    pub fn char_outcomes(&self, index: usize) -> Vec<(char, CharOutcome)> {
        let Some(target) = self.words.get(index) else {
            return Vec::new();
        };

        let (typed, live) = if let Some(submitted) = self.per_word_inputs.get(&index) {
            (submitted.as_str(), false)
        } else if index == self.current_word_index && self.phase != SessionPhase::Completed {
            (self.current_input.as_str(), true)
        } else {
            return target.chars().map(|c| (c, CharOutcome::Pending)).collect();
        };

        let mut typed_chars = typed.chars();
        let mut outcomes: Vec<(char, CharOutcome)> = target
            .chars()
            .map(|expected| match typed_chars.next() {
                Some(actual) if actual == expected => (expected, CharOutcome::Correct),
                Some(_) => (expected, CharOutcome::Incorrect),
                None if live => (expected, CharOutcome::Pending),
                None => (expected, CharOutcome::Incorrect),
            })
            .collect();
        outcomes.extend(typed_chars.map(|c| (c, CharOutcome::Extra)));
        outcomes
    }

    fn activate(&mut self) {
        debug!("session started");
        self.phase = SessionPhase::Active;
        self.started_at = Some(Instant::now());
        self.notify(|o| o.on_start());
    }

    fn commit(&mut self, terminated: bool) {
        let index = self.current_word_index;
        let input = std::mem::take(&mut self.current_input);
        let score = WordScore::committed(&self.words[index], &input);

        self.correct_chars += score.correct;
        self.total_chars += score.total;
        if terminated {
            self.correct_chars += 1;
            self.total_chars += 1;
        }
        self.per_word_inputs.insert(index, input);
        self.current_word_index += 1;

        if self.current_word_index == self.words.len() {
            self.complete();
        }
    }

    fn complete(&mut self) {
        self.phase = SessionPhase::Completed;
        let stats = self.stats();
        debug!(
            correct = stats.correct_chars,
            total = stats.total_chars,
            "session completed"
        );
        self.notify(|o| o.on_complete(&stats));
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn SessionObserver)) {
        for observer in self.observers.iter_mut() {
            f(observer.as_mut());
        }
    }
}
