use chrono::Utc;
use std::time::Duration;

use crate::history::ResultRecord;
use crate::session::SessionStats;

/// Standard typing-test convention: one "word" is five characters.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Words per minute from correctly typed characters.
///
/// Returns 0 for a non-positive elapsed time instead of dividing by zero.
pub fn compute_wpm(correct_chars: u32, elapsed_secs: f64) -> u32 {
    if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() {
        return 0;
    }

    let words = correct_chars as f64 / CHARS_PER_WORD;
    let minutes = elapsed_secs / 60.0;

    (words / minutes).round() as u32
}

/// Percentage of attempted characters typed correctly.
///
/// Nothing attempted means nothing was wrong, so an empty attempt scores 100.
pub fn compute_accuracy(correct_chars: u32, total_chars: u32) -> u32 {
    if total_chars == 0 {
        return 100;
    }

    let pct = (correct_chars as f64 / total_chars as f64 * 100.0).round() as u32;
    pct.min(100)
}

pub struct SessionResult;

impl SessionResult {
    /// Turn the final session counters into a history record stamped now.
    pub fn from_stats(stats: &SessionStats, elapsed: Duration) -> ResultRecord {
        ResultRecord {
            words_per_minute: compute_wpm(stats.correct_chars, elapsed.as_secs_f64()),
            accuracy_percent: compute_accuracy(stats.correct_chars, stats.total_chars),
            timestamp: Utc::now(),
        }
    }
}
