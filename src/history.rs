use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::HistoryError;
use crate::store::KeyValueStore;
use crate::util::{mean, std_dev};

pub const DEFAULT_HISTORY_KEY: &str = "typing_history";

/// Persisted outcome of one completed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub words_per_minute: u32,
    pub accuracy_percent: u32,
    pub timestamp: DateTime<Utc>,
}

/// Verdict of a new result against the attempt right before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Improvement {
    pub speed_improved: bool,
    pub accuracy_improved: bool,
    pub is_first_attempt: bool,
}

/// What happened to a record handed to [`HistoryStore::append`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub record: ResultRecord,
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySummary {
    pub attempts: usize,
    pub mean_wpm: f64,
    pub best_wpm: u32,
    pub mean_accuracy: f64,
    pub wpm_std_dev: f64,
}

/// Append-only list of results kept as one JSON array under a single key.
pub struct HistoryStore<S: KeyValueStore> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> HistoryStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, DEFAULT_HISTORY_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Append a record. Persistence failures are logged, never propagated;
    /// the record always comes back for display.
    pub fn append(&self, record: ResultRecord) -> Appended {
        match self.try_append(&record) {
            Ok(()) => {
                debug!(wpm = record.words_per_minute, "result saved");
                Appended {
                    record,
                    persisted: true,
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to persist result");
                Appended {
                    record,
                    persisted: false,
                }
            }
        }
    }

    fn try_append(&self, record: &ResultRecord) -> Result<(), HistoryError> {
        // a failed read must not be mistaken for an empty history
        let mut records: Vec<ResultRecord> = match self.store.get(&self.key)? {
            Some(payload) => serde_json::from_str(&payload).unwrap_or_else(|e| {
                warn!(error = %e, "replacing corrupt history payload");
                Vec::new()
            }),
            None => Vec::new(),
        };
        records.push(record.clone());
        let payload = serde_json::to_string(&records)?;
        self.store.set(&self.key, &payload)?;
        Ok(())
    }

    /// Every stored record, oldest first. Missing, unreadable or corrupt
    /// payloads all read as an empty history.
    pub fn get_all(&self) -> Vec<ResultRecord> {
        let payload = match self.store.get(&self.key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "history unavailable");
                return Vec::new();
            }
        };

        serde_json::from_str(&payload).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring corrupt history payload");
            Vec::new()
        })
    }

    pub fn latest(&self) -> Option<ResultRecord> {
        self.get_all().pop()
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.store.remove(&self.key)?;
        Ok(())
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        summarize(&self.get_all())
    }

    /// Write the history as CSV with a header row
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<usize, HistoryError> {
        let records = self.get_all();
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["timestamp", "wpm", "accuracy"])?;
        for record in &records {
            writer.write_record([
                record.timestamp.to_rfc3339(),
                record.words_per_minute.to_string(),
                record.accuracy_percent.to_string(),
            ])?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(records.len())
    }
}

/// Compare `new` with the most recent entry of `prior` only.
pub fn check_improvement(new: &ResultRecord, prior: &[ResultRecord]) -> Improvement {
    match prior.last() {
        None => Improvement {
            speed_improved: false,
            accuracy_improved: false,
            is_first_attempt: true,
        },
        Some(previous) => Improvement {
            speed_improved: new.words_per_minute > previous.words_per_minute,
            accuracy_improved: new.accuracy_percent > previous.accuracy_percent,
            is_first_attempt: false,
        },
    }
}

pub fn summarize(records: &[ResultRecord]) -> Option<HistorySummary> {
    let wpms: Vec<f64> = records.iter().map(|r| r.words_per_minute as f64).collect();
    let accuracies: Vec<f64> = records.iter().map(|r| r.accuracy_percent as f64).collect();

    Some(HistorySummary {
        attempts: records.len(),
        mean_wpm: mean(&wpms)?,
        best_wpm: records.iter().map(|r| r.words_per_minute).max()?,
        mean_accuracy: mean(&accuracies)?,
        wpm_std_dev: std_dev(&wpms)?,
    })
}

/// WPM change from each attempt to the next, oldest first
pub fn wpm_deltas(records: &[ResultRecord]) -> Vec<i64> {
    records
        .iter()
        .tuple_windows()
        .map(|(a, b)| b.words_per_minute as i64 - a.words_per_minute as i64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn record(wpm: u32, accuracy: u32) -> ResultRecord {
        ResultRecord {
            words_per_minute: wpm,
            accuracy_percent: accuracy,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disk gone".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota exceeded".into()))
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk gone".into()))
        }
    }

    /// In-memory store whose next `get` can be made to fail
    #[derive(Default)]
    struct FlakyRead {
        inner: MemoryStore,
        fail_next_get: Cell<bool>,
    }

    impl KeyValueStore for FlakyRead {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_next_get.replace(false) {
                return Err(StoreError::Unavailable("busy".into()));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_empty_history() {
        let history = HistoryStore::new(MemoryStore::new());
        assert!(history.get_all().is_empty());
        assert!(history.latest().is_none());
        assert!(history.summary().is_none());
    }

    #[test]
    fn test_append_and_read_back() {
        let history = HistoryStore::new(MemoryStore::new());
        let first = record(40, 95);
        let second = record(45, 90);

        assert!(history.append(first.clone()).persisted);
        assert!(history.append(second.clone()).persisted);

        assert_eq!(history.get_all(), vec![first, second.clone()]);
        assert_eq!(history.latest(), Some(second));
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(record(52, 97)).unwrap();
        assert_eq!(json["wordsPerMinute"], 52);
        assert_eq!(json["accuracyPercent"], 97);
        assert_eq!(json["timestamp"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_corrupt_payload_reads_as_empty() {
        let store = MemoryStore::new();
        store.set(DEFAULT_HISTORY_KEY, "{not json").unwrap();
        let history = HistoryStore::new(store);

        assert!(history.get_all().is_empty());

        // appending over a corrupt payload starts a fresh list
        assert!(history.append(record(30, 80)).persisted);
        assert_eq!(history.get_all().len(), 1);
    }

    #[test]
    fn test_persist_failure_still_returns_record() {
        let history = HistoryStore::new(BrokenStore);
        let rec = record(60, 99);

        let appended = history.append(rec.clone());

        assert!(!appended.persisted);
        assert_eq!(appended.record, rec);
        assert!(history.get_all().is_empty());
    }

    #[test]
    fn test_read_failure_does_not_overwrite_history() {
        let history = HistoryStore::new(FlakyRead::default());
        for wpm in [10, 20, 30] {
            assert!(history.append(record(wpm, 90)).persisted);
        }

        history.store.fail_next_get.set(true);
        let appended = history.append(record(40, 90));

        assert!(!appended.persisted);
        assert_eq!(appended.record.words_per_minute, 40);
        let wpms: Vec<u32> = history
            .get_all()
            .iter()
            .map(|r| r.words_per_minute)
            .collect();
        assert_eq!(wpms, vec![10, 20, 30]);

        assert!(history.append(record(50, 90)).persisted);
        assert_eq!(history.get_all().len(), 4);
    }

    #[test]
    fn test_custom_key_isolated() {
        let store = MemoryStore::new();
        store.set(DEFAULT_HISTORY_KEY, "[]").unwrap();
        let history = HistoryStore::with_key(store, "other");
        history.append(record(10, 50));
        assert_eq!(history.get_all().len(), 1);
    }

    #[test]
    fn test_first_attempt_never_improves() {
        let verdict = check_improvement(&record(100, 100), &[]);
        assert_eq!(
            verdict,
            Improvement {
                speed_improved: false,
                accuracy_improved: false,
                is_first_attempt: true,
            }
        );
    }

    #[test]
    fn test_improvement_compares_previous_only() {
        let prior = vec![record(90, 99), record(40, 80)];
        let verdict = check_improvement(&record(50, 80), &prior);

        assert!(verdict.speed_improved);
        assert!(!verdict.accuracy_improved);
        assert!(!verdict.is_first_attempt);
    }

    #[test]
    fn test_clear() {
        let history = HistoryStore::new(MemoryStore::new());
        history.append(record(10, 50));
        history.clear().unwrap();
        assert!(history.get_all().is_empty());
    }

    #[test]
    fn test_summary() {
        let summary = summarize(&[record(40, 90), record(60, 100)]).unwrap();
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.mean_wpm, 50.0);
        assert_eq!(summary.best_wpm, 60);
        assert_eq!(summary.mean_accuracy, 95.0);
        assert_eq!(summary.wpm_std_dev, 10.0);
    }

    #[test]
    fn test_wpm_deltas() {
        let deltas = wpm_deltas(&[record(40, 90), record(55, 90), record(50, 90)]);
        assert_eq!(deltas, vec![15, -5]);
        assert!(wpm_deltas(&[record(1, 1)]).is_empty());
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let history = HistoryStore::new(MemoryStore::new());
        history.append(record(42, 96));

        let written = history.export_csv(&path).unwrap();

        assert_eq!(written, 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "timestamp,wpm,accuracy\n2024-03-01T12:00:00+00:00,42,96\n"
        );
    }
}
