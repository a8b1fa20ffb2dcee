use chrono::{TimeZone, Utc};
use keypace::history::{check_improvement, HistoryStore, ResultRecord, DEFAULT_HISTORY_KEY};
use keypace::store::{KeyValueStore, SqliteStore};
use tempfile::tempdir;

fn record(wpm: u32, accuracy: u32, minute: u32) -> ResultRecord {
    ResultRecord {
        words_per_minute: wpm,
        accuracy_percent: accuracy,
        timestamp: Utc.with_ymd_and_hms(2024, 5, 4, 9, minute, 0).unwrap(),
    }
}

#[test]
fn appended_record_reads_back_equal_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");
    let original = record(58, 94, 0);

    {
        let history = HistoryStore::new(SqliteStore::open(&path).unwrap());
        assert!(history.append(original.clone()).persisted);
    }

    let reopened = HistoryStore::new(SqliteStore::open(&path).unwrap());
    assert_eq!(reopened.get_all(), vec![original]);
}

#[test]
fn empty_history_means_first_attempt() {
    let dir = tempdir().unwrap();
    let history = HistoryStore::new(SqliteStore::open(dir.path().join("h.db")).unwrap());

    let results = history.get_all();
    assert!(results.is_empty());
    assert!(check_improvement(&record(40, 90, 1), &results).is_first_attempt);
}

#[test]
fn history_is_append_only_in_order() {
    let history = HistoryStore::new(SqliteStore::open_in_memory().unwrap());
    let records: Vec<ResultRecord> = (0..5).map(|i| record(30 + i, 90, i)).collect();

    for r in &records {
        history.append(r.clone());
    }

    assert_eq!(history.get_all(), records);
    assert_eq!(history.latest(), records.last().cloned());
}

#[test]
fn payload_is_a_json_array_under_one_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");
    SqliteStore::open(&path)
        .unwrap()
        .set("unrelated", "keep me")
        .unwrap();

    let history = HistoryStore::new(SqliteStore::open(&path).unwrap());
    history.append(record(61, 97, 2));

    let raw_store = SqliteStore::open(&path).unwrap();
    let raw = raw_store.get(DEFAULT_HISTORY_KEY).unwrap().unwrap();
    assert_eq!(
        raw,
        r#"[{"wordsPerMinute":61,"accuracyPercent":97,"timestamp":"2024-05-04T09:02:00Z"}]"#
    );
    assert_eq!(raw_store.get("unrelated").unwrap().as_deref(), Some("keep me"));
    assert_eq!(DEFAULT_HISTORY_KEY, "typing_history");
}

#[test]
fn corrupt_payload_on_disk_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");
    SqliteStore::open(&path)
        .unwrap()
        .set(DEFAULT_HISTORY_KEY, "[{\"wordsPerMinute\": \"fast\"}]")
        .unwrap();

    let history = HistoryStore::new(SqliteStore::open(&path).unwrap());
    assert!(history.get_all().is_empty());
    assert!(history.latest().is_none());
}
