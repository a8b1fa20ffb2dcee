use cgisf_lib::cgisf;
use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TextSourceError;
use crate::session::split_words;

pub const FALLBACK_PHRASE: &str = "the quick brown fox jumps over the lazy dog";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

static LANG_DIR: Dir = include_dir!("src/lang");

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextSourceKind {
    Words,
    Sentences,
    Remote,
}

/// Anything that can supply the words for a session
pub trait TextSource {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError>;
}

impl<T: TextSource + ?Sized> TextSource for Box<T> {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError> {
        (**self).fetch_text()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct WordList {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

impl WordList {
    /// Load an embedded list from `src/lang/<name>.json`
    pub fn embedded(name: &str) -> Option<Self> {
        let file = LANG_DIR.get_file(format!("{name}.json"))?;
        let contents = file.contents_utf8()?;
        serde_json::from_str(contents)
            .map_err(|e| warn!(error = %e, list = name, "unreadable word list"))
            .ok()
    }
}

/// Random words drawn from an embedded list
#[derive(Debug, Clone)]
pub struct RandomWords {
    list: WordList,
    count: usize,
}

impl RandomWords {
    pub fn new(list: WordList, count: usize) -> Self {
        Self { list, count }
    }

    pub fn english(count: usize) -> Option<Self> {
        WordList::embedded("english").map(|list| Self::new(list, count))
    }
}

impl TextSource for RandomWords {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError> {
        let mut rng = rand::thread_rng();
        let words: Vec<String> = (0..self.count)
            .filter_map(|_| self.list.words.choose(&mut rng).cloned())
            .collect();
        non_empty(words)
    }
}

/// Generated nonsense sentences, capitalized and punctuated
#[derive(Debug, Clone, Copy)]
pub struct Sentences {
    count: usize,
}

impl Sentences {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl TextSource for Sentences {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError> {
        let rng = &mut rand::thread_rng();
        let text = (0..self.count)
            .map(|_| {
                cgisf(
                    rng.gen_range(1..3),
                    rng.gen_range(1..3),
                    rng.gen_range(1..5),
                    rng.gen_bool(0.5),
                    rng.gen_range(1..3),
                    rng.gen_bool(0.5),
                )
            })
            .collect::<Vec<String>>()
            .join(" ");
        non_empty(split_words(&text))
    }
}

/// Fixed user-supplied text
#[derive(Debug, Clone)]
pub struct Prompt(pub String);

impl TextSource for Prompt {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError> {
        non_empty(split_words(&self.0))
    }
}

/// Text fetched over HTTP with a request timeout
#[derive(Debug, Clone)]
pub struct RemoteText {
    url: String,
    timeout: Duration,
}

impl RemoteText {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl TextSource for RemoteText {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError> {
        debug!(url = %self.url, "fetching text");
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let resp = client.get(&self.url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TextSourceError::Status(status.as_u16()));
        }

        let body = resp.text()?;
        non_empty(parse_body(&body))
    }
}

/// Accepts `{"content": ..}` / `{"text": ..}` objects, arrays of strings or
/// such objects, a bare JSON string, or plain text.
pub fn parse_body(body: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items.iter().flat_map(text_of).collect(),
        Ok(value @ (Value::Object(_) | Value::String(_))) => text_of(&value),
        _ => split_words(body),
    }
}

fn text_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => split_words(s),
        Value::Object(map) => ["content", "text", "quote"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(split_words)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn non_empty(words: Vec<String>) -> Result<Vec<String>, TextSourceError> {
    if words.is_empty() {
        Err(TextSourceError::Empty)
    } else {
        Ok(words)
    }
}

/// Remembers the last successful fetch and serves it when the inner source
/// fails.
pub struct Cached<S: TextSource> {
    inner: S,
    last: RefCell<Option<Vec<String>>>,
}

impl<S: TextSource> Cached<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last: RefCell::new(None),
        }
    }

    pub fn cached(&self) -> Option<Vec<String>> {
        self.last.borrow().clone()
    }
}

impl<S: TextSource> TextSource for Cached<S> {
    fn fetch_text(&self) -> Result<Vec<String>, TextSourceError> {
        match self.inner.fetch_text() {
            Ok(words) => {
                *self.last.borrow_mut() = Some(words.clone());
                Ok(words)
            }
            Err(e) => match self.cached() {
                Some(words) => {
                    warn!(error = %e, "text source failed, reusing cached text");
                    Ok(words)
                }
                None => Err(e),
            },
        }
    }
}

/// Front door for session text: never fails, degrades to [`FALLBACK_PHRASE`].
pub struct TextProvider {
    source: Box<dyn TextSource>,
}

impl TextProvider {
    pub fn new(source: impl TextSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    pub fn load(&self) -> Vec<String> {
        self.source.fetch_text().unwrap_or_else(|e| {
            warn!(error = %e, "text source failed, using fallback phrase");
            split_words(FALLBACK_PHRASE)
        })
    }
}
