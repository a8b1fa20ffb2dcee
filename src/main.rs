use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keypace::{
    config::{Config, ConfigStore, FileConfigStore},
    history::{summarize, HistoryStore},
    logging::init_tracing,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    store::{KeyValueStore, MemoryStore, SqliteStore},
    text_source::{
        Cached, Prompt, RandomWords, RemoteText, Sentences, TextProvider, TextSourceKind,
        FALLBACK_PHRASE,
    },
    trainer::{Flow, Trainer},
    TICK_RATE_MS,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::warn;

/// typing speed trainer with countdown, live metrics and result history
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// number of seconds to run the test
    #[clap(short = 's', long)]
    seconds: Option<u32>,

    /// number of words to draw for the test
    #[clap(short = 'w', long)]
    words: Option<usize>,

    /// custom prompt to use
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// where session text comes from
    #[clap(long, value_enum)]
    source: Option<TextSourceKind>,

    /// URL for the remote text source
    #[clap(long)]
    url: Option<String>,

    /// print result history and exit
    #[clap(long)]
    history: bool,

    /// write result history as CSV and exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// delete all stored results and exit
    #[clap(long)]
    clear_history: bool,
}

impl Cli {
    /// Fold command-line overrides into the stored config.
    /// Returns true if anything changed.
    fn apply(&self, cfg: &mut Config) -> bool {
        let before = cfg.clone();
        if let Some(secs) = self.seconds {
            cfg.duration_secs = secs;
        }
        if let Some(words) = self.words {
            cfg.number_of_words = words;
        }
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(url) = &self.url {
            cfg.remote_url = Some(url.clone());
        }
        *cfg != before
    }
}

fn build_provider(cli: &Cli, cfg: &Config) -> TextProvider {
    if let Some(prompt) = &cli.prompt {
        return TextProvider::new(Prompt(prompt.clone()));
    }

    match (cfg.source, &cfg.remote_url) {
        (TextSourceKind::Remote, Some(url)) => TextProvider::new(Cached::new(RemoteText::new(
            url.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        ))),
        (TextSourceKind::Sentences, _) => {
            TextProvider::new(Sentences::new((cfg.number_of_words / 8).max(1)))
        }
        (kind, _) => {
            if kind == TextSourceKind::Remote {
                warn!("remote source selected without a URL, using word list");
            }
            match RandomWords::english(cfg.number_of_words) {
                Some(words) => TextProvider::new(words),
                None => TextProvider::new(Prompt(FALLBACK_PHRASE.to_string())),
            }
        }
    }
}

fn open_history(cfg: &Config) -> HistoryStore<Box<dyn KeyValueStore>> {
    let store: Box<dyn KeyValueStore> = match SqliteStore::open_default() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "history database unavailable, results will not be kept");
            Box::new(MemoryStore::new())
        }
    };
    HistoryStore::with_key(store, cfg.history_key.clone())
}

fn print_history<S: KeyValueStore>(history: &HistoryStore<S>) {
    let records = history.get_all();
    if records.is_empty() {
        println!("no results yet");
        return;
    }

    println!("{:>4}  {:<20} {:>5} {:>5}", "#", "date", "wpm", "acc");
    for (i, r) in records.iter().enumerate() {
        println!(
            "{:>4}  {:<20} {:>5} {:>4}%",
            i + 1,
            r.timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            r.words_per_minute,
            r.accuracy_percent
        );
    }
    if let Some(s) = summarize(&records) {
        println!(
            "\n{} attempts, avg {:.1} wpm (best {}), avg {:.1}% accuracy",
            s.attempts, s.mean_wpm, s.best_wpm, s.mean_accuracy
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if cli.apply(&mut config) {
        if let Err(e) = config_store.save(&config) {
            warn!(error = %e, "failed to save config");
        }
    }

    let history = open_history(&config);

    if cli.clear_history {
        history.clear()?;
        println!("history cleared");
        return Ok(());
    }
    if let Some(path) = &cli.export_csv {
        let written = history.export_csv(path)?;
        println!("wrote {written} results to {}", path.display());
        return Ok(());
    }
    if cli.history {
        print_history(&history);
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut trainer = Trainer::new(build_provider(&cli, &config), history, config.duration_secs);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, &mut trainer);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    trainer: &mut Trainer<S>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| f.render_widget(&*trainer, f.area()))?;

    loop {
        let redraw = match runner.step() {
            AppEvent::Key(key) => {
                if trainer.on_key(key) == Flow::Quit {
                    break;
                }
                // count seconds from the first keystroke
                if trainer.take_started() {
                    runner.realign();
                }
                true
            }
            AppEvent::Second => {
                trainer.on_second();
                true
            }
            AppEvent::Resize => true,
            AppEvent::Tick => false,
        };

        if redraw {
            terminal.draw(|f| f.render_widget(&*trainer, f.area()))?;
        }
    }

    Ok(())
}
