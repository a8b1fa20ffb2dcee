// Library surface for the binary, headless/integration tests and reuse.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod session;
pub mod store;
pub mod text_source;
pub mod timer;
pub mod trainer;
pub mod ui;
pub mod util;

/// Redraw interval of the event loop
pub const TICK_RATE_MS: u64 = 100;
