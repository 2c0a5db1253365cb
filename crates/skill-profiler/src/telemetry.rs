//! Centralised tracing initialisation for hosts embedding the profiler.
//!
//! Call [`init_tracing`] (or [`init_tracing_from_env`]) once at program
//! start to configure the global subscriber with an `EnvFilter` and optional
//! JSON formatting. The library never installs a subscriber by itself.
//!
//! Safe to call more than once. Later calls are ignored (the global
//! subscriber can only be set once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "SKILLPROF_LOG";
/// `json` selects JSON output; anything else is plain text.
pub const LOG_FORMAT_ENV: &str = "SKILLPROF_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Plain
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Initialise the global tracing subscriber.
///
/// * `format` - plain text or newline-delimited JSON
/// * `level` - verbosity when neither `SKILLPROF_LOG` nor `RUST_LOG` is set
pub fn init_tracing(format: LogFormat, level: Level) {
    let filter = env_filter(level);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).json())
                .try_init()
                .ok();
        }
        LogFormat::Plain => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .try_init()
                .ok();
        }
    }
}

/// [`init_tracing`] with the format taken from `SKILLPROF_LOG_FORMAT`.
pub fn init_tracing_from_env(level: Level) {
    init_tracing(LogFormat::from_env(), level);
}
