//! Log setup for the binaries.
//!
//! Logs go to stderr so they never mix with a report on stdout.
//! `RUST_LOG` overrides the level chosen on the command line.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `--loglevel` values, least verbose first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Critical,
    Error,
    #[value(alias = "warn")]
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Level selected by `--verbose N`: 1 info, 2 debug, 3 and above trace.
    pub fn from_verbosity(verbose: u8) -> Option<Self> {
        match verbose {
            0 => None,
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }

    /// The more verbose of `self` and the `--verbose` level.
    pub fn raised_by(self, verbose: u8) -> Self {
        Self::from_verbosity(verbose).map_or(self, |level| self.max(level))
    }

    /// `EnvFilter` directive. There is no level above error, so critical
    /// shares it.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .try_init();
}
