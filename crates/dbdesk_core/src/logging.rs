//! Tracing setup for processes embedding the database backend.
//!
//! Statement execution, pool events and connector fallbacks are logged
//! through `tracing`. A host installs the subscriber once with
//! [`init_logging`]; the filter comes from the config, then `DBDESK_LOG`,
//! then `RUST_LOG`.

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "DBDESK_LOG";

/// Prefix of the daily statement log files (`dbdesk.YYYY-MM-DD.log`).
const FILE_PREFIX: &str = "dbdesk";

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Standard error only, colored when it is a terminal.
    Console,
    /// A daily file in the log directory, with warnings echoed to stderr.
    File,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// Directory for daily log files when `output` is [`LogOutput::File`]
    pub log_dir: PathBuf,
    /// Filter directives overriding the environment
    pub filter: Option<String>,
    /// Highest level echoed to stderr while logging to a file
    pub echo_level: Level,
}

impl LogConfig {
    /// Console output when attached to a terminal, file output otherwise
    /// (a backend running under a service manager).
    pub fn detect(log_dir: PathBuf) -> Self {
        let output = if atty::is(atty::Stream::Stderr) {
            LogOutput::Console
        } else {
            LogOutput::File
        };
        Self::with_output(output, log_dir)
    }

    pub fn console() -> Self {
        Self::with_output(LogOutput::Console, log_dir())
    }

    pub fn file(log_dir: impl Into<PathBuf>) -> Self {
        Self::with_output(LogOutput::File, log_dir.into())
    }

    fn with_output(output: LogOutput, log_dir: PathBuf) -> Self {
        Self {
            output,
            log_dir,
            filter: None,
            echo_level: Level::WARN,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_echo_level(mut self, level: Level) -> Self {
        self.echo_level = level;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::detect(log_dir())
    }
}

/// Keeps the file writer alive. Dropping it flushes buffered lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    file_writer: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Whether log lines are also written to a rolling file.
    pub fn has_file_output(&self) -> bool {
        self.file_writer.is_some()
    }
}

/// Install the global subscriber described by `config`.
///
/// A log directory that cannot be created degrades to console output. A
/// subscriber already installed by the host is left in place.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let filter = resolve_filter(config.filter.as_deref(), |name| std::env::var(name).ok());

    if config.output == LogOutput::File {
        match open_log_file(&config.log_dir) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let echo = std::io::stderr.with_max_level(config.echo_level);
                let installed = tracing_subscriber::fmt()
                    .with_writer(writer.and(echo))
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .try_init()
                    .is_ok();
                // The worker guard is only useful when our writer was installed
                return LoggingGuard {
                    file_writer: installed.then_some(guard),
                };
            }
            Err(e) => {
                eprintln!(
                    "dbdesk: cannot log to {}: {e}; logging to the console",
                    config.log_dir.display()
                );
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .try_init();
    LoggingGuard { file_writer: None }
}

fn open_log_file(dir: &Path) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix("log")
        .build(dir)?;
    Ok(appender)
}

/// Pick the first parsable filter from the explicit directives, `DBDESK_LOG`
/// and `RUST_LOG`, falling back to [`default_log_filter`].
fn resolve_filter(explicit: Option<&str>, env: impl Fn(&str) -> Option<String>) -> EnvFilter {
    let candidates = [
        explicit.map(str::to_string),
        env(LOG_ENV_VAR),
        env("RUST_LOG"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_log_filter()))
}

/// Default directives: statement tracing in debug builds, info otherwise.
/// Driver crates stay at warn either way.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,dbdesk_core=trace,tokio_postgres=warn,sqlx=warn"
    } else {
        "warn,dbdesk_core=info,tokio_postgres=warn,sqlx=warn"
    }
}

/// Log directory under the data directory.
pub fn log_dir() -> PathBuf {
    crate::config::default_data_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(default_log_filter()).is_ok());
        let filter = resolve_filter(None, no_env);
        assert_eq!(
            filter.to_string(),
            EnvFilter::new(default_log_filter()).to_string()
        );
    }

    #[test]
    fn test_filter_precedence() {
        let env = |name: &str| match name {
            LOG_ENV_VAR => Some("dbdesk_core=debug".to_string()),
            "RUST_LOG" => Some("error".to_string()),
            _ => None,
        };
        assert_eq!(resolve_filter(Some("warn"), env).to_string(), "warn");
        assert_eq!(resolve_filter(None, env).to_string(), "dbdesk_core=debug");

        let rust_log_only = |name: &str| (name == "RUST_LOG").then(|| "error".to_string());
        assert_eq!(resolve_filter(None, rust_log_only).to_string(), "error");
    }

    #[test]
    fn test_unparsable_filter_is_skipped() {
        let env = |name: &str| (name == LOG_ENV_VAR).then(|| "info".to_string());
        assert_eq!(resolve_filter(Some("dbdesk_core=[[["), env).to_string(), "info");
    }

    #[test]
    fn test_config_constructors() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::file(dir.path())
            .with_filter("info")
            .with_echo_level(Level::ERROR);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.log_dir, dir.path());
        assert_eq!(config.filter.as_deref(), Some("info"));
        assert_eq!(config.echo_level, Level::ERROR);

        assert_eq!(LogConfig::console().output, LogOutput::Console);
    }

    #[test]
    fn test_log_file_created_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        assert!(open_log_file(&nested).is_ok());
        assert!(nested.is_dir());
    }
}
