//! Rolling file logs for the `kinship` binary.
//!
//! # Responsibility
//! - Start the `flexi_logger` backend from a [`KinshipConfig`] once per process.
//! - Route panics through the log so an aborted import leaves a trace.
//!
//! # Invariants
//! - Events are `key=value` lines carrying entity types, ids, counts and
//!   `duration_ms`, never record contents.
//! - A second start with the same directory and level is a no-op; any other
//!   second start is rejected. Starting never panics.
//!
//! # See also
//! - `config` for where the level and directory come from.

use crate::config::KinshipConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "kinship";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE_LOG: OnceCell<ActiveLog> = OnceCell::new();

struct ActiveLog {
    level: &'static str,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

/// Starts file logging when `config.log_dir` is set.
///
/// Returns `Ok(false)` when file logging is off and `Ok(true)` once logs are
/// being written.
///
/// # Errors
/// - The log directory cannot be created or the backend fails to start.
/// - Logging is already active with another directory or level.
pub fn init_logging(config: &KinshipConfig) -> Result<bool, String> {
    let Some(log_dir) = config.log_dir.as_deref() else {
        return Ok(false);
    };
    let active = ACTIVE_LOG.get_or_try_init(|| start(config.log_level, log_dir))?;
    if active.log_dir != log_dir || active.level != config.log_level {
        return Err(format!(
            "logging already active with level `{}` at `{}`; refusing `{}` at `{}`",
            active.level,
            active.log_dir.display(),
            config.log_level,
            log_dir.display()
        ));
    }
    Ok(true)
}

fn start(level: &'static str, log_dir: &Path) -> Result<ActiveLog, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={}",
        level,
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLog {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

/// Payloads may quote archive text; keep them on one bounded line.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut line = flattened.chars().take(max_chars).collect::<String>();
    if flattened.chars().count() > max_chars {
        line.push_str("...");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{init_logging, single_line};
    use crate::config::KinshipConfig;

    #[test]
    fn single_line_flattens_and_truncates() {
        let line = single_line("<name>\n<first>Anna</first>\r</name>", 12);
        assert_eq!(line, "<name> <firs...");
        assert_eq!(single_line("Smith", 12), "Smith");
    }

    #[test]
    fn init_is_off_without_log_dir_and_rejects_conflicts() {
        assert!(!init_logging(&KinshipConfig::default()).unwrap());

        // The logger outlives the test, so its directory is not a tempdir guard.
        let dir = std::env::temp_dir().join(format!("kinship-logging-{}", std::process::id()));
        let config = KinshipConfig {
            log_level: "info",
            log_dir: Some(dir.join("logs")),
            ..KinshipConfig::default()
        };
        assert!(init_logging(&config).unwrap());
        assert!(init_logging(&config).unwrap());
        assert!(dir.join("logs").is_dir());

        let louder = KinshipConfig {
            log_level: "debug",
            ..config.clone()
        };
        assert!(init_logging(&louder).unwrap_err().contains("refusing"));

        let elsewhere = KinshipConfig {
            log_dir: Some(dir.join("other")),
            ..config
        };
        assert!(init_logging(&elsewhere).unwrap_err().contains("refusing"));
    }
}
