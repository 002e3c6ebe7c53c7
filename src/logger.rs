//! Log output for the bot.
//!
//! A plain level such as `debug` applies to this crate only; reqwest, hyper
//! and teloxide stay at `warn` so per-request chatter from the libraries does
//! not drown out the bot's own `chat = …` events. Anything that looks like a
//! full `EnvFilter` directive (`info,ayah_bot::content=trace`) is taken as-is.
//!
//! [`directive`] is the one place levels are validated. Config loading calls
//! it so a bad level is rejected at startup, before [`init`] runs.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Level applied to every crate other than this one for plain levels.
const DEPENDENCY_LEVEL: &str = "warn";

/// Turn a configured level into the `EnvFilter` directive to install.
pub fn directive(level: &str) -> Result<String, AppError> {
    let level = level.trim();
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }

    if level.contains([',', '=']) {
        EnvFilter::try_new(level)
            .map_err(|e| AppError::Logger(format!("invalid log directive '{level}': {e}")))?;
        return Ok(level.to_string());
    }

    let parsed = level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))?;
    if parsed == LevelFilter::OFF {
        return Ok("off".to_string());
    }
    let parsed = parsed.to_string().to_ascii_lowercase();
    Ok(format!("{DEPENDENCY_LEVEL},{}={parsed}", env!("CARGO_CRATE_NAME")))
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set and valid, takes over from `level` unless
/// `level_from_cli` is set: a `-v` flag on the command line always wins.
pub fn init(level: &str, level_from_cli: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let configured = directive(level)?;
    let from_env = if level_from_cli { None } else { EnvFilter::try_from_default_env().ok() };
    let filter = match from_env {
        Some(filter) => filter,
        None => EnvFilter::try_new(&configured)
            .map_err(|e| AppError::Logger(format!("invalid log directive '{configured}': {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer(log_file)?)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// stderr, or `log_file` opened for append.
fn writer(log_file: Option<&Path>) -> Result<BoxMakeWriter, AppError> {
    let Some(path) = log_file else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Logger(format!("failed to open log file '{}': {e}", path.display())))?;
    Ok(BoxMakeWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_targets_this_crate() {
        assert_eq!(directive("debug").unwrap(), "warn,ayah_bot=debug");
        assert_eq!(directive(" TRACE ").unwrap(), "warn,ayah_bot=trace");
    }

    #[test]
    fn off_silences_everything() {
        assert_eq!(directive("off").unwrap(), "off");
    }

    #[test]
    fn full_directive_is_kept() {
        assert_eq!(directive("info,ayah_bot::content=trace").unwrap(), "info,ayah_bot::content=trace");
    }

    #[test]
    fn bad_levels_rejected() {
        assert!(directive("loud").is_err());
        assert!(directive("").is_err());
        assert!(directive("   ").is_err());
    }

    #[test]
    fn unopenable_log_file_errors() {
        let err = init("info", true, Some(Path::new("/nonexistent-dir/ayah.log"))).unwrap_err();
        assert!(err.to_string().contains("failed to open log file"));
    }

    #[test]
    fn bad_level_fails_before_touching_the_subscriber() {
        let err = init("loud", true, None).unwrap_err();
        assert!(err.to_string().contains("unrecognised log level"));
    }
}
