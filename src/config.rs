//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory (or
//! an explicit path), then applies `AYAH_LOG_LEVEL` and
//! `AYAH_CONTENT_BASE_URL` env overrides. The bot credential is never read
//! from TOML, only from `TELEGRAM_BOT_TOKEN` / `BOT_TOKEN`.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Edition codes for the three renderings fetched per ayah.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditionsConfig {
    /// Arabic text aligned with a recitation; the only edition carrying audio.
    pub arabic: String,
    pub russian: String,
    pub english: String,
}

/// Content provider connection settings.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// API root, e.g. `https://api.alquran.cloud/v1` (no trailing slash).
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base delay; doubled after every retry.
    pub backoff: Duration,
    /// HTTP statuses treated as transient.
    pub retry_statuses: Vec<u16>,
    /// Edition used when listing a surah's ayahs.
    pub chapter_edition: String,
    pub editions: EditionsConfig,
}

/// Per-chat session housekeeping.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions untouched for this long are forgotten.
    pub idle_timeout: Duration,
}

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    /// Pause before restarting the dispatcher after it exits unexpectedly.
    pub restart_delay: Duration,
}

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub telegram: TelegramConfig,
    pub pty: PtyConfig,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Append logs here instead of stderr (already expanded, no `~`).
    pub log_file: Option<PathBuf>,
    pub content: ContentConfig,
    pub session: SessionConfig,
    pub comms: CommsConfig,
    /// From `TELEGRAM_BOT_TOKEN` or `BOT_TOKEN`; `None` disables Telegram.
    pub bot_token: Option<String>,
}

impl Config {
    /// Returns `true` if the Telegram channel should be loaded.
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled && self.bot_token.is_some()
    }

    /// Returns `true` if the console channel should be loaded.
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }
}

// ── Raw TOML shape ───────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    content: RawContent,
    #[serde(default)]
    session: RawSession,
    #[serde(default)]
    comms: RawComms,
}

#[derive(Deserialize)]
struct RawBot {
    #[serde(default = "default_bot_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { name: default_bot_name(), log_level: default_log_level(), log_file: None }
    }
}

#[derive(Deserialize)]
struct RawContent {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_backoff_millis")]
    backoff_millis: u64,
    #[serde(default = "default_retry_statuses")]
    retry_statuses: Vec<u16>,
    #[serde(default = "default_chapter_edition")]
    chapter_edition: String,
    #[serde(default)]
    editions: RawEditions,
}

impl Default for RawContent {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_millis: default_backoff_millis(),
            retry_statuses: default_retry_statuses(),
            chapter_edition: default_chapter_edition(),
            editions: RawEditions::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawEditions {
    #[serde(default = "default_arabic_edition")]
    arabic: String,
    #[serde(default = "default_russian_edition")]
    russian: String,
    #[serde(default = "default_english_edition")]
    english: String,
}

impl Default for RawEditions {
    fn default() -> Self {
        Self {
            arabic: default_arabic_edition(),
            russian: default_russian_edition(),
            english: default_english_edition(),
        }
    }
}

#[derive(Deserialize)]
struct RawSession {
    #[serde(default = "default_idle_minutes")]
    idle_minutes: u64,
}

impl Default for RawSession {
    fn default() -> Self {
        Self { idle_minutes: default_idle_minutes() }
    }
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    telegram: RawTelegram,
    #[serde(default)]
    pty: RawPty,
}

#[derive(Deserialize)]
struct RawTelegram {
    /// Defaults to `true`; still needs a token to actually start.
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_restart_delay_seconds")]
    restart_delay_seconds: u64,
}

impl Default for RawTelegram {
    fn default() -> Self {
        Self { enabled: true, restart_delay_seconds: default_restart_delay_seconds() }
    }
}

#[derive(Deserialize, Default)]
struct RawPty {
    #[serde(default)]
    enabled: bool,
}

fn default_bot_name() -> String { "ayah-bot".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_base_url() -> String { "https://api.alquran.cloud/v1".to_string() }
fn default_timeout_seconds() -> u64 { 10 }
fn default_max_retries() -> u32 { 3 }
fn default_backoff_millis() -> u64 { 300 }
fn default_retry_statuses() -> Vec<u16> { vec![500, 502, 504] }
fn default_chapter_edition() -> String { "en.asad".to_string() }
fn default_arabic_edition() -> String { "ar.alafasy".to_string() }
fn default_russian_edition() -> String { "ru.kuliev".to_string() }
fn default_english_edition() -> String { "en.asad".to_string() }
fn default_idle_minutes() -> u64 { 24 * 60 }
fn default_restart_delay_seconds() -> u64 { 5 }
fn default_true() -> bool { true }

// ── Loading ──────────────────────────────────────────────────────────────────

/// Explicit overrides, normally sourced from the environment.
/// Tests pass them directly instead of mutating env vars.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub base_url: Option<String>,
    pub bot_token: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("AYAH_LOG_LEVEL").ok(),
            base_url: env::var("AYAH_CONTENT_BASE_URL").ok(),
            bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .or_else(|_| env::var("BOT_TOKEN"))
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Load config from `path` (or `config/default.toml`), then apply env overrides.
///
/// A missing default file is not an error: every field has a default. A
/// missing explicitly-requested file is.
pub fn load(path: Option<&Path>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();
    match path {
        Some(p) => load_from(p, overrides),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_from(default, overrides)
            } else {
                resolve(RawConfig::default(), overrides)
            }
        }
    }
}

/// Load from an explicit path with explicit overrides.
pub fn load_from(path: &Path, overrides: Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;
    resolve(parsed, overrides)
}

fn resolve(parsed: RawConfig, overrides: Overrides) -> Result<Config, AppError> {
    let c = parsed.content;

    let base_url = overrides.base_url.unwrap_or(c.base_url);
    let base_url = base_url.trim_end_matches('/').to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(AppError::Config(format!("content.base_url must be http(s): '{base_url}'")));
    }
    if c.timeout_seconds == 0 {
        return Err(AppError::Config("content.timeout_seconds must be > 0".into()));
    }

    if parsed.session.idle_minutes == 0 {
        return Err(AppError::Config("session.idle_minutes must be > 0".into()));
    }

    let log_level = overrides.log_level.unwrap_or(parsed.bot.log_level);
    logger::directive(&log_level).map_err(|e| AppError::Config(format!("bot.log_level: {e}")))?;

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level,
        log_file: parsed.bot.log_file.as_deref().map(expand_home),
        content: ContentConfig {
            base_url,
            timeout: Duration::from_secs(c.timeout_seconds),
            max_retries: c.max_retries,
            backoff: Duration::from_millis(c.backoff_millis),
            retry_statuses: c.retry_statuses,
            chapter_edition: c.chapter_edition,
            editions: EditionsConfig {
                arabic: c.editions.arabic,
                russian: c.editions.russian,
                english: c.editions.english,
            },
        },
        session: SessionConfig {
            idle_timeout: Duration::from_secs(parsed.session.idle_minutes.saturating_mul(60)),
        },
        comms: CommsConfig {
            telegram: TelegramConfig {
                enabled: parsed.comms.telegram.enabled,
                restart_delay: Duration::from_secs(parsed.comms.telegram.restart_delay_seconds),
            },
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
        },
        bot_token: overrides.bot_token,
    })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

impl ContentConfig {
    /// Settings pointing at `base_url` with short backoff, for tests against a
    /// local server.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(default_timeout_seconds()),
            max_retries: default_max_retries(),
            backoff: Duration::from_millis(1),
            retry_statuses: default_retry_statuses(),
            chapter_edition: default_chapter_edition(),
            editions: EditionsConfig {
                arabic: default_arabic_edition(),
                russian: default_russian_edition(),
                english: default_english_edition(),
            },
        }
    }
}
