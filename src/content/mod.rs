//! Content provider client — surah lists, surah ayah listings and per-ayah
//! detail in three editions.
//!
//! [`ContentClient`] is the only component that performs network I/O. Every
//! call goes through [`transport::HttpTransport`], which owns the timeout
//! and retry policy; nothing here retries on its own. All provider wire types
//! are private to this module.
//!
//! Failures are reported as [`ContentError`]: `Unavailable` (timeouts,
//! 5xx, retries exhausted), `NotFound` (the provider rejected the address) or
//! `PartialData` (the multilingual aggregate could not be assembled).

pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ContentConfig, EditionsConfig};
use crate::error::AppError;
use transport::{HttpReply, HttpTransport, RetryPolicy, TransportFailure};

// ── Data model ───────────────────────────────────────────────────────────────

/// A surah as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: u32,
    pub display_name: String,
    pub verse_count: u32,
}

/// A surah's name and its ayah numbers in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterVerses {
    pub chapter: u32,
    pub display_name: String,
    pub verses: Vec<u32>,
}

/// One ayah in every supported rendering, plus its recitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseDetail {
    pub chapter: u32,
    pub verse: u32,
    pub arabic: String,
    pub russian: String,
    pub english: String,
    pub audio_url: String,
}

/// The renderings fetched for every ayah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edition {
    Arabic,
    Russian,
    English,
}

impl Edition {
    pub const ALL: [Edition; 3] = [Edition::Arabic, Edition::Russian, Edition::English];

    fn code(self, editions: &EditionsConfig) -> &str {
        match self {
            Edition::Arabic => &editions.arabic,
            Edition::Russian => &editions.russian,
            Edition::English => &editions.english,
        }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Edition::Arabic => "arabic",
            Edition::Russian => "russian",
            Edition::English => "english",
        })
    }
}

// ── Error ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("content provider unavailable: {reason} (after {retries} retries)")]
    Unavailable { reason: String, retries: u32 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("incomplete ayah data: {0}")]
    PartialData(String),
}

impl From<TransportFailure> for ContentError {
    fn from(f: TransportFailure) -> Self {
        ContentError::Unavailable { reason: f.reason, retries: f.retries }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Client for the scripture content API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ContentClient {
    transport: HttpTransport,
    base_url: String,
    chapter_edition: String,
    editions: EditionsConfig,
}

impl ContentClient {
    pub fn new(config: &ContentConfig) -> Result<Self, AppError> {
        let transport = HttpTransport::new(config.timeout, RetryPolicy::from_config(config))
            .map_err(|e| AppError::Content(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chapter_edition: config.chapter_edition.clone(),
            editions: config.editions.clone(),
        })
    }

    /// All surahs in the provider's order.
    ///
    /// Any failure, including a 4xx, is `Unavailable`: the list always exists.
    pub async fn list_chapters(&self) -> Result<Vec<Chapter>, ContentError> {
        let url = format!("{}/surah", self.base_url);
        let reply = self.transport.get(&url).await?;
        if !reply.status.is_success() {
            return Err(ContentError::Unavailable {
                reason: format!("HTTP {}", reply.status),
                retries: reply.retries,
            });
        }
        let data: Vec<WireChapter> = parse_ok(&reply).map_err(|reason| {
            ContentError::Unavailable { reason, retries: reply.retries }
        })?;
        debug!(count = data.len(), "surah list fetched");
        Ok(data
            .into_iter()
            .map(|c| Chapter { id: c.number, display_name: c.english_name, verse_count: c.number_of_ayahs })
            .collect())
    }

    /// A surah's name and ordered ayah numbers.
    pub async fn chapter_verses(&self, chapter: u32) -> Result<ChapterVerses, ContentError> {
        let url = format!("{}/surah/{chapter}/{}", self.base_url, self.chapter_edition);
        let reply = self.transport.get(&url).await?;
        check_status(&reply, || format!("surah {chapter}"))?;
        let data: WireSurah = parse_ok(&reply).map_err(|reason| {
            ContentError::Unavailable { reason, retries: reply.retries }
        })?;
        Ok(ChapterVerses {
            chapter: data.number,
            display_name: data.english_name,
            verses: data.ayahs.into_iter().map(|a| a.number_in_surah).collect(),
        })
    }

    /// Number of ayahs in `chapter`.
    pub async fn verse_count(&self, chapter: u32) -> Result<u32, ContentError> {
        let verses = self.chapter_verses(chapter).await?;
        Ok(verses.verses.len() as u32)
    }

    /// Arabic text, both translations and the recitation URL of one ayah.
    ///
    /// The three editions are fetched concurrently. The result is all or
    /// nothing: a single missing or malformed edition yields `PartialData`,
    /// never a detail with a blank field. When every edition fails the same
    /// way, that failure is returned as-is.
    pub async fn verse_detail(&self, chapter: u32, verse: u32) -> Result<VerseDetail, ContentError> {
        let (arabic, russian, english) = tokio::join!(
            self.fetch_edition(chapter, verse, Edition::Arabic),
            self.fetch_edition(chapter, verse, Edition::Russian),
            self.fetch_edition(chapter, verse, Edition::English),
        );

        match (arabic, russian, english) {
            (Ok(ar), Ok(ru), Ok(en)) => {
                let audio_url = ar.audio.filter(|a| !a.trim().is_empty()).ok_or_else(|| {
                    ContentError::PartialData(format!("no audio for {chapter}:{verse}"))
                })?;
                Ok(VerseDetail {
                    chapter,
                    verse,
                    arabic: ar.text,
                    russian: ru.text,
                    english: en.text,
                    audio_url,
                })
            }
            (ar, ru, en) => Err(aggregate_failure(chapter, verse, [ar.err(), ru.err(), en.err()])),
        }
    }

    async fn fetch_edition(&self, chapter: u32, verse: u32, edition: Edition) -> Result<WireAyah, ContentError> {
        let url = format!(
            "{}/ayah/{chapter}:{verse}/{}",
            self.base_url,
            edition.code(&self.editions)
        );
        let reply = self.transport.get(&url).await?;
        check_status(&reply, || format!("ayah {chapter}:{verse} ({edition})"))?;
        let ayah: WireAyah = parse_ok(&reply).map_err(|reason| {
            warn!(chapter, verse, %edition, %reason, "malformed ayah payload");
            ContentError::PartialData(format!("{edition}: {reason}"))
        })?;
        if ayah.text.trim().is_empty() {
            return Err(ContentError::PartialData(format!("{edition}: empty text")));
        }
        Ok(ayah)
    }
}

fn aggregate_failure(chapter: u32, verse: u32, errors: [Option<ContentError>; 3]) -> ContentError {
    let mut failed: Vec<(Edition, ContentError)> = Edition::ALL
        .into_iter()
        .zip(errors)
        .filter_map(|(edition, e)| e.map(|e| (edition, e)))
        .collect();

    if failed.len() == Edition::ALL.len() {
        let all_not_found = failed.iter().all(|(_, e)| matches!(e, ContentError::NotFound(_)));
        let all_unavailable = failed.iter().all(|(_, e)| matches!(e, ContentError::Unavailable { .. }));
        if all_not_found {
            return ContentError::NotFound(format!("ayah {chapter}:{verse}"));
        }
        if all_unavailable {
            return failed.swap_remove(0).1;
        }
    }

    let editions = failed.iter().map(|(e, _)| e.to_string()).collect::<Vec<_>>().join(", ");
    warn!(chapter, verse, %editions, "ayah editions failed");
    ContentError::PartialData(format!("ayah {chapter}:{verse} missing {editions}"))
}

/// 400 and 404 mean the provider rejected the address. Every other failure,
/// including 403 and 429, says nothing about the address and is an outage.
fn check_status(reply: &HttpReply, what: impl FnOnce() -> String) -> Result<(), ContentError> {
    let status = reply.status;
    if status.is_success() {
        Ok(())
    } else if matches!(status, StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND) {
        Err(ContentError::NotFound(what()))
    } else {
        Err(ContentError::Unavailable {
            reason: format!("HTTP {status}"),
            retries: reply.retries,
        })
    }
}

fn parse_ok<T: DeserializeOwned>(reply: &HttpReply) -> Result<T, String> {
    let envelope: Envelope<T> = serde_json::from_str(&reply.body)
        .map_err(|e| format!("failed to parse response body: {e}"))?;
    if envelope.status != "OK" {
        return Err(format!("provider status '{}'", envelope.status));
    }
    if envelope.code.is_some_and(|c| c != StatusCode::OK.as_u16()) {
        return Err(format!("provider code {:?}", envelope.code));
    }
    Ok(envelope.data)
}

// ── Private wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: Option<u16>,
    status: String,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChapter {
    number: u32,
    english_name: String,
    number_of_ayahs: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSurah {
    number: u32,
    english_name: String,
    ayahs: Vec<WireAyahRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAyahRef {
    number_in_surah: u32,
}

#[derive(Debug, Deserialize)]
struct WireAyah {
    text: String,
    #[serde(default)]
    audio: Option<String>,
}
