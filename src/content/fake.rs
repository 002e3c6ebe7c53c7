//! In-process stand-in for the content API, served by axum on a loopback port.
//!
//! Knows four surahs (1, 2, 112, 114) and answers the same envelope shape as
//! the real provider. A [`Script`] forces statuses, delays or malformed
//! bodies; hit counters let tests observe retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

const CATALOGUE: &[(u32, &str, u32)] = &[
    (1, "Al-Faatiha", 7),
    (2, "Al-Baqara", 286),
    (112, "Al-Ikhlaas", 4),
    (114, "An-Naas", 6),
];

#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Status forced on every `/surah` request.
    pub list_status: Option<u16>,
    /// Delay before answering `/surah`.
    pub list_delay: Option<Duration>,
    /// Status forced on every `/surah/{n}/{edition}` request.
    pub surah_status: Option<u16>,
    /// Status forced on `/ayah` requests for an edition code.
    pub edition_status: Vec<(String, u16)>,
    /// Edition whose `/ayah` bodies carry `"status": "ERROR"`.
    pub malformed_edition: Option<String>,
}

#[derive(Default)]
struct Hits {
    list: AtomicUsize,
    surah: AtomicUsize,
    ayah: AtomicUsize,
}

struct Shared {
    script: Script,
    hits: Hits,
}

pub struct FakeProvider {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl FakeProvider {
    pub async fn start(script: Script) -> Self {
        let shared = Arc::new(Shared { script, hits: Hits::default() });
        let app = Router::new()
            .route("/surah", get(list_surahs))
            .route("/surah/{number}/{edition}", get(surah))
            .route("/ayah/{address}/{edition}", get(ayah))
            .with_state(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { base_url: format!("http://{addr}"), shared }
    }

    pub fn list_hits(&self) -> usize {
        self.shared.hits.list.load(Ordering::SeqCst)
    }

    pub fn surah_hits(&self) -> usize {
        self.shared.hits.surah.load(Ordering::SeqCst)
    }

    pub fn ayah_hits(&self) -> usize {
        self.shared.hits.ayah.load(Ordering::SeqCst)
    }
}

fn verse_count(number: u32) -> Option<(&'static str, u32)> {
    CATALOGUE.iter().find(|(n, _, _)| *n == number).map(|(_, name, count)| (*name, *count))
}

fn envelope(data: Value) -> Response {
    Json(json!({ "code": 200, "status": "OK", "data": data })).into_response()
}

fn failure(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({ "code": status.as_u16(), "status": status.canonical_reason(), "data": "scripted failure" });
    (status, Json(body)).into_response()
}

async fn list_surahs(State(shared): State<Arc<Shared>>) -> Response {
    shared.hits.list.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = shared.script.list_delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = shared.script.list_status {
        return failure(status);
    }
    let data: Vec<Value> = CATALOGUE
        .iter()
        .map(|(n, name, count)| json!({ "number": n, "englishName": name, "numberOfAyahs": count }))
        .collect();
    envelope(Value::Array(data))
}

async fn surah(State(shared): State<Arc<Shared>>, Path((number, _edition)): Path<(u32, String)>) -> Response {
    shared.hits.surah.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = shared.script.surah_status {
        return failure(status);
    }
    let Some((name, count)) = verse_count(number) else {
        return failure(404);
    };
    let ayahs: Vec<Value> = (1..=count).map(|v| json!({ "numberInSurah": v, "text": "…" })).collect();
    envelope(json!({ "number": number, "englishName": name, "numberOfAyahs": count, "ayahs": ayahs }))
}

async fn ayah(State(shared): State<Arc<Shared>>, Path((address, edition)): Path<(String, String)>) -> Response {
    shared.hits.ayah.fetch_add(1, Ordering::SeqCst);
    if let Some((_, status)) = shared.script.edition_status.iter().find(|(e, _)| *e == edition) {
        return failure(*status);
    }
    if shared.script.malformed_edition.as_deref() == Some(edition.as_str()) {
        return Json(json!({ "code": 200, "status": "ERROR", "data": {} })).into_response();
    }
    let parsed = address
        .split_once(':')
        .and_then(|(c, v)| Some((c.parse::<u32>().ok()?, v.parse::<u32>().ok()?)));
    let Some((chapter, verse)) = parsed else {
        return failure(400);
    };
    match verse_count(chapter) {
        Some((_, count)) if verse >= 1 && verse <= count => {}
        _ => return failure(404),
    }
    let mut data = json!({
        "numberInSurah": verse,
        "text": format!("{edition} text {chapter}:{verse}"),
        "surah": { "number": chapter },
    });
    if edition.starts_with("ar.") {
        data["audio"] = json!(format!("https://cdn.example.org/audio/{edition}/{chapter}_{verse}.mp3"));
    }
    envelope(data)
}
