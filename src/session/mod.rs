//! Session controller — turns one navigation intent into one reply.
//!
//! For every intent the controller takes the chat's session lock, consults
//! [`NavigationState`], calls [`ContentClient`] and builds a [`Reply`]. Every
//! lower-layer failure becomes a reply with its own [`ReplyKind`]; nothing
//! here returns an error.
//!
//! The cursor is moved only after the ayah it will point at has been fetched.
//! Out-of-range ayah numbers are rejected before fetching, using the surah's
//! ayah count.

pub mod render;
pub mod store;

pub use render::{Button, Keyboard, Reply, ReplyKind};
pub use store::{SessionKey, SessionStore};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::content::{ContentClient, ContentError};
use crate::intent::{Intent, InvalidIntent};
use crate::navigation::{Cursor, NavError, NavigationState};

/// What a `NotFound` refers to, so it can be reported precisely.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Chapter,
    Verse,
}

pub struct SessionController {
    content: ContentClient,
    sessions: SessionStore,
}

impl SessionController {
    pub fn new(content: ContentClient) -> Self {
        Self { content, sessions: SessionStore::new() }
    }

    /// Route a classified intent. `first_name` personalises the welcome.
    pub async fn handle(&self, key: &SessionKey, intent: Intent, first_name: Option<&str>) -> Reply {
        debug!(chat = %key, ?intent, "handling intent");
        match intent {
            Intent::Start => self.on_start(key, first_name).await,
            Intent::GoBack => Reply::welcome(first_name),
            Intent::Help => Reply::help(),
            Intent::BrowseChapters => self.on_list_chapters().await,
            Intent::SelectChapterById(chapter) => self.on_select_chapter(key, chapter).await,
            Intent::SelectVerseByCoordinates { chapter, verse } => {
                self.on_select_verse(key, chapter, verse).await
            }
            Intent::StepNext => self.on_step_next(key).await,
            Intent::StepPrevious => self.on_step_previous(key).await,
            Intent::Invalid(reason) => Reply::invalid(&reason),
            Intent::Unrecognized => Reply::unrecognized(),
        }
    }

    /// Every `idle / 4`, drop sessions that have been idle for `idle`.
    /// Stops when `shutdown` is cancelled.
    pub fn spawn_idle_sweep(
        self: &Arc<Self>,
        idle: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval((idle / 4).max(Duration::from_secs(1)));
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticks.tick() => {
                        let evicted = controller.sessions.evict_idle(idle).await;
                        if evicted > 0 {
                            debug!(evicted, "idle sessions dropped");
                        }
                    }
                }
            }
        })
    }

    /// Number of chats with live navigation state.
    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    /// Current position of a chat, if any.
    pub async fn cursor(&self, key: &SessionKey) -> Option<Cursor> {
        self.sessions.get(key).await.lock().await.current()
    }

    pub async fn on_start(&self, key: &SessionKey, first_name: Option<&str>) -> Reply {
        let session = self.sessions.get(key).await;
        session.lock().await.reset();
        info!(chat = %key, "session started");
        Reply::welcome(first_name)
    }

    pub async fn on_list_chapters(&self) -> Reply {
        match self.content.list_chapters().await {
            Ok(chapters) => Reply::chapter_list(&chapters),
            Err(e) => {
                warn!(error = %e, "surah list unavailable");
                Reply::chapters_unavailable()
            }
        }
    }

    pub async fn on_select_chapter(&self, key: &SessionKey, chapter: u32) -> Reply {
        let session = self.sessions.get(key).await;
        let mut nav = session.lock().await;
        match self.content.chapter_verses(chapter).await {
            Ok(verses) => {
                let cursor = nav.select_chapter(chapter);
                debug!(chat = %key, %cursor, "surah selected");
                Reply::verse_list(&verses)
            }
            Err(e) => content_failure(key, &e, Lookup::Chapter),
        }
    }

    pub async fn on_select_verse(&self, key: &SessionKey, chapter: u32, verse: u32) -> Reply {
        let session = self.sessions.get(key).await;
        let mut nav = session.lock().await;

        let count = match self.content.verse_count(chapter).await {
            Ok(count) => count,
            Err(e) => return content_failure(key, &e, Lookup::Chapter),
        };
        if verse == 0 || verse > count {
            let reason = InvalidIntent::VerseOutOfRange { chapter, verse, count };
            debug!(chat = %key, %reason, "ayah rejected");
            return Reply::invalid(&reason);
        }

        self.show(key, &mut nav, Cursor::new(chapter, verse)).await
    }

    pub async fn on_step_next(&self, key: &SessionKey) -> Reply {
        let session = self.sessions.get(key).await;
        let mut nav = session.lock().await;

        let Some(current) = nav.current() else {
            return nav_failure(key, NavError::PreconditionFailed);
        };
        let count = match self.content.verse_count(current.chapter).await {
            Ok(count) => count,
            Err(e) => return content_failure(key, &e, Lookup::Chapter),
        };
        match nav.peek_next(count) {
            Ok(target) => self.show(key, &mut nav, target).await,
            Err(e) => nav_failure(key, e),
        }
    }

    pub async fn on_step_previous(&self, key: &SessionKey) -> Reply {
        let session = self.sessions.get(key).await;
        let mut nav = session.lock().await;

        match nav.peek_previous() {
            Ok(target) => self.show(key, &mut nav, target).await,
            Err(e) => nav_failure(key, e),
        }
    }

    /// Fetch `target` and, only if that succeeds, make it the current position.
    async fn show(&self, key: &SessionKey, nav: &mut NavigationState, target: Cursor) -> Reply {
        match self.content.verse_detail(target.chapter, target.verse).await {
            Ok(detail) => {
                nav.commit(target);
                debug!(chat = %key, cursor = %target, "ayah shown");
                Reply::verse(&detail)
            }
            Err(e) => content_failure(key, &e, Lookup::Verse),
        }
    }
}

fn content_failure(key: &SessionKey, error: &ContentError, lookup: Lookup) -> Reply {
    warn!(chat = %key, %error, "content request failed");
    match (error, lookup) {
        (ContentError::NotFound(_), Lookup::Chapter) => Reply::chapter_not_found(),
        (ContentError::NotFound(_), Lookup::Verse) => Reply::verse_not_found(),
        (ContentError::Unavailable { .. }, _) => Reply::unavailable(),
        (ContentError::PartialData(_), _) => Reply::partial_data(),
    }
}

fn nav_failure(key: &SessionKey, error: NavError) -> Reply {
    debug!(chat = %key, %error, "navigation refused");
    match error {
        NavError::Boundary(boundary) => Reply::boundary(boundary),
        NavError::PreconditionFailed => Reply::no_selection(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::content::fake::{FakeProvider, Script};
    use crate::navigation::Boundary;

    async fn controller(script: Script) -> (SessionController, FakeProvider) {
        let provider = FakeProvider::start(script).await;
        let content = ContentClient::new(&ContentConfig::for_base_url(&provider.base_url)).unwrap();
        (SessionController::new(content), provider)
    }

    fn chat(id: i64) -> SessionKey {
        SessionKey::new("test", id)
    }

    #[tokio::test]
    async fn select_chapter_then_verse() {
        let (ctl, _provider) = controller(Script::default()).await;
        let key = chat(1);

        let reply = ctl.on_select_chapter(&key, 2).await;
        assert_eq!(reply.kind, ReplyKind::VerseList);
        let labels = reply.keyboard.as_ref().unwrap().labels();
        // 286 ayahs plus the back button.
        assert_eq!(labels.len(), 287);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(2, 1)));

        let reply = ctl.on_select_verse(&key, 2, 255).await;
        assert_eq!(reply.kind, ReplyKind::Verse);
        assert!(reply.text.contains("Ayah 255 of Surah 2"));
        assert!(reply.text.contains("ar.alafasy text 2:255"));
        assert!(reply.text.contains("ru.kuliev text 2:255"));
        assert!(reply.text.contains("en.asad text 2:255"));
        assert!(reply.audio_url.as_deref().is_some_and(|a| !a.is_empty()));
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(2, 255)));
    }

    #[tokio::test]
    async fn stepping_to_the_end_of_al_baqara() {
        let (ctl, _provider) = controller(Script::default()).await;
        let key = chat(1);
        ctl.on_select_verse(&key, 2, 255).await;

        for step in 1..=31 {
            let reply = ctl.on_step_next(&key).await;
            assert_eq!(reply.kind, ReplyKind::Verse, "step {step}");
        }
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(2, 286)));

        for _ in 0..2 {
            let reply = ctl.on_step_next(&key).await;
            assert_eq!(reply.kind, ReplyKind::Boundary(Boundary::AtLast));
            assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(2, 286)));
        }
    }

    #[tokio::test]
    async fn previous_at_first_verse_is_boundary_without_fetch() {
        let (ctl, provider) = controller(Script::default()).await;
        let key = chat(1);
        ctl.on_select_chapter(&key, 1).await;
        let before = provider.ayah_hits();

        for _ in 0..2 {
            let reply = ctl.on_step_previous(&key).await;
            assert_eq!(reply.kind, ReplyKind::Boundary(Boundary::AtFirst));
        }
        assert_eq!(provider.ayah_hits(), before);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(1, 1)));
    }

    #[tokio::test]
    async fn previous_moves_back() {
        let (ctl, _provider) = controller(Script::default()).await;
        let key = chat(1);
        ctl.on_select_verse(&key, 112, 3).await;
        let reply = ctl.on_step_previous(&key).await;
        assert_eq!(reply.kind, ReplyKind::Verse);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(112, 2)));
    }

    #[tokio::test]
    async fn stepping_without_selection_is_precondition_failure() {
        let (ctl, provider) = controller(Script::default()).await;
        let key = chat(1);
        assert_eq!(ctl.on_step_next(&key).await.kind, ReplyKind::NoSelection);
        assert_eq!(ctl.on_step_previous(&key).await.kind, ReplyKind::NoSelection);
        assert_eq!(provider.surah_hits(), 0);
    }

    #[tokio::test]
    async fn start_resets_cursor_and_back_keeps_it() {
        let (ctl, _provider) = controller(Script::default()).await;
        let key = chat(1);
        ctl.on_select_chapter(&key, 114).await;

        let reply = ctl.handle(&key, Intent::GoBack, Some("Yusuf")).await;
        assert_eq!(reply.kind, ReplyKind::Welcome);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(114, 1)));

        let reply = ctl.handle(&key, Intent::Start, Some("Yusuf")).await;
        assert_eq!(reply.kind, ReplyKind::Welcome);
        assert!(reply.text.contains("Yusuf"));
        assert_eq!(ctl.cursor(&key).await, None);
    }

    #[tokio::test]
    async fn list_chapters_unavailable_after_retries() {
        let (ctl, provider) = controller(Script { list_status: Some(502), ..Script::default() }).await;
        let reply = ctl.handle(&chat(1), Intent::BrowseChapters, None).await;
        assert_eq!(reply.kind, ReplyKind::ChaptersUnavailable);
        assert_eq!(provider.list_hits(), 4);
    }

    #[tokio::test]
    async fn rate_limited_surah_is_reported_as_unavailable() {
        let (ctl, _provider) = controller(Script { surah_status: Some(429), ..Script::default() }).await;
        let key = chat(1);
        let reply = ctl.on_select_chapter(&key, 2).await;
        assert_eq!(reply.kind, ReplyKind::Unavailable);
        assert_eq!(ctl.cursor(&key).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sweep_forgets_abandoned_chats() {
        // Paused clock: stay off the network so no request can time out.
        let content = ContentClient::new(&ContentConfig::for_base_url("http://127.0.0.1:1")).unwrap();
        let ctl = Arc::new(SessionController::new(content));
        ctl.handle(&chat(1), Intent::Start, None).await;
        assert_eq!(ctl.session_count().await, 1);

        let shutdown = CancellationToken::new();
        let sweep = ctl.spawn_idle_sweep(Duration::from_secs(60), shutdown.clone());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ctl.session_count().await, 0);
        assert_eq!(ctl.cursor(&chat(1)).await, None);

        shutdown.cancel();
        sweep.await.unwrap();
    }

    #[tokio::test]
    async fn list_chapters_renders_labels() {
        let (ctl, _provider) = controller(Script::default()).await;
        let reply = ctl.on_list_chapters().await;
        assert_eq!(reply.kind, ReplyKind::ChapterList);
        let labels = reply.keyboard.as_ref().unwrap().labels();
        assert_eq!(labels[0], "1. Al-Faatiha");
        assert_eq!(labels[3], "114. An-Naas");
    }

    #[tokio::test]
    async fn unknown_chapter_is_reported_and_cursor_untouched() {
        let (ctl, _provider) = controller(Script::default()).await;
        let key = chat(1);
        ctl.on_select_verse(&key, 1, 5).await;
        assert_eq!(ctl.on_select_chapter(&key, 115).await.kind, ReplyKind::ChapterNotFound);
        assert_eq!(ctl.on_select_verse(&key, 115, 1).await.kind, ReplyKind::ChapterNotFound);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(1, 5)));
    }

    #[tokio::test]
    async fn out_of_range_verse_rejected_before_detail_fetch() {
        let (ctl, provider) = controller(Script::default()).await;
        let key = chat(1);
        let reply = ctl.on_select_verse(&key, 1, 8).await;
        assert_eq!(reply.kind, ReplyKind::InvalidIntent);
        assert!(reply.text.contains("has only 7 ayahs"));
        assert_eq!(provider.ayah_hits(), 0);
        assert_eq!(ctl.cursor(&key).await, None);
    }

    #[tokio::test]
    async fn partial_data_keeps_cursor() {
        let (ctl, _provider) = controller(Script {
            edition_status: vec![("en.asad".into(), 404)],
            ..Script::default()
        })
        .await;
        let key = chat(1);
        ctl.on_select_chapter(&key, 1).await;

        assert_eq!(ctl.on_select_verse(&key, 1, 3).await.kind, ReplyKind::PartialData);
        assert_eq!(ctl.on_step_next(&key).await.kind, ReplyKind::PartialData);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(1, 1)));
    }

    #[tokio::test]
    async fn unavailable_verse_keeps_cursor() {
        let (ctl, _provider) = controller(Script {
            edition_status: vec![
                ("ar.alafasy".into(), 504),
                ("ru.kuliev".into(), 504),
                ("en.asad".into(), 504),
            ],
            ..Script::default()
        })
        .await;
        let key = chat(1);
        ctl.on_select_chapter(&key, 112).await;
        assert_eq!(ctl.on_step_next(&key).await.kind, ReplyKind::Unavailable);
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(112, 1)));
    }

    #[tokio::test]
    async fn invalid_and_unrecognized_intents() {
        let (ctl, _provider) = controller(Script::default()).await;
        let key = chat(1);
        let reply = ctl.handle(&key, Intent::Invalid(InvalidIntent::BadVerse), None).await;
        assert_eq!(reply.kind, ReplyKind::InvalidIntent);
        assert_eq!(ctl.handle(&key, Intent::Unrecognized, None).await.kind, ReplyKind::Unrecognized);
        assert_eq!(ctl.handle(&key, Intent::Help, None).await.kind, ReplyKind::Help);
    }

    #[tokio::test]
    async fn concurrent_chats_do_not_interfere() {
        let (ctl, _provider) = controller(Script::default()).await;
        let ctl = std::sync::Arc::new(ctl);
        let a = chat(100);
        let b = chat(200);

        let (ra, rb) = tokio::join!(
            {
                let ctl = ctl.clone();
                let a = a.clone();
                async move {
                    ctl.on_select_chapter(&a, 2).await;
                    ctl.on_select_verse(&a, 2, 10).await;
                    ctl.on_step_next(&a).await
                }
            },
            {
                let ctl = ctl.clone();
                let b = b.clone();
                async move {
                    ctl.on_select_chapter(&b, 114).await;
                    ctl.on_step_next(&b).await
                }
            }
        );
        assert_eq!(ra.kind, ReplyKind::Verse);
        assert_eq!(rb.kind, ReplyKind::Verse);
        assert_eq!(ctl.cursor(&a).await, Some(Cursor::new(2, 11)));
        assert_eq!(ctl.cursor(&b).await, Some(Cursor::new(114, 2)));
    }

    #[tokio::test]
    async fn concurrent_steps_in_one_chat_are_not_lost() {
        let (ctl, _provider) = controller(Script::default()).await;
        let ctl = std::sync::Arc::new(ctl);
        let key = chat(7);
        ctl.on_select_chapter(&key, 2).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..5 {
            let ctl = ctl.clone();
            let key = key.clone();
            tasks.spawn(async move { ctl.on_step_next(&key).await.kind });
        }
        while let Some(kind) = tasks.join_next().await {
            assert_eq!(kind.unwrap(), ReplyKind::Verse);
        }
        assert_eq!(ctl.cursor(&key).await, Some(Cursor::new(2, 6)));
    }
}
