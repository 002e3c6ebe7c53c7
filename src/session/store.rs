//! In-memory registry of per-chat navigation state.
//!
//! Each chat gets its own `Arc<Mutex<NavigationState>>`. The outer map lock
//! is held only for lookup; the per-session lock is held by the controller
//! for a whole intent, so two messages from one chat never interleave while
//! different chats never wait on each other.
//!
//! Entries remember when they were last handed out. [`SessionStore::evict_idle`]
//! drops the ones nobody has touched for a while and nobody currently holds.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::navigation::NavigationState;

/// Identity of one conversation: the channel it arrived on plus the chat id
/// within that channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub channel_id: String,
    pub chat_id: i64,
}

impl SessionKey {
    pub fn new(channel_id: impl Into<String>, chat_id: i64) -> Self {
        Self { channel_id: channel_id.into(), chat_id }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.chat_id)
    }
}

pub type SharedSession = Arc<Mutex<NavigationState>>;

#[derive(Debug)]
struct Slot {
    session: SharedSession,
    last_seen: Instant,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `key`, created empty on first use.
    pub async fn get(&self, key: &SessionKey) -> SharedSession {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        let slot = sessions
            .entry(key.clone())
            .or_insert_with(|| Slot { session: SharedSession::default(), last_seen: now });
        slot.last_seen = now;
        slot.session.clone()
    }

    /// Drop sessions unused for at least `idle`. A session some handler still
    /// holds is kept whatever its age. Returns how many were dropped.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            slot.last_seen.elapsed() < idle || Arc::strong_count(&slot.session) > 1
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Cursor;

    #[tokio::test]
    async fn same_key_shares_state() {
        let store = SessionStore::new();
        let key = SessionKey::new("telegram0", 42);
        store.get(&key).await.lock().await.select_chapter(2);
        let again = store.get(&key).await;
        assert_eq!(again.lock().await.current(), Some(Cursor::new(2, 1)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn different_chats_are_isolated() {
        let store = SessionStore::new();
        let a = SessionKey::new("telegram0", 1);
        let b = SessionKey::new("telegram0", 2);
        let c = SessionKey::new("pty0", 1);
        store.get(&a).await.lock().await.select_verse(2, 255);
        store.get(&b).await.lock().await.select_chapter(114);
        assert_eq!(store.get(&a).await.lock().await.current(), Some(Cursor::new(2, 255)));
        assert_eq!(store.get(&b).await.lock().await.current(), Some(Cursor::new(114, 1)));
        assert_eq!(store.get(&c).await.lock().await.current(), None);
        assert_eq!(store.len().await, 3);
    }

    #[test]
    fn key_display() {
        assert_eq!(SessionKey::new("telegram0", -100).to_string(), "telegram0/-100");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted() {
        let store = SessionStore::new();
        let old = SessionKey::new("telegram0", 1);
        let fresh = SessionKey::new("telegram0", 2);
        store.get(&old).await.lock().await.select_verse(2, 255);

        tokio::time::advance(Duration::from_secs(600)).await;
        store.get(&fresh).await;

        assert_eq!(store.evict_idle(Duration::from_secs(300)).await, 1);
        assert_eq!(store.len().await, 1);
        // An evicted chat starts over.
        assert_eq!(store.get(&old).await.lock().await.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn held_session_survives_eviction() {
        let store = SessionStore::new();
        let key = SessionKey::new("pty0", 0);
        let held = store.get(&key).await;
        held.lock().await.select_chapter(1);

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(store.evict_idle(Duration::from_secs(300)).await, 0);
        drop(held);
        assert_eq!(store.evict_idle(Duration::from_secs(300)).await, 1);
    }
}
