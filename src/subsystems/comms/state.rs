//! Shared state for the comms subsystem — the capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and can only classify-and-dispatch
//! through [`CommsState::dispatch`]. They never touch navigation state or the
//! content client directly.
//!
//! Each dispatch runs on its own Tokio task, so a panic while handling one
//! message becomes an `Internal` reply instead of taking the channel down.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::intent::Intent;
use crate::session::{Reply, SessionController, SessionKey};

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
    /// A chat sent `/start`.
    SessionStarted { channel_id: String, chat_id: i64 },
    /// The transport loop exited unexpectedly and is being restarted.
    ChannelRestarting { channel_id: String, reason: String },
}

// ── State ─────────────────────────────────────────────────────────────────────

pub struct CommsState {
    controller: Arc<SessionController>,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(controller: Arc<SessionController>, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { controller, event_tx }
    }

    /// Handle one classified intent for `key` and return the reply to render.
    pub async fn dispatch(&self, key: SessionKey, intent: Intent, first_name: Option<String>) -> Reply {
        if intent == Intent::Start {
            self.report_event(CommsEvent::SessionStarted {
                channel_id: key.channel_id.clone(),
                chat_id: key.chat_id,
            });
        }

        let controller = self.controller.clone();
        let chat = key.to_string();
        run_isolated(&chat, async move {
            controller.handle(&key, intent, first_name.as_deref()).await
        })
        .await
    }

    /// Report an event to the comms subsystem manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is not
    /// keeping up or has already exited.
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}

/// Run one message's handling on its own task. A panic inside `work` is
/// logged and answered with [`Reply::internal`].
async fn run_isolated<F>(chat: &str, work: F) -> Reply
where
    F: Future<Output = Reply> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(%chat, "message handler failed: {e}");
            Reply::internal()
        }
    }
}
