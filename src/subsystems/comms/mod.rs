//! Comms subsystem — the chat transports.
//!
//! # Architecture
//!
//! Each channel (console, Telegram) implements [`Channel`] and is spawned as
//! an independent task by [`start`]. Channels capture their shared
//! [`Arc<CommsState>`] at construction time and talk to the session
//! controller only through it.
//!
//! An intra-subsystem [`mpsc`] channel lets running channels signal the
//! manager (session starts, restarts, shutdowns). It is drained by a
//! monitoring task that logs and otherwise ignores events.

mod state;
#[cfg(feature = "channel-pty")]
pub mod pty;
#[cfg(feature = "channel-telegram")]
pub mod telegram;

pub use state::{CommsEvent, CommsState};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::session::SessionController;

// ── Channel ──────────────────────────────────────────────────────────────────

/// A boxed, owned future returned by [`Channel::run`].
pub type ChannelFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A transport that receives messages and renders replies.
pub trait Channel: Send + 'static {
    /// Stable identifier used in logs and session keys.
    fn id(&self) -> &str;

    /// Consume the channel and return its run-loop. The loop must stop once
    /// `shutdown` is cancelled.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture;
}

// ── CommsHandle ──────────────────────────────────────────────────────────────

/// Handle to the running channel set.
pub struct CommsHandle {
    inner: JoinHandle<Result<(), AppError>>,
    channels: usize,
}

impl CommsHandle {
    /// Number of channels that were started.
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Await all channels and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("comms manager panicked: {e}"))),
        }
    }
}

// ── start ────────────────────────────────────────────────────────────────────

/// Spawn all configured channels and return a [`CommsHandle`].
///
/// Synchronous: returns as soon as the tasks are spawned.
pub fn start(
    config: &Config,
    controller: Arc<SessionController>,
    shutdown: CancellationToken,
) -> CommsHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(controller, event_tx));

    let mut channels: Vec<Box<dyn Channel>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading console channel");
            channels.push(Box::new(pty::PtyChannel::new("pty0", state.clone())));
        }
    }

    #[cfg(feature = "channel-telegram")]
    {
        if let (true, Some(token)) = (config.comms_telegram_should_load(), config.bot_token.clone()) {
            info!("loading telegram channel");
            channels.push(Box::new(telegram::TelegramChannel::new(
                "telegram0",
                token,
                config.comms.telegram.restart_delay,
                state.clone(),
            )));
        }
    }

    if channels.is_empty() {
        info!("no comms channels configured — waiting for shutdown");
    }

    drop(state);
    tokio::spawn(drain_events(event_rx));

    spawn_channels(channels, shutdown)
}

async fn drain_events(mut rx: mpsc::Receiver<CommsEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            CommsEvent::ChannelShutdown { channel_id } => {
                debug!(%channel_id, "channel reported shutdown");
            }
            CommsEvent::SessionStarted { channel_id, chat_id } => {
                debug!(%channel_id, chat_id, "chat session started");
            }
            CommsEvent::ChannelRestarting { channel_id, reason } => {
                info!(%channel_id, %reason, "channel restarting");
            }
        }
    }
}

/// Run each channel on its own task. A channel error cancels `shutdown` so
/// siblings stop too; the first error is returned once all have exited.
fn spawn_channels(channels: Vec<Box<dyn Channel>>, shutdown: CancellationToken) -> CommsHandle {
    let count = channels.len();
    let inner = tokio::spawn(async move {
        if channels.is_empty() {
            shutdown.cancelled().await;
            return Ok(());
        }

        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();
        for channel in channels {
            debug!(channel = %channel.id(), "spawning channel");
            set.spawn(channel.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;
        while let Some(res) = set.join_next().await {
            match res {
                Err(e) => {
                    error!("channel panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| AppError::Comms(format!("channel panicked: {e}")));
                }
                Ok(Err(e)) => {
                    error!("channel error: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Ok(Ok(())) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    CommsHandle { inner, channels: count }
}

// ── supervise ────────────────────────────────────────────────────────────────

/// Keep a transport loop alive until `shutdown`.
///
/// `run_once` builds and drives one instance of the loop. If that future
/// returns while the process is still running, a `ChannelRestarting` event is
/// reported and a fresh instance is started after `restart_delay`.
#[cfg_attr(not(feature = "channel-telegram"), allow(dead_code))]
pub(crate) async fn supervise<F, Fut>(
    channel_id: &str,
    restart_delay: Duration,
    shutdown: &CancellationToken,
    state: &CommsState,
    mut run_once: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(%channel_id, "shutdown signal received — closing channel");
                return;
            }
            _ = run_once() => {
                warn!(%channel_id, delay_ms = restart_delay.as_millis() as u64, "transport loop exited unexpectedly, restarting");
                state.report_event(CommsEvent::ChannelRestarting {
                    channel_id: channel_id.to_string(),
                    reason: "transport loop exited".into(),
                });
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(restart_delay) => {}
        }
    }
}
