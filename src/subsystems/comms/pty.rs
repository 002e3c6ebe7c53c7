//! Console channel — reads lines from stdin, prints replies to stdout.
//!
//! Lets the bot be browsed locally without Telegram credentials. Keyboard
//! options are listed under the reply text and can be typed back verbatim
//! (`1. Al-Faatiha`, `2 255`, `▶`...); audio is shown as a URL. Every line
//! belongs to a single session, chat id 0.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState};
use super::{Channel, ChannelFuture};
use crate::error::AppError;
use crate::intent;
use crate::session::{Keyboard, Reply, SessionKey};

const CONSOLE_CHAT_ID: i64 = 0;

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Channel for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(run_pty(self.channel_id, self.state, shutdown))
    }
}

async fn run_pty(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "console channel started — type /start and press Enter. Ctrl-C to quit.");
    println!("─────────────────────────────────");
    println!(" Ayah console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(%channel_id, "shutdown signal received — closing console channel");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        let text = text.trim();
                        if text.is_empty() {
                            continue;
                        }
                        let intent = intent::classify(text);
                        debug!(%channel_id, ?intent, "console input");
                        let key = SessionKey::new(channel_id.clone(), CONSOLE_CHAT_ID);
                        let reply = state.dispatch(key, intent, None).await;
                        println!("{}", render_plain(&reply));
                    }
                    Ok(None) => {
                        info!(%channel_id, "stdin closed — console channel exiting");
                        break;
                    }
                    Err(e) => {
                        warn!(%channel_id, "stdin read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

/// Render a reply as console text.
fn render_plain(reply: &Reply) -> String {
    let mut out = reply.text.clone();
    if let Some(keyboard) = &reply.keyboard {
        out.push('\n');
        match keyboard {
            Keyboard::Inline(rows) => {
                for button in rows.iter().flatten() {
                    out.push_str(&format!("\n  [{}] → {}", button.label, button.data));
                }
            }
            Keyboard::Reply(rows) => {
                for row in rows {
                    out.push_str("\n  ");
                    out.push_str(&row.iter().map(|l| format!("[{}]", l.replace('\n', " "))).collect::<Vec<_>>().join(" "));
                }
            }
        }
    }
    if let Some(audio) = &reply.audio_url {
        out.push_str(&format!("\n🔊 {audio}"));
    }
    out
}
