//! Telegram channel — long-polls the Bot API, classifies each message or
//! button press, and renders the reply (text chunks, keyboard, audio).
//!
//! The dispatcher runs under [`supervise`]: if it ever returns while the
//! process is not shutting down, it is rebuilt after `restart_delay`. Faults
//! inside a single message are already turned into replies by
//! [`CommsState::dispatch`]; supervision only covers the transport itself.

use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::UpdateHandler;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState};
use super::{Channel, ChannelFuture, supervise};
use crate::error::AppError;
use crate::intent;
use crate::session::render::{MAX_MESSAGE_LENGTH, chunk_text};
use crate::session::{Keyboard, Reply, SessionKey};

// ── TelegramChannel ──────────────────────────────────────────────────────────

pub struct TelegramChannel {
    channel_id: String,
    token: String,
    restart_delay: Duration,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(
        channel_id: impl Into<String>,
        token: String,
        restart_delay: Duration,
        state: Arc<CommsState>,
    ) -> Self {
        Self { channel_id: channel_id.into(), token, restart_delay, state }
    }
}

impl Channel for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(run_telegram(*self, shutdown))
    }
}

/// What every handler needs besides the bot and the update.
struct ChannelContext {
    channel_id: String,
    state: Arc<CommsState>,
}

// ── run_telegram ─────────────────────────────────────────────────────────────

async fn run_telegram(channel: TelegramChannel, shutdown: CancellationToken) -> Result<(), AppError> {
    let TelegramChannel { channel_id, token, restart_delay, state } = channel;
    info!(%channel_id, "telegram channel starting");

    let bot = Bot::new(token);
    let ctx = Arc::new(ChannelContext { channel_id: channel_id.clone(), state: state.clone() });

    supervise(&channel_id, restart_delay, &shutdown, &state, || {
        let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
            .dependencies(dptree::deps![ctx.clone()])
            .default_handler(|update| async move {
                debug!(update_id = ?update.id, "unhandled telegram update");
            })
            .build();
        async move { dispatcher.dispatch().await }
    })
    .await;

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

async fn on_message(bot: Bot, msg: Message, ctx: Arc<ChannelContext>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    debug!(
        channel_id = %ctx.channel_id,
        from = ?msg.from.as_ref().and_then(|u| u.username.as_ref()),
        "telegram received message"
    );

    let intent = intent::classify(text);
    let first_name = msg.from.as_ref().map(|u| u.first_name.clone());
    let key = SessionKey::new(ctx.channel_id.clone(), msg.chat.id.0);
    let reply = ctx.state.dispatch(key, intent, first_name).await;
    deliver(&bot, msg.chat.id, reply).await;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, ctx: Arc<ChannelContext>) -> ResponseResult<()> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("failed to answer callback query: {e}");
    }
    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat().id;

    let intent = intent::classify_callback(data);
    let key = SessionKey::new(ctx.channel_id.clone(), chat_id.0);
    let reply = ctx.state.dispatch(key, intent, Some(q.from.first_name.clone())).await;
    deliver(&bot, chat_id, reply).await;
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Send the reply text in chunks (keyboard on the last one), then the audio.
/// Send failures are logged; they never fail the handler.
async fn deliver(bot: &Bot, chat_id: ChatId, reply: Reply) {
    let chunks = chunk_text(&reply.text, MAX_MESSAGE_LENGTH);
    let last = chunks.len() - 1;

    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut request = bot.send_message(chat_id, chunk);
        if i == last {
            if let Some(keyboard) = &reply.keyboard {
                request = request.reply_markup(markup(keyboard));
            }
        }
        if let Err(e) = request.await {
            warn!(chat_id = chat_id.0, "failed to send telegram reply: {e}");
        }
    }

    if let Some(audio) = reply.audio_url {
        match reqwest::Url::parse(&audio) {
            Ok(url) => {
                if let Err(e) = bot.send_audio(chat_id, InputFile::url(url)).await {
                    warn!(chat_id = chat_id.0, %audio, "failed to send telegram audio: {e}");
                }
            }
            Err(e) => warn!(%audio, "invalid audio url: {e}"),
        }
    }
}

fn markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
                .collect::<Vec<_>>()
        }))),
        Keyboard::Reply(rows) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(|l| KeyboardButton::new(l.clone())).collect::<Vec<_>>()),
            )
            .resize_keyboard(),
        ),
    }
}
