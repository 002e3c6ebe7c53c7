//! Outbound render model and the bilingual (Russian / English) texts.
//!
//! A [`Reply`] is transport-neutral: text, an optional keyboard and an
//! optional audio URL to be delivered as a separate message. Channels decide
//! how to draw it.

use crate::content::{Chapter, ChapterVerses, VerseDetail};
use crate::intent::{BACK_LABEL, BROWSE_CALLBACK, BROWSE_LABEL, InvalidIntent, NEXT_LABEL, PREVIOUS_LABEL};
use crate::navigation::Boundary;

/// Largest text segment a channel should send in one message.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

const CHAPTERS_PER_ROW: usize = 2;
const VERSES_PER_ROW: usize = 3;

pub const HELP_TEXT: &str = "ℹ️ Инструкция:\n\
• /start — начать заново\n\
• Выбери суру, затем аят — и получишь текст и аудио.\n\n\
ℹ️ How to use:\n\
• /start — start over\n\
• Choose a surah, then an ayah, to get its text and recitation.";
pub const CHAPTERS_UNAVAILABLE_TEXT: &str =
    "⚠️ Список сур сейчас недоступен, попробуй позже.\n⚠️ The surah list is unavailable right now, try again later.";
pub const CHAPTER_NOT_FOUND_TEXT: &str = "❌ Сура не найдена.\n❌ Surah not found.";
pub const VERSE_NOT_FOUND_TEXT: &str = "❌ Аят не найден.\n❌ Ayah not found.";
pub const UNAVAILABLE_TEXT: &str =
    "⚠️ Сервис с текстами сейчас недоступен, попробуй позже.\n⚠️ The text service is unavailable right now, try again later.";
pub const PARTIAL_DATA_TEXT: &str =
    "❌ Не удалось получить информацию об аяте.\n❌ Could not get complete information about this ayah.";
pub const AT_FIRST_TEXT: &str = "⚠️ Ты уже на первом аяте.\n⚠️ This is already the first ayah.";
pub const AT_LAST_TEXT: &str = "✅ Это последний аят.\n✅ This is the last ayah.";
pub const NO_SELECTION_TEXT: &str = "⚠️ Сначала выбери суру и аят.\n⚠️ Choose a surah and an ayah first.";
pub const INVALID_FORMAT_TEXT: &str = "❌ Неправильный формат аята.\n❌ Invalid surah or ayah number.";
pub const UNRECOGNIZED_TEXT: &str =
    "❗ Команда не распознана.\nНапиши /start, чтобы начать заново.\n❗ Command not understood. Send /start to begin again.";
pub const INTERNAL_TEXT: &str = "⚠️ Внутренняя ошибка, попробуй ещё раз.\n⚠️ Internal error, please try again.";

/// Stable category of a reply; one per outcome the user can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Welcome,
    Help,
    ChapterList,
    VerseList,
    Verse,
    Boundary(Boundary),
    NoSelection,
    ChaptersUnavailable,
    ChapterNotFound,
    VerseNotFound,
    Unavailable,
    PartialData,
    InvalidIntent,
    Unrecognized,
    Internal,
}

/// An inline button: shown label plus the data sent back when pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<Button>>),
    /// A persistent keyboard whose presses arrive as plain text.
    Reply(Vec<Vec<String>>),
}

impl Keyboard {
    /// Every label, row by row.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Keyboard::Inline(rows) => rows.iter().flatten().map(|b| b.label.as_str()).collect(),
            Keyboard::Reply(rows) => rows.iter().flatten().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub audio_url: Option<String>,
}

impl Reply {
    fn plain(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into(), keyboard: None, audio_url: None }
    }

    pub fn welcome(first_name: Option<&str>) -> Self {
        let name = first_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| format!(" {n}"))
            .unwrap_or_default();
        let text = format!(
            "Assalamu alaykum{name} 🌙\n\
             Welcome!\nThis bot will help you listen, read and understand the Quran.\n\
             Choose a surah or an ayah and start your journey ✨\n\n\
             Ассаляму алейкум{name} 🌙\n\
             Добро пожаловать!\nЭтот бот поможет тебе слушать, читать и понимать Коран.\n\
             Выбери суру и начни путь ✨"
        );
        Self {
            kind: ReplyKind::Welcome,
            text,
            keyboard: Some(Keyboard::Inline(vec![vec![Button {
                label: BROWSE_LABEL.to_string(),
                data: BROWSE_CALLBACK.to_string(),
            }]])),
            audio_url: None,
        }
    }

    pub fn help() -> Self {
        Self::plain(ReplyKind::Help, HELP_TEXT)
    }

    pub fn chapter_list(chapters: &[Chapter]) -> Self {
        let labels: Vec<String> = chapters.iter().map(chapter_label).collect();
        Self {
            kind: ReplyKind::ChapterList,
            text: "📖 Выбери суру / Choose the surah:".to_string(),
            keyboard: Some(grid_with_back(labels, CHAPTERS_PER_ROW)),
            audio_url: None,
        }
    }

    pub fn verse_list(verses: &ChapterVerses) -> Self {
        let labels: Vec<String> = verses.verses.iter().map(|v| format!("{} {v}", verses.chapter)).collect();
        Self {
            kind: ReplyKind::VerseList,
            text: format!("📘 {} — выбери аят / choose the ayah:", verses.display_name),
            keyboard: Some(grid_with_back(labels, VERSES_PER_ROW)),
            audio_url: None,
        }
    }

    pub fn verse(detail: &VerseDetail) -> Self {
        let text = format!(
            "🕋 Ayah {} of Surah {}\n📖 Arabic: {}\n🇷🇺 Русский: {}\n🇬🇧 English: {}",
            detail.verse, detail.chapter, detail.arabic, detail.russian, detail.english
        );
        Self {
            kind: ReplyKind::Verse,
            text,
            keyboard: Some(Keyboard::Reply(vec![
                vec![PREVIOUS_LABEL.to_string(), NEXT_LABEL.to_string()],
                vec![BACK_LABEL.to_string()],
            ])),
            audio_url: Some(detail.audio_url.clone()),
        }
    }

    pub fn boundary(boundary: Boundary) -> Self {
        let text = match boundary {
            Boundary::AtFirst => AT_FIRST_TEXT,
            Boundary::AtLast => AT_LAST_TEXT,
        };
        Self::plain(ReplyKind::Boundary(boundary), text)
    }

    pub fn no_selection() -> Self {
        Self::plain(ReplyKind::NoSelection, NO_SELECTION_TEXT)
    }

    pub fn chapters_unavailable() -> Self {
        Self::plain(ReplyKind::ChaptersUnavailable, CHAPTERS_UNAVAILABLE_TEXT)
    }

    pub fn chapter_not_found() -> Self {
        Self::plain(ReplyKind::ChapterNotFound, CHAPTER_NOT_FOUND_TEXT)
    }

    pub fn verse_not_found() -> Self {
        Self::plain(ReplyKind::VerseNotFound, VERSE_NOT_FOUND_TEXT)
    }

    pub fn unavailable() -> Self {
        Self::plain(ReplyKind::Unavailable, UNAVAILABLE_TEXT)
    }

    pub fn partial_data() -> Self {
        Self::plain(ReplyKind::PartialData, PARTIAL_DATA_TEXT)
    }

    pub fn invalid(reason: &InvalidIntent) -> Self {
        let text = match reason {
            InvalidIntent::VerseOutOfRange { chapter, count, .. } => format!(
                "❌ В суре {chapter} всего {count} аятов.\n❌ Surah {chapter} has only {count} ayahs."
            ),
            InvalidIntent::BadChapter | InvalidIntent::BadVerse => INVALID_FORMAT_TEXT.to_string(),
        };
        Self::plain(ReplyKind::InvalidIntent, text)
    }

    pub fn unrecognized() -> Self {
        Self::plain(ReplyKind::Unrecognized, UNRECOGNIZED_TEXT)
    }

    pub fn internal() -> Self {
        Self::plain(ReplyKind::Internal, INTERNAL_TEXT)
    }
}

/// Keyboard label for a surah: `"<n>. <name>"`.
pub fn chapter_label(chapter: &Chapter) -> String {
    format!("{}. {}", chapter.id, chapter.display_name)
}

fn grid_with_back(labels: Vec<String>, per_row: usize) -> Keyboard {
    let mut rows: Vec<Vec<String>> = labels.chunks(per_row).map(<[String]>::to_vec).collect();
    rows.push(vec![BACK_LABEL.to_string()]);
    Keyboard::Reply(rows)
}

/// Split `text` into segments of at most `max` chars, on char boundaries.
/// Always returns at least one segment.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}
