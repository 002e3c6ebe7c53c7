//! Inbound text and button data → [`Intent`].
//!
//! Classification is the only place that looks at raw user text. The session
//! controller receives typed intents and never inspects strings.
//!
//! Rules, in order:
//! 1. `/command` (an optional `@botname` suffix is ignored).
//! 2. Navigation button labels (matched on their leading emoji).
//! 3. Digits before the first `.` select a surah (`"2"`, `"2. Al-Baqara"`).
//! 4. Two tokens, the first numeric, select an ayah (`"2 255"`).

use thiserror::Error;

/// Callback data carried by the welcome screen's inline button.
pub const BROWSE_CALLBACK: &str = "surah";

pub const BROWSE_LABEL: &str = "📖 Surah";
pub const BACK_LABEL: &str = "🔙 Назад / Back";
pub const PREVIOUS_LABEL: &str = "◀️ Предыдущий аят / Previous ayah";
pub const NEXT_LABEL: &str = "▶️ Следующий аят / Next ayah";

const BACK_MARK: &str = "🔙";
const PREVIOUS_MARK: &str = "◀";
const NEXT_MARK: &str = "▶";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    Help,
    BrowseChapters,
    GoBack,
    SelectChapterById(u32),
    SelectVerseByCoordinates { chapter: u32, verse: u32 },
    StepNext,
    StepPrevious,
    Invalid(InvalidIntent),
    Unrecognized,
}

/// Input that looked like a selection but cannot name a real position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIntent {
    #[error("surah number must be a positive integer")]
    BadChapter,
    #[error("ayah number must be a positive integer")]
    BadVerse,
    #[error("surah {chapter} has {count} ayahs, {verse} is out of range")]
    VerseOutOfRange { chapter: u32, verse: u32, count: u32 },
}

/// Classify a free-text message.
pub fn classify(text: &str) -> Intent {
    let text = text.trim();
    if text.is_empty() {
        return Intent::Unrecognized;
    }

    if let Some(command) = text.strip_prefix('/') {
        return classify_command(command);
    }

    if text.starts_with(BACK_MARK) {
        return Intent::GoBack;
    }
    if text.starts_with(NEXT_MARK) {
        return Intent::StepNext;
    }
    if text.starts_with(PREVIOUS_MARK) {
        return Intent::StepPrevious;
    }

    if let Some(head) = text.split('.').next() {
        if is_digits(head) {
            return match parse_positive(head) {
                Some(chapter) => Intent::SelectChapterById(chapter),
                None => Intent::Invalid(InvalidIntent::BadChapter),
            };
        }
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if let [chapter, verse] = tokens.as_slice() {
        if is_digits(chapter) {
            let Some(chapter) = parse_positive(chapter) else {
                return Intent::Invalid(InvalidIntent::BadChapter);
            };
            return match parse_positive(verse) {
                Some(verse) => Intent::SelectVerseByCoordinates { chapter, verse },
                None => Intent::Invalid(InvalidIntent::BadVerse),
            };
        }
    }

    Intent::Unrecognized
}

/// Classify inline-button callback data.
pub fn classify_callback(data: &str) -> Intent {
    if data == BROWSE_CALLBACK {
        Intent::BrowseChapters
    } else {
        classify(data)
    }
}

fn classify_command(command: &str) -> Intent {
    let name = command.split_whitespace().next().unwrap_or_default();
    let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();
    match name.as_str() {
        "start" => Intent::Start,
        "help" => Intent::Help,
        "surahs" | "surah" => Intent::BrowseChapters,
        "next" => Intent::StepNext,
        "prev" | "previous" => Intent::StepPrevious,
        "back" => Intent::GoBack,
        _ => Intent::Unrecognized,
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_positive(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|n| *n > 0)
}
