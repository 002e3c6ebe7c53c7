//! Per-chat reading position and the stepping rules around it.
//!
//! [`NavigationState`] never performs I/O. Stepping forward needs the surah's
//! ayah count, which the caller fetches and passes in. `peek_*` compute the
//! target without moving; the session controller peeks, fetches the target
//! ayah, and only then commits it, so the cursor never rests on an ayah that
//! could not be shown.

use std::fmt;

use thiserror::Error;

/// A surah/ayah position. Both numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub chapter: u32,
    pub verse: u32,
}

impl Cursor {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    AtFirst,
    AtLast,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Boundary::AtFirst => "first",
            Boundary::AtLast => "last",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("already at the {0} ayah")]
    Boundary(Boundary),
    #[error("no surah/ayah selected yet")]
    PreconditionFailed,
}

/// `None` is the Uninitialized state; `Some` is Browsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    cursor: Option<Cursor>,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Cursor> {
        self.cursor
    }

    /// Jump to the first ayah of `chapter`, whatever the previous position.
    pub fn select_chapter(&mut self, chapter: u32) -> Cursor {
        self.commit(Cursor::new(chapter, 1))
    }

    /// Jump to an explicit position. Bounds are the caller's concern.
    pub fn select_verse(&mut self, chapter: u32, verse: u32) -> Cursor {
        self.commit(Cursor::new(chapter, verse))
    }

    pub fn commit(&mut self, cursor: Cursor) -> Cursor {
        self.cursor = Some(cursor);
        cursor
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Position one ayah forward, or `AtLast` when already at `verse_count`.
    pub fn peek_next(&self, verse_count: u32) -> Result<Cursor, NavError> {
        let current = self.cursor.ok_or(NavError::PreconditionFailed)?;
        if current.verse < verse_count {
            Ok(Cursor::new(current.chapter, current.verse + 1))
        } else {
            Err(NavError::Boundary(Boundary::AtLast))
        }
    }

    /// Position one ayah back, or `AtFirst` on ayah 1.
    pub fn peek_previous(&self) -> Result<Cursor, NavError> {
        let current = self.cursor.ok_or(NavError::PreconditionFailed)?;
        if current.verse > 1 {
            Ok(Cursor::new(current.chapter, current.verse - 1))
        } else {
            Err(NavError::Boundary(Boundary::AtFirst))
        }
    }

    pub fn step_next(&mut self, verse_count: u32) -> Result<Cursor, NavError> {
        let next = self.peek_next(verse_count)?;
        Ok(self.commit(next))
    }

    pub fn step_previous(&mut self) -> Result<Cursor, NavError> {
        let previous = self.peek_previous()?;
        Ok(self.commit(previous))
    }
}
