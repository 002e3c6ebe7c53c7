//! Ayah Bot — browse the Quran surah by surah, ayah by ayah, over chat.
//!
//! Layers, leaves first: [`content`] fetches text and audio from the content
//! API, [`navigation`] tracks a chat's position, [`session`] turns intents
//! into replies, and [`subsystems::comms`] connects chat transports.

pub mod config;
pub mod content;
pub mod error;
pub mod intent;
pub mod logger;
pub mod navigation;
pub mod session;
pub mod subsystems;
