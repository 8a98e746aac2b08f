//! Dialogue history for a voice session.
//!
//! * [`Turn`] / [`Role`] — one role-tagged utterance or reply.
//! * [`DialogueHistory`] — ordered, append-only log replayed to the
//!   conversant on every exchange.

pub mod dialogue;
pub mod turn;

pub use dialogue::DialogueHistory;
pub use turn::{Role, Turn};
