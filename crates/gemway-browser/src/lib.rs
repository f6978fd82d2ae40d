//! Browser core for Gemini capsules.
//!
//! Ties the Gemtext parser and the history stack to the wire client
//! through the [`NavigationEngine`], which owns one browsing session and
//! runs `navigate`, `back`, `forward`, `refresh` and `home` against it.
//! Presentation layers read the session through snapshots and never
//! mutate it directly.

pub mod engine;
pub mod gemini;
pub mod nav;
pub mod session;

pub use engine::NavigationEngine;
pub use gemini::{Document, GemtextBlock};
pub use nav::HistoryStack;
pub use session::{NavigationFailure, NavigationSession, Page, SessionSnapshot};
