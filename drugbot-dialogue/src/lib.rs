//! Drugbot Dialogue - the two-step drug menu behind the LINE responder.
//!
//! A user sends a drug number (`1`-`4`) and receives a short prompt; sending
//! `a` afterwards returns the side-effect details for that drug. Selections
//! live in an in-memory [`SessionStore`] and expire after 30 minutes of
//! inactivity.
//!
//! ## Architecture
//!
//! ```text
//! (user_id, text, now) → DialogueResolver → ReplyPayload
//!                          │        │
//!                  SessionStore   DrugTable
//! ```
//!
//! Time is always passed in, either from [`SystemClock`] or a test clock, so
//! expiry never depends on wall-clock delays.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod clock;
pub mod content;
pub mod reply;
pub mod resolver;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{DrugCode, DrugEntry, DrugTable, TableError, SELECT_FIRST_TEXT};
pub use reply::{Annotation, ReplyPayload};
pub use resolver::{Branch, DialogueResolver};
pub use session::{SessionRecord, SessionStore, Step, DEFAULT_SESSION_TTL_SECS};
