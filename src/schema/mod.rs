//! Keystroke input schema
//!
//! Defines the keystroke event model, the mixed-format timestamp parser and the
//! adapter that turns CSV/JSON exports into validated events.

mod adapter;
mod key_event;
pub mod timestamp;

pub use adapter::*;
pub use key_event::*;
