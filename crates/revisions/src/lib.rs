//! Redline Tracking (Track Changes)
//!
//! Redlines mark node ranges of the document as inserted, deleted or
//! reformatted. Structural table edits record redlines over whole node
//! ranges; before converting text to a table, redlines lying inside the
//! converted range are accepted so no redline has to be split at a cell
//! boundary.

mod revision;
mod state;
mod error;
mod commands;

pub use revision::*;
pub use state::*;
pub use error::*;
pub use commands::*;
