//! Layout Engine - incremental frame layout
//!
//! The layout is a tree of frames (pages, bodies, columns, tables, rows,
//! cells, paragraphs) kept in an arena. Size changes travel through the tree
//! as grow and shrink requests; formatting recomputes only what was
//! invalidated. Table frames mirror the lines and boxes of the content model
//! and are rebuilt after structural table edits.

mod accessibility;
mod columns;
mod error;
mod format;
mod frame;
mod geometry;
mod grow;
mod layout;
mod lowers;
mod table_frames;

pub use accessibility::*;
pub use columns::*;
pub use error::*;
pub use frame::*;
pub use geometry::*;
pub use grow::*;
pub use layout::*;
pub use lowers::*;
