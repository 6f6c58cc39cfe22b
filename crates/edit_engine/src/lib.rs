//! Edit Engine - Table editing with undo, redlining and layout sync
//!
//! This crate implements the structural table operations on top of the
//! document model: creating and deleting tables, rows, columns and cells,
//! splitting and merging tables, converting between text and tables. Every
//! operation records an undo entry, reports to the redline table and keeps
//! the frame layout in step with the content.

mod error;
mod undo;
mod guards;
mod executor;
mod command;
mod number_format;
mod formula;
mod autoformat;
mod table_insert;
mod table_rows_cols;
mod table_format;
mod table_split;
mod cell_split;
mod text_table;

pub use error::*;
pub use undo::*;
pub use guards::*;
pub use executor::*;
pub use command::*;
pub use number_format::*;
pub use formula::*;
pub use autoformat::*;
pub use table_insert::*;
pub use table_rows_cols::*;
pub use table_format::*;
pub use table_split::*;
pub use cell_split::*;
pub use text_table::*;
