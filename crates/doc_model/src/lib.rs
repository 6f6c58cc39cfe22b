//! Document Model - node array and table content model
//!
//! The document body is a flat array of nodes bracketed into sections.
//! Tables hang off their table node as a tree of lines and boxes; leaf boxes
//! own a content section in the node array, branch boxes own nested lines.

mod node_id;
mod error;
mod node;
mod nodes;
mod format;
mod style_pool;
mod settings;
mod sort_boxes;
pub mod table;
mod document;
mod table_ops;
mod selection;
mod restructure;
pub mod snapshot;
pub mod visit;

pub use node_id::*;
pub use error::*;
pub use node::*;
pub use nodes::*;
pub use format::*;
pub use style_pool::*;
pub use settings::*;
pub use sort_boxes::*;
pub use table::*;
pub use document::*;
pub use selection::*;
pub use snapshot::*;
pub use visit::*;
