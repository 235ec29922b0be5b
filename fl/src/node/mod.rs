//! Node addressing: path encoding and per-group directories

mod path;
mod tree;

pub use path::{GROUP_SEPARATOR, NodeInfo, NodePath};
pub use tree::{DEFAULT_FAN_OUT, NodeTree, TreeEntry, TreeError};
