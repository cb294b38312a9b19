//! Compiler failure diagnostics.

mod call_tree;
mod filter;

pub use call_tree::{CALL_TREE_PREFIX, CallTree};
pub use filter::{CALL_PATH_MARKER, ErrorReportFilter};
