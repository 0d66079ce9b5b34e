//! Adjacency-list tree traversal for SeaORM.
//!
//! Each row of the configured table stores its own id and its parent's id.
//! This crate answers hierarchical questions over such a table (path to the
//! root, paths between two nodes, subtree enumeration, ancestor and
//! descendant checks) with recursive queries, so the storage engine needs no
//! native hierarchy support. Stores without `WITH RECURSIVE` can use the
//! level-by-level strategy instead.
//!
//! Everything here is read-only: the crate never writes to the table.

pub mod config;
pub mod error;
pub mod node;
pub mod row;
pub mod traits;
pub mod tree;

mod closure;
mod query;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{TraversalStrategy, TreeConfig, TreeOptions};
    pub use crate::node::NodeHandle;
    pub use crate::row::{Leveled, Row};
    pub use crate::traits::{AdjacencyTreeModel, TreeId};
    pub use crate::tree::TreeHandle;
}

pub use adjacency_tree_macros::AdjacencyTreeModel as AdjacencyTreeModelDerive;
#[doc(hidden)]
pub use adjacency_tree_macros::AdjacencyTreeModel;
pub use config::{TraversalStrategy, TreeConfig, TreeOptions, LEVEL_COLUMN};
pub use error::TreeError;
pub use node::NodeHandle;
pub use row::{Leveled, Row};
pub use traits::{AdjacencyTreeModel, TreeId};
pub use tree::TreeHandle;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
