use std::fmt::Debug;

use sea_orm::{ConnectionTrait, FromQueryResult, TryGetable, Value};

use crate::config::TreeConfig;
use crate::tree::TreeHandle;

/// Identifier usable both as a row key and as a parent reference.
pub trait TreeId:
    Clone + Debug + PartialOrd + Into<Value> + TryGetable + Send + Sync + 'static
{
}

impl<T> TreeId for T where
    T: Clone + Debug + PartialOrd + Into<Value> + TryGetable + Send + Sync + 'static
{
}

/// Trait implemented by SeaORM `Model` types stored as an adjacency list.
///
/// Implementations are normally provided by the `#[derive(AdjacencyTreeModel)]` macro.
pub trait AdjacencyTreeModel: FromQueryResult + Send + Sync + 'static {
    type Id: TreeId;

    fn adjacency_tree_config() -> &'static TreeConfig;

    fn id(&self) -> Self::Id;
    fn parent_id(&self) -> Option<Self::Id>;

    /// Whether this row is a root: no parent, or a parent equal to itself.
    fn is_root(&self) -> bool {
        match self.parent_id() {
            Some(parent) => parent == self.id(),
            None => true,
        }
    }

    /// Tree handle over this model's table.
    fn tree<C>(conn: &C) -> TreeHandle<'_, C, Self::Id, Self>
    where
        C: ConnectionTrait,
        Self: Sized,
    {
        TreeHandle::new(conn, Self::adjacency_tree_config())
    }
}
