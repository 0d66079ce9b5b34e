use std::fmt;
use std::marker::PhantomData;

use sea_orm::{ConnectionTrait, FromQueryResult};

use crate::closure;
use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::node::NodeHandle;
use crate::query::TreeQuery;
use crate::row::Row;
use crate::traits::{AdjacencyTreeModel, TreeId};

/// Entry point over one adjacency-list table.
///
/// A row is a root when its parent column is `NULL` *or* equals its own id.
/// Both conventions are honoured everywhere, so a table may mix them.
///
/// The table must be acyclic apart from self-referencing roots. A longer
/// cycle makes path and subtree queries run without end; detecting that is
/// left to the caller.
pub struct TreeHandle<'a, C, Id, M = Row> {
    conn: &'a C,
    config: &'a TreeConfig,
    _marker: PhantomData<fn() -> (Id, M)>,
}

impl<C, Id, M> Clone for TreeHandle<'_, C, Id, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, Id, M> Copy for TreeHandle<'_, C, Id, M> {}

impl<C, Id, M> fmt::Debug for TreeHandle<'_, C, Id, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeHandle")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

impl<'a, C, Id, M> TreeHandle<'a, C, Id, M> {
    pub fn config(&self) -> &'a TreeConfig {
        self.config
    }

    pub fn connection(&self) -> &'a C {
        self.conn
    }
}

impl<'a, C, Id, M> TreeHandle<'a, C, Id, M>
where
    C: ConnectionTrait,
    Id: TreeId,
    M: FromQueryResult + Send + Sync + 'static,
{
    pub fn new(conn: &'a C, config: &'a TreeConfig) -> Self {
        Self {
            conn,
            config,
            _marker: PhantomData,
        }
    }

    pub(crate) fn query(&self) -> TreeQuery<'a> {
        TreeQuery::new(self.config, self.conn.get_database_backend())
    }

    /// Handle for the node `id`. Does not check that the row exists.
    pub fn node(&self, id: Id) -> NodeHandle<'a, C, Id, M> {
        NodeHandle::new(*self, id)
    }

    /// Every row of the table, in storage order.
    pub async fn all_data(&self) -> Result<Vec<M>, TreeError> {
        let rows = closure::query_all(self.conn, self.query().all_rows()).await?;
        rows.iter()
            .map(|row| M::from_query_result(row, "").map_err(TreeError::from))
            .collect()
    }

    /// Rows with a `NULL` or self-referencing parent, ordered by id.
    pub async fn roots(&self) -> Result<Vec<M>, TreeError> {
        let rows = closure::query_all(self.conn, self.query().roots()).await?;
        rows.iter()
            .map(|row| M::from_query_result(row, "").map_err(TreeError::from))
            .collect()
    }
}

impl<'a, C, M> TreeHandle<'a, C, M::Id, M>
where
    C: ConnectionTrait,
    M: AdjacencyTreeModel,
{
    pub fn for_model(conn: &'a C) -> Self {
        Self::new(conn, M::adjacency_tree_config())
    }

    pub fn node_of(&self, model: &M) -> NodeHandle<'a, C, M::Id, M> {
        self.node(model.id())
    }
}
