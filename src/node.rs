use std::fmt;

use futures::stream::{self, Stream, TryStreamExt};
use sea_orm::{ConnectionTrait, FromQueryResult, Statement};

use crate::closure::{self, LevelWalk, Visit};
use crate::error::TreeError;
use crate::query::Walk;
use crate::row::{Leveled, Row};
use crate::traits::TreeId;
use crate::tree::TreeHandle;

/// Handle bound to a single node id.
///
/// Every operation is an independent read. "No such row", "not related" and
/// "nothing found" are `Ok(None)`; store failures are errors.
pub struct NodeHandle<'a, C, Id, M = Row> {
    tree: TreeHandle<'a, C, Id, M>,
    id: Id,
}

impl<C, Id: Clone, M> Clone for NodeHandle<'_, C, Id, M> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            id: self.id.clone(),
        }
    }
}

impl<C, Id: fmt::Debug, M> fmt::Debug for NodeHandle<'_, C, Id, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("table", &self.tree.config().table())
            .field("id", &self.id)
            .finish()
    }
}

impl<'a, C, Id, M> NodeHandle<'a, C, Id, M>
where
    C: ConnectionTrait,
    Id: TreeId,
    M: FromQueryResult + Send + Sync + 'static,
{
    pub(crate) fn new(tree: TreeHandle<'a, C, Id, M>, id: Id) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn tree(&self) -> TreeHandle<'a, C, Id, M> {
        self.tree
    }

    fn key(&self) -> sea_orm::Value {
        self.id.clone().into()
    }

    async fn fetch_one(&self, stmt: Statement) -> Result<Option<M>, TreeError> {
        let row = closure::query_one(self.tree.connection(), stmt).await?;
        Ok(row.map(|row| M::from_query_result(&row, "")).transpose()?)
    }

    async fn walk(&self, walk: Walk<Id>) -> Result<Vec<Visit<Id>>, TreeError> {
        closure::run(self.tree.connection(), self.tree.config(), walk).await
    }

    pub async fn exists(&self) -> Result<bool, TreeError> {
        let stmt = self.tree.query().link_of(self.key());
        Ok(closure::query_one(self.tree.connection(), stmt)
            .await?
            .is_some())
    }

    pub async fn data(&self) -> Result<Option<M>, TreeError> {
        self.fetch_one(self.tree.query().by_id(self.key())).await
    }

    /// The row this node's parent column references. `None` for missing
    /// nodes and for roots of either convention.
    pub async fn parent_data(&self) -> Result<Option<M>, TreeError> {
        self.fetch_one(self.tree.query().parent_of(self.key(), None))
            .await
    }

    /// Rows whose parent column references this node, ordered by id, or
    /// `None` when there are none.
    pub async fn children_data(&self) -> Result<Option<Vec<M>>, TreeError> {
        let stmt = self.tree.query().children_of(self.key(), None);
        let rows = closure::query_all(self.tree.connection(), stmt).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let children = rows
            .iter()
            .map(|row| M::from_query_result(row, ""))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(children))
    }

    /// Whether the node exists and its parent is `NULL` or itself.
    pub async fn is_root(&self) -> Result<bool, TreeError> {
        let stmt = self.tree.query().link_of(self.key());
        let Some(row) = closure::query_one(self.tree.connection(), stmt).await? else {
            return Ok(false);
        };
        let parent = row.try_get::<Option<Id>>("", self.tree.config().parent_column())?;
        Ok(parent.map_or(true, |parent| parent == self.id))
    }

    /// Chain from the root down to this node, inclusive. The root is at
    /// level 0 and this node at its depth.
    pub async fn path(&self) -> Result<Option<Vec<Leveled<M>>>, TreeError> {
        let visits = self.walk(Walk::up(self.id.clone(), None, None)).await?;
        if visits.is_empty() {
            return Ok(None);
        }
        let mut path = visits
            .into_iter()
            .rev()
            .map(Visit::into_leveled::<M>)
            .collect::<Result<Vec<_>, _>>()?;
        for (level, step) in (0..).zip(path.iter_mut()) {
            step.level = level;
        }
        Ok(Some(path))
    }

    /// Chain from this node (level 0) up to the ancestor `target` (last),
    /// giving up past `max_level` hops. `None` when `target` is this node or
    /// is not an ancestor within the bound.
    pub async fn path_up_to(
        &self,
        target: Id,
        max_level: Option<i32>,
    ) -> Result<Option<Vec<Leveled<M>>>, TreeError> {
        if target == self.id {
            return Ok(None);
        }
        let visits = self
            .walk(Walk::up(self.id.clone(), Some(target.clone()), max_level))
            .await?;
        match visits.last() {
            Some(last) if last.id == target => {}
            _ => return Ok(None),
        }
        let path = visits
            .into_iter()
            .map(Visit::into_leveled::<M>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(path))
    }

    /// Chain from this node (level 0) down to the descendant `target`, which
    /// carries its distance from this node.
    pub async fn path_down_to(
        &self,
        target: Id,
        max_level: Option<i32>,
    ) -> Result<Option<Vec<Leveled<M>>>, TreeError> {
        let Some(mut path) = self
            .tree
            .node(target)
            .path_up_to(self.id.clone(), max_level)
            .await?
        else {
            return Ok(None);
        };
        let mut level = path.len() as i32 - 1;
        for step in path.iter_mut() {
            step.level = level;
            level -= 1;
        }
        path.reverse();
        Ok(Some(path))
    }

    /// The ancestor `id` with its distance from this node.
    pub async fn has_ancestor(
        &self,
        id: Id,
        max_level: Option<i32>,
    ) -> Result<Option<Leveled<M>>, TreeError> {
        if id == self.id {
            return Ok(None);
        }
        Ok(self
            .path_up_to(id, max_level)
            .await?
            .and_then(|mut path| path.pop()))
    }

    /// The descendant `id` with its distance from this node.
    pub async fn has_descendant(
        &self,
        id: Id,
        max_level: Option<i32>,
    ) -> Result<Option<Leveled<M>>, TreeError> {
        if id == self.id {
            return Ok(None);
        }
        let Some(path) = self
            .tree
            .node(id)
            .path_up_to(self.id.clone(), max_level)
            .await?
        else {
            return Ok(None);
        };
        let distance = path.last().map_or(0, |last| last.level);
        Ok(path.into_iter().next().map(|mut descendant| {
            descendant.level = distance;
            descendant
        }))
    }

    /// The row `id` if it is this node's direct parent.
    pub async fn has_parent(&self, id: Id) -> Result<Option<M>, TreeError> {
        if id == self.id {
            return Ok(None);
        }
        self.fetch_one(self.tree.query().parent_of(self.key(), Some(id.into())))
            .await
    }

    /// The row `id` if it is a direct child of this node.
    pub async fn has_child(&self, id: Id) -> Result<Option<M>, TreeError> {
        if id == self.id {
            return Ok(None);
        }
        self.fetch_one(self.tree.query().children_of(self.key(), Some(id.into())))
            .await
    }

    /// Every descendant of this node, by level then id, each carrying its
    /// distance from this node. Levels beyond `max_level` are not visited.
    /// `None` when nothing lies below this node.
    pub async fn descendants(
        &self,
        max_level: Option<i32>,
    ) -> Result<Option<Vec<Leveled<M>>>, TreeError> {
        let mut visits = self.walk(Walk::down(self.id.clone(), max_level)).await?;
        if visits.is_empty() {
            return Ok(None);
        }
        // the seed row is this node itself
        visits.remove(0);
        if visits.is_empty() {
            return Ok(None);
        }
        let descendants = visits
            .into_iter()
            .map(Visit::into_leveled::<M>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(descendants))
    }

    /// Lazily produced form of [`descendants`](Self::descendants).
    ///
    /// Issues one query per level, whatever the configured strategy, and
    /// yields a level's rows before fetching the next. Dropping the stream
    /// stops the walk.
    pub fn descendants_stream(
        &self,
        max_level: Option<i32>,
    ) -> impl Stream<Item = Result<Leveled<M>, TreeError>> + 'a {
        let levels = LevelWalk::new(
            self.tree.connection(),
            self.tree.config(),
            Walk::down(self.id.clone(), max_level),
        );
        stream::try_unfold(levels, |mut levels| async move {
            let next = levels.next_level().await?;
            Ok::<_, TreeError>(next.map(|visits| {
                let rows = visits
                    .into_iter()
                    .filter(|visit| visit.level > 0)
                    .map(Visit::into_leveled::<M>)
                    .collect::<Vec<_>>();
                (stream::iter(rows), levels)
            }))
        })
        .try_flatten()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use futures::TryStreamExt;
    use sea_orm::{DatabaseConnection, DbBackend, DbErr, FromQueryResult, MockDatabase, Value};

    use super::*;
    use crate::config::{TraversalStrategy, TreeConfig, TreeOptions};

    #[derive(Clone, Debug, PartialEq, FromQueryResult)]
    struct Node {
        id: i32,
        parent_id: Option<i32>,
        name: String,
    }

    type MockRow = BTreeMap<&'static str, Value>;

    fn row(id: i32, parent_id: Option<i32>, name: &str, level: Option<i32>) -> MockRow {
        let mut row = BTreeMap::from([
            ("id", Value::from(id)),
            ("parent_id", Value::from(parent_id)),
            ("name", Value::from(name)),
        ]);
        if let Some(level) = level {
            row.insert("tree_lv", Value::from(level));
        }
        row
    }

    fn tree<'a>(
        db: &'a DatabaseConnection,
        config: &'a TreeConfig,
    ) -> TreeHandle<'a, DatabaseConnection, i32, Node> {
        TreeHandle::new(db, config)
    }

    #[tokio::test]
    async fn self_queries_issue_no_statement() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let config = TreeConfig::new("nodes");
        {
            let node = tree(&db, &config).node(3);
            assert_eq!(node.has_child(3).await?, None);
            assert_eq!(node.has_parent(3).await?, None);
            assert_eq!(node.has_ancestor(3, None).await?, None);
            assert_eq!(node.has_descendant(3, Some(2)).await?, None);
            assert_eq!(node.path_up_to(3, None).await?, None);
            assert_eq!(node.path_down_to(3, None).await?, None);
        }
        assert!(db.into_transaction_log().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn path_is_releveled_from_the_root() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![
                row(3, Some(2), "c", Some(0)),
                row(2, Some(1), "b", Some(1)),
                row(1, None, "a", Some(2)),
            ]])
            .into_connection();
        let config = TreeConfig::new("nodes");

        let path = tree(&db, &config).node(3).path().await?.unwrap();
        let got: Vec<(i32, i32)> = path.iter().map(|step| (step.row.id, step.level)).collect();
        assert_eq!(got, vec![(1, 0), (2, 1), (3, 2)]);

        assert_eq!(db.into_transaction_log().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn path_up_to_requires_reaching_the_target() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![
                row(3, Some(2), "c", Some(0)),
                row(2, Some(1), "b", Some(1)),
            ]])
            .into_connection();
        let config = TreeConfig::new("nodes");

        assert_eq!(tree(&db, &config).node(3).path_up_to(1, Some(1)).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn has_descendant_reports_distance_from_the_caller() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![
                row(4, Some(2), "d", Some(0)),
                row(2, Some(1), "b", Some(1)),
                row(1, None, "a", Some(2)),
            ]])
            .into_connection();
        let config = TreeConfig::new("nodes");

        let found = tree(&db, &config).node(1).has_descendant(4, None).await?.unwrap();
        assert_eq!(found.row.id, 4);
        assert_eq!(found.level, 2);
        Ok(())
    }

    #[tokio::test]
    async fn descendants_drop_the_caller_row() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([
                vec![row(4, Some(2), "d", Some(0))],
                vec![
                    row(1, None, "a", Some(0)),
                    row(2, Some(1), "b", Some(1)),
                ],
            ])
            .into_connection();
        let config = TreeConfig::new("nodes");
        let tree = tree(&db, &config);

        assert_eq!(tree.node(4).descendants(None).await?, None);

        let below = tree.node(1).descendants(None).await?.unwrap();
        assert_eq!(below.len(), 1);
        assert_eq!(below[0].row.name, "b");
        assert_eq!(below[0].level, 1);
        Ok(())
    }

    #[tokio::test]
    async fn level_by_level_issues_one_statement_per_level() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Sqlite)
            .append_query_results([
                vec![row(1, None, "a", None)],
                vec![row(2, Some(1), "b", None)],
                vec![row(3, Some(2), "c", None), row(4, Some(2), "d", None)],
                vec![],
            ])
            .into_connection();
        let config = TreeOptions::default()
            .strategy(TraversalStrategy::LevelByLevel)
            .apply(TreeConfig::new("nodes"));

        let below = tree(&db, &config).node(1).descendants(None).await?.unwrap();
        let got: Vec<(i32, i32)> = below.iter().map(|step| (step.row.id, step.level)).collect();
        assert_eq!(got, vec![(2, 1), (3, 2), (4, 2)]);

        assert_eq!(db.into_transaction_log().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn level_by_level_stops_at_the_bound() -> Result<(), TreeError> {
        let db = MockDatabase::new(DbBackend::Sqlite)
            .append_query_results([
                vec![row(1, None, "a", None)],
                vec![row(2, Some(1), "b", None)],
            ])
            .into_connection();
        let config = TreeOptions::default()
            .strategy(TraversalStrategy::LevelByLevel)
            .apply(TreeConfig::new("nodes"));

        let below = tree(&db, &config).node(1).descendants(Some(1)).await?.unwrap();
        assert_eq!(below.len(), 1);
        assert_eq!(db.into_transaction_log().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn wide_levels_are_split_into_batches() -> Result<(), TreeError> {
        let children: Vec<MockRow> = (2..=1002)
            .map(|id| row(id, Some(1), "child", None))
            .collect();
        let db = MockDatabase::new(DbBackend::Sqlite)
            .append_query_results([
                vec![row(1, None, "a", None)],
                children,
                vec![row(2000, Some(2), "late", None)],
                vec![row(1500, Some(1002), "early", None)],
                vec![],
            ])
            .into_connection();
        let config = TreeOptions::default()
            .strategy(TraversalStrategy::LevelByLevel)
            .apply(TreeConfig::new("nodes"));

        let below = tree(&db, &config).node(1).descendants(None).await?.unwrap();
        assert_eq!(below.len(), 1003);
        let deepest: Vec<(i32, i32)> = below[1001..]
            .iter()
            .map(|step| (step.row.id, step.level))
            .collect();
        assert_eq!(deepest, vec![(1500, 2), (2000, 2)]);

        // seed, first level, two batches for the second, then the third
        assert_eq!(db.into_transaction_log().len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn store_failures_surface_as_errors() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_errors([
                DbErr::Custom("path".to_owned()),
                DbErr::Custom("data".to_owned()),
                DbErr::Custom("descendants".to_owned()),
                DbErr::Custom("stream".to_owned()),
            ])
            .into_connection();
        let config = TreeConfig::new("nodes");
        let node = tree(&db, &config).node(3);

        assert!(matches!(node.path().await, Err(TreeError::Query(_))));
        assert!(matches!(node.data().await, Err(TreeError::Query(_))));
        assert!(matches!(node.descendants(None).await, Err(TreeError::Query(_))));
        let streamed = node.descendants_stream(None).try_collect::<Vec<_>>().await;
        assert!(matches!(streamed, Err(TreeError::Query(_))));
    }
}
