use std::cmp::Ordering;

use sea_orm::{ConnectionTrait, FromQueryResult, QueryResult, Statement, Value};
use tracing::{debug, trace};

use crate::config::{TraversalStrategy, TreeConfig, LEVEL_COLUMN};
use crate::error::TreeError;
use crate::query::{Direction, TreeQuery, Walk};
use crate::row::Leveled;
use crate::traits::TreeId;

/// A row reached by a closure walk, with the columns the walk itself needs
/// already decoded.
pub(crate) struct Visit<Id> {
    pub id: Id,
    pub parent: Option<Id>,
    pub level: i32,
    result: QueryResult,
}

impl<Id: TreeId> Visit<Id> {
    fn decode(result: QueryResult, config: &TreeConfig, level: i32) -> Result<Self, TreeError> {
        let id = result.try_get::<Id>("", config.id_column())?;
        let parent = result.try_get::<Option<Id>>("", config.parent_column())?;
        Ok(Self {
            id,
            parent,
            level,
            result,
        })
    }

    fn decode_leveled(result: QueryResult, config: &TreeConfig) -> Result<Self, TreeError> {
        let level = result.try_get::<i32>("", LEVEL_COLUMN)?;
        Self::decode(result, config, level)
    }

    pub fn into_leveled<M: FromQueryResult>(self) -> Result<Leveled<M>, TreeError> {
        let row = M::from_query_result(&self.result, "")?;
        Ok(Leveled::new(row, self.level))
    }
}

/// Evaluate `walk` with the configured strategy. Rows come back ordered by
/// level, then by id.
pub(crate) async fn run<C, Id>(
    conn: &C,
    config: &TreeConfig,
    walk: Walk<Id>,
) -> Result<Vec<Visit<Id>>, TreeError>
where
    C: ConnectionTrait,
    Id: TreeId,
{
    debug!(
        table = config.table(),
        direction = ?walk.direction,
        seed = ?walk.seed,
        stop_at = ?walk.stop_at,
        max_level = ?walk.max_level,
        strategy = ?config.strategy(),
        "walking tree"
    );

    match config.strategy() {
        TraversalStrategy::RecursiveQuery => {
            let walk = Walk {
                direction: walk.direction,
                seed: walk.seed.into(),
                stop_at: walk.stop_at.map(Into::into),
                max_level: walk.max_level,
            };
            let stmt = TreeQuery::new(config, conn.get_database_backend()).closure(&walk);
            let rows = query_all(conn, stmt).await?;
            rows.into_iter()
                .map(|row| Visit::<Id>::decode_leveled(row, config))
                .collect()
        }
        TraversalStrategy::LevelByLevel => {
            let mut levels = LevelWalk::new(conn, config, walk);
            let mut visits = Vec::new();
            while let Some(mut level) = levels.next_level().await? {
                visits.append(&mut level);
            }
            Ok(visits)
        }
    }
}

pub(crate) async fn query_all<C: ConnectionTrait>(
    conn: &C,
    stmt: Statement,
) -> Result<Vec<QueryResult>, TreeError> {
    trace!(sql = %stmt.sql, "issuing tree query");
    Ok(conn.query_all(stmt).await?)
}

pub(crate) async fn query_one<C: ConnectionTrait>(
    conn: &C,
    stmt: Statement,
) -> Result<Option<QueryResult>, TreeError> {
    trace!(sql = %stmt.sql, "issuing tree query");
    Ok(conn.query_one(stmt).await?)
}

/// Most keys bound into a single level query. Backends cap the number of
/// bind variables per statement (32766 on SQLite).
pub(crate) const STEP_BATCH: usize = 1000;

enum Frontier<Id> {
    Seed,
    Rows(Vec<(Id, Option<Id>)>),
    Exhausted,
}

/// Breadth-first evaluation of a closure, one query per level.
pub(crate) struct LevelWalk<'a, C, Id> {
    conn: &'a C,
    config: &'a TreeConfig,
    walk: Walk<Id>,
    frontier: Frontier<Id>,
    level: i32,
}

impl<'a, C, Id> LevelWalk<'a, C, Id>
where
    C: ConnectionTrait,
    Id: TreeId,
{
    pub fn new(conn: &'a C, config: &'a TreeConfig, walk: Walk<Id>) -> Self {
        Self {
            conn,
            config,
            walk,
            frontier: Frontier::Seed,
            level: 0,
        }
    }

    /// Keys to expand from the current frontier, or `None` when the walk is
    /// over. Rows at the bound, the stop row and self-referencing rows do
    /// not expand.
    fn expandable(&self, rows: &[(Id, Option<Id>)]) -> Option<Vec<Value>> {
        if let Some(max_level) = self.walk.max_level {
            if self.level - 1 >= max_level {
                return None;
            }
        }
        let keys: Vec<Value> = rows
            .iter()
            .filter(|(id, _)| self.walk.stop_at.as_ref() != Some(id))
            .filter_map(|(id, parent)| match self.walk.direction {
                Direction::Up => parent
                    .as_ref()
                    .filter(|parent| *parent != id)
                    .map(|parent| parent.clone().into()),
                Direction::Down => Some(id.clone().into()),
            })
            .collect();
        (!keys.is_empty()).then_some(keys)
    }

    /// Fetch the next level of the walk. The first call yields the seed row.
    ///
    /// A wide frontier is expanded in batches of `STEP_BATCH` keys; the
    /// level's rows are then put back in id order.
    pub async fn next_level(&mut self) -> Result<Option<Vec<Visit<Id>>>, TreeError> {
        let query = TreeQuery::new(self.config, self.conn.get_database_backend());
        let statements: Vec<Statement> =
            match std::mem::replace(&mut self.frontier, Frontier::Exhausted) {
                Frontier::Exhausted => return Ok(None),
                Frontier::Seed => vec![query.by_id(self.walk.seed.clone().into())],
                Frontier::Rows(rows) => match self.expandable(&rows) {
                    Some(keys) => keys
                        .chunks(STEP_BATCH)
                        .map(|batch| query.step(self.walk.direction, batch.to_vec()))
                        .collect(),
                    None => return Ok(None),
                },
            };
        let batched = statements.len() > 1;

        let mut visits = Vec::new();
        for stmt in statements {
            for row in query_all(self.conn, stmt).await? {
                visits.push(Visit::<Id>::decode(row, self.config, self.level)?);
            }
        }
        if visits.is_empty() {
            return Ok(None);
        }
        if batched {
            visits.sort_by(|a, b| a.id.partial_cmp(&b.id).unwrap_or(Ordering::Equal));
        }

        trace!(level = self.level, rows = visits.len(), "tree level fetched");
        self.frontier = Frontier::Rows(
            visits
                .iter()
                .map(|visit| (visit.id.clone(), visit.parent.clone()))
                .collect(),
        );
        self.level += 1;
        Ok(Some(visits))
    }
}
