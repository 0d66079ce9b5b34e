use sea_orm::sea_query::{
    Alias, ColumnRef, CommonTableExpression, Cond, Expr, IntoIden, JoinType, Order, Query,
    QueryStatementBuilder, SelectStatement, UnionType, WithClause,
};
use sea_orm::{DbBackend, Statement, Value};

use crate::config::{TreeConfig, LEVEL_COLUMN};

const WALK_TABLE: &str = "tree_walk";
const FRONTIER: &str = "frontier";
const CANDIDATE: &str = "candidate";
const PARENT: &str = "parent";
const NODE: &str = "node";

/// Which way a closure follows the parent reference.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Direction {
    /// Towards the root: the candidate is the frontier row's parent.
    Up,
    /// Towards the leaves: the candidate's parent is the frontier row.
    Down,
}

/// Parameters of one recursive closure.
#[derive(Clone, Debug)]
pub(crate) struct Walk<Id> {
    pub direction: Direction,
    pub seed: Id,
    pub stop_at: Option<Id>,
    pub max_level: Option<i32>,
}

impl<Id> Walk<Id> {
    pub fn up(seed: Id, stop_at: Option<Id>, max_level: Option<i32>) -> Self {
        Self {
            direction: Direction::Up,
            seed,
            stop_at,
            max_level,
        }
    }

    pub fn down(seed: Id, max_level: Option<i32>) -> Self {
        Self {
            direction: Direction::Down,
            seed,
            stop_at: None,
            max_level,
        }
    }
}

/// Builds the statements issued against the configured table, rendered for
/// one database backend.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TreeQuery<'a> {
    config: &'a TreeConfig,
    backend: DbBackend,
}

impl<'a> TreeQuery<'a> {
    pub fn new(config: &'a TreeConfig, backend: DbBackend) -> Self {
        Self { config, backend }
    }

    fn table(&self) -> Alias {
        Alias::new(self.config.table())
    }

    fn id(&self) -> Alias {
        Alias::new(self.config.id_column())
    }

    fn parent(&self) -> Alias {
        Alias::new(self.config.parent_column())
    }

    fn build<S: QueryStatementBuilder>(&self, statement: &S) -> Statement {
        let (sql, values) = statement.build_any(&*self.backend.get_query_builder());
        Statement::from_sql_and_values(self.backend, sql, values.0)
    }

    pub fn all_rows(&self) -> Statement {
        let select = Query::select()
            .column(ColumnRef::Asterisk)
            .from(self.table())
            .to_owned();
        self.build(&select)
    }

    /// Rows carrying either root marker.
    pub fn roots(&self) -> Statement {
        let select = Query::select()
            .column(ColumnRef::Asterisk)
            .from(self.table())
            .cond_where(
                Cond::any()
                    .add(Expr::col(self.parent()).is_null())
                    .add(Expr::col(self.parent()).equals(self.id())),
            )
            .order_by(self.id(), Order::Asc)
            .to_owned();
        self.build(&select)
    }

    /// Point lookup of a full row.
    pub fn by_id(&self, id: Value) -> Statement {
        let select = Query::select()
            .column(ColumnRef::Asterisk)
            .from(self.table())
            .and_where(Expr::col(self.id()).eq(id))
            .limit(1)
            .to_owned();
        self.build(&select)
    }

    /// Point lookup of the id and parent columns only.
    pub fn link_of(&self, id: Value) -> Statement {
        let select = Query::select()
            .column(self.id())
            .column(self.parent())
            .from(self.table())
            .and_where(Expr::col(self.id()).eq(id))
            .limit(1)
            .to_owned();
        self.build(&select)
    }

    /// Parent-join lookup: the row referenced by `child`'s parent column,
    /// optionally required to be `expected`. A self-referencing root has no
    /// parent.
    pub fn parent_of(&self, child: Value, expected: Option<Value>) -> Statement {
        let (parent, node) = (Alias::new(PARENT), Alias::new(NODE));
        let mut select = Query::select();
        select
            .column(ColumnRef::TableAsterisk(parent.clone().into_iden()))
            .from_as(self.table(), parent.clone())
            .join_as(
                JoinType::InnerJoin,
                self.table(),
                node.clone(),
                Expr::col((parent.clone(), self.id())).equals((node.clone(), self.parent())),
            )
            .and_where(Expr::col((node.clone(), self.id())).eq(child))
            .and_where(Expr::col((parent.clone(), self.id())).not_equals((node, self.id())));
        if let Some(expected) = expected {
            select.and_where(Expr::col((parent, self.id())).eq(expected));
        }
        select.limit(1);
        self.build(&select)
    }

    /// Children-filter lookup: rows whose parent column is `parent`,
    /// optionally narrowed to the row `only`. A self-referencing root is not
    /// its own child.
    pub fn children_of(&self, parent: Value, only: Option<Value>) -> Statement {
        let mut select = Query::select();
        select
            .column(ColumnRef::Asterisk)
            .from(self.table())
            .and_where(Expr::col(self.parent()).eq(parent))
            .and_where(Expr::col(self.id()).not_equals(self.parent()));
        if let Some(only) = only {
            select.and_where(Expr::col(self.id()).eq(only));
        }
        select.order_by(self.id(), Order::Asc);
        self.build(&select)
    }

    /// One level of a closure walked from application code: the rows
    /// reached from `frontier` in `direction`.
    ///
    /// Up: `frontier` holds the parent ids to fetch. Down: `frontier` holds
    /// the ids whose children to fetch.
    pub fn step(&self, direction: Direction, frontier: Vec<Value>) -> Statement {
        let mut select = Query::select();
        select.column(ColumnRef::Asterisk).from(self.table());
        match direction {
            Direction::Up => {
                select.and_where(Expr::col(self.id()).is_in(frontier));
            }
            Direction::Down => {
                select
                    .and_where(Expr::col(self.parent()).is_in(frontier))
                    .and_where(Expr::col(self.id()).not_equals(self.parent()));
            }
        }
        select.order_by(self.id(), Order::Asc);
        self.build(&select)
    }

    /// The recursive closure: seed row at level 0, then repeatedly join
    /// candidates to the frontier until nothing new is produced.
    pub fn closure(&self, walk: &Walk<Value>) -> Statement {
        let (frontier, candidate) = (Alias::new(FRONTIER), Alias::new(CANDIDATE));
        let (walk_table, level) = (Alias::new(WALK_TABLE), Alias::new(LEVEL_COLUMN));

        let mut seed = Query::select()
            .column(ColumnRef::TableAsterisk(self.table().into_iden()))
            .expr_as(Expr::val(0i32), level.clone())
            .from(self.table())
            .and_where(Expr::col((self.table(), self.id())).eq(walk.seed.clone()))
            .to_owned();

        let link = match walk.direction {
            Direction::Up => {
                Expr::col((candidate.clone(), self.id())).equals((frontier.clone(), self.parent()))
            }
            Direction::Down => {
                Expr::col((candidate.clone(), self.parent())).equals((frontier.clone(), self.id()))
            }
        };

        let mut step = Query::select();
        step.column(ColumnRef::TableAsterisk(candidate.clone().into_iden()))
            .expr_as(
                Expr::col((frontier.clone(), level.clone())).add(1i32),
                level.clone(),
            )
            .from_as(walk_table.clone(), frontier.clone())
            .join_as(JoinType::InnerJoin, self.table(), candidate.clone(), link)
            .and_where(
                Expr::col((candidate, self.id())).not_equals((frontier.clone(), self.id())),
            );
        if let Some(stop_at) = &walk.stop_at {
            step.and_where(Expr::col((frontier.clone(), self.id())).ne(stop_at.clone()));
        }
        if let Some(max_level) = walk.max_level {
            step.and_where(Expr::col((frontier, level.clone())).lt(max_level));
        }

        let cte = CommonTableExpression::new()
            .query(seed.union(UnionType::Distinct, step).to_owned())
            .table_name(walk_table.clone())
            .to_owned();

        let select: SelectStatement = Query::select()
            .column(ColumnRef::Asterisk)
            .from(walk_table)
            .order_by(level, Order::Asc)
            .order_by(self.id(), Order::Asc)
            .to_owned();

        let query = select.with(WithClause::new().recursive(true).cte(cte).to_owned());
        self.build(&query)
    }
}
