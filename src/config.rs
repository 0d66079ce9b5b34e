use serde::Deserialize;

use crate::error::TreeError;

/// Name of the synthesized column carrying the traversal level.
///
/// The column only exists in traversal results; a persisted column with the
/// same name would be shadowed.
pub const LEVEL_COLUMN: &str = "tree_lv";

/// Static configuration describing which table and columns hold the
/// adjacency list.
#[derive(Clone, Debug)]
pub struct TreeConfig {
    table: String,
    id_column: String,
    parent_column: String,
    strategy: TraversalStrategy,
}

impl TreeConfig {
    /// Create a new configuration for `table` using the default column names
    /// (`id`, `parent_id`) and the recursive-query strategy.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            parent_column: "parent_id".to_string(),
            strategy: TraversalStrategy::default(),
        }
    }

    /// Parse [`TreeOptions`] from JSON and build a validated configuration.
    ///
    /// The `table` key is required.
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let options: TreeOptions = serde_json::from_str(json)?;
        let table = options
            .table
            .clone()
            .ok_or_else(|| TreeError::config("`table` is required"))?;
        let config = options.apply(TreeConfig::new(table));
        config.validate()?;
        Ok(config)
    }

    /// Merge options produced by [`TreeOptions`].
    pub(crate) fn apply_options(mut self, options: TreeOptions) -> Self {
        if let Some(table) = options.table {
            self.table = table;
        }
        if let Some(id_column) = options.id_column {
            self.id_column = id_column;
        }
        if let Some(parent_column) = options.parent_column {
            self.parent_column = parent_column;
        }
        if let Some(strategy) = options.strategy {
            self.strategy = strategy;
        }
        self
    }

    /// Check that the configured names can describe an adjacency list.
    pub fn validate(&self) -> Result<(), TreeError> {
        for (what, value) in [
            ("table", &self.table),
            ("id column", &self.id_column),
            ("parent column", &self.parent_column),
        ] {
            if value.trim().is_empty() {
                return Err(TreeError::config(format!("{what} name is empty")));
            }
        }
        if self.id_column == self.parent_column {
            return Err(TreeError::config(format!(
                "id and parent columns are both `{}`",
                self.id_column
            )));
        }
        if self.id_column == LEVEL_COLUMN || self.parent_column == LEVEL_COLUMN {
            return Err(TreeError::config(format!(
                "`{LEVEL_COLUMN}` is reserved for traversal levels"
            )));
        }
        Ok(())
    }

    /// Table holding the tree rows.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column storing the row identifier.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Column storing the parent identifier.
    pub fn parent_column(&self) -> &str {
        &self.parent_column
    }

    /// How recursive closures are evaluated.
    pub fn strategy(&self) -> TraversalStrategy {
        self.strategy
    }
}

/// Builder-style options, also accepted as serialized configuration and
/// consumed by the derive macro.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeOptions {
    table: Option<String>,
    id_column: Option<String>,
    parent_column: Option<String>,
    strategy: Option<TraversalStrategy>,
}

impl TreeOptions {
    pub fn table(mut self, value: impl Into<String>) -> Self {
        self.table = Some(value.into());
        self
    }

    pub fn id_column(mut self, value: impl Into<String>) -> Self {
        self.id_column = Some(value.into());
        self
    }

    pub fn parent_column(mut self, value: impl Into<String>) -> Self {
        self.parent_column = Some(value.into());
        self
    }

    pub fn strategy(mut self, strategy: TraversalStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn apply(self, base: TreeConfig) -> TreeConfig {
        base.apply_options(self)
    }
}

/// Evaluation strategy for the recursive closure behind path and subtree
/// queries.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalStrategy {
    /// A single `WITH RECURSIVE` statement evaluated by the database.
    RecursiveQuery,
    /// One plain `SELECT` per tree level, driven from application code.
    /// For stores without recursive query support.
    LevelByLevel,
}

impl Default for TraversalStrategy {
    fn default() -> Self {
        Self::RecursiveQuery
    }
}
