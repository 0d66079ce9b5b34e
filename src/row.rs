use sea_orm::{DbErr, FromQueryResult, JsonValue, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::config::LEVEL_COLUMN;

/// A table row with arbitrary columns, keyed by column name.
///
/// Used when the caller has no SeaORM model for the table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, JsonValue>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.0
    }
}

impl From<Map<String, JsonValue>> for Row {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl FromQueryResult for Row {
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        match JsonValue::from_query_result(res, pre)? {
            JsonValue::Object(mut map) => {
                map.remove(LEVEL_COLUMN);
                Ok(Self(map))
            }
            other => Err(DbErr::Type(format!("expected a row object, got {other}"))),
        }
    }
}

/// A row decorated with its distance from the node a traversal started at.
///
/// Serializes as the row's own fields plus `TreeLv`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Leveled<M> {
    #[serde(flatten)]
    pub row: M,
    #[serde(rename = "TreeLv")]
    pub level: i32,
}

impl<M> Leveled<M> {
    pub fn new(row: M, level: i32) -> Self {
        Self { row, level }
    }

    pub fn into_row(self) -> M {
        self.row
    }
}
