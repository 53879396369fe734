use crate::error::{PersistenceError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Primary key of every row.
pub const ID_FIELD: &str = "id";

/// Storage operations a [`Repository`](crate::Repository) runs against.
///
/// Implemented by the [`DataSource`](crate::DataSource) for ambient access
/// and by the [`EntityManager`](crate::EntityManager) inside a transaction.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Insert `row`, assigning an id when it has none. Returns the stored row.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Every row of `table`, in id order.
    async fn select(&self, table: &str) -> Result<Vec<Value>>;

    /// Remove every row of `table`.
    async fn clear(&self, table: &str) -> Result<()>;
}

/// Committed rows, per table, keyed by id.
#[derive(Debug, Default, Clone)]
pub(crate) struct Store {
    tables: HashMap<String, BTreeMap<i64, Value>>,
}

impl Store {
    pub(crate) fn create_table(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub(crate) fn insert(&mut self, table: &str, id: i64, row: Value) {
        self.tables.entry(table.to_string()).or_default().insert(id, row);
    }

    pub(crate) fn rows(&self, table: &str) -> BTreeMap<i64, Value> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    pub(crate) fn clear(&mut self, table: &str) {
        if let Some(rows) = self.tables.get_mut(table) {
            rows.clear();
        }
    }

    pub(crate) fn clear_all(&mut self) {
        self.tables.values_mut().for_each(BTreeMap::clear);
    }

    pub(crate) fn drop_all(&mut self) {
        self.tables.clear();
    }
}

/// Set the id of `row`, allocating one with `next_id` if it is missing or `null`.
pub(crate) fn assign_id(
    table: &str,
    mut row: Value,
    next_id: impl FnOnce() -> i64,
) -> Result<(i64, Value)> {
    let object = row.as_object_mut().ok_or_else(|| PersistenceError::InvalidRow {
        table: table.to_string(),
    })?;
    let id = match object.get(ID_FIELD).and_then(Value::as_i64) {
        Some(id) => id,
        None => {
            let id = next_id();
            object.insert(ID_FIELD.to_string(), Value::from(id));
            id
        }
    };
    Ok((id, row))
}
