//! In-process gateway used by tests and `--dry-run` invocations.
//!
//! Emulates the pieces of datastore behaviour the engine relies on: id
//! assignment, tenant filtering, and unique constraints declared on the
//! entity spec.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::fixture::{FixtureValue, Row, ID_COLUMN, TENANT_COLUMN};
use crate::gateway::{DataAccessGateway, RowId};
use crate::registry::EntitySpec;

#[derive(Default)]
struct Table {
    next_id: RowId,
    rows: Vec<Row>,
}

impl Table {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows stored for a table. Test helper.
    pub fn row_count(&self, table_key: &str) -> usize {
        self.tables
            .lock()
            .expect("memory gateway lock poisoned")
            .get(table_key)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// Snapshot of a table's rows, in insertion order. Test helper.
    pub fn rows(&self, table_key: &str) -> Vec<Row> {
        self.tables
            .lock()
            .expect("memory gateway lock poisoned")
            .get(table_key)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Insert a row with a caller-chosen id, bypassing generation. Used to
    /// stage pre-existing data (e.g. the reserved system tenant).
    pub fn put(&self, table_key: &str, id: RowId, mut row: Row) {
        let mut tables = self.tables.lock().expect("memory gateway lock poisoned");
        let table = tables
            .entry(table_key.to_string())
            .or_insert_with(Table::new);
        row.insert(ID_COLUMN.to_string(), FixtureValue::Int(id));
        table.next_id = table.next_id.max(id + 1);
        table.rows.push(row);
    }

    fn matches_tenant(row: &Row, tenant_id: Option<i64>) -> bool {
        match tenant_id {
            None => true,
            Some(t) => row.get(TENANT_COLUMN).and_then(FixtureValue::as_i64) == Some(t),
        }
    }
}

#[async_trait]
impl DataAccessGateway for MemoryGateway {
    async fn query_by_tenant(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
    ) -> Result<Vec<Row>, GatewayError> {
        let tables = self.tables.lock().expect("memory gateway lock poisoned");
        Ok(tables
            .get(&spec.table_key)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|r| Self::matches_tenant(r, tenant_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_by_tenant_and_parent(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
        parent_fk: &str,
        parent_id: RowId,
    ) -> Result<Vec<Row>, GatewayError> {
        let tables = self.tables.lock().expect("memory gateway lock poisoned");
        Ok(tables
            .get(&spec.table_key)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|r| Self::matches_tenant(r, tenant_id))
                    .filter(|r| {
                        r.get(parent_fk).and_then(FixtureValue::as_i64) == Some(parent_id)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn exists_by_unique_key(
        &self,
        spec: &EntitySpec,
        key: &[(String, FixtureValue)],
    ) -> Result<bool, GatewayError> {
        let tables = self.tables.lock().expect("memory gateway lock poisoned");
        Ok(tables
            .get(&spec.table_key)
            .map(|t| {
                t.rows.iter().any(|row| {
                    key.iter()
                        .all(|(col, value)| row.get(col) == Some(value))
                })
            })
            .unwrap_or(false))
    }

    async fn insert(&self, spec: &EntitySpec, mut row: Row) -> Result<RowId, GatewayError> {
        let mut tables = self.tables.lock().expect("memory gateway lock poisoned");
        let table = tables
            .entry(spec.table_key.clone())
            .or_insert_with(Table::new);

        if !spec.unique_key.is_empty() {
            let clash = table.rows.iter().any(|existing| {
                spec.unique_key
                    .iter()
                    .all(|col| existing.get(col).is_some() && existing.get(col) == row.get(col))
            });
            if clash {
                return Err(GatewayError::Constraint {
                    entity: spec.name.clone(),
                    message: format!("unique key {:?} already present", spec.unique_key),
                });
            }
        }

        let id = table.next_id;
        table.next_id += 1;
        row.insert(ID_COLUMN.to_string(), FixtureValue::Int(id));
        table.rows.push(row);
        Ok(id)
    }
}
