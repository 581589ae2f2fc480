//! Narrow data-access contract the seeding engine depends on.
//!
//! The orchestrator never talks to a storage engine directly; everything goes
//! through [`DataAccessGateway`]. [`MemoryGateway`] backs tests and dry runs,
//! [`SqlGateway`] talks to Postgres or SQLite through sea-orm.

pub mod memory;
pub mod sql;

use async_trait::async_trait;

use crate::errors::GatewayError;
use crate::fixture::{FixtureValue, Row};
use crate::registry::EntitySpec;

pub use memory::MemoryGateway;
pub use sql::SqlGateway;

pub type RowId = i64;

#[async_trait]
pub trait DataAccessGateway: Send + Sync {
    /// All rows of `spec`, scoped to a tenant when `tenant_id` is set,
    /// ordered by id so repeat runs observe the same sequence.
    async fn query_by_tenant(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
    ) -> Result<Vec<Row>, GatewayError>;

    /// Child rows of `spec` referencing `parent_id` through `parent_fk`.
    async fn query_by_tenant_and_parent(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
        parent_fk: &str,
        parent_id: RowId,
    ) -> Result<Vec<Row>, GatewayError>;

    /// Whether a row matching the unique-key tuple already exists.
    async fn exists_by_unique_key(
        &self,
        spec: &EntitySpec,
        key: &[(String, FixtureValue)],
    ) -> Result<bool, GatewayError>;

    /// Insert one row, returning the assigned id. The datastore's unique
    /// constraints are the source of truth for upsert races; violations come
    /// back as [`GatewayError::Constraint`].
    async fn insert(&self, spec: &EntitySpec, row: Row) -> Result<RowId, GatewayError>;

    /// Insert several rows. The default implementation loops over `insert`
    /// and stops at the first error.
    async fn insert_batch(
        &self,
        spec: &EntitySpec,
        rows: Vec<Row>,
    ) -> Result<Vec<RowId>, GatewayError> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(self.insert(spec, row).await?);
        }
        Ok(ids)
    }
}
