//! sea-orm backed gateway for Postgres and SQLite.
//!
//! Statements are built dynamically with sea-query against the table and
//! column names declared on each [`EntitySpec`]; the engine has no compiled
//! entity models because the schemas are owned by the application being
//! seeded.

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Order, Query, SimpleExpr};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, QueryResult, Value,
};
use tracing::{debug, info};

use crate::errors::GatewayError;
use crate::fixture::{FixtureValue, Row, ValueType, ID_COLUMN, TENANT_COLUMN};
use crate::gateway::{DataAccessGateway, RowId};
use crate::registry::{EntitySpec, Scope};

pub struct SqlGateway {
    db: DatabaseConnection,
}

impl SqlGateway {
    /// Connect with the same pool settings the platform services use.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, GatewayError> {
        let mut options = ConnectOptions::new(url.to_owned());
        options
            .max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        info!(max_connections, "connecting to datastore");
        let db = Database::connect(options)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        debug!("datastore connection established");
        Ok(Self { db })
    }

    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Columns the gateway reads back for an entity, with their storage
    /// types. Ids and foreign keys are integral by convention.
    fn select_columns(spec: &EntitySpec) -> Vec<(String, ValueType)> {
        let mut cols = vec![(ID_COLUMN.to_string(), ValueType::Int)];
        if spec.scope == Scope::PerTenant {
            cols.push((TENANT_COLUMN.to_string(), ValueType::Int));
        }
        for parent in &spec.parent_refs {
            cols.push((parent.fk_field.clone(), ValueType::Int));
        }
        for field in &spec.fields {
            cols.push((field.column.clone(), field.kind.value_type()));
        }
        cols.dedup_by(|a, b| a.0 == b.0);
        cols
    }

    fn read_row(
        spec: &EntitySpec,
        result: &QueryResult,
    ) -> Result<Row, GatewayError> {
        let mut row = Row::new();
        for (col, ty) in Self::select_columns(spec) {
            let value = read_value(result, &col, ty)
                .map_err(|e| classify(&spec.name, e))?;
            if let Some(value) = value {
                row.insert(col, value);
            }
        }
        Ok(row)
    }

    fn base_select(
        spec: &EntitySpec,
        tenant_id: Option<i64>,
    ) -> sea_orm::sea_query::SelectStatement {
        let mut query = Query::select();
        query.from(Alias::new(spec.table_key.as_str()));
        for (col, _) in Self::select_columns(spec) {
            query.column(Alias::new(col));
        }
        if let Some(tenant) = tenant_id {
            query.and_where(Expr::col(Alias::new(TENANT_COLUMN)).eq(tenant));
        }
        query.order_by(Alias::new(ID_COLUMN), Order::Asc);
        query
    }

    async fn run_select(
        &self,
        spec: &EntitySpec,
        query: sea_orm::sea_query::SelectStatement,
    ) -> Result<Vec<Row>, GatewayError> {
        let stmt = self.db.get_database_backend().build(&query);
        let results = self
            .db
            .query_all(stmt)
            .await
            .map_err(|e| classify(&spec.name, e))?;
        results.iter().map(|r| Self::read_row(spec, r)).collect()
    }
}

#[async_trait]
impl DataAccessGateway for SqlGateway {
    async fn query_by_tenant(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
    ) -> Result<Vec<Row>, GatewayError> {
        self.run_select(spec, Self::base_select(spec, tenant_id)).await
    }

    async fn query_by_tenant_and_parent(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
        parent_fk: &str,
        parent_id: RowId,
    ) -> Result<Vec<Row>, GatewayError> {
        let mut query = Self::base_select(spec, tenant_id);
        query.and_where(Expr::col(Alias::new(parent_fk)).eq(parent_id));
        self.run_select(spec, query).await
    }

    async fn exists_by_unique_key(
        &self,
        spec: &EntitySpec,
        key: &[(String, FixtureValue)],
    ) -> Result<bool, GatewayError> {
        let mut query = Query::select();
        query
            .expr(Expr::val(1))
            .from(Alias::new(spec.table_key.as_str()))
            .limit(1);
        for (col, value) in key {
            query.and_where(Expr::col(Alias::new(col.as_str())).eq(to_db_value(value)));
        }
        let stmt = self.db.get_database_backend().build(&query);
        let found = self
            .db
            .query_one(stmt)
            .await
            .map_err(|e| classify(&spec.name, e))?;
        Ok(found.is_some())
    }

    async fn insert(&self, spec: &EntitySpec, row: Row) -> Result<RowId, GatewayError> {
        let mut insert = Query::insert();
        insert.into_table(Alias::new(spec.table_key.as_str()));
        insert.columns(row.keys().map(|k| Alias::new(k.as_str())));
        let values: Vec<SimpleExpr> = row.values().map(|v| to_db_value(v).into()).collect();
        insert
            .values(values)
            .map_err(|e| GatewayError::Query {
                entity: spec.name.clone(),
                message: e.to_string(),
            })?
            .returning_col(Alias::new(ID_COLUMN));

        let stmt = self.db.get_database_backend().build(&insert);
        let result = self
            .db
            .query_one(stmt)
            .await
            .map_err(|e| classify(&spec.name, e))?
            .ok_or_else(|| GatewayError::Query {
                entity: spec.name.clone(),
                message: "insert returned no id".into(),
            })?;
        result
            .try_get::<i64>("", ID_COLUMN)
            .map_err(|e| classify(&spec.name, e))
    }
}

fn to_db_value(value: &FixtureValue) -> Value {
    match value {
        FixtureValue::Null => Value::String(None),
        FixtureValue::Bool(b) => Value::Bool(Some(*b)),
        FixtureValue::Int(n) => Value::BigInt(Some(*n)),
        FixtureValue::Decimal(d) => Value::Decimal(Some(Box::new(*d))),
        FixtureValue::Text(s) => Value::String(Some(Box::new(s.clone()))),
        FixtureValue::Timestamp(t) => Value::ChronoDateTimeUtc(Some(Box::new(*t))),
        FixtureValue::Uuid(u) => Value::Uuid(Some(Box::new(*u))),
    }
}

fn read_value(
    result: &QueryResult,
    col: &str,
    ty: ValueType,
) -> Result<Option<FixtureValue>, DbErr> {
    Ok(match ty {
        ValueType::Bool => result
            .try_get::<Option<bool>>("", col)?
            .map(FixtureValue::Bool),
        ValueType::Int => result
            .try_get::<Option<i64>>("", col)?
            .map(FixtureValue::Int),
        ValueType::Decimal => result
            .try_get::<Option<rust_decimal::Decimal>>("", col)?
            .map(FixtureValue::Decimal),
        ValueType::Text => result
            .try_get::<Option<String>>("", col)?
            .map(FixtureValue::Text),
        ValueType::Timestamp => result
            .try_get::<Option<chrono::DateTime<chrono::Utc>>>("", col)?
            .map(FixtureValue::Timestamp),
        ValueType::Uuid => result
            .try_get::<Option<uuid::Uuid>>("", col)?
            .map(FixtureValue::Uuid),
    })
}

/// Map a sea-orm error onto the gateway taxonomy: connectivity problems are
/// fatal, unique violations are counted, everything else is a query error.
fn classify(entity: &str, err: DbErr) -> GatewayError {
    match &err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => GatewayError::Unavailable(err.to_string()),
        _ => {
            let message = err.to_string();
            let lowered = message.to_lowercase();
            if lowered.contains("unique") || lowered.contains("duplicate") {
                GatewayError::Constraint {
                    entity: entity.to_string(),
                    message,
                }
            } else {
                GatewayError::Query {
                    entity: entity.to_string(),
                    message,
                }
            }
        }
    }
}
