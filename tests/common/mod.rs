//! Shared fixtures for the integration suites: small registries mirroring
//! the company -> client -> invoice shape, and gateway wrappers that inject
//! controlled failures.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use opsledger_seeder::fixture::{FieldKind, FieldSpec, FixtureValue, Row, ValueType};
use opsledger_seeder::registry::{CountPolicy, EntitySpec, Registry, Scope};
use opsledger_seeder::{DataAccessGateway, GatewayError, MemoryGateway};

pub fn text_choice(column: &str, values: &[&str]) -> FieldSpec {
    FieldSpec::new(
        column,
        FieldKind::ElementOf(
            values
                .iter()
                .map(|v| FixtureValue::Text(v.to_string()))
                .collect(),
        ),
    )
}

/// Unique-ish email composer: the 5-digit draw keeps collisions rare while
/// staying fully seed-deterministic.
pub fn email_field() -> FieldSpec {
    FieldSpec::new(
        "email",
        FieldKind::Compose(
            ValueType::Text,
            Arc::new(|rng, _ctx| {
                Ok(FixtureValue::Text(format!(
                    "user{:05}@fixture.test",
                    rng.int_in(0, 99_999)?
                )))
            }),
        ),
    )
}

pub fn invoice_number_field() -> FieldSpec {
    FieldSpec::new(
        "number",
        FieldKind::Compose(
            ValueType::Text,
            Arc::new(|rng, _ctx| {
                Ok(FixtureValue::Text(format!(
                    "INV-{:06}",
                    rng.int_in(1, 999_999)?
                )))
            }),
        ),
    )
}

/// companies (global, fixed `company_count`) -> clients (1..=3 per tenant,
/// unique (company_id, email)) -> invoices (per-parent-range 0..=5,
/// unique (company_id, client_id, number)).
pub fn three_level_registry(company_count: u32) -> Registry {
    let mut reg = Registry::new();
    reg.register(
        EntitySpec::new("companies", "companies")
            .scope(Scope::Global)
            .unique_key(["name"])
            .count(CountPolicy::Fixed(company_count))
            .field(FieldSpec::new(
                "name",
                FieldKind::Compose(
                    ValueType::Text,
                    Arc::new(|_rng, ctx| {
                        Ok(FixtureValue::Text(format!("Fixture Co {}", ctx.instance)))
                    }),
                ),
            )),
    )
    .unwrap();
    reg.set_tenant_source("companies").unwrap();
    reg.register(
        EntitySpec::new("clients", "clients")
            .unique_key(["company_id", "email"])
            .count(CountPolicy::RangeRandom(1, 3))
            .field(text_choice("name", &["Ada", "Grace", "Edsger", "Barbara"]))
            .field(email_field()),
    )
    .unwrap();
    reg.register(
        EntitySpec::new("invoices", "invoices")
            .parent("clients", "client_id")
            .unique_key(["company_id", "client_id", "number"])
            .count(CountPolicy::PerParentRange(0, 5))
            .field(invoice_number_field())
            .field(text_choice("status", &["draft", "sent", "paid"])),
    )
    .unwrap();
    reg.seal().unwrap();
    reg
}

/// Fails the first `fail_first` inserts into `entity` with a constraint
/// violation, then behaves normally.
pub struct FailingInserts {
    pub inner: MemoryGateway,
    entity: String,
    fail_first: usize,
    seen: AtomicUsize,
}

impl FailingInserts {
    pub fn new(entity: &str, fail_first: usize) -> Self {
        Self {
            inner: MemoryGateway::new(),
            entity: entity.to_string(),
            fail_first,
            seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataAccessGateway for FailingInserts {
    async fn query_by_tenant(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
    ) -> Result<Vec<Row>, GatewayError> {
        self.inner.query_by_tenant(spec, tenant_id).await
    }

    async fn query_by_tenant_and_parent(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
        parent_fk: &str,
        parent_id: i64,
    ) -> Result<Vec<Row>, GatewayError> {
        self.inner
            .query_by_tenant_and_parent(spec, tenant_id, parent_fk, parent_id)
            .await
    }

    async fn exists_by_unique_key(
        &self,
        spec: &EntitySpec,
        key: &[(String, FixtureValue)],
    ) -> Result<bool, GatewayError> {
        self.inner.exists_by_unique_key(spec, key).await
    }

    async fn insert(&self, spec: &EntitySpec, row: Row) -> Result<i64, GatewayError> {
        if spec.name == self.entity {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(GatewayError::Constraint {
                    entity: spec.name.clone(),
                    message: "injected failure".into(),
                });
            }
        }
        self.inner.insert(spec, row).await
    }
}

/// Loses the connection after `after` successful inserts.
pub struct DropsConnection {
    pub inner: MemoryGateway,
    after: usize,
    count: AtomicUsize,
}

impl DropsConnection {
    pub fn new(after: usize) -> Self {
        Self {
            inner: MemoryGateway::new(),
            after,
            count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataAccessGateway for DropsConnection {
    async fn query_by_tenant(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
    ) -> Result<Vec<Row>, GatewayError> {
        self.inner.query_by_tenant(spec, tenant_id).await
    }

    async fn query_by_tenant_and_parent(
        &self,
        spec: &EntitySpec,
        tenant_id: Option<i64>,
        parent_fk: &str,
        parent_id: i64,
    ) -> Result<Vec<Row>, GatewayError> {
        self.inner
            .query_by_tenant_and_parent(spec, tenant_id, parent_fk, parent_id)
            .await
    }

    async fn exists_by_unique_key(
        &self,
        spec: &EntitySpec,
        key: &[(String, FixtureValue)],
    ) -> Result<bool, GatewayError> {
        self.inner.exists_by_unique_key(spec, key).await
    }

    async fn insert(&self, spec: &EntitySpec, row: Row) -> Result<i64, GatewayError> {
        if self.count.fetch_add(1, Ordering::SeqCst) >= self.after {
            return Err(GatewayError::Unavailable("connection reset".into()));
        }
        self.inner.insert(spec, row).await
    }
}
