//! SqlGateway behaviour against an in-memory SQLite database.
//!
//! The schemas are owned by the application being seeded, so the tests
//! create minimal tables by hand before exercising the gateway.

mod common;

use std::sync::Arc;

use sea_orm::{ConnectOptions, ConnectionTrait, Database};

use common::text_choice;
use opsledger_seeder::fixture::{FixtureValue, Row};
use opsledger_seeder::registry::{CountPolicy, EntitySpec, Registry, Scope};
use opsledger_seeder::{
    DataAccessGateway, FixedClock, GatewayError, Orchestrator, RandomSource, RunOptions, RunState,
    SeedMode, SqlGateway,
};

async fn sqlite_gateway(schema: &[&str]) -> SqlGateway {
    // a single pooled connection, otherwise each pool member would get its
    // own private in-memory database
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    for ddl in schema {
        db.execute_unprepared(ddl).await.unwrap();
    }
    SqlGateway::new(db)
}

fn client_spec() -> EntitySpec {
    EntitySpec::new("clients", "clients")
        .unique_key(["company_id", "email"])
        .field(text_choice("name", &["Ada", "Grace"]))
        .field(common::email_field())
}

const CLIENTS_DDL: &str = "CREATE TABLE clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id INTEGER NOT NULL,
    name TEXT,
    email TEXT,
    UNIQUE (company_id, email)
)";

fn client_row(tenant: i64, name: &str, email: &str) -> Row {
    let mut row = Row::new();
    row.insert("company_id".into(), FixtureValue::Int(tenant));
    row.insert("name".into(), FixtureValue::Text(name.into()));
    row.insert("email".into(), FixtureValue::Text(email.into()));
    row
}

#[tokio::test]
async fn insert_returns_ids_and_rows_read_back() {
    let gw = sqlite_gateway(&[CLIENTS_DDL]).await;
    let spec = client_spec();

    let a = gw
        .insert(&spec, client_row(2, "Ada", "ada@x.test"))
        .await
        .unwrap();
    let b = gw
        .insert(&spec, client_row(2, "Grace", "grace@x.test"))
        .await
        .unwrap();
    assert!(b > a);

    let rows = gw.query_by_tenant(&spec, Some(2)).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("id").and_then(FixtureValue::as_i64), Some(a));
    assert_eq!(rows[0].get("name").and_then(FixtureValue::as_str), Some("Ada"));

    // other tenants see nothing
    assert!(gw.query_by_tenant(&spec, Some(3)).await.unwrap().is_empty());
}

#[tokio::test]
async fn unique_violations_come_back_as_constraint_errors() {
    let gw = sqlite_gateway(&[CLIENTS_DDL]).await;
    let spec = client_spec();
    gw.insert(&spec, client_row(2, "Ada", "ada@x.test"))
        .await
        .unwrap();

    let err = gw
        .insert(&spec, client_row(2, "Ada Again", "ada@x.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Constraint { .. }), "{err}");

    let key = vec![
        ("company_id".to_string(), FixtureValue::Int(2)),
        ("email".to_string(), FixtureValue::Text("ada@x.test".into())),
    ];
    assert!(gw.exists_by_unique_key(&spec, &key).await.unwrap());
    let other = vec![
        ("company_id".to_string(), FixtureValue::Int(3)),
        ("email".to_string(), FixtureValue::Text("ada@x.test".into())),
    ];
    assert!(!gw.exists_by_unique_key(&spec, &other).await.unwrap());
}

#[tokio::test]
async fn query_by_parent_filters_on_the_foreign_key() {
    let gw = sqlite_gateway(&[
        CLIENTS_DDL,
        "CREATE TABLE invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            client_id INTEGER NOT NULL,
            number TEXT,
            status TEXT
        )",
    ])
    .await;
    let invoices = EntitySpec::new("invoices", "invoices")
        .parent("clients", "client_id")
        .field(text_choice("status", &["draft", "paid"]));

    let mut row = Row::new();
    row.insert("company_id".into(), FixtureValue::Int(2));
    row.insert("client_id".into(), FixtureValue::Int(7));
    row.insert("status".into(), FixtureValue::Text("paid".into()));
    gw.insert(&invoices, row.clone()).await.unwrap();
    row.insert("client_id".into(), FixtureValue::Int(8));
    gw.insert(&invoices, row).await.unwrap();

    let of_seven = gw
        .query_by_tenant_and_parent(&invoices, Some(2), "client_id", 7)
        .await
        .unwrap();
    assert_eq!(of_seven.len(), 1);
    assert_eq!(
        of_seven[0].get("client_id").and_then(FixtureValue::as_i64),
        Some(7)
    );
}

#[tokio::test]
async fn orchestrator_runs_end_to_end_on_sqlite() {
    let gw = sqlite_gateway(&[
        "CREATE TABLE companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            UNIQUE (name)
        )",
        CLIENTS_DDL,
        "CREATE TABLE invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            client_id INTEGER NOT NULL,
            number TEXT,
            status TEXT,
            UNIQUE (company_id, client_id, number)
        )",
    ])
    .await;

    let registry = common::three_level_registry(2);
    let gateway = Arc::new(gw);
    let clock = Arc::new(FixedClock::on(2026, 6, 1));
    let orchestrator = Orchestrator::new(&registry, gateway.clone(), clock);
    let mut opts = RunOptions::new(SeedMode::Development, 31);
    opts.reserved_tenant = None;

    let first = orchestrator
        .run(&opts, &mut RandomSource::from_seed(31))
        .await
        .unwrap();
    assert_eq!(first.state, RunState::Completed);
    let created = first.total_created();
    assert!(created >= 2, "companies and clients should be created");

    // idempotent re-run against the real datastore
    let second = orchestrator
        .run(&opts, &mut RandomSource::from_seed(31))
        .await
        .unwrap();
    assert_eq!(second.state, RunState::Completed);
    assert_eq!(second.total_created(), 0);
}
