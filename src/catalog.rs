//! The OpsLedger entity catalog: every seedable entity of the platform,
//! declared once with its scope, parents, idempotency key, count policy and
//! field generators.
//!
//! Global entities carry the production-essential reference data (tax
//! tables, plans, permission sets, templates); tenant-scoped entities carry
//! the synthetic fixture volume used in development environments. Scope is
//! declared explicitly per entity rather than inferred.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal_macros::dec;

use crate::clock::Clock;
use crate::errors::SeedError;
use crate::fixture::{FieldKind, FieldSpec, FixtureValue, ValueType};
use crate::registry::{CountPolicy, EntitySpec, Registry, Scope};

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Carla", "Diego", "Elena", "Farid", "Grace", "Hugo", "Ines", "Jonas",
    "Klara", "Liam", "Marta", "Noor", "Oscar", "Priya", "Quentin", "Rosa", "Stefan", "Tara",
];

const LAST_NAMES: &[&str] = &[
    "Almeida", "Becker", "Costa", "Dubois", "Eriksen", "Fischer", "Garcia", "Hansen", "Ivanov",
    "Jensen", "Keller", "Lopez", "Meyer", "Novak", "Olsen", "Petrov", "Quinn", "Rossi", "Silva",
    "Tanaka",
];

const EMAIL_DOMAINS: &[&str] = &[
    "example.com",
    "mail.test",
    "contoso.test",
    "fieldops.test",
    "northservice.test",
];

const COMPANY_NAMES: &[&str] = &[
    "Northwind Field Services",
    "Bluepeak Consulting",
    "Harborline IT Group",
    "Cedar & Stone Partners",
    "Quantica Managed Services",
    "Redbrick Facilities",
    "Lighthouse Automation",
    "Summitcare Solutions",
];

const SERVICE_LINES: &[&str] = &[
    "Managed workstation support",
    "Server maintenance retainer",
    "Network monitoring",
    "Onsite field visit",
    "Backup and recovery plan",
    "Security audit",
    "License management",
    "Project consulting hours",
];

const EXPENSE_CATEGORIES: &[&str] = &[
    "travel",
    "hardware",
    "software",
    "meals",
    "subcontractor",
    "shipping",
];

const USAGE_METRICS: &[&str] = &[
    "endpoints_monitored",
    "tickets_handled",
    "gb_backed_up",
    "mailboxes_managed",
];

/// Deterministic per-instance label out of a fixed list.
fn titled(names: &'static [&'static str]) -> FieldKind {
    FieldKind::Compose(
        ValueType::Text,
        Arc::new(move |_rng, ctx| {
            Ok(FixtureValue::Text(names[ctx.instance % names.len()].into()))
        }),
    )
}

fn person_name() -> FieldKind {
    FieldKind::Compose(
        ValueType::Text,
        Arc::new(|rng, _ctx| {
            let first = rng.pick(FIRST_NAMES)?;
            let last = rng.pick(LAST_NAMES)?;
            Ok(FixtureValue::Text(format!("{first} {last}")))
        }),
    )
}

fn email() -> FieldKind {
    FieldKind::Compose(
        ValueType::Text,
        Arc::new(|rng, _ctx| {
            let first = rng.pick(FIRST_NAMES)?.to_lowercase();
            let last = rng.pick(LAST_NAMES)?.to_lowercase();
            let n = rng.int_in(1, 9999)?;
            let domain = rng.pick(EMAIL_DOMAINS)?;
            Ok(FixtureValue::Text(format!("{first}.{last}{n}@{domain}")))
        }),
    )
}

fn phone() -> FieldKind {
    FieldKind::Compose(
        ValueType::Text,
        Arc::new(|rng, _ctx| {
            Ok(FixtureValue::Text(format!(
                "+1-555-{:04}",
                rng.int_in(0, 9999)?
            )))
        }),
    )
}

fn reference_number(prefix: &'static str) -> FieldKind {
    FieldKind::Compose(
        ValueType::Text,
        Arc::new(move |rng, _ctx| {
            Ok(FixtureValue::Text(format!(
                "{prefix}-{:06}",
                rng.int_in(1, 999_999)?
            )))
        }),
    )
}

fn text(value: &str) -> FixtureValue {
    FixtureValue::Text(value.to_string())
}

fn choice(values: &[&str]) -> FieldKind {
    FieldKind::ElementOf(values.iter().map(|v| text(v)).collect())
}

fn weighted(values: &[(&str, u32)]) -> FieldKind {
    FieldKind::WeightedChoice(values.iter().map(|(v, w)| (text(v), *w)).collect())
}

/// Build and seal the full OpsLedger registry. All date ranges are anchored
/// on the injected clock so fixture timestamps are reproducible.
pub fn build_registry(clock: &dyn Clock) -> Result<Registry, SeedError> {
    let now = clock.now();
    let two_years_ago = now - Duration::days(730);
    let ninety_days_ago = now - Duration::days(90);
    let next_quarter = now + Duration::days(90);

    let mut reg = Registry::new();

    // --- global / system entities -------------------------------------

    reg.register(
        EntitySpec::new("tax_jurisdictions", "tax_jurisdictions")
            .scope(Scope::Global)
            .unique_key(["name"])
            .count(CountPolicy::Fixed(6))
            .field(FieldSpec::new(
                "name",
                titled(&[
                    "United States",
                    "Canada",
                    "United Kingdom",
                    "Germany",
                    "Netherlands",
                    "Australia",
                ]),
            ))
            .field(FieldSpec::new(
                "code",
                titled(&["US", "CA", "GB", "DE", "NL", "AU"]),
            )),
    )?;

    reg.register(
        EntitySpec::new("tax_rates", "tax_rates")
            .scope(Scope::Global)
            .parent("tax_jurisdictions", "jurisdiction_id")
            .unique_key(["jurisdiction_id", "name"])
            .count(CountPolicy::PerParentRange(1, 3))
            .field(FieldSpec::new("name", choice(&["Standard", "Reduced", "Zero"])))
            .field(FieldSpec::new(
                "rate",
                FieldKind::DecimalRange(dec!(0.0), dec!(25.0), 3),
            ))
            .field(FieldSpec::new(
                "is_default",
                FieldKind::WeightedChoice(vec![
                    (FixtureValue::Bool(true), 1),
                    (FixtureValue::Bool(false), 3),
                ]),
            )),
    )?;

    reg.register(
        EntitySpec::new("subscription_plans", "subscription_plans")
            .scope(Scope::Global)
            .unique_key(["name"])
            .count(CountPolicy::Fixed(4))
            .field(FieldSpec::new(
                "name",
                titled(&["Starter", "Standard", "Professional", "Enterprise"]),
            ))
            .field(FieldSpec::new(
                "monthly_price",
                FieldKind::DecimalRange(dec!(19.00), dec!(499.00), 2),
            ))
            .field(FieldSpec::new(
                "billing_period",
                weighted(&[("monthly", 3), ("annual", 1)]),
            ))
            .field(FieldSpec::new("is_active", FieldKind::Const(FixtureValue::Bool(true)))),
    )?;

    reg.register(
        EntitySpec::new("permission_sets", "permission_sets")
            .scope(Scope::Global)
            .unique_key(["name"])
            .count(CountPolicy::Fixed(5))
            .field(FieldSpec::new(
                "name",
                titled(&["owner", "admin", "dispatcher", "technician", "read_only"]),
            ))
            .field(FieldSpec::new(
                "description",
                FieldKind::OptionalWithProbability(
                    0.8,
                    Box::new(choice(&[
                        "Full platform access",
                        "Back-office administration",
                        "Scheduling and dispatch",
                        "Field work only",
                        "Reporting access",
                    ])),
                ),
            )),
    )?;

    reg.register(
        EntitySpec::new("document_templates", "document_templates")
            .scope(Scope::Global)
            .unique_key(["name"])
            .count(CountPolicy::Fixed(6))
            .field(FieldSpec::new(
                "name",
                titled(&[
                    "Standard Invoice",
                    "Detailed Quote",
                    "Service Report",
                    "Dunning Notice",
                    "Project Statement",
                    "Ticket Summary",
                ]),
            ))
            .field(FieldSpec::new(
                "kind",
                titled(&["invoice", "quote", "report", "dunning", "project", "ticket"]),
            )),
    )?;

    // demo companies define the tenant population; never seeded in
    // production mode
    reg.register(
        EntitySpec::new("companies", "companies")
            .scope(Scope::Global)
            .fixture_only()
            .unique_key(["name"])
            .count(CountPolicy::RangeRandom(3, 6))
            .field(FieldSpec::new("name", titled(COMPANY_NAMES)))
            .field(FieldSpec::new("external_id", FieldKind::Uuid))
            .field(FieldSpec::new(
                "country",
                choice(&["US", "CA", "GB", "DE", "NL"]),
            ))
            .field(FieldSpec::new(
                "created_at",
                FieldKind::DateRange(two_years_ago, now),
            )),
    )?;
    reg.set_tenant_source("companies")?;

    // --- tenant-scoped entities ---------------------------------------

    reg.register(
        EntitySpec::new("clients", "clients")
            .unique_key(["company_id", "email"])
            .count(CountPolicy::RangeRandom(8, 18))
            .field(FieldSpec::new("name", person_name()))
            .field(FieldSpec::new("email", email()))
            .field(FieldSpec::new(
                "phone",
                FieldKind::OptionalWithProbability(0.7, Box::new(phone())),
            ))
            .field(FieldSpec::new(
                "status",
                weighted(&[("active", 8), ("prospect", 3), ("inactive", 1)]),
            ))
            .field(FieldSpec::new(
                "credit_limit",
                FieldKind::DecimalRange(dec!(500.00), dec!(25000.00), 2),
            ))
            .field(FieldSpec::new("external_id", FieldKind::Uuid))
            .field(FieldSpec::new(
                "created_at",
                FieldKind::DateRange(two_years_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("contacts", "contacts")
            .parent("clients", "client_id")
            .unique_key(["company_id", "email"])
            .count(CountPolicy::PerParentRange(1, 3))
            .field(FieldSpec::new("name", person_name()))
            .field(FieldSpec::new("email", email()))
            .field(FieldSpec::new(
                "role",
                weighted(&[("billing", 2), ("technical", 3), ("management", 1)]),
            ))
            .field(FieldSpec::new(
                "phone",
                FieldKind::OptionalWithProbability(0.5, Box::new(phone())),
            )),
    )?;

    reg.register(
        EntitySpec::new("projects", "projects")
            .parent("clients", "client_id")
            .count(CountPolicy::PercentOfParent(30, 60))
            .field(FieldSpec::new(
                "name",
                choice(&[
                    "Office network refresh",
                    "Cloud migration",
                    "Workstation rollout",
                    "Security hardening",
                    "Backup overhaul",
                    "Telephony upgrade",
                ]),
            ))
            .field(FieldSpec::new(
                "status",
                weighted(&[("active", 5), ("on_hold", 1), ("completed", 3)]),
            ))
            .field(FieldSpec::new(
                "budget",
                FieldKind::DecimalRange(dec!(2000.00), dec!(80000.00), 2),
            ))
            .field(FieldSpec::new(
                "hourly_rate",
                FieldKind::DecimalRange(dec!(60.00), dec!(220.00), 2),
            ))
            .field(FieldSpec::new(
                "started_at",
                FieldKind::DateRange(two_years_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("tasks", "tasks")
            .parent("projects", "project_id")
            .count(CountPolicy::PerParentRange(0, 6))
            .field(FieldSpec::new("description", choice(SERVICE_LINES)))
            .field(FieldSpec::new(
                "status",
                weighted(&[("open", 3), ("in_progress", 2), ("done", 4)]),
            ))
            .field(FieldSpec::new(
                "estimated_hours",
                FieldKind::DecimalRange(dec!(0.5), dec!(40.0), 2),
            )),
    )?;

    reg.register(
        EntitySpec::new("tickets", "tickets")
            .parent("clients", "client_id")
            .count(CountPolicy::PerParentRange(0, 5))
            .field(FieldSpec::new("number", reference_number("TKT")))
            .field(FieldSpec::new(
                "subject",
                choice(&[
                    "Printer offline",
                    "VPN connection drops",
                    "Email delivery delays",
                    "Laptop replacement",
                    "Server disk warning",
                    "Password reset",
                ]),
            ))
            .field(FieldSpec::new(
                "priority",
                weighted(&[("low", 3), ("normal", 5), ("high", 2), ("critical", 1)]),
            ))
            .field(FieldSpec::new(
                "status",
                weighted(&[("open", 3), ("waiting", 2), ("resolved", 5)]),
            ))
            .field(FieldSpec::new(
                "opened_at",
                FieldKind::DateRange(ninety_days_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("time_entries", "time_entries")
            .parent("tasks", "task_id")
            .count(CountPolicy::PerParentRange(0, 8))
            .field(FieldSpec::new(
                "hours",
                FieldKind::DecimalRange(dec!(0.25), dec!(8.0), 2),
            ))
            .field(FieldSpec::new(
                "billable",
                FieldKind::WeightedChoice(vec![
                    (FixtureValue::Bool(true), 4),
                    (FixtureValue::Bool(false), 1),
                ]),
            ))
            .field(FieldSpec::new(
                "entry_date",
                FieldKind::DateRange(ninety_days_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("expenses", "expenses")
            .parent("projects", "project_id")
            .count(CountPolicy::PerParentRange(0, 4))
            .field(FieldSpec::new("category", choice(EXPENSE_CATEGORIES)))
            .field(FieldSpec::new(
                "amount",
                FieldKind::DecimalRange(dec!(5.00), dec!(1500.00), 2),
            ))
            .field(FieldSpec::new(
                "incurred_at",
                FieldKind::DateRange(ninety_days_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("invoices", "invoices")
            .parent("clients", "client_id")
            .unique_key(["company_id", "number"])
            .count(CountPolicy::PerParentRange(0, 4))
            .field(FieldSpec::new("number", reference_number("INV")))
            .field(FieldSpec::new(
                "status",
                weighted(&[("draft", 2), ("sent", 3), ("paid", 4), ("overdue", 1)]),
            ))
            .field(FieldSpec::new(
                "total_amount",
                FieldKind::DecimalRange(dec!(50.00), dec!(12000.00), 2),
            ))
            .field(FieldSpec::new(
                "currency",
                weighted(&[("USD", 5), ("EUR", 2), ("GBP", 1)]),
            ))
            .field(FieldSpec::new(
                "issued_at",
                FieldKind::DateRange(ninety_days_ago, now),
            ))
            .field(FieldSpec::new("external_id", FieldKind::Uuid)),
    )?;

    reg.register(
        EntitySpec::new("invoice_items", "invoice_items")
            .parent("invoices", "invoice_id")
            .count(CountPolicy::PerParentRange(1, 5))
            .field(FieldSpec::new("description", choice(SERVICE_LINES)))
            .field(FieldSpec::new("quantity", FieldKind::IntRange(1, 40)))
            .field(FieldSpec::new(
                "unit_price",
                FieldKind::DecimalRange(dec!(5.00), dec!(400.00), 2),
            )),
    )?;

    reg.register(
        EntitySpec::new("payments", "payments")
            .parent("invoices", "invoice_id")
            .unique_key(["company_id", "invoice_id"])
            .count(CountPolicy::PercentOfParent(40, 70))
            .field(FieldSpec::new(
                "amount",
                FieldKind::DerivedFromParent(
                    ValueType::Decimal,
                    Arc::new(|invoice| {
                        invoice
                            .get("total_amount")
                            .cloned()
                            .unwrap_or(FixtureValue::Null)
                    }),
                ),
            ))
            .field(FieldSpec::new(
                "method",
                weighted(&[("card", 4), ("bank_transfer", 4), ("check", 1)]),
            ))
            .field(FieldSpec::new(
                "received_at",
                FieldKind::DateRange(ninety_days_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("credit_notes", "credit_notes")
            .parent("invoices", "invoice_id")
            .unique_key(["company_id", "invoice_id"])
            .count(CountPolicy::PercentOfParent(5, 12))
            .field(FieldSpec::new("number", reference_number("CN")))
            .field(FieldSpec::new(
                "amount",
                FieldKind::DecimalRange(dec!(10.00), dec!(2000.00), 2),
            ))
            .field(FieldSpec::new(
                "reason",
                choice(&["billing_error", "goodwill", "cancelled_work", "duplicate"]),
            )),
    )?;

    reg.register(
        EntitySpec::new("quotes", "quotes")
            .parent("clients", "client_id")
            .unique_key(["company_id", "number"])
            .count(CountPolicy::PerParentRange(0, 3))
            .field(FieldSpec::new("number", reference_number("QTE")))
            .field(FieldSpec::new(
                "status",
                weighted(&[("draft", 2), ("sent", 3), ("accepted", 2), ("declined", 1)]),
            ))
            .field(FieldSpec::new(
                "total_amount",
                FieldKind::DecimalRange(dec!(100.00), dec!(20000.00), 2),
            ))
            .field(FieldSpec::new(
                "valid_until",
                FieldKind::DateRange(now, next_quarter),
            )),
    )?;

    reg.register(
        EntitySpec::new("client_subscriptions", "client_subscriptions")
            .parent("clients", "client_id")
            .lookup("subscription_plans", "plan_id")
            .unique_key(["company_id", "client_id"])
            .count(CountPolicy::PercentOfParent(50, 80))
            .field(FieldSpec::new(
                "status",
                weighted(&[("active", 8), ("paused", 1), ("cancelled", 2)]),
            ))
            .field(FieldSpec::new(
                "started_at",
                FieldKind::DateRange(two_years_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("usage_records", "usage_records")
            .parent("client_subscriptions", "subscription_id")
            .count(CountPolicy::PerParentRange(0, 10))
            .field(FieldSpec::new("metric", choice(USAGE_METRICS)))
            .field(FieldSpec::new("quantity", FieldKind::IntRange(1, 500)))
            .field(FieldSpec::new(
                "recorded_at",
                FieldKind::DateRange(ninety_days_ago, now),
            )),
    )?;

    reg.register(
        EntitySpec::new("dunning_notices", "dunning_notices")
            .parent("invoices", "invoice_id")
            .unique_key(["company_id", "invoice_id", "level"])
            .count(CountPolicy::PercentOfParent(5, 15))
            .field(FieldSpec::new("level", FieldKind::IntRange(1, 3)))
            .field(FieldSpec::new(
                "sent_at",
                FieldKind::DateRange(ninety_days_ago, now),
            ))
            .field(FieldSpec::new(
                "fee",
                FieldKind::OptionalWithProbability(
                    0.4,
                    Box::new(FieldKind::DecimalRange(dec!(5.00), dec!(50.00), 2)),
                ),
            )),
    )?;

    reg.register(
        EntitySpec::new("appointments", "appointments")
            .parent("contacts", "contact_id")
            .count(CountPolicy::PerParentRange(0, 3))
            .field(FieldSpec::new(
                "scheduled_at",
                FieldKind::DateRange(now, next_quarter),
            ))
            .field(FieldSpec::new("duration_minutes", FieldKind::IntRange(15, 120)))
            .field(FieldSpec::new(
                "kind",
                weighted(&[("onsite", 2), ("remote", 5), ("call", 3)]),
            )),
    )?;

    reg.seal()?;
    Ok(reg)
}
