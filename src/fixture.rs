//! Field-level fixture generation.
//!
//! Each column of a seedable entity declares a [`FieldSpec`] describing how
//! its value is produced. Generation is a pure function of the field spec, the
//! seeded [`RandomSource`] state, and the [`GenContext`], so a fixed seed
//! reproduces every generated row byte for byte.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::SeedError;
use crate::rng::RandomSource;

/// One generated row, keyed by column name. Columns whose generated value is
/// absent (see [`FieldKind::OptionalWithProbability`]) are omitted entirely.
pub type Row = BTreeMap<String, FixtureValue>;

/// Column name carrying the tenant partition on tenant-scoped tables.
pub const TENANT_COLUMN: &str = "company_id";

/// Primary-key column name used by every seeded table.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FixtureValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

/// Storage type of a column, used by gateways to read rows back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Decimal,
    Text,
    Timestamp,
    Uuid,
}

impl FixtureValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FixtureValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FixtureValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FixtureValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            FixtureValue::Bool(_) => ValueType::Bool,
            FixtureValue::Int(_) => ValueType::Int,
            FixtureValue::Decimal(_) => ValueType::Decimal,
            FixtureValue::Timestamp(_) => ValueType::Timestamp,
            FixtureValue::Uuid(_) => ValueType::Uuid,
            FixtureValue::Null | FixtureValue::Text(_) => ValueType::Text,
        }
    }
}

impl std::fmt::Display for FixtureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureValue::Null => write!(f, "null"),
            FixtureValue::Bool(b) => write!(f, "{b}"),
            FixtureValue::Int(n) => write!(f, "{n}"),
            FixtureValue::Decimal(d) => write!(f, "{d}"),
            FixtureValue::Text(s) => write!(f, "{s}"),
            FixtureValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FixtureValue::Uuid(u) => write!(f, "{u}"),
        }
    }
}

/// Context available to a single field generation call.
pub struct GenContext<'a> {
    /// Tenant the row belongs to; `None` for global entities.
    pub tenant_id: Option<i64>,
    /// Primary parent row, when the entity declares one.
    pub parent_row: Option<&'a Row>,
    /// Zero-based index of this instance within the current seed step. Lets
    /// composers produce stable, distinct values ("Starter", "Pro", ...).
    pub instance: usize,
}

pub type DeriveFn = Arc<dyn Fn(&Row) -> FixtureValue + Send + Sync>;
pub type ComposeFn =
    Arc<dyn Fn(&mut RandomSource, &GenContext<'_>) -> Result<FixtureValue, SeedError> + Send + Sync>;

#[derive(Clone)]
pub enum FieldKind {
    IntRange(i64, i64),
    DecimalRange(Decimal, Decimal, u32),
    DateRange(DateTime<Utc>, DateTime<Utc>),
    WeightedChoice(Vec<(FixtureValue, u32)>),
    ElementOf(Vec<FixtureValue>),
    OptionalWithProbability(f64, Box<FieldKind>),
    /// Copy or transform a value out of the primary parent row.
    DerivedFromParent(ValueType, DeriveFn),
    Const(FixtureValue),
    /// Deterministic UUID built from the random stream (never `new_v4`).
    Uuid,
    /// Arbitrary composition over the rng and context; declares its storage
    /// type so gateways can read the column back.
    Compose(ValueType, ComposeFn),
}

impl FieldKind {
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldKind::IntRange(..) => ValueType::Int,
            FieldKind::DecimalRange(..) => ValueType::Decimal,
            FieldKind::DateRange(..) => ValueType::Timestamp,
            FieldKind::WeightedChoice(items) => items
                .first()
                .map(|(v, _)| v.value_type())
                .unwrap_or(ValueType::Text),
            FieldKind::ElementOf(items) => items
                .first()
                .map(FixtureValue::value_type)
                .unwrap_or(ValueType::Text),
            FieldKind::OptionalWithProbability(_, inner) => inner.value_type(),
            FieldKind::DerivedFromParent(ty, _) => *ty,
            FieldKind::Const(v) => v.value_type(),
            FieldKind::Uuid => ValueType::Uuid,
            FieldKind::Compose(ty, _) => *ty,
        }
    }
}

#[derive(Clone)]
pub struct FieldSpec {
    pub column: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(column: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }
}

/// Generate one value. Pure in `(kind, rng state, ctx)`.
pub fn generate(
    kind: &FieldKind,
    rng: &mut RandomSource,
    ctx: &GenContext<'_>,
) -> Result<FixtureValue, SeedError> {
    match kind {
        FieldKind::IntRange(lo, hi) => Ok(FixtureValue::Int(rng.int_in(*lo, *hi)?)),
        FieldKind::DecimalRange(lo, hi, precision) => {
            let (lo_f, hi_f) = (lo.to_f64(), hi.to_f64());
            let (lo_f, hi_f) = match (lo_f, hi_f) {
                (Some(a), Some(b)) if a <= b => (a, b),
                _ => {
                    return Err(SeedError::Generation(format!(
                        "invalid decimal range {lo}..{hi}"
                    )))
                }
            };
            let sampled = lo_f + rng.unit() * (hi_f - lo_f);
            let value = Decimal::from_f64(sampled)
                .unwrap_or(*lo)
                .round_dp(*precision);
            Ok(FixtureValue::Decimal(value))
        }
        FieldKind::DateRange(from, to) => {
            let span = (*to - *from).num_seconds();
            if span < 0 {
                return Err(SeedError::Generation(format!(
                    "date range ends before it starts: {from}..{to}"
                )));
            }
            let offset = rng.int_in(0, span)?;
            Ok(FixtureValue::Timestamp(*from + Duration::seconds(offset)))
        }
        FieldKind::WeightedChoice(items) => Ok(rng.pick_weighted(items)?.clone()),
        FieldKind::ElementOf(items) => Ok(rng.pick(items)?.clone()),
        FieldKind::OptionalWithProbability(p, inner) => {
            // the presence draw happens unconditionally so the stream stays
            // aligned whether or not the value is emitted
            if rng.chance(*p) {
                generate(inner, rng, ctx)
            } else {
                Ok(FixtureValue::Null)
            }
        }
        FieldKind::DerivedFromParent(_, derive) => {
            let parent = ctx.parent_row.ok_or_else(|| {
                SeedError::Generation("derived field used without a parent row".into())
            })?;
            Ok(derive(parent))
        }
        FieldKind::Const(v) => Ok(v.clone()),
        FieldKind::Uuid => Ok(FixtureValue::Uuid(Uuid::from_u128(rng.bits_128()))),
        FieldKind::Compose(_, compose) => compose(rng, ctx),
    }
}
