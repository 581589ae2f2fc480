//! Entity schema registry.
//!
//! Every seedable entity is declared once as an [`EntitySpec`]: its table,
//! scope, parent references, idempotency key, count policy and field
//! generators. The registry is built at startup, sealed, and read-only for
//! the rest of the process. Execution order is derived from the declared
//! parent references (see [`crate::resolver`]), never hand-maintained.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;
use strum::Display;

use crate::errors::SeedError;
use crate::fixture::FieldSpec;
use crate::resolver;
use crate::rng::RandomSource;

/// Tenant id reserved for production-essential rows; synthetic generation
/// never writes into it.
pub const RESERVED_SYSTEM_TENANT: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Seeded once, system-wide, before any tenant-scoped entity.
    Global,
    /// Seeded once per tenant, partitioned by `company_id`.
    PerTenant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRole {
    /// Drives the count policy and supplies the `parent_row` context.
    Primary,
    /// Foreign key filled from a random row of the referenced entity.
    Lookup,
}

#[derive(Debug, Clone)]
pub struct ParentRef {
    pub entity: String,
    pub fk_field: String,
    pub role: ParentRole,
}

/// How many instances of an entity to generate relative to its parent set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    Fixed(u32),
    RangeRandom(u32, u32),
    /// `floor(parent_count * pct / 100)`, pct drawn from the inclusive
    /// percentage range, clamped to `[0, parent_count]`. Each selected parent
    /// is distinct.
    PercentOfParent(u32, u32),
    /// Independent child count per parent row.
    PerParentRange(u32, u32),
}

impl CountPolicy {
    /// Target instance count for policies that produce one aggregate number.
    /// `PerParentRange` is expanded per parent row by the orchestrator and
    /// returns the upper-bound estimate here.
    pub fn sample(&self, parent_count: usize, rng: &mut RandomSource) -> Result<usize, SeedError> {
        match *self {
            CountPolicy::Fixed(n) => Ok(n as usize),
            CountPolicy::RangeRandom(min, max) => {
                Ok(rng.int_in(i64::from(min), i64::from(max))? as usize)
            }
            CountPolicy::PercentOfParent(min_pct, max_pct) => {
                let pct = rng.int_in(i64::from(min_pct), i64::from(max_pct))? as usize;
                Ok((parent_count * pct / 100).min(parent_count))
            }
            CountPolicy::PerParentRange(_, max) => Ok(parent_count * max as usize),
        }
    }
}

pub struct EntitySpec {
    pub name: String,
    pub table_key: String,
    pub scope: Scope,
    pub parent_refs: Vec<ParentRef>,
    pub unique_key: Vec<String>,
    pub count_policy: CountPolicy,
    pub fields: Vec<FieldSpec>,
    /// Synthetic-fixture-only entities are skipped in production mode even
    /// when global (e.g. demo companies).
    pub fixture_only: bool,
}

impl EntitySpec {
    pub fn new(name: impl Into<String>, table_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_key: table_key.into(),
            scope: Scope::PerTenant,
            parent_refs: Vec::new(),
            unique_key: Vec::new(),
            count_policy: CountPolicy::Fixed(0),
            fields: Vec::new(),
            fixture_only: false,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn parent(mut self, entity: impl Into<String>, fk_field: impl Into<String>) -> Self {
        self.parent_refs.push(ParentRef {
            entity: entity.into(),
            fk_field: fk_field.into(),
            role: ParentRole::Primary,
        });
        self
    }

    pub fn lookup(mut self, entity: impl Into<String>, fk_field: impl Into<String>) -> Self {
        self.parent_refs.push(ParentRef {
            entity: entity.into(),
            fk_field: fk_field.into(),
            role: ParentRole::Lookup,
        });
        self
    }

    pub fn unique_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn count(mut self, policy: CountPolicy) -> Self {
        self.count_policy = policy;
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fixture_only(mut self) -> Self {
        self.fixture_only = true;
        self
    }

    /// Primary parent reference, if one is declared. At most one is allowed;
    /// `Registry::seal` enforces this.
    pub fn primary_parent(&self) -> Option<&ParentRef> {
        self.parent_refs
            .iter()
            .find(|r| r.role == ParentRole::Primary)
    }

    pub fn lookup_parents(&self) -> impl Iterator<Item = &ParentRef> {
        self.parent_refs
            .iter()
            .filter(|r| r.role == ParentRole::Lookup)
    }
}

#[derive(Default)]
pub struct Registry {
    specs: Vec<EntitySpec>,
    index: HashMap<String, usize>,
    tenant_source: Option<String>,
    sealed: bool,
    order_cache: OnceLock<Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: EntitySpec) -> Result<(), SeedError> {
        if self.sealed {
            return Err(SeedError::RegistrySealed(spec.name));
        }
        if self.index.contains_key(&spec.name) {
            return Err(SeedError::DuplicateEntity(spec.name));
        }
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
        Ok(())
    }

    /// Declare which entity's rows define the tenant population.
    pub fn set_tenant_source(&mut self, name: impl Into<String>) -> Result<(), SeedError> {
        if self.sealed {
            return Err(SeedError::RegistrySealed("tenant source".into()));
        }
        self.tenant_source = Some(name.into());
        Ok(())
    }

    pub fn tenant_source(&self) -> Option<&EntitySpec> {
        self.tenant_source.as_deref().and_then(|n| self.get(n))
    }

    /// Validate cross-references and freeze the registry. After this,
    /// `register` fails with [`SeedError::RegistrySealed`].
    pub fn seal(&mut self) -> Result<(), SeedError> {
        for spec in &self.specs {
            for parent in &spec.parent_refs {
                if !self.index.contains_key(&parent.entity) {
                    return Err(SeedError::UnknownEntity(parent.entity.clone()));
                }
            }
            let primaries = spec
                .parent_refs
                .iter()
                .filter(|r| r.role == ParentRole::Primary)
                .count();
            if primaries > 1 {
                return Err(SeedError::InvalidInvocation(format!(
                    "entity '{}' declares {primaries} primary parents",
                    spec.name
                )));
            }
        }
        if let Some(source) = &self.tenant_source {
            if !self.index.contains_key(source.as_str()) {
                return Err(SeedError::UnknownEntity(source.clone()));
            }
        }
        self.sealed = true;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn get(&self, name: &str) -> Option<&EntitySpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// All specs in registration order (the resolver's tie-break order).
    pub fn all(&self) -> &[EntitySpec] {
        &self.specs
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Topological execution order, computed at most once per registry.
    pub fn execution_order(&self) -> Result<&[String], SeedError> {
        if !self.sealed {
            return Err(SeedError::RegistryNotSealed("resolving execution order"));
        }
        if let Some(order) = self.order_cache.get() {
            return Ok(order);
        }
        let order = resolver::execution_order(self)?;
        Ok(self.order_cache.get_or_init(|| order))
    }
}
