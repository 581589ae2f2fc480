//! Seed orchestration: walks the resolved entity order, per tenant, applying
//! count policies and idempotent upsert semantics.
//!
//! Global-scope entities run once, before any tenant-scoped entity. A missing
//! parent set or a failed row never kills the run; only a lost datastore
//! connection does. Cancellation is honored between steps, never mid-row.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::errors::{GatewayError, SeedError};
use crate::fixture::{generate, FixtureValue, GenContext, Row, ID_COLUMN, TENANT_COLUMN};
use crate::gateway::DataAccessGateway;
use crate::registry::{
    CountPolicy, EntitySpec, ParentRef, Registry, Scope, RESERVED_SYSTEM_TENANT,
};
use crate::report::{RunState, SeedRunReport, StepOutcome, StepReport};
use crate::rng::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Global/system entities only, no synthetic per-tenant volume.
    Production,
    /// Globals plus full per-tenant fixture generation.
    Development,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: SeedMode,
    /// Restrict per-tenant seeding to these tenant ids. Ids that do not
    /// exist in the datastore make the run fail as an invalid invocation.
    pub tenant_filter: Option<Vec<i64>>,
    /// Abandon an (entity, tenant) step once `failed > threshold * target`.
    pub failure_threshold: f64,
    /// Tenant id reserved for production rows, excluded from generation.
    pub reserved_tenant: Option<i64>,
    /// RNG seed, echoed into the report for reproduction.
    pub seed: u64,
}

impl RunOptions {
    pub fn new(mode: SeedMode, seed: u64) -> Self {
        Self {
            mode,
            tenant_filter: None,
            failure_threshold: 0.5,
            reserved_tenant: Some(RESERVED_SYSTEM_TENANT),
            seed,
        }
    }
}

pub struct Orchestrator<'a> {
    registry: &'a Registry,
    gateway: Arc<dyn DataAccessGateway>,
    clock: Arc<dyn Clock>,
    cancel: Arc<AtomicBool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a Registry,
        gateway: Arc<dyn DataAccessGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            gateway,
            clock,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag observed between steps; setting it stops the run at the next
    /// (entity, tenant) boundary, with remaining steps reported `NotRun`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub async fn run(
        &self,
        opts: &RunOptions,
        rng: &mut RandomSource,
    ) -> Result<SeedRunReport, SeedError> {
        let order = self.registry.execution_order()?.to_vec();
        let mut report = SeedRunReport::new(opts.seed, self.clock.now());
        report.state = RunState::Running;

        let globals: Vec<&EntitySpec> = order
            .iter()
            .filter_map(|name| self.registry.get(name))
            .filter(|s| s.scope == Scope::Global)
            .filter(|s| opts.mode == SeedMode::Development || !s.fixture_only)
            .collect();
        let tenant_scoped: Vec<&EntitySpec> = if opts.mode == SeedMode::Development {
            order
                .iter()
                .filter_map(|name| self.registry.get(name))
                .filter(|s| s.scope == Scope::PerTenant)
                .collect()
        } else {
            Vec::new()
        };

        info!(
            globals = globals.len(),
            tenant_scoped = tenant_scoped.len(),
            seed = opts.seed,
            "seed run starting"
        );

        // phase 1: global entities, once, in topological order
        for (idx, spec) in globals.iter().enumerate() {
            if self.cancelled() {
                report.cancelled = true;
                for rest in &globals[idx..] {
                    report.steps.push(StepReport::not_run(&rest.name, None));
                }
                for rest in &tenant_scoped {
                    report.steps.push(StepReport::not_run(&rest.name, None));
                }
                return Ok(self.finish(report, RunState::Completed));
            }
            match self.seed_step(spec, None, opts, rng).await {
                Ok(step) => {
                    self.log_step(&step);
                    report.steps.push(step);
                }
                Err(e) => {
                    error!(entity = %spec.name, error = %e, "aborting seed run");
                    report.abort_reason = Some(e.to_string());
                    for rest in &globals[idx + 1..] {
                        report.steps.push(StepReport::not_run(&rest.name, None));
                    }
                    for rest in &tenant_scoped {
                        report.steps.push(StepReport::not_run(&rest.name, None));
                    }
                    return Ok(self.finish(report, RunState::Aborted));
                }
            }
        }

        // phase 2: tenant discovery
        let tenants: Vec<i64> = if opts.mode == SeedMode::Development {
            match self.discover_tenants(opts).await {
                Ok(t) => t,
                Err(SeedError::Gateway(e)) => {
                    error!(error = %e, "tenant discovery failed, aborting");
                    report.abort_reason = Some(e.to_string());
                    for rest in &tenant_scoped {
                        report.steps.push(StepReport::not_run(&rest.name, None));
                    }
                    return Ok(self.finish(report, RunState::Aborted));
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        // phase 3: tenant-scoped entities; all tenants of entity E complete
        // before any entity depending on E starts
        let mut pending: Vec<(usize, i64)> = Vec::new();
        for (eidx, _) in tenant_scoped.iter().enumerate() {
            for tenant in &tenants {
                pending.push((eidx, *tenant));
            }
        }
        for (pos, (eidx, tenant)) in pending.iter().enumerate() {
            let spec = tenant_scoped[*eidx];
            if self.cancelled() {
                report.cancelled = true;
                for (rest_idx, rest_tenant) in &pending[pos..] {
                    report
                        .steps
                        .push(StepReport::not_run(&tenant_scoped[*rest_idx].name, Some(*rest_tenant)));
                }
                break;
            }
            match self.seed_step(spec, Some(*tenant), opts, rng).await {
                Ok(step) => {
                    self.log_step(&step);
                    report.steps.push(step);
                }
                Err(e) => {
                    error!(entity = %spec.name, tenant = *tenant, error = %e, "aborting seed run");
                    report.abort_reason = Some(e.to_string());
                    for (rest_idx, rest_tenant) in &pending[pos + 1..] {
                        report.steps.push(StepReport::not_run(
                            &tenant_scoped[*rest_idx].name,
                            Some(*rest_tenant),
                        ));
                    }
                    return Ok(self.finish(report, RunState::Aborted));
                }
            }
        }

        Ok(self.finish(report, RunState::Completed))
    }

    fn finish(&self, mut report: SeedRunReport, state: RunState) -> SeedRunReport {
        report.state = state;
        report.finished_at = Some(self.clock.now());
        info!(
            state = %report.state,
            created = report.total_created(),
            existing = report.total_skipped_existing(),
            failed = report.total_failed(),
            "seed run finished"
        );
        report
    }

    fn log_step(&self, step: &StepReport) {
        debug!(
            entity = %step.entity,
            tenant = ?step.tenant,
            attempted = step.attempted,
            created = step.created,
            existing = step.skipped_existing,
            failed = step.failed,
            outcome = %step.outcome,
            "entity step done"
        );
    }

    /// Tenant ids come from the tenant-source entity's rows, minus the
    /// reserved production tenant, intersected with the filter if any.
    async fn discover_tenants(&self, opts: &RunOptions) -> Result<Vec<i64>, SeedError> {
        let source = self.registry.tenant_source().ok_or_else(|| {
            SeedError::InvalidInvocation("registry declares no tenant source entity".into())
        })?;
        let rows = self.gateway.query_by_tenant(source, None).await?;
        let mut ids: Vec<i64> = rows
            .iter()
            .filter_map(|r| r.get(ID_COLUMN).and_then(FixtureValue::as_i64))
            .filter(|id| Some(*id) != opts.reserved_tenant)
            .collect();
        if let Some(filter) = &opts.tenant_filter {
            let unknown: Vec<i64> = filter.iter().copied().filter(|f| !ids.contains(f)).collect();
            if !unknown.is_empty() {
                return Err(SeedError::UnknownTenant(unknown));
            }
            ids.retain(|id| filter.contains(id));
        }
        info!(tenants = ids.len(), "tenant population resolved");
        Ok(ids)
    }

    async fn seed_step(
        &self,
        spec: &EntitySpec,
        tenant: Option<i64>,
        opts: &RunOptions,
        rng: &mut RandomSource,
    ) -> Result<StepReport, SeedError> {
        let mut step = StepReport::new(&spec.name, tenant);

        // resolve parent row sets
        let mut primary_rows: Vec<Row> = Vec::new();
        if let Some(parent) = spec.primary_parent() {
            primary_rows = self.parent_rows(parent, tenant).await?;
            if primary_rows.is_empty() {
                step.skipped_missing_parent = 1;
                step.outcome = StepOutcome::SkippedMissingParent;
                return Ok(step);
            }
        }
        let mut lookups: Vec<(&ParentRef, Vec<Row>)> = Vec::new();
        for parent in spec.lookup_parents() {
            let rows = self.parent_rows(parent, tenant).await?;
            if rows.is_empty() {
                step.skipped_missing_parent = 1;
                step.outcome = StepOutcome::SkippedMissingParent;
                return Ok(step);
            }
            lookups.push((parent, rows));
        }

        // plan instances: which primary parent (if any) each row hangs off
        let plan = self.plan_instances(spec, &primary_rows, rng)?;
        let target = plan.len() as u64;

        for (instance, parent_idx) in plan.into_iter().enumerate() {
            step.attempted += 1;
            let parent_row = parent_idx.map(|i| &primary_rows[i]);

            let outcome: Result<(), GatewayError> = match self
                .build_row(spec, tenant, parent_row, &lookups, instance, rng)
            {
                Err(e) => {
                    debug!(entity = %spec.name, error = %e, "row generation failed");
                    step.failed += 1;
                    Ok(())
                }
                Ok(row) => self.upsert_row(spec, row, &mut step).await,
            };
            if let Err(e) = outcome {
                if e.is_fatal() {
                    return Err(e.into());
                }
                step.failed += 1;
            }

            if step.failed as f64 > opts.failure_threshold * target as f64 {
                warn!(
                    entity = %spec.name,
                    tenant = ?tenant,
                    failed = step.failed,
                    target,
                    "failure threshold exceeded, abandoning entity for this tenant"
                );
                step.outcome = StepOutcome::AbandonedThreshold;
                break;
            }
        }
        Ok(step)
    }

    async fn parent_rows(
        &self,
        parent: &ParentRef,
        tenant: Option<i64>,
    ) -> Result<Vec<Row>, SeedError> {
        let parent_spec = self
            .registry
            .get(&parent.entity)
            .ok_or_else(|| SeedError::UnknownEntity(parent.entity.clone()))?;
        let scope_tenant = match parent_spec.scope {
            Scope::PerTenant => tenant,
            Scope::Global => None,
        };
        Ok(self
            .gateway
            .query_by_tenant(parent_spec, scope_tenant)
            .await?)
    }

    fn plan_instances(
        &self,
        spec: &EntitySpec,
        primary_rows: &[Row],
        rng: &mut RandomSource,
    ) -> Result<Vec<Option<usize>>, SeedError> {
        let has_primary = spec.primary_parent().is_some();
        match spec.count_policy {
            CountPolicy::PerParentRange(min, max) => {
                let mut plan = Vec::new();
                for idx in 0..primary_rows.len() {
                    let children = rng.int_in(i64::from(min), i64::from(max))? as usize;
                    plan.extend(std::iter::repeat(Some(idx)).take(children));
                }
                Ok(plan)
            }
            CountPolicy::PercentOfParent(_, _) => {
                let count = spec.count_policy.sample(primary_rows.len(), rng)?;
                Ok(rng
                    .distinct_indices(primary_rows.len(), count)
                    .into_iter()
                    .map(Some)
                    .collect())
            }
            CountPolicy::Fixed(_) | CountPolicy::RangeRandom(_, _) => {
                let count = spec.count_policy.sample(primary_rows.len(), rng)?;
                let mut plan = Vec::with_capacity(count);
                for _ in 0..count {
                    if has_primary {
                        let idx = rng.int_in(0, primary_rows.len() as i64 - 1)? as usize;
                        plan.push(Some(idx));
                    } else {
                        plan.push(None);
                    }
                }
                Ok(plan)
            }
        }
    }

    fn build_row(
        &self,
        spec: &EntitySpec,
        tenant: Option<i64>,
        parent_row: Option<&Row>,
        lookups: &[(&ParentRef, Vec<Row>)],
        instance: usize,
        rng: &mut RandomSource,
    ) -> Result<Row, SeedError> {
        let mut row = Row::new();
        if spec.scope == Scope::PerTenant {
            let tenant = tenant.ok_or_else(|| {
                SeedError::Generation(format!("entity '{}' seeded without a tenant", spec.name))
            })?;
            row.insert(TENANT_COLUMN.to_string(), FixtureValue::Int(tenant));
        }
        if let (Some(parent), Some(prow)) = (spec.primary_parent(), parent_row) {
            let parent_id = prow
                .get(ID_COLUMN)
                .and_then(FixtureValue::as_i64)
                .ok_or_else(|| SeedError::Generation("parent row has no id".into()))?;
            row.insert(parent.fk_field.clone(), FixtureValue::Int(parent_id));
        }
        for (parent, rows) in lookups {
            let picked = rng.pick(rows)?;
            let parent_id = picked
                .get(ID_COLUMN)
                .and_then(FixtureValue::as_i64)
                .ok_or_else(|| SeedError::Generation("lookup parent row has no id".into()))?;
            row.insert(parent.fk_field.clone(), FixtureValue::Int(parent_id));
        }

        let ctx = GenContext {
            tenant_id: tenant,
            parent_row,
            instance,
        };
        for field in &spec.fields {
            let value = generate(&field.kind, rng, &ctx)?;
            if !value.is_null() {
                row.insert(field.column.clone(), value);
            }
        }
        Ok(row)
    }

    /// Insert-if-absent when the entity declares a unique key, plain insert
    /// otherwise. Non-fatal errors are surfaced so the caller can count them.
    async fn upsert_row(
        &self,
        spec: &EntitySpec,
        row: Row,
        step: &mut StepReport,
    ) -> Result<(), GatewayError> {
        if !spec.unique_key.is_empty() {
            let mut key = Vec::with_capacity(spec.unique_key.len());
            for col in &spec.unique_key {
                match row.get(col) {
                    Some(v) => key.push((col.clone(), v.clone())),
                    None => {
                        // a null-valued unique field cannot be checked; treat
                        // the row as a generation failure
                        return Err(GatewayError::Query {
                            entity: spec.name.clone(),
                            message: format!("unique key field '{col}' missing from row"),
                        });
                    }
                }
            }
            if self.gateway.exists_by_unique_key(spec, &key).await? {
                step.skipped_existing += 1;
                return Ok(());
            }
        }
        self.gateway.insert(spec, row).await?;
        step.created += 1;
        Ok(())
    }
}
