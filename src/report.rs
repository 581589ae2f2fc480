//! Structured outcome of a seed run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

/// Outcome of one (entity, tenant) seeding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    SkippedMissingParent,
    AbandonedThreshold,
    NotRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    Initialized,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub entity: String,
    /// `None` for global entities.
    pub tenant: Option<i64>,
    pub attempted: u64,
    pub created: u64,
    pub skipped_existing: u64,
    pub skipped_missing_parent: u64,
    pub failed: u64,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn new(entity: impl Into<String>, tenant: Option<i64>) -> Self {
        Self {
            entity: entity.into(),
            tenant,
            attempted: 0,
            created: 0,
            skipped_existing: 0,
            skipped_missing_parent: 0,
            failed: 0,
            outcome: StepOutcome::Completed,
        }
    }

    pub fn not_run(entity: impl Into<String>, tenant: Option<i64>) -> Self {
        let mut step = Self::new(entity, tenant);
        step.outcome = StepOutcome::NotRun;
        step
    }
}

#[derive(Debug, Serialize)]
pub struct SeedRunReport {
    pub state: RunState,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub abort_reason: Option<String>,
    pub steps: Vec<StepReport>,
}

impl SeedRunReport {
    pub fn new(seed: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            state: RunState::Initialized,
            seed,
            started_at,
            finished_at: None,
            cancelled: false,
            abort_reason: None,
            steps: Vec::new(),
        }
    }

    pub fn total_created(&self) -> u64 {
        self.steps.iter().map(|s| s.created).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.steps.iter().map(|s| s.failed).sum()
    }

    pub fn total_skipped_existing(&self) -> u64 {
        self.steps.iter().map(|s| s.skipped_existing).sum()
    }

    /// Plain-text rendering, one line per (entity, tenant) step.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "seed run {} (seed={})\n",
            self.state, self.seed
        ));
        if let Some(reason) = &self.abort_reason {
            out.push_str(&format!("abort reason: {reason}\n"));
        }
        out.push_str(&format!(
            "{:<24} {:>8} {:>10} {:>8} {:>8} {:>8} {:>8}  {}\n",
            "entity", "tenant", "attempted", "created", "existed", "no-parent", "failed", "outcome"
        ));
        for step in &self.steps {
            let tenant = step
                .tenant
                .map(|t| t.to_string())
                .unwrap_or_else(|| "global".to_string());
            out.push_str(&format!(
                "{:<24} {:>8} {:>10} {:>8} {:>8} {:>8} {:>8}  {}\n",
                step.entity,
                tenant,
                step.attempted,
                step.created,
                step.skipped_existing,
                step.skipped_missing_parent,
                step.failed,
                step.outcome
            ));
        }
        out.push_str(&format!(
            "totals: created={} existing={} failed={}\n",
            self.total_created(),
            self.total_skipped_existing(),
            self.total_failed()
        ));
        out
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_aggregate_across_steps() {
        let mut report = SeedRunReport::new(7, Utc::now());
        let mut a = StepReport::new("clients", Some(2));
        a.created = 5;
        a.failed = 1;
        let mut b = StepReport::new("invoices", Some(2));
        b.created = 3;
        b.skipped_existing = 2;
        report.steps.push(a);
        report.steps.push(b);
        assert_eq!(report.total_created(), 8);
        assert_eq!(report.total_failed(), 1);
        assert_eq!(report.total_skipped_existing(), 2);
    }

    #[test]
    fn text_rendering_marks_global_steps() {
        let mut report = SeedRunReport::new(7, Utc::now());
        report.state = RunState::Completed;
        report.steps.push(StepReport::new("tax_rates", None));
        let text = report.render_text();
        assert!(text.contains("global"));
        assert!(text.contains("tax_rates"));
    }

    #[test]
    fn json_rendering_is_snake_cased() {
        let mut report = SeedRunReport::new(7, Utc::now());
        report.state = RunState::Aborted;
        report.steps.push(StepReport::not_run("invoices", Some(3)));
        let json = report.render_json().unwrap();
        assert!(json.contains("\"aborted\""));
        assert!(json.contains("\"not_run\""));
    }
}
