//! opsledger-seed: populate an OpsLedger database with reference data and,
//! in development mode, synthetic per-tenant fixtures.
//!
//! Exit codes: 0 success (skips and counted row failures included),
//! 1 aborted run (datastore failure or dependency cycle), 2 invalid
//! invocation.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use opsledger_seeder::config::SeederConfig;
use opsledger_seeder::{
    catalog, DataAccessGateway, MemoryGateway, Orchestrator, RandomSource, RunOptions, RunState,
    SeedError, SeedMode, SqlGateway, SystemClock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Global/system entities only.
    Production,
    /// Globals plus full per-tenant fixture generation.
    Development,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "opsledger-seed", about = "OpsLedger database seeder", version)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Development)]
    mode: Mode,

    /// Restrict per-tenant seeding to these tenant ids (repeatable).
    #[arg(long = "tenant")]
    tenants: Vec<i64>,

    /// RNG seed; defaults to a random value, printed for reproduction.
    #[arg(long)]
    seed: Option<u64>,

    /// Generate against an in-memory store; the database is not touched.
    #[arg(long)]
    dry_run: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,

    /// Override the configured per-entity failure threshold (0..=1).
    #[arg(long)]
    fail_threshold: Option<f64>,

    /// Override the configured database URL.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match SeederConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    init_tracing(&config);

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "seed run failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_tracing(config: &SeederConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli, config: SeederConfig) -> Result<ExitCode, SeedError> {
    let mut config = config;
    if let Some(threshold) = cli.fail_threshold {
        config.failure_threshold = threshold;
        config = config.validated()?;
    }
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }

    let clock = Arc::new(SystemClock);
    let registry = catalog::build_registry(clock.as_ref())?;
    // surfaces a cyclic catalog before any data access
    registry.execution_order()?;

    let gateway: Arc<dyn DataAccessGateway> = if cli.dry_run {
        info!("dry run: seeding an in-memory store");
        Arc::new(MemoryGateway::new())
    } else {
        Arc::new(SqlGateway::connect(&config.database_url, config.max_connections).await?)
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(seed, "using rng seed");
    let mut rng = RandomSource::from_seed(seed);

    let mut opts = RunOptions::new(
        match cli.mode {
            Mode::Production => SeedMode::Production,
            Mode::Development => SeedMode::Development,
        },
        seed,
    );
    opts.failure_threshold = config.failure_threshold;
    if !cli.tenants.is_empty() {
        if cli.tenants.iter().any(|t| Some(*t) == opts.reserved_tenant) {
            return Err(SeedError::InvalidInvocation(
                "the reserved system tenant cannot be seeded with fixtures".into(),
            ));
        }
        opts.tenant_filter = Some(cli.tenants.clone());
    }

    let orchestrator = Orchestrator::new(&registry, gateway, clock);
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current entity step");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = orchestrator.run(&opts, &mut rng).await?;

    match cli.report {
        ReportFormat::Text => print!("{}", report.render_text()),
        ReportFormat::Json => println!(
            "{}",
            report
                .render_json()
                .map_err(|e| SeedError::Config(e.to_string()))?
        ),
    }

    Ok(match report.state {
        RunState::Aborted => ExitCode::from(1),
        _ => ExitCode::SUCCESS,
    })
}
