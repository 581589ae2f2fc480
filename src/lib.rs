//! OpsLedger Seeder
//!
//! Deterministic, dependency-ordered database seeding for the OpsLedger
//! multi-tenant PSA platform. Entities are declared once in a schema
//! registry; execution order is derived from parent references with a
//! topological sort; all randomness and timestamps flow through injected
//! sources so a seed value reproduces a run exactly; upserts keyed on
//! declared unique tuples make re-runs create zero duplicate rows.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod catalog;
pub mod clock;
pub mod config;
pub mod errors;
pub mod fixture;
pub mod gateway;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod rng;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::{GatewayError, SeedError};
pub use fixture::{FieldKind, FieldSpec, FixtureValue, Row};
pub use gateway::{DataAccessGateway, MemoryGateway, SqlGateway};
pub use orchestrator::{Orchestrator, RunOptions, SeedMode};
pub use registry::{CountPolicy, EntitySpec, Registry, Scope};
pub use report::{RunState, SeedRunReport, StepOutcome, StepReport};
pub use rng::RandomSource;
