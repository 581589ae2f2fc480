//! Error taxonomy for the seeding engine.
//!
//! Registry misconfiguration and dependency cycles are fatal before any data
//! access happens; gateway unavailability aborts a run in progress; everything
//! else is recorded in the run report and the run continues.

use thiserror::Error;

/// Errors surfaced by the data access gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The datastore cannot be reached or the connection was lost. Fatal to
    /// the whole run.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    /// A row violated a database constraint. Counted per row, not fatal.
    #[error("constraint violation on '{entity}': {message}")]
    Constraint { entity: String, message: String },

    /// A query or statement failed for reasons other than connectivity.
    #[error("query against '{entity}' failed: {message}")]
    Query { entity: String, message: String },
}

impl GatewayError {
    /// Whether this error must abort the entire seed run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("entity '{0}' is already registered")]
    DuplicateEntity(String),

    #[error("registry is sealed; cannot register '{0}'")]
    RegistrySealed(String),

    #[error("registry must be sealed before {0}")]
    RegistryNotSealed(&'static str),

    #[error("cyclic dependency among entities: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("unknown entity '{0}' referenced")]
    UnknownEntity(String),

    #[error("tenant filter names unknown tenant ids: {0:?}")]
    UnknownTenant(Vec<i64>),

    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("field generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl SeedError {
    /// Process exit code for the CLI: 1 for aborted runs, 2 for invalid
    /// invocations, matching the documented contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            SeedError::UnknownTenant(_)
            | SeedError::InvalidInvocation(_)
            | SeedError::Config(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn unavailable_is_fatal_and_constraint_is_not() {
        assert!(GatewayError::Unavailable("connection reset".into()).is_fatal());
        assert!(!GatewayError::Constraint {
            entity: "clients".into(),
            message: "unique".into()
        }
        .is_fatal());
    }

    #[test_case(SeedError::UnknownTenant(vec![42]), 2; "unknown tenant filter")]
    #[test_case(SeedError::Config("bad threshold".into()), 2; "config error")]
    #[test_case(SeedError::InvalidInvocation("bad seed".into()), 2; "invalid invocation")]
    #[test_case(SeedError::CyclicDependency(vec!["a".into(), "b".into()]), 1; "cycle")]
    #[test_case(SeedError::Gateway(GatewayError::Unavailable("down".into())), 1; "gateway down")]
    fn exit_codes_follow_the_cli_contract(err: SeedError, code: i32) {
        assert_eq!(err.exit_code(), code);
    }
}
