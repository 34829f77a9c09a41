//! Core functionality for Preflight
//!
//! This crate contains the configuration provider, the probe strategies,
//! the per-service executor, and the declarative service registry. The
//! binary crate drives these and renders the resulting report.

pub mod config;
pub mod error;
pub mod executor;
pub mod probe;
pub mod registry;

// Re-export schema types for convenience
pub use schema::*;

pub use config::ConfigMap;
pub use error::{CoreError, Result};
pub use executor::{run_all, run_service, ServiceRun};
pub use registry::default_registry;

/// Core utilities and helper functions
pub mod utils {
    use tracing::{debug, info};

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        debug!("Tracing initialized with level: {}", level);
        Ok(())
    }

    /// Validate a set of service specs before a run
    pub fn validate_registry(specs: &[crate::ServiceSpec]) -> crate::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for spec in specs {
            spec.validate().map_err(crate::CoreError::ValidationError)?;
            if !seen.insert(spec.id.clone()) {
                return Err(crate::CoreError::ValidationError(format!(
                    "duplicate service id '{}'",
                    spec.id
                )));
            }
        }
        info!("Validated {} service specs", specs.len());
        Ok(())
    }
}
