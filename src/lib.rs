//! AEP project catalog and automation-opportunity orchestrator.
//!
//! Reads Adobe After Effects project files (RIFX/AEP), stores a relational catalog of
//! their contents, scores them for automation potential, and runs a multi-agent
//! workflow that plans, implements, verifies, and reviews automation artifacts.
//!
//! # Example
//!
//! ```rust,no_run
//! use aep_catalog::{aep, config::AppConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _config = AppConfig::default();
//!     let bytes = std::fs::read("project.aep")?;
//!     let project = aep::parse(&bytes)?;
//!     println!("compositions: {}", project.compositions().count());
//!     Ok(())
//! }
//! ```

pub mod aep;
pub mod agent_runtime;
pub mod agents;
pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod rifx;

pub use error::{CrateError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
