//! End-to-end test harness for Docker volume plugins
//!
//! For every node the harness installs the plugin, creates a volume through it, confirms and
//! inspects that volume, creates a container mounting it, and finally cleans the node up.

pub use cleanup::{CleanupReport, clean, clean_all};
pub use client::TestClient;
pub use config::{HarnessConfig, NodeConfig, NodeEnv};
pub use engine::{DockerEngine, Engine};
pub use error::HarnessError;
pub use harness::{RunOutcome, run};
pub use runner::{Step, Summary, TestResult, run_steps};

pub mod cleanup;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod harness;
pub mod runner;

#[cfg(test)]
mod tests;
