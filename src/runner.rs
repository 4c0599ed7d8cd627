//! Runs the test steps and formats their results

use crate::client::TestClient;
use crate::engine::Engine;
use crate::error::HarnessError;
use colored::Colorize;
use std::fmt;

pub const CHECKMARK: &str = "✔";
pub const XMARK: &str = "✗";

/// A single test step, run once per node
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Step {
    InstallPlugin,
    CreateVolume,
    ConfirmVolume,
    InspectVolume,
    CreateContainerWithVolume,
}

impl Step {
    /// The full suite, in the order it runs
    #[must_use]
    pub fn suite() -> &'static [Step] {
        &[
            Step::InstallPlugin,
            Step::CreateVolume,
            Step::ConfirmVolume,
            Step::InspectVolume,
            Step::CreateContainerWithVolume,
        ]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Step::InstallPlugin => "InstallPlugin",
            Step::CreateVolume => "CreateVolume",
            Step::ConfirmVolume => "ConfirmVolume",
            Step::InspectVolume => "InspectVolume",
            Step::CreateContainerWithVolume => "CreateContainerWithVolume",
        }
    }

    /// Run this step against one client
    ///
    /// # Errors
    ///
    /// Whatever the underlying client call returns.
    pub async fn run<E: Engine>(self, client: &mut TestClient<E>) -> Result<(), HarnessError> {
        match self {
            Step::InstallPlugin => client.install_plugin().await,
            Step::CreateVolume => client.create_volume().await,
            Step::ConfirmVolume => client.confirm_volume().await,
            Step::InspectVolume => client.inspect_volume().await,
            Step::CreateContainerWithVolume => client.create_container_with_volume().await,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Passed,
    Failed(String),
}

/// The result of running one step on one node
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestResult {
    pub step: Step,
    pub node: String,
    pub outcome: Outcome,
}

impl TestResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Passed)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Passed => write!(
                f,
                "{} Test: {} [{}] ",
                CHECKMARK.green(),
                self.step,
                self.node
            ),
            Outcome::Failed(error) => write!(
                f,
                "{} Test: {} [{}] Test {} failed. error: {}",
                XMARK.red(),
                self.step,
                self.node,
                self.step,
                error
            ),
        }
    }
}

/// Run `steps` in order, each against every client before moving to the next
///
/// A failing step never stops the run. Later steps for that node will usually fail too,
/// since they rely on what the earlier step should have created.
pub async fn run_steps<E: Engine>(steps: &[Step], clients: &mut [TestClient<E>]) -> Summary {
    let mut results = Vec::with_capacity(steps.len() * clients.len());

    for &step in steps {
        for client in clients.iter_mut() {
            log::debug!("Running {} on {}", step, client.node());
            let outcome = match step.run(client).await {
                Ok(()) => Outcome::Passed,
                Err(e) => {
                    log::debug!("{} failed on {}: {}", step, client.node(), e);
                    Outcome::Failed(e.to_string())
                }
            };

            results.push(TestResult {
                step,
                node: client.node().to_string(),
                outcome,
            });
        }
    }

    Summary { results }
}

/// All results of a run
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    pub results: Vec<TestResult>,
}

impl Summary {
    /// Whether every step passed on every node
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    #[must_use]
    pub fn verdict(&self) -> &'static str {
        if self.passed() {
            "This is a triumph!!!"
        } else {
            "This is a failure!!!"
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result)?;
        }
        write!(f, "\n{}\n", self.verdict())
    }
}
