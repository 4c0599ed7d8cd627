//! One harness run over connected clients: the suite, a state dump, then cleanup

use crate::cleanup::{CleanupReport, clean_all};
use crate::client::TestClient;
use crate::engine::Engine;
use crate::error::HarnessError;
use crate::runner::{Step, Summary, run_steps};

/// Everything a run produced
#[derive(Debug)]
pub struct RunOutcome {
    /// `None` when the suite was skipped
    pub summary: Option<Summary>,
    pub cleanup: Vec<CleanupReport>,
}

impl RunOutcome {
    /// Whether any step failed or any node was not cleaned up
    #[must_use]
    pub fn failed(&self) -> bool {
        self.summary.as_ref().is_some_and(|s| !s.passed())
            || self.cleanup.iter().any(|r| !r.is_clean())
    }

    /// Process exit status: failures only count when `strict` is set
    #[must_use]
    pub fn exit_status(&self, strict: bool) -> u8 {
        u8::from(strict && self.failed())
    }
}

/// Run the suite on every client unless `clean_only`, then clean every node
///
/// The summary is printed as soon as the suite finishes. Cleanup always runs, whatever the
/// steps did, and consumes the clients.
pub async fn run<E: Engine>(mut clients: Vec<TestClient<E>>, clean_only: bool) -> RunOutcome {
    let summary = if clean_only {
        log::info!("Skipping tests, running just testbed cleaning");
        None
    } else {
        log::debug!("Starting volume tests");
        let summary = run_steps(Step::suite(), &mut clients).await;
        println!("{}", summary);
        Some(summary)
    };

    if log::log_enabled!(log::Level::Debug) {
        for client in &clients {
            if let Err(e) = dump_state(client).await {
                log::debug!("Could not list state of {}: {}", client.node(), e);
            }
        }
    }

    let cleanup = clean_all(clients).await;
    for report in &cleanup {
        if report.is_clean() {
            log::info!("{}", report);
        } else {
            log::error!("{}", report);
        }
    }

    RunOutcome { summary, cleanup }
}

async fn dump_state<E: Engine>(client: &TestClient<E>) -> Result<(), HarnessError> {
    client.log_containers().await?;
    client.log_volumes().await?;
    client.log_plugins().await
}
