//! Tears down every node after a run
//!
//! Each node is cleaned in its own task and the tasks are joined, so a node that hangs or
//! fails does not stop the others from being cleaned. Every node yields exactly one
//! [`CleanupReport`], including when its task panics.

use crate::client::TestClient;
use crate::engine::Engine;
use crate::error::HarnessError;
use std::any::Any;
use std::fmt;

/// What happened while cleaning one node
#[derive(Debug)]
pub struct CleanupReport {
    pub node: String,
    pub errors: Vec<HarnessError>,
    /// Whether the whole sequence ran, as opposed to stopping early
    pub completed: bool,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.completed && self.errors.is_empty()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "Cleaned up testbed {}", self.node);
        }

        write!(f, "Error cleaning up {}", self.node)?;
        if !self.completed {
            write!(f, " (stopped early)")?;
        }
        for error in &self.errors {
            write!(f, "; {}", error)?;
        }
        Ok(())
    }
}

/// Clean one node: containers, then volumes, then the plugin
///
/// A container failure is recorded and cleaning carries on. A volume failure is recorded and
/// ends the sequence, leaving the plugin installed.
pub async fn clean<E: Engine>(client: &mut TestClient<E>) -> CleanupReport {
    log::debug!("Cleaning up testbed: {}", client.node());
    let mut errors = Vec::new();

    if let Err(e) = client.clean_containers().await {
        log::error!("Error cleaning containers on {}: {}", client.node(), e);
        errors.push(e);
    }

    if let Err(e) = client.clean_volumes().await {
        log::error!("Error cleaning volumes on {}: {}", client.node(), e);
        errors.push(e);
        return CleanupReport {
            node: client.node().to_string(),
            errors,
            completed: false,
        };
    }

    if let Err(e) = client.delete_plugin().await {
        log::error!("Error deleting plugin on {}: {}", client.node(), e);
        errors.push(e);
    }

    CleanupReport {
        node: client.node().to_string(),
        errors,
        completed: true,
    }
}

/// Clean every node concurrently and wait for all of them
///
/// Reports come back in the same order as `clients`.
pub async fn clean_all<E: Engine>(clients: Vec<TestClient<E>>) -> Vec<CleanupReport> {
    let handles: Vec<_> = clients
        .into_iter()
        .map(|mut client| {
            let node = client.node().to_string();
            let handle = tokio::spawn(async move { clean(&mut client).await });
            (node, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (node, handle) in handles {
        let report = match handle.await {
            Ok(report) => report,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                log::error!("Error cleaning up {}: {}", node, message);
                CleanupReport {
                    errors: vec![HarnessError::CleanupPanicked {
                        node: node.clone(),
                        message,
                    }],
                    node,
                    completed: false,
                }
            }
        };
        reports.push(report);
    }

    reports
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
