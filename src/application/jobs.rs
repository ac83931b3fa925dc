//! Supervised background jobs
//!
//! Uploads and the store-clearing request run detached from the capture
//! loop. Every job reports back through one channel, so the run can log
//! each outcome and wait for stragglers before it exits.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::delivery::DeliveryError;
use super::ports::TransportError;
use crate::domain::delivery::DeliveryReport;

/// Final word from a background job
#[derive(Debug)]
pub enum JobReport {
    /// A segment upload finished, accepted or not
    Delivery {
        segment: u64,
        result: Result<DeliveryReport, DeliveryError>,
    },
    /// The remote store truncation request finished
    StoreCleared(Result<String, TransportError>),
    /// The job panicked or was aborted before reporting
    Crashed {
        label: String,
        segment: Option<u64>,
        reason: String,
    },
}

/// Owns the report channel for every job spawned during a run
pub struct JobSupervisor {
    tx: mpsc::UnboundedSender<JobReport>,
    rx: mpsc::UnboundedReceiver<JobReport>,
}

impl JobSupervisor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Handle that can spawn jobs from other tasks
    pub fn spawner(&self) -> JobSpawner {
        JobSpawner {
            tx: self.tx.clone(),
        }
    }

    /// Wait until every job spawned so far (and by any live spawner) has
    /// reported, then return the reports in completion order.
    pub async fn wait_all(self) -> Vec<JobReport> {
        let Self { tx, mut rx } = self;
        drop(tx);

        let mut reports = Vec::new();
        while let Some(report) = rx.recv().await {
            reports.push(report);
        }
        reports
    }
}

impl Default for JobSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for spawning supervised jobs
#[derive(Clone)]
pub struct JobSpawner {
    tx: mpsc::UnboundedSender<JobReport>,
}

impl JobSpawner {
    /// Spawn `job` on the runtime. Its report (or a `Crashed` report if it
    /// panics) is delivered to the owning [`JobSupervisor`].
    pub fn spawn<F>(&self, label: impl Into<String>, segment: Option<u64>, job: F)
    where
        F: Future<Output = JobReport> + Send + 'static,
    {
        let label = label.into();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            debug!(job = %label, "background job started");
            let report = match tokio::spawn(job).await {
                Ok(report) => report,
                Err(e) => {
                    error!(job = %label, "background job crashed: {}", e);
                    JobReport::Crashed {
                        label,
                        segment,
                        reason: e.to_string(),
                    }
                }
            };
            // The supervisor only goes away after draining, so a failed send
            // means the run was abandoned.
            let _ = tx.send(report);
        });
    }
}
