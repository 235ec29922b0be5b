//! Reporter - bounded diagnostic queue
//!
//! Components that swallow errors (looper handlers, the referee accept loop)
//! push them into a bounded queue; a background drain task logs them. The
//! reporter is passed in at construction time rather than living in a global.
//!
//! When the queue is full the [`OverflowPolicy`] decides what happens:
//! - `DropNewest`: the incoming report is discarded immediately
//! - `Block`: the caller waits up to the configured timeout, then discards
//!
//! Either way a discarded report bumps the `dropped` counter.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tracing::{debug, error, info};

use crate::config::ReporterConfig;

/// What to do with a report when the queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the incoming report
    #[default]
    DropNewest,
    /// Wait for space up to the block timeout, then discard
    Block,
}

/// One queued diagnostic
#[derive(Debug, Clone)]
pub struct Report {
    pub context: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.at.to_rfc3339(), self.context, self.message)
    }
}

/// Cloneable handle for pushing reports
#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::Sender<Report>,
    policy: OverflowPolicy,
    block_timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl Reporter {
    /// Create a reporter and the drain that consumes its queue
    pub fn channel(capacity: usize, policy: OverflowPolicy, block_timeout: Duration) -> (Self, ReportDrain) {
        debug!(capacity, ?policy, ?block_timeout, "Reporter::channel: called");
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reporter = Self {
            tx,
            policy,
            block_timeout,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (reporter, ReportDrain { rx })
    }

    pub fn from_config(config: &ReporterConfig) -> (Self, ReportDrain) {
        Self::channel(config.capacity, config.overflow, config.block_timeout())
    }

    /// Queue a report according to the overflow policy
    ///
    /// Returns false if the report was discarded.
    pub async fn report(&self, context: &str, err: impl fmt::Display) -> bool {
        let report = Report {
            context: context.to_string(),
            message: err.to_string(),
            at: Utc::now(),
        };
        match self.policy {
            OverflowPolicy::DropNewest => self.enqueue_or_drop(report),
            OverflowPolicy::Block => match self.tx.send_timeout(report, self.block_timeout).await {
                Ok(()) => true,
                Err(SendTimeoutError::Timeout(report)) => {
                    self.discard(&report, "timed out waiting for queue space");
                    false
                }
                Err(SendTimeoutError::Closed(report)) => {
                    self.discard(&report, "drain closed");
                    false
                }
            },
        }
    }

    /// Queue a report without waiting, whatever the policy
    pub fn try_report(&self, context: &str, err: impl fmt::Display) -> bool {
        self.enqueue_or_drop(Report {
            context: context.to_string(),
            message: err.to_string(),
            at: Utc::now(),
        })
    }

    /// Number of reports discarded so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    fn enqueue_or_drop(&self, report: Report) -> bool {
        match self.tx.try_send(report) {
            Ok(()) => true,
            Err(TrySendError::Full(report)) => {
                self.discard(&report, "queue full");
                false
            }
            Err(TrySendError::Closed(report)) => {
                self.discard(&report, "drain closed");
                false
            }
        }
    }

    fn discard(&self, report: &Report, why: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        debug!(context = %report.context, %why, "Reporter: report discarded");
    }
}

/// Consumer side of the report queue
pub struct ReportDrain {
    rx: mpsc::Receiver<Report>,
}

impl ReportDrain {
    /// Receive the next report
    pub async fn recv(&mut self) -> Option<Report> {
        self.rx.recv().await
    }

    /// Log every report until all reporters are dropped
    pub async fn run(mut self) {
        info!("Report drain started");
        while let Some(report) = self.rx.recv().await {
            error!(context = %report.context, at = %report.at.to_rfc3339(), "{}", report.message);
        }
        info!("Report drain stopped");
    }
}
