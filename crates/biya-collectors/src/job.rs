use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use biya_common::error::{ExporterError, Result};
use tokio_util::sync::CancellationToken;

/// One collection routine. A run either succeeds or returns the reason it
/// failed; "no value available" is a success that writes nothing.
///
/// `cancel` fires on shutdown. Collectors should stop waiting on upstreams
/// once it does and return [`ExporterError::Cancelled`].
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, cancel: &CancellationToken) -> Result<()>;
}

/// Awaits `request` unless `cancel` fires first.
pub async fn unless_cancelled<F: Future>(cancel: &CancellationToken, request: F) -> Result<F::Output> {
    cancel
        .run_until_cancelled(request)
        .await
        .ok_or(ExporterError::Cancelled)
}

/// A named collector scheduled on a fixed interval.
///
/// The name doubles as the `source` label of the scrape metrics and as the
/// readiness key, so it must be unique and stable.
#[derive(Clone)]
pub struct Job {
    pub name: String,
    pub interval: Duration,
    pub collector: Arc<dyn Collector>,
}

impl Job {
    pub fn new(name: impl Into<String>, interval: Duration, collector: Arc<dyn Collector>) -> Self {
        Self {
            name: name.into(),
            interval,
            collector,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
