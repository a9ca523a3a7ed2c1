use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use biya_common::error::{ExporterError, Result};
use biya_metrics::ExporterMetrics;
use tokio::{
    task::JoinSet,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job::Job;

/// Runs every job on its own interval loop and tracks process readiness.
///
/// Readiness flips to true once each scheduled job has succeeded at least
/// once and never flips back.
pub struct Scheduler {
    metrics: Arc<ExporterMetrics>,
    jobs: Vec<Job>,
    ready: AtomicBool,
    /// Scheduled jobs that have not yet completed a successful run.
    pending: Mutex<HashSet<String>>,
}

impl Scheduler {
    pub fn new(metrics: Arc<ExporterMetrics>, jobs: Vec<Job>) -> Self {
        let pending = jobs
            .iter()
            .filter(|job| !job.interval.is_zero())
            .map(|job| job.name.clone())
            .collect();

        Self {
            metrics,
            jobs,
            ready: AtomicBool::new(false),
            pending: Mutex::new(pending),
        }
    }

    pub fn ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Runs all job loops until `shutdown` is cancelled, then waits for every
    /// loop to finish its current run. The same token reaches each collector
    /// so in-flight upstream calls can be abandoned.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(ExporterError::NoJobs);
        }

        let mut loops = JoinSet::new();
        for job in &self.jobs {
            if job.interval.is_zero() {
                warn!(job = %job.name, interval = ?job.interval, "skip job with non-positive interval");
                continue;
            }

            let scheduler = Arc::clone(&self);
            let job = job.clone();
            let shutdown = shutdown.clone();
            loops.spawn(async move { scheduler.run_job_loop(job, shutdown).await });
        }
        info!(jobs = loops.len(), "scheduler started");

        shutdown.cancelled().await;
        while let Some(joined) = loops.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "job loop terminated abnormally");
            }
        }

        info!("scheduler stopped");
        Ok(())
    }

    async fn run_job_loop(&self, job: Job, shutdown: CancellationToken) {
        // First run happens right away so a fresh process has data early.
        self.run_once(&job, &shutdown).await;

        let mut ticker = time::interval_at(Instant::now() + job.interval, job.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.run_once(&job, &shutdown).await,
            }
        }
        debug!(job = %job.name, "job loop stopped");
    }

    async fn run_once(&self, job: &Job, shutdown: &CancellationToken) {
        let started = Instant::now();
        let outcome = job.collector.collect(shutdown).await;
        let duration_s = started.elapsed().as_secs_f64();

        if let Err(ExporterError::Cancelled) = outcome {
            debug!(job = %job.name, duration_s, "collector run cancelled");
            return;
        }

        self.metrics.observe_duration(&job.name, duration_s);
        match outcome {
            Ok(()) => {
                self.metrics.set_scrape_success(&job.name, true);
                debug!(job = %job.name, duration_s, "collector run ok");
                self.mark_job_ready(&job.name);
            }
            Err(err) => {
                self.metrics.set_scrape_success(&job.name, false);
                error!(
                    job = %job.name,
                    duration_s,
                    error = %err,
                    error_kind = err.kind(),
                    "collector run failed"
                );
            }
        }
    }

    fn mark_job_ready(&self, name: &str) {
        if self.ready() {
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.remove(name) {
            return;
        }
        if pending.is_empty() {
            self.ready.store(true, Ordering::Release);
            info!("every job completed a successful run, exporter is ready");
        }
    }
}
