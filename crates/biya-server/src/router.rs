use std::sync::Arc;

use axum::{Router, routing::get};
use biya_collectors::Scheduler;
use biya_metrics::ExporterMetrics;

use crate::handlers;

pub struct ExporterState {
    pub metrics: Arc<ExporterMetrics>,
    pub scheduler: Arc<Scheduler>,
}

impl ExporterState {
    pub fn new(metrics: Arc<ExporterMetrics>, scheduler: Arc<Scheduler>) -> Self {
        Self { metrics, scheduler }
    }
}

pub fn exporter_router(state: Arc<ExporterState>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .route("/healthz", get(handlers::health::healthz))
        .route("/readyz", get(handlers::health::readyz))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use biya_collectors::{Collector, Job, Scheduler};
    use biya_common::error::Result;
    use biya_metrics::{BuildInfo, ExporterMetrics};
    use tokio::time::sleep;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::{ExporterState, exporter_router};
    use crate::handlers::metrics::TEXT_FORMAT_CONTENT_TYPE;

    struct Noop;

    #[async_trait]
    impl Collector for Noop {
        async fn collect(&self, _cancel: &CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    fn state() -> Arc<ExporterState> {
        let metrics = Arc::new(ExporterMetrics::new("biya", &BuildInfo::new("0.1.0", "none")));
        let jobs = vec![Job::new("noop", Duration::from_secs(60), Arc::new(Noop))];
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&metrics), jobs));
        Arc::new(ExporterState::new(metrics, scheduler))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn metrics_serves_text_exposition() {
        let state = state();
        state.metrics.set_gauge("x", &[], 42.0);

        let (status, content_type, body) = get(exporter_router(Arc::clone(&state)), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(TEXT_FORMAT_CONTENT_TYPE));
        assert_eq!(body, state.metrics.render_text());
        assert!(body.contains("\nx 42\n"));
        assert!(body.contains("biya_exporter_build_info{version=\"0.1.0\",commit=\"none\"} 1\n"));
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let (status, _, body) = get(exporter_router(state()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn readyz_follows_the_scheduler() {
        let state = state();
        let (status, _, body) = get(exporter_router(Arc::clone(&state)), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "not ready");

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&state.scheduler).run(shutdown.clone()));
        for _ in 0..200 {
            if state.scheduler.ready() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }

        let (status, _, body) = get(exporter_router(Arc::clone(&state)), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ready");

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }
}
