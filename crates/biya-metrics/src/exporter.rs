use crate::{
    catalog::{self, CATALOG, SEEDED_ZERO},
    registry::{Label, MetricsRegistry},
};

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
}

impl BuildInfo {
    pub fn new(version: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commit: commit.into(),
        }
    }
}

/// Typed entry point used by collectors and the scheduler.
///
/// Construction declares the whole catalog, seeds the headline series with
/// zero and publishes the build info gauge once.
pub struct ExporterMetrics {
    chain_id: String,
    registry: MetricsRegistry,
}

impl ExporterMetrics {
    pub fn new(chain_id: impl Into<String>, build: &BuildInfo) -> Self {
        let registry = MetricsRegistry::new();
        for spec in CATALOG {
            registry.declare(spec.name, spec.metric_type, spec.help, spec.label_keys);
        }
        for (name, labels) in SEEDED_ZERO {
            registry.set_gauge(name, labels, 0.0);
        }
        registry.set_gauge(
            catalog::BUILD_INFO,
            &[("version", build.version.as_str()), ("commit", build.commit.as_str())],
            1.0,
        );

        Self {
            chain_id: chain_id.into(),
            registry,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn set_gauge(&self, metric: &str, labels: &[Label<'_>], value: f64) {
        self.registry.set_gauge(metric, labels, value);
    }

    /// Sets a `chain_id`-labeled gauge for the configured chain.
    pub fn set_chain_gauge(&self, metric: &str, value: f64) {
        self.registry
            .set_gauge(metric, &[("chain_id", self.chain_id.as_str())], value);
    }

    pub fn set_source_up(&self, source: &str, up: bool) {
        self.registry
            .set_gauge(catalog::SOURCE_UP, &[("source", source)], bool_value(up));
    }

    pub fn set_scrape_success(&self, job: &str, success: bool) {
        self.registry
            .set_gauge(catalog::SCRAPE_SUCCESS, &[("source", job)], bool_value(success));
    }

    /// Records one collector run latency for `job`.
    pub fn observe_duration(&self, job: &str, seconds: f64) {
        self.registry.observe_histogram(
            catalog::SCRAPE_DURATION_SECONDS,
            &[("source", job)],
            catalog::SCRAPE_DURATION_BUCKETS,
            seconds,
        );
    }

    pub fn observe_histogram(&self, metric: &str, labels: &[Label<'_>], buckets: &[f64], value: f64) {
        self.registry.observe_histogram(metric, labels, buckets, value);
    }

    pub fn render_text(&self) -> String {
        self.registry.render_text()
    }
}

fn bool_value(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::{BuildInfo, ExporterMetrics};
    use crate::catalog;

    fn metrics() -> ExporterMetrics {
        ExporterMetrics::new("biya", &BuildInfo::new("0.1.0", "abc123"))
    }

    #[test]
    fn construction_seeds_headline_series() {
        let output = metrics().render_text();
        assert!(output.contains("\nbiya_block_height 0\n"));
        assert!(output.contains("\nbiya_tx_total{status=\"failed\"} 0\n"));
        assert!(output.contains("\nbiya_tx_total{status=\"success\"} 0\n"));
        assert!(output.contains("\nbiya_mempool_capacity 0\n"));
        assert!(output.contains("# TYPE biya_blocks_total counter\n"));
        assert!(output.contains("# TYPE biya_exporter_scrape_duration_seconds histogram\n"));
    }

    #[test]
    fn build_info_is_published_once() {
        let output = metrics().render_text();
        assert!(output.contains("biya_exporter_build_info{version=\"0.1.0\",commit=\"abc123\"} 1\n"));
        assert_eq!(output.matches("biya_exporter_build_info{").count(), 1);
    }

    #[test]
    fn duration_uses_fixed_ladder_labeled_by_job() {
        let metrics = metrics();
        metrics.observe_duration("realtime_chain", 0.03);

        let output = metrics.render_text();
        let buckets = output
            .lines()
            .filter(|line| line.starts_with("biya_exporter_scrape_duration_seconds_bucket{source=\"realtime_chain\""))
            .count();
        assert_eq!(buckets, catalog::SCRAPE_DURATION_BUCKETS.len() + 1);
        assert!(output.contains(
            "biya_exporter_scrape_duration_seconds_bucket{source=\"realtime_chain\",le=\"0.025\"} 0\n"
        ));
        assert!(output.contains(
            "biya_exporter_scrape_duration_seconds_bucket{source=\"realtime_chain\",le=\"0.05\"} 1\n"
        ));
        assert!(output.contains("biya_exporter_scrape_duration_seconds_count{source=\"realtime_chain\"} 1\n"));
    }

    #[test]
    fn chain_gauges_carry_the_chain_id() {
        let metrics = metrics();
        assert_eq!(metrics.chain_id(), "biya");
        metrics.set_chain_gauge(catalog::CHAIN_HEAD_BLOCK_HEIGHT, 1234.0);
        metrics.set_scrape_success("minute_chain", false);
        metrics.set_source_up("tendermint_status", true);

        let output = metrics.render_text();
        assert!(output.contains("biya_chain_head_block_height{chain_id=\"biya\"} 1234\n"));
        assert!(output.contains("biya_exporter_scrape_success{source=\"minute_chain\"} 0\n"));
        assert!(output.contains("biya_exporter_source_up{source=\"tendermint_status\"} 1\n"));
    }
}
