#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
    /// Stored and written exactly like a gauge; monotonicity is up to the caller.
    Counter,
    Histogram,
}

impl MetricType {
    pub fn as_prometheus_type(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }

    pub fn is_histogram(&self) -> bool {
        matches!(self, Self::Histogram)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    /// Canonical label order for every series of this metric.
    pub label_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Histogram {
        /// `(upper bound, observations falling in this bucket only)`, ascending.
        buckets: Vec<(f64, u64)>,
        count: u64,
        sum: f64,
    },
}

#[derive(Debug, Clone)]
pub struct MetricSample {
    /// Pre-rendered `key="value",...` series key; empty for unlabeled series.
    pub series_key: String,
    pub value: MetricValue,
}

#[derive(Debug, Clone)]
pub struct CollectedMetric {
    pub descriptor: MetricDescriptor,
    pub samples: Vec<MetricSample>,
}
