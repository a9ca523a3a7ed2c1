use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, warn};

use crate::types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue};

/// A `(label key, label value)` pair supplied by a caller.
pub type Label<'a> = (&'a str, &'a str);

/// Process-wide series store.
///
/// Every declaration, write and render goes through one coarse `RwLock`, so a
/// render always observes whole updates. Families and series live in ordered
/// maps, which gives the exposition its name and series-key ordering for free.
pub struct MetricsRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    families: BTreeMap<String, MetricFamily>,
}

struct MetricFamily {
    descriptor: MetricDescriptor,
    series: FamilySeries,
}

enum FamilySeries {
    Gauge(BTreeMap<String, f64>),
    Histogram(BTreeMap<String, HistogramSeries>),
}

struct HistogramSeries {
    buckets: Vec<f64>,
    /// Per-bucket counts, not cumulative. Cumulation happens at render time.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl MetricFamily {
    fn new(descriptor: MetricDescriptor) -> Self {
        let series = if descriptor.metric_type.is_histogram() {
            FamilySeries::Histogram(BTreeMap::new())
        } else {
            FamilySeries::Gauge(BTreeMap::new())
        };
        Self { descriptor, series }
    }
}

impl HistogramSeries {
    fn new(buckets: Vec<f64>) -> Self {
        Self {
            counts: vec![0; buckets.len()],
            buckets,
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        if let Some(index) = self.buckets.iter().position(|bound| value <= *bound) {
            self.counts[index] += 1;
        }
        self.count += 1;
        self.sum += value;
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Registers a metric. The first registration of a name wins; later
    /// declarations of the same name are ignored.
    pub fn declare(&self, name: &str, metric_type: MetricType, help: &str, label_keys: &[&str]) {
        let descriptor = MetricDescriptor {
            name: name.to_string(),
            help: help.to_string(),
            metric_type,
            label_keys: label_keys.iter().map(|key| (*key).to_string()).collect(),
        };

        let mut state = self.write();
        if let Some(existing) = state.families.get(name) {
            if existing.descriptor != descriptor {
                warn!(
                    metric = name,
                    existing_type = existing.descriptor.metric_type.as_prometheus_type(),
                    requested_type = metric_type.as_prometheus_type(),
                    existing_labels = ?existing.descriptor.label_keys,
                    requested_labels = ?label_keys,
                    "metric redeclared with a different shape, keeping first declaration"
                );
            }
            return;
        }

        state
            .families
            .insert(name.to_string(), MetricFamily::new(descriptor));
    }

    /// Upserts the value of a gauge or counter series.
    ///
    /// An undeclared name is auto-declared as a gauge without help text whose label
    /// order is the alphabetical order of the supplied keys.
    pub fn set_gauge(&self, name: &str, labels: &[Label<'_>], value: f64) {
        let mut state = self.write();
        let family = family_entry(&mut state, name, MetricType::Gauge, labels);
        let key = series_key(&family.descriptor, labels);

        match &mut family.series {
            FamilySeries::Gauge(series) => {
                series.insert(key, value);
            }
            FamilySeries::Histogram(_) => {
                warn!(metric = name, "set_gauge on a histogram metric ignored");
            }
        }
    }

    /// Records one observation into a histogram series.
    ///
    /// The bucket layout is fixed by the first observation of each series;
    /// a different layout on a later call is ignored.
    pub fn observe_histogram(&self, name: &str, labels: &[Label<'_>], buckets: &[f64], value: f64) {
        let mut state = self.write();
        let family = family_entry(&mut state, name, MetricType::Histogram, labels);
        let key = series_key(&family.descriptor, labels);

        let FamilySeries::Histogram(series) = &mut family.series else {
            warn!(metric = name, "observe_histogram on a non-histogram metric ignored");
            return;
        };

        let requested = normalize_buckets(buckets);
        let entry = series
            .entry(key)
            .or_insert_with(|| HistogramSeries::new(requested.clone()));
        if entry.buckets != requested {
            debug!(
                metric = name,
                kept = ?entry.buckets,
                ignored = ?requested,
                "histogram bucket layout differs from first observation"
            );
        }
        entry.observe(value);
    }

    /// Current value of a gauge/counter series, if it has been written.
    #[cfg(test)]
    pub(crate) fn gauge_value(&self, name: &str, labels: &[Label<'_>]) -> Option<f64> {
        let state = self.read();
        let family = state.families.get(name)?;
        let FamilySeries::Gauge(series) = &family.series else {
            return None;
        };
        series.get(&series_key(&family.descriptor, labels)).copied()
    }

    /// Snapshot of every family, sorted by name, series sorted by key.
    pub fn collect_all(&self) -> Vec<CollectedMetric> {
        let state = self.read();
        state
            .families
            .values()
            .map(|family| CollectedMetric {
                descriptor: family.descriptor.clone(),
                samples: match &family.series {
                    FamilySeries::Gauge(series) => series
                        .iter()
                        .map(|(key, value)| MetricSample {
                            series_key: key.clone(),
                            value: MetricValue::Gauge(*value),
                        })
                        .collect(),
                    FamilySeries::Histogram(series) => series
                        .iter()
                        .map(|(key, histogram)| MetricSample {
                            series_key: key.clone(),
                            value: MetricValue::Histogram {
                                buckets: histogram
                                    .buckets
                                    .iter()
                                    .copied()
                                    .zip(histogram.counts.iter().copied())
                                    .collect(),
                                count: histogram.count,
                                sum: histogram.sum,
                            },
                        })
                        .collect(),
                },
            })
            .collect()
    }

    /// Renders the Prometheus text exposition of the current state.
    pub fn render_text(&self) -> String {
        let mut output = String::new();

        for metric in self.collect_all() {
            let name = &metric.descriptor.name;
            output.push_str("# HELP ");
            output.push_str(name);
            output.push(' ');
            output.push_str(&escape_help(&metric.descriptor.help));
            output.push('\n');

            output.push_str("# TYPE ");
            output.push_str(name);
            output.push(' ');
            output.push_str(metric.descriptor.metric_type.as_prometheus_type());
            output.push('\n');

            for sample in metric.samples {
                match sample.value {
                    MetricValue::Gauge(value) => {
                        push_sample_line(&mut output, name, &sample.series_key, &format_value(value));
                    }
                    MetricValue::Histogram {
                        buckets,
                        count,
                        sum,
                    } => {
                        let bucket_name = format!("{name}_bucket");
                        let mut cumulative = 0_u64;
                        for (bound, bucket_count) in buckets {
                            cumulative = cumulative.saturating_add(bucket_count);
                            push_sample_line(
                                &mut output,
                                &bucket_name,
                                &with_le(&sample.series_key, &format_value(bound)),
                                &cumulative.to_string(),
                            );
                        }
                        push_sample_line(
                            &mut output,
                            &bucket_name,
                            &with_le(&sample.series_key, "+Inf"),
                            &count.to_string(),
                        );
                        push_sample_line(
                            &mut output,
                            &format!("{name}_sum"),
                            &sample.series_key,
                            &format_value(sum),
                        );
                        push_sample_line(
                            &mut output,
                            &format!("{name}_count"),
                            &sample.series_key,
                            &count.to_string(),
                        );
                    }
                }
            }
        }

        output
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn family_entry<'a>(
    state: &'a mut RegistryState,
    name: &str,
    metric_type: MetricType,
    labels: &[Label<'_>],
) -> &'a mut MetricFamily {
    state.families.entry(name.to_string()).or_insert_with(|| {
        let mut label_keys: Vec<String> =
            labels.iter().map(|(key, _)| (*key).to_string()).collect();
        label_keys.sort();
        label_keys.dedup();
        debug!(
            metric = name,
            metric_type = metric_type.as_prometheus_type(),
            "auto-declaring undeclared metric"
        );
        MetricFamily::new(MetricDescriptor {
            name: name.to_string(),
            help: String::new(),
            metric_type,
            label_keys,
        })
    })
}

/// Builds the `key="value",...` identity of a series in declared label order.
/// Keys the caller did not supply are left out.
fn series_key(descriptor: &MetricDescriptor, labels: &[Label<'_>]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let mut keys: Vec<&str> = descriptor.label_keys.iter().map(String::as_str).collect();
    if keys.is_empty() {
        keys = labels.iter().map(|(key, _)| *key).collect();
        keys.sort_unstable();
        keys.dedup();
    }

    let mut rendered = String::new();
    for key in keys {
        let Some((_, value)) = labels.iter().find(|(candidate, _)| *candidate == key) else {
            continue;
        };
        if !rendered.is_empty() {
            rendered.push(',');
        }
        rendered.push_str(key);
        rendered.push_str("=\"");
        rendered.push_str(&escape_label_value(value));
        rendered.push('"');
    }
    rendered
}

fn normalize_buckets(buckets: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = buckets
        .iter()
        .copied()
        .filter(|bound| !bound.is_nan() && *bound != f64::INFINITY)
        .collect();
    sorted.sort_by(|left, right| left.total_cmp(right));
    sorted.dedup();
    sorted
}

fn with_le(series_key: &str, bound: &str) -> String {
    if series_key.is_empty() {
        format!("le=\"{bound}\"")
    } else {
        format!("{series_key},le=\"{bound}\"")
    }
}

fn push_sample_line(output: &mut String, name: &str, labels: &str, value: &str) {
    output.push_str(name);
    if !labels.is_empty() {
        output.push('{');
        output.push_str(labels);
        output.push('}');
    }
    output.push(' ');
    output.push_str(value);
    output.push('\n');
}

/// Shortest round-trip decimal, never in exponent form.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', " ")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
