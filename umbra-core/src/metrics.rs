//! Named metrics published by an exploration.
//!
//! Metric payloads are dynamically typed but self-describing: a tagged union
//! of scalars, sequences and nested records, so callers can consume them
//! without reflection and the JSON rendering stays stable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Token;

use crate::component::ComponentResult;

/// A metric payload: scalar, sequence, or nested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MetricValue {
    /// An integer metric value (e.g. a count).
    Long(i64),

    /// A floating-point metric value (e.g. an estimate or a ratio).
    Double(f64),

    /// A text metric value.
    Text(String),

    /// A boolean metric value.
    Boolean(bool),

    /// An ordered sequence of metric values (e.g. histogram buckets).
    Sequence(Vec<MetricValue>),

    /// A record of named metric values, ordered by key.
    Record(BTreeMap<String, MetricValue>),
}

impl MetricValue {
    /// Checks if the metric value is numeric (Long or Double).
    pub fn is_numeric(&self) -> bool {
        matches!(self, MetricValue::Long(_) | MetricValue::Double(_))
    }

    /// Attempts to get the numeric value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Double(v) => Some(*v),
            MetricValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Builds a record value from name/value pairs.
    pub fn record<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<MetricValue>,
    {
        MetricValue::Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Converts a raw column token into a metric value.
    ///
    /// Used when publishing distinct values of a column whose type is only
    /// known at runtime; non-scalar tokens fall back to their JSON rendering.
    pub fn from_token(token: &Token) -> Self {
        match token {
            Token::Bool(b) => MetricValue::Boolean(*b),
            Token::Number(n) => {
                if let Some(v) = n.as_i64() {
                    MetricValue::Long(v)
                } else {
                    MetricValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Token::String(s) => MetricValue::Text(s.clone()),
            other => MetricValue::Text(other.to_string()),
        }
    }

    /// Returns a human-readable string representation of the metric value.
    pub fn to_string_pretty(&self) -> String {
        match self {
            MetricValue::Double(v) => {
                if v.fract() == 0.0 {
                    format!("{v:.0}")
                } else {
                    format!("{v:.4}")
                }
            }
            MetricValue::Long(v) => v.to_string(),
            MetricValue::Text(s) => s.clone(),
            MetricValue::Boolean(b) => b.to_string(),
            MetricValue::Sequence(s) => format!("Sequence({} elements)", s.len()),
            MetricValue::Record(r) => format!("Record({} fields)", r.len()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_pretty())
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Long(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Long(value as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Double(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Boolean(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<Vec<MetricValue>> for MetricValue {
    fn from(value: Vec<MetricValue>) -> Self {
        MetricValue::Sequence(value)
    }
}

/// One published metric: a name paired with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// The metric's name, e.g. `refined_min` or `histogram.buckets`.
    pub name: String,
    /// The metric's payload.
    pub value: MetricValue,
}

impl Metric {
    /// Creates a metric.
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The growing snapshot of metrics published by one exploration.
///
/// Safe to read at any time; readers observe everything published so far, in
/// publish order.
#[derive(Debug, Default)]
pub struct MetricsSink {
    metrics: Mutex<Vec<Metric>>,
}

impl MetricsSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch of metrics.
    pub fn extend(&self, metrics: impl IntoIterator<Item = Metric>) {
        self.metrics
            .lock()
            .expect("metrics sink poisoned")
            .extend(metrics);
    }

    /// Returns a snapshot of everything published so far.
    pub fn snapshot(&self) -> Vec<Metric> {
        self.metrics.lock().expect("metrics sink poisoned").clone()
    }
}

/// Adapts a component's eventual result into named metrics.
///
/// Publishers hold a non-owning reference to the memoized node they wrap;
/// awaiting the node from here is what triggers the component graph.
#[async_trait]
pub trait PublisherComponent: Send + Sync {
    /// The publisher's name, used for logging and failure reporting.
    fn name(&self) -> &'static str;

    /// Awaits the wrapped result and renders it as metrics.
    ///
    /// A component that degraded (e.g. an unbucketable histogram) returns an
    /// empty batch rather than an error.
    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_serialization() {
        let value = MetricValue::record([
            ("total_count", MetricValue::Long(100)),
            ("suppressed_ratio", MetricValue::Double(0.05)),
        ]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "Record");
        assert_eq!(json["value"]["total_count"]["type"], "Long");
        assert_eq!(json["value"]["total_count"]["value"], 100);
    }

    #[test]
    fn test_from_token_scalars() {
        assert_eq!(MetricValue::from_token(&json!(true)), MetricValue::Boolean(true));
        assert_eq!(MetricValue::from_token(&json!(7)), MetricValue::Long(7));
        assert_eq!(MetricValue::from_token(&json!(2.5)), MetricValue::Double(2.5));
        assert_eq!(
            MetricValue::from_token(&json!("ok")),
            MetricValue::Text("ok".to_string())
        );
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(MetricValue::Long(3).as_f64(), Some(3.0));
        assert_eq!(MetricValue::Double(0.5).as_i64(), None);
        assert!(MetricValue::Long(3).is_numeric());
        assert!(!MetricValue::Text("3".into()).is_numeric());
    }

    #[test]
    fn test_sink_snapshot_preserves_publish_order() {
        let sink = MetricsSink::new();
        sink.extend([Metric::new("count", 10i64)]);
        sink.extend([
            Metric::new("naive_min", 1.5),
            Metric::new("naive_max", 9.5),
        ]);

        let names: Vec<_> = sink.snapshot().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["count", "naive_min", "naive_max"]);
    }
}
