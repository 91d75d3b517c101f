//! Metric names and metric maps
//!
//! Metrics are numeric values attached to every node. Each node carries two maps:
//!
//! - `setMetrics`: explicit overrides entered by a user (partial, often empty)
//! - `calculatedMetrics`: the effective value of every metric (always complete)
//!
//! Only one metric exists today (`readinessLevel`), but all code iterates
//! [`Metric::ALL`] so adding a variant is enough to introduce a new metric.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Map of metric name to value
pub type MetricMap = BTreeMap<Metric, f64>;

/// Partial metric update
///
/// - key absent: leave the existing override untouched
/// - `None` (JSON `null`): erase the override, return to automatic
/// - `Some(value)`: replace the override
pub type MetricsPatch = BTreeMap<Metric, Option<f64>>;

/// Named metric tracked for every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// How ready a problem/solution is, 0 (idea) to 9 (proven)
    ReadinessLevel,
}

impl Metric {
    /// Every known metric, in serialization order
    pub const ALL: [Metric; 1] = [Metric::ReadinessLevel];

    /// Value used when a node has neither an override nor children
    pub fn default_value(self) -> f64 {
        match self {
            Metric::ReadinessLevel => 0.0,
        }
    }

    /// Inclusive range of accepted override values
    pub fn range(self) -> (f64, f64) {
        match self {
            Metric::ReadinessLevel => (0.0, 9.0),
        }
    }

    /// Whether override values must be whole numbers
    pub fn is_integral(self) -> bool {
        match self {
            Metric::ReadinessLevel => true,
        }
    }

    /// Wire name of the metric (matches the serde representation)
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::ReadinessLevel => "readinessLevel",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric map holding the default value of every metric
pub fn default_metrics() -> MetricMap {
    Metric::ALL
        .iter()
        .map(|metric| (*metric, metric.default_value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_serializes_as_camel_case_key() {
        let mut map = MetricMap::new();
        map.insert(Metric::ReadinessLevel, 4.0);

        assert_eq!(serde_json::to_value(&map).unwrap(), json!({"readinessLevel": 4.0}));
    }

    #[test]
    fn test_patch_distinguishes_null_from_value() {
        let patch: MetricsPatch = serde_json::from_value(json!({"readinessLevel": null})).unwrap();
        assert_eq!(patch.get(&Metric::ReadinessLevel), Some(&None));

        let patch: MetricsPatch = serde_json::from_value(json!({"readinessLevel": 3})).unwrap();
        assert_eq!(patch.get(&Metric::ReadinessLevel), Some(&Some(3.0)));

        let patch: MetricsPatch = serde_json::from_value(json!({})).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_default_metrics_is_complete() {
        let defaults = default_metrics();
        assert_eq!(defaults.len(), Metric::ALL.len());
        assert_eq!(defaults[&Metric::ReadinessLevel], 0.0);
    }
}
