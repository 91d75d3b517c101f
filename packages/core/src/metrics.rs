//! Metrics Calculator
//!
//! Pure functions deciding the effective value of each metric for a node.
//!
//! # Rule
//!
//! Applied independently per metric:
//!
//! 1. An explicit override in `set_metrics` wins unconditionally
//! 2. Otherwise the minimum over the children's effective values
//! 3. Otherwise the metric's default
//!
//! A node may therefore have some metrics pinned and others derived.

use crate::models::{Metric, MetricMap, MetricsPatch};
use crate::tree::TreeError;

/// Effective value of one metric
///
/// `child_values` are the children's effective values for the same metric.
pub fn calculate_metric(
    metric: Metric,
    set_overrides: &MetricMap,
    child_values: impl IntoIterator<Item = f64>,
) -> f64 {
    if let Some(value) = set_overrides.get(&metric) {
        return *value;
    }

    child_values
        .into_iter()
        .reduce(f64::min)
        .unwrap_or_else(|| metric.default_value())
}

/// Effective value of every metric
///
/// `children` are the children's calculated metric maps. A child missing a
/// metric contributes that metric's default.
pub fn calculate_metrics<'a>(
    set_overrides: &MetricMap,
    children: impl IntoIterator<Item = &'a MetricMap> + Clone,
) -> MetricMap {
    Metric::ALL
        .iter()
        .map(|metric| {
            let child_values = children.clone().into_iter().map(|calculated| {
                calculated
                    .get(metric)
                    .copied()
                    .unwrap_or_else(|| metric.default_value())
            });
            (*metric, calculate_metric(*metric, set_overrides, child_values))
        })
        .collect()
}

/// Merge a partial metric patch into existing overrides
///
/// - `None` in the patch erases the override
/// - a metric absent from the patch is left untouched
/// - any value replaces the override
///
/// The result only ever holds explicit numbers, so an override map with every
/// metric erased is empty rather than a map of nulls.
pub fn merge_metrics(existing: &MetricMap, patch: &MetricsPatch) -> MetricMap {
    let mut merged = existing.clone();
    for (metric, value) in patch {
        match value {
            Some(value) => {
                merged.insert(*metric, *value);
            }
            None => {
                merged.remove(metric);
            }
        }
    }
    merged
}

/// Check an override value against the metric's domain
///
/// # Errors
///
/// `TreeError::InvalidMetricValue` if the value is not finite, is fractional
/// for an integral metric, or lies outside the metric's range.
pub fn validate_metric_value(metric: Metric, value: f64) -> Result<(), TreeError> {
    if !value.is_finite() {
        return Err(TreeError::invalid_metric_value(
            metric,
            value,
            "value must be a finite number",
        ));
    }

    if metric.is_integral() && value.fract() != 0.0 {
        return Err(TreeError::invalid_metric_value(
            metric,
            value,
            "value must be a whole number",
        ));
    }

    let (min, max) = metric.range();
    if value < min || value > max {
        return Err(TreeError::invalid_metric_value(
            metric,
            value,
            format!("value must be between {} and {}", min, max),
        ));
    }

    Ok(())
}

/// Validate every explicit value in a set of overrides
pub fn validate_metrics(set_overrides: &MetricMap) -> Result<(), TreeError> {
    set_overrides
        .iter()
        .try_for_each(|(metric, value)| validate_metric_value(*metric, *value))
}

/// Validate every explicit value in a patch (erasures are always valid)
pub fn validate_patch(patch: &MetricsPatch) -> Result<(), TreeError> {
    patch
        .iter()
        .filter_map(|(metric, value)| value.map(|v| (*metric, v)))
        .try_for_each(|(metric, value)| validate_metric_value(metric, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RL: Metric = Metric::ReadinessLevel;

    fn overrides(value: Option<f64>) -> MetricMap {
        value.map(|v| (RL, v)).into_iter().collect()
    }

    #[test]
    fn test_override_wins_over_children() {
        assert_eq!(calculate_metric(RL, &overrides(Some(7.0)), [1.0, 2.0]), 7.0);
    }

    #[test]
    fn test_minimum_of_children_without_override() {
        assert_eq!(calculate_metric(RL, &overrides(None), [5.0, 2.0, 8.0]), 2.0);
    }

    #[test]
    fn test_default_without_override_or_children() {
        assert_eq!(calculate_metric(RL, &overrides(None), Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn test_calculate_metrics_uses_child_maps() {
        let a = overrides(Some(5.0));
        let b = overrides(Some(2.0));

        let result = calculate_metrics(&MetricMap::new(), [&a, &b]);

        assert_eq!(result[&RL], 2.0);
    }

    #[test]
    fn test_calculate_metrics_missing_child_metric_counts_as_default() {
        let a = overrides(Some(5.0));
        let empty = MetricMap::new();

        let result = calculate_metrics(&MetricMap::new(), [&a, &empty]);

        assert_eq!(result[&RL], 0.0);
    }

    #[test]
    fn test_merge_null_erases_override() {
        let mut patch = MetricsPatch::new();
        patch.insert(RL, None);

        let merged = merge_metrics(&overrides(Some(5.0)), &patch);

        assert!(merged.is_empty());
    }

    #[test]
    fn test_merge_absent_keeps_existing() {
        let merged = merge_metrics(&overrides(Some(5.0)), &MetricsPatch::new());
        assert_eq!(merged, overrides(Some(5.0)));
    }

    #[test]
    fn test_merge_value_replaces() {
        let mut patch = MetricsPatch::new();
        patch.insert(RL, Some(3.0));

        assert_eq!(merge_metrics(&overrides(Some(5.0)), &patch), overrides(Some(3.0)));
        assert_eq!(merge_metrics(&MetricMap::new(), &patch), overrides(Some(3.0)));
    }

    #[test]
    fn test_validate_metric_value_bounds() {
        assert!(validate_metric_value(RL, 0.0).is_ok());
        assert!(validate_metric_value(RL, 9.0).is_ok());
        assert!(validate_metric_value(RL, 10.0).is_err());
        assert!(validate_metric_value(RL, -1.0).is_err());
        assert!(validate_metric_value(RL, 2.5).is_err());
        assert!(validate_metric_value(RL, f64::NAN).is_err());
    }

    #[test]
    fn test_validate_patch_ignores_erasures() {
        let mut patch = MetricsPatch::new();
        patch.insert(RL, None);
        assert!(validate_patch(&patch).is_ok());

        patch.insert(RL, Some(12.0));
        assert!(matches!(
            validate_patch(&patch),
            Err(TreeError::InvalidMetricValue { .. })
        ));
    }
}
