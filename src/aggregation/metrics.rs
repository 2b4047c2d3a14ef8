//! Single-value metric aggregations.

use crate::aggregation::AggregationTarget;
use crate::aggregation::request::MetricKind;
use crate::aggregation::result::AggregationResult;

/// Compute a metric over the numeric doc values of `field`.
///
/// `value_count` counts every doc value (numeric or not). The other metrics
/// skip non-numeric values; `avg`, `min` and `max` of nothing are `null`
/// while `sum` of nothing is `0`.
pub fn metric(kind: MetricKind, field: &str, targets: &[AggregationTarget<'_>]) -> AggregationResult {
    let values = targets.iter().flat_map(|target| {
        target
            .docs
            .iter()
            .flat_map(move |doc_id| target.state.doc_values().values(field, *doc_id))
    });

    if kind == MetricKind::ValueCount {
        return AggregationResult::Metric(Some(values.count() as f64));
    }

    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values.filter_map(|v| v.as_f64()) {
        count += 1;
        sum += value;
        min = min.min(value);
        max = max.max(value);
    }

    let value = match kind {
        MetricKind::Sum => Some(sum),
        _ if count == 0 => None,
        MetricKind::Avg => Some(sum / count as f64),
        MetricKind::Min => Some(min),
        MetricKind::Max => Some(max),
        MetricKind::ValueCount => Some(count as f64),
    };
    AggregationResult::Metric(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::state_with;
    use serde_json::json;

    #[test]
    fn test_metrics() {
        let (state, mapping) = state_with(vec![
            json!({"age": 30, "state": "ID"}),
            json!({"age": 40, "state": "ID"}),
            json!({"state": "TX"}),
        ]);
        let targets = [AggregationTarget::new(&state, &mapping, state.doc_ids(), 1)];

        assert_eq!(metric(MetricKind::Avg, "age", &targets).value(), Some(35.0));
        assert_eq!(metric(MetricKind::Sum, "age", &targets).value(), Some(70.0));
        assert_eq!(metric(MetricKind::Min, "age", &targets).value(), Some(30.0));
        assert_eq!(metric(MetricKind::Max, "age", &targets).value(), Some(40.0));
        assert_eq!(metric(MetricKind::ValueCount, "age", &targets).value(), Some(2.0));
        assert_eq!(metric(MetricKind::ValueCount, "state.keyword", &targets).value(), Some(3.0));
    }

    #[test]
    fn test_empty_input() {
        let (state, mapping) = state_with(vec![json!({"state": "TX"})]);
        let targets = [AggregationTarget::new(&state, &mapping, Default::default(), 1)];
        assert_eq!(metric(MetricKind::Avg, "age", &targets), AggregationResult::Metric(None));
        assert_eq!(metric(MetricKind::Max, "age", &targets), AggregationResult::Metric(None));
        assert_eq!(metric(MetricKind::Sum, "age", &targets), AggregationResult::Metric(Some(0.0)));
    }
}
