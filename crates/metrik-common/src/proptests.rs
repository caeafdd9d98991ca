//! Property tests for the metric wire, display and signing forms.
//!
//! Ids are drawn from the path-safe alphabet so the short form stays
//! splittable on `/`. Gauge values stay within a range where `value + 1.0`
//! still moves the six-digit canonical form.

use crate::metric::{Metric, MetricKind};
use proptest::prelude::*;

fn arb_id() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_.-]{0,31}"
}

fn arb_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,24}"
}

fn arb_metric() -> impl Strategy<Value = Metric> {
    prop_oneof![
        (arb_id(), -1e12..1e12f64).prop_map(|(id, v)| Metric::gauge(id, v)),
        (arb_id(), any::<i64>()).prop_map(|(id, d)| Metric::counter(id, d)),
    ]
}

/// Same id, other kind, payload carried over numerically.
fn with_other_kind(m: &Metric) -> Metric {
    match m.kind() {
        MetricKind::Gauge => {
            Metric::counter(m.id.clone(), m.float_value().unwrap_or_default() as i64)
        }
        MetricKind::Counter => Metric::gauge(m.id.clone(), m.delta().unwrap_or_default() as f64),
    }
}

fn with_other_payload(m: &Metric) -> Metric {
    match m.kind() {
        MetricKind::Gauge => {
            Metric::gauge(m.id.clone(), m.float_value().unwrap_or_default() + 1.0)
        }
        MetricKind::Counter => {
            Metric::counter(m.id.clone(), m.delta().unwrap_or_default().wrapping_add(1))
        }
    }
}

fn with_other_id(m: &Metric) -> Metric {
    let id = format!("{}x", m.id);
    match m.kind() {
        MetricKind::Gauge => Metric::gauge(id, m.float_value().unwrap_or_default()),
        MetricKind::Counter => Metric::counter(id, m.delta().unwrap_or_default()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn json_round_trip_keeps_every_field(m in arb_metric(), key in "[a-z0-9]{0,8}") {
        let m = m.signed(&key).unwrap();
        let text = serde_json::to_string(&m).unwrap();
        let back: Metric = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(back, m);
    }

    #[test]
    fn short_form_round_trip_is_stable(m in arb_metric()) {
        let text = m.to_string();
        let back: Metric = text.parse().unwrap();
        prop_assert_eq!(back.to_string(), text);
        prop_assert_eq!(back.key(), m.key());
    }

    #[test]
    fn path_params_rebuild_the_metric(m in arb_metric()) {
        let params = m.path_params();
        let rebuilt =
            Metric::with_value(&params["type"], &params["id"], params["value"].as_str()).unwrap();
        prop_assert_eq!(rebuilt.to_string(), m.to_string());
    }

    #[test]
    fn sign_is_deterministic_and_empty_without_key(m in arb_metric(), key in arb_key()) {
        let tag = m.sign(&key).unwrap();
        prop_assert_eq!(tag.len(), 64);
        prop_assert_eq!(m.sign(&key).unwrap(), tag);
        prop_assert_eq!(m.sign("").unwrap(), "");
    }

    #[test]
    fn sign_changes_with_id_kind_and_payload(m in arb_metric(), key in arb_key()) {
        let tag = m.sign(&key).unwrap();
        prop_assert_ne!(with_other_id(&m).sign(&key).unwrap(), tag.clone());
        prop_assert_ne!(with_other_kind(&m).sign(&key).unwrap(), tag.clone());
        prop_assert_ne!(with_other_payload(&m).sign(&key).unwrap(), tag);
    }
}
