//! Prometheus counters for the order, return and coupon workflows.
//!
//! All metrics live in a crate-local [`Registry`] so embedding applications
//! can merge or ignore them; [`gather_text`] renders the text exposition format.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::errors::ServiceError;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new_custom(Some("marketplace".into()), None)
        .expect("registry can be created");
    static ref WORKFLOW_ACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "workflow_actions_total",
            "Total number of workflow actions completed"
        ),
        &["action"]
    )
    .expect("metric can be created");
    static ref WORKFLOW_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "workflow_failures_total",
            "Total number of failed workflow actions"
        ),
        &["action", "error_type"]
    )
    .expect("metric can be created");
    static ref GUARD_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "guard_rejections_total",
            "Actions refused locally before any request was sent"
        ),
        &["action"]
    )
    .expect("metric can be created");
}

fn ensure_registered() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
            Box::new(WORKFLOW_ACTIONS.clone()),
            Box::new(WORKFLOW_FAILURES.clone()),
            Box::new(GUARD_REJECTIONS.clone()),
        ];
        for collector in collectors {
            if let Err(err) = REGISTRY.register(collector) {
                warn!(error = %err, "failed to register metric");
            }
        }
    });
}

pub fn record_success(action: &str) {
    ensure_registered();
    WORKFLOW_ACTIONS.with_label_values(&[action]).inc();
}

/// Counts a failure; client-side refusals go to the guard counter.
pub fn record_failure(action: &str, error: &ServiceError) {
    ensure_registered();
    if error.is_client_side() {
        GUARD_REJECTIONS.with_label_values(&[action]).inc();
    } else {
        WORKFLOW_FAILURES
            .with_label_values(&[action, error.kind()])
            .inc();
    }
}

pub fn success_count(action: &str) -> u64 {
    WORKFLOW_ACTIONS.with_label_values(&[action]).get()
}

pub fn guard_rejection_count(action: &str) -> u64 {
    GUARD_REJECTIONS.with_label_values(&[action]).get()
}

/// Text exposition of every registered metric.
pub fn gather_text() -> String {
    ensure_registered();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
