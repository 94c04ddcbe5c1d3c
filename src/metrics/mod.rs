//! Metrics module
//!
//! Prometheus counters for uploads, language classification, upload
//! authorizations and deletions. Exposed by the upload service at `/metrics`.

use crate::router::LanguageLabel;
use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec, Encoder, TextEncoder};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "kb_uploads_total",
        "Total number of bulk uploads",
        &["prefix", "status"]
    ).unwrap();

    // Classification metrics
    pub static ref CLASSIFICATIONS_TOTAL: CounterVec = register_counter_vec!(
        "kb_classifications_total",
        "Language classifications by resulting label",
        &["language", "fallback"]
    ).unwrap();

    // Upload service metrics
    pub static ref AUTHORIZATIONS_TOTAL: CounterVec = register_counter_vec!(
        "kb_upload_authorizations_total",
        "Write authorizations requested from the upload service",
        &["status"]
    ).unwrap();

    // Maintenance metrics
    pub static ref DELETIONS_TOTAL: Counter = register_counter!(
        "kb_deletions_total",
        "Objects deleted by maintenance operations"
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(prefix: &str) {
    UPLOADS_TOTAL.with_label_values(&[prefix, "success"]).inc();
}

/// Record a failed upload
pub fn record_upload_failure(prefix: &str) {
    UPLOADS_TOTAL.with_label_values(&[prefix, "failure"]).inc();
}

/// Record a language classification
pub fn record_classification(language: LanguageLabel, fallback: bool) {
    let fallback = if fallback { "true" } else { "false" };
    CLASSIFICATIONS_TOTAL
        .with_label_values(&[language.as_str(), fallback])
        .inc();
}

/// Record a write authorization request
pub fn record_authorization(success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTHORIZATIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record deleted objects
pub fn record_deletions(count: usize) {
    DELETIONS_TOTAL.inc_by(count as f64);
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
