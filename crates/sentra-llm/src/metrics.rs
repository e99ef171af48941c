//! Process metrics for Sentra

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total LLM calls
    pub llm_calls: AtomicU64,
    /// Total LLM errors
    pub llm_errors: AtomicU64,
    /// Total tokens used
    pub tokens_used: AtomicU64,
    /// Decision analyses completed
    pub analyses: AtomicU64,
    /// Consensus sessions started
    pub consensus_sessions: AtomicU64,
    /// Batch scans completed
    pub scans_completed: AtomicU64,
    /// Fraud alerts raised
    pub alerts_raised: AtomicU64,
    /// Messages translated between protocols
    pub translations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an LLM call
    pub fn record_llm_call(&self, tokens: u64, error: bool) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.tokens_used.fetch_add(tokens, Ordering::Relaxed);
        if error {
            self.llm_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_analysis(&self) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consensus_session(&self) {
        self.consensus_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed scan and the alerts it raised
    pub fn record_scan(&self, alerts: u64) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.alerts_raised.fetch_add(alerts, Ordering::Relaxed);
    }

    pub fn record_translation(&self) {
        self.translations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            llm_errors: self.llm_errors.load(Ordering::Relaxed),
            tokens_used: self.tokens_used.load(Ordering::Relaxed),
            analyses: self.analyses.load(Ordering::Relaxed),
            consensus_sessions: self.consensus_sessions.load(Ordering::Relaxed),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
        }
    }

    /// Get LLM error rate
    pub fn llm_error_rate(&self) -> f64 {
        let total = self.llm_calls.load(Ordering::Relaxed);
        let errors = self.llm_errors.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            errors as f64 / total as f64
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub llm_calls: u64,
    pub llm_errors: u64,
    pub tokens_used: u64,
    pub analyses: u64,
    pub consensus_sessions: u64,
    pub scans_completed: u64,
    pub alerts_raised: u64,
    pub translations: u64,
}

impl MetricsSnapshot {
    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        let counters: [(&str, &str, u64); 8] = [
            ("sentra_llm_calls_total", "Total number of LLM API calls", self.llm_calls),
            ("sentra_llm_errors_total", "Total number of LLM API errors", self.llm_errors),
            ("sentra_tokens_used_total", "Total tokens consumed by LLM calls", self.tokens_used),
            ("sentra_analyses_total", "Decision analyses completed", self.analyses),
            ("sentra_consensus_sessions_total", "Consensus sessions started", self.consensus_sessions),
            ("sentra_scans_completed_total", "Batch fraud scans completed", self.scans_completed),
            ("sentra_alerts_raised_total", "Fraud alerts raised", self.alerts_raised),
            ("sentra_translations_total", "Messages translated between protocols", self.translations),
        ];

        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value));
        }

        let error_rate = if self.llm_calls > 0 {
            self.llm_errors as f64 / self.llm_calls as f64
        } else {
            0.0
        };
        output.push_str("# HELP sentra_llm_error_rate Current LLM error rate\n");
        output.push_str("# TYPE sentra_llm_error_rate gauge\n");
        output.push_str(&format!("sentra_llm_error_rate {:.4}\n", error_rate));

        output
    }
}

/// Global metrics instance
static GLOBAL_METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get or initialize global metrics
pub fn global_metrics() -> Arc<Metrics> {
    GLOBAL_METRICS
        .get_or_init(|| Arc::new(Metrics::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_llm_call(100, false);
        metrics.record_llm_call(50, true);
        metrics.record_scan(3);
        metrics.record_analysis();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.llm_calls, 2);
        assert_eq!(snapshot.llm_errors, 1);
        assert_eq!(snapshot.tokens_used, 150);
        assert_eq!(snapshot.scans_completed, 1);
        assert_eq!(snapshot.alerts_raised, 3);
        assert_eq!(snapshot.analyses, 1);

        assert_eq!(metrics.llm_error_rate(), 0.5);
    }

    #[test]
    fn test_prometheus_rendering() {
        let metrics = Metrics::new();
        metrics.record_llm_call(10, false);
        let text = metrics.snapshot().to_prometheus();
        assert!(text.contains("sentra_llm_calls_total 1"));
        assert!(text.contains("# TYPE sentra_llm_error_rate gauge"));
    }
}
