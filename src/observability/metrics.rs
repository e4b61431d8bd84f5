//! Metrics for the movie pipeline
//!
//! Thin helpers over the `metrics` facade using Prometheus naming conventions.
//! Without an installed recorder every call is a no-op, so stages can record
//! unconditionally.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

pub const METRICS_ADDR_ENV: &str = "MOVIE_PIPELINE_METRICS_ADDR";

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RunsStarted,
    RecordsIn,
    RecordsExcluded,
    StageDuration,
    PosterFetchAttempts,
    PosterFetchDuration,
    GenreColumnsRetained,
    GenreColumnsDropped,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsStarted => "movie_pipeline_runs_total",
            MetricName::RecordsIn => "movie_pipeline_records_in_total",
            MetricName::RecordsExcluded => "movie_pipeline_records_excluded_total",
            MetricName::StageDuration => "movie_pipeline_stage_duration_seconds",
            MetricName::PosterFetchAttempts => "movie_pipeline_poster_fetch_attempts_total",
            MetricName::PosterFetchDuration => "movie_pipeline_poster_fetch_duration_seconds",
            MetricName::GenreColumnsRetained => "movie_pipeline_genre_columns_retained",
            MetricName::GenreColumnsDropped => "movie_pipeline_genre_columns_dropped",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static INIT: Once = Once::new();

/// Install the Prometheus exporter when `MOVIE_PIPELINE_METRICS_ADDR` is set.
///
/// Idempotent. Batch runs normally leave the variable unset and the facade
/// discards everything.
pub fn init() {
    INIT.call_once(|| {
        let addr_str = match std::env::var(METRICS_ADDR_ENV) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => {
                info!("Metrics exporter disabled ({} not set)", METRICS_ADDR_ENV);
                return;
            }
        };

        let addr: SocketAddr = match addr_str.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr_str, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => info!("Prometheus exporter listening at http://{}/metrics", addr),
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

// ============================================================================
// Run / stage metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    pub fn run_started() {
        ::metrics::counter!(MetricName::RunsStarted.as_str()).increment(1);
    }

    /// Record how many records entered a stage
    pub fn stage_input(stage: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RecordsIn.as_str(), "stage" => stage).increment(count as u64);
    }

    pub fn stage_duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }

    /// Record records dropped by a stage for a given reason
    pub fn records_excluded(stage: &'static str, reason: &str, count: usize) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(
            MetricName::RecordsExcluded.as_str(),
            "stage" => stage,
            "reason" => reason.to_string()
        )
        .increment(count as u64);
    }
}

// ============================================================================
// Poster color metrics
// ============================================================================

pub mod color {
    use super::MetricName;

    /// Record one fetch attempt outcome ("success", "transient", "permanent")
    pub fn fetch_attempt(outcome: &'static str) {
        ::metrics::counter!(MetricName::PosterFetchAttempts.as_str(), "outcome" => outcome).increment(1);
    }

    pub fn fetch_duration(secs: f64) {
        ::metrics::histogram!(MetricName::PosterFetchDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Genre encoding metrics
// ============================================================================

pub mod encode {
    use super::MetricName;

    pub fn genre_columns(retained: usize, dropped: usize) {
        ::metrics::gauge!(MetricName::GenreColumnsRetained.as_str()).set(retained as f64);
        ::metrics::gauge!(MetricName::GenreColumnsDropped.as_str()).set(dropped as f64);
    }
}
