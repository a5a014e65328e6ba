//! The run-level report.
//!
//! Aggregates every per-record degradation so an aborted or degraded run
//! can state which stage, which value, and what fraction of records were
//! affected.

use serde::{Deserialize, Serialize};

use reel_models::{format_seconds, AlignmentWarning, EnrichmentGap, SelectionDiagnostics};
use reel_telemetry::RideStats;

/// Everything the operator needs to judge a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub ride: Option<RideStats>,
    pub alignment_warnings: Vec<AlignmentWarning>,
    pub enrichment_gaps: Vec<EnrichmentGap>,
    /// Fraction of sampled moments whose enrichment degraded.
    pub degraded_fraction: f64,
    pub selection: Option<SelectionDiagnostics>,
}

impl RunReport {
    pub fn record_warning(&mut self, warning: AlignmentWarning) {
        self.alignment_warnings.push(warning);
    }

    pub fn record_warnings(&mut self, warnings: impl IntoIterator<Item = AlignmentWarning>) {
        self.alignment_warnings.extend(warnings);
    }

    pub fn record_gaps(&mut self, gaps: impl IntoIterator<Item = EnrichmentGap>) {
        self.enrichment_gaps.extend(gaps);
    }

    /// One-line human summary for logs.
    pub fn summary(&self) -> String {
        let ride = match &self.ride {
            Some(r) => format!(
                "ride {} / {:.1} km, ",
                format_seconds(r.duration_s),
                r.distance_km
            ),
            None => String::new(),
        };
        let selection = match &self.selection {
            Some(d) if d.accepted > 0 => format!("{} clips selected", d.accepted),
            Some(d) => format!(
                "selection empty (dominant filter: {})",
                d.dominant_filter().unwrap_or("none")
            ),
            None => "no selection yet".to_string(),
        };
        format!(
            "{ride}{} warnings, {} gaps ({:.1}% of moments degraded), {}",
            self.alignment_warnings.len(),
            self.enrichment_gaps.len(),
            self.degraded_fraction * 100.0,
            selection
        )
    }
}
