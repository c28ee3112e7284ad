//! Risk levels and dashboard metrics
//!
//! Derived views over the case list. Nothing here mutates a case.

use serde::Serialize;

use crate::case::{CaseRecord, SubmittedAt};

/// Score at or above which a case counts as high risk
pub const HIGH_RISK_SCORE: f64 = 0.7;

/// Score at or above which a case counts as medium risk
pub const MEDIUM_RISK_SCORE: f64 = 0.4;

/// Coarse risk bucket shown next to each case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a case by its label first, then by its score
    pub fn assess(classification: Option<&str>, score: Option<f64>) -> Self {
        let label = classification.unwrap_or_default().to_lowercase();
        if label.contains("high") || score.is_some_and(|s| s >= HIGH_RISK_SCORE) {
            RiskLevel::High
        } else if label.contains("medium") || score.is_some_and(|s| s >= MEDIUM_RISK_SCORE) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn of(case: &CaseRecord) -> Self {
        Self::assess(case.classification.as_deref(), case.composite_score)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Render a score as a whole percentage, or "n/a" while processing
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{}%", (s * 100.0).round() as i64),
        None => "n/a".to_string(),
    }
}

/// Summary counters over the ordered case list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total: usize,
    pub high_risk: usize,
    /// Mean composite score as a rounded percentage; unscored cases count as 0
    pub average_percent: u32,
    /// Timestamp of the most recent case, when it has one
    pub last_updated: Option<SubmittedAt>,
}

impl DashboardMetrics {
    /// Compute metrics over cases already in display order (most recent first)
    pub fn compute(cases: &[CaseRecord]) -> Self {
        let total = cases.len();
        let high_risk = cases
            .iter()
            .filter(|case| {
                let label = case.classification.as_deref().unwrap_or_default().to_lowercase();
                label.contains("high") || case.composite_score.is_some_and(|s| s >= HIGH_RISK_SCORE)
            })
            .count();
        let average_percent = if total == 0 {
            0
        } else {
            let sum: f64 = cases.iter().map(|case| case.composite_score.unwrap_or(0.0)).sum();
            ((sum / total as f64) * 100.0).round().max(0.0) as u32
        };
        let last_updated = cases.first().and_then(|case| case.submitted_at.clone());

        Self {
            total,
            high_risk,
            average_percent,
            last_updated,
        }
    }
}
