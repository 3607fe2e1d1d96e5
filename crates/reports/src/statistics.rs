use std::collections::BTreeMap;

use serde::Serialize;

use crate::{ReportStatus, ReportType};

/// Aggregate counts over the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStatistics {
    pub total_reports: u64,
    pub by_status: BTreeMap<&'static str, u64>,
    pub by_type: BTreeMap<&'static str, u64>,
    /// Share of answered (RESUELTO + CERRADO) reports, e.g. `"66.7%"`.
    pub response_rate: String,
}

impl ReportStatistics {
    /// Build from `(status, type, count)` groups. Every enum value is
    /// present in the output, zero-filled.
    pub fn from_groups(groups: impl IntoIterator<Item = (ReportStatus, ReportType, u64)>) -> Self {
        let mut by_status: BTreeMap<&'static str, u64> =
            ReportStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        let mut by_type: BTreeMap<&'static str, u64> =
            ReportType::ALL.iter().map(|t| (t.as_str(), 0)).collect();
        let mut total = 0u64;
        let mut answered = 0u64;

        for (status, report_type, count) in groups {
            total += count;
            if status.is_answered() {
                answered += count;
            }
            *by_status.entry(status.as_str()).or_default() += count;
            *by_type.entry(report_type.as_str()).or_default() += count;
        }

        let rate = answered as f64 / total.max(1) as f64 * 100.0;
        Self {
            total_reports: total,
            by_status,
            by_type,
            response_rate: format!("{rate:.1}%"),
        }
    }
}
