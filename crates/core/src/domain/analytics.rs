use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::request::RequestKind;
use crate::domain::user::UserId;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(default)]
    pub total_expense_amount: f64,
    #[serde(default)]
    pub avg_discount_percentage: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(default)]
    pub avg_processing_time_hours: Option<f64>,
}

/// Aggregates computed by the server; the client only renders them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_requests: u64,
    #[serde(default)]
    pub status_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub type_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub financial_summary: FinancialSummary,
    #[serde(default)]
    pub performance_metrics: PerformanceMetrics,
    #[serde(default)]
    pub flagged_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyticsFilter {
    pub user_id: Option<UserId>,
    pub grade: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub request_type: Option<RequestKind>,
}

impl AnalyticsFilter {
    /// Query parameters in a stable order, unset fields omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(user_id) = self.user_id {
            pairs.push(("user_id", user_id.0.to_string()));
        }
        if let Some(grade) = self.grade.as_deref().filter(|grade| !grade.trim().is_empty()) {
            pairs.push(("grade", grade.to_string()));
        }
        if let Some(month) = self.month {
            pairs.push(("month", month.to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        if let Some(request_type) = self.request_type {
            pairs.push(("request_type", request_type.as_str().to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AnalyticsFilter, AnalyticsSummary};
    use crate::domain::request::RequestKind;
    use crate::domain::user::UserId;

    #[test]
    fn unset_filters_are_omitted_from_query() {
        assert!(AnalyticsFilter::default().query_pairs().is_empty());

        let filter = AnalyticsFilter {
            user_id: Some(UserId(4)),
            month: Some(3),
            request_type: Some(RequestKind::Discount),
            grade: Some(" ".to_string()),
            ..AnalyticsFilter::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("user_id", "4".to_string()),
                ("month", "3".to_string()),
                ("request_type", "DISCOUNT".to_string()),
            ]
        );
    }

    #[test]
    fn summary_tolerates_missing_processing_time() {
        let summary: AnalyticsSummary = serde_json::from_value(json!({
            "total_requests": 3,
            "status_counts": {"PENDING": 1, "APPROVED": 2},
            "type_counts": {"LEAVE": 3},
            "financial_summary": {"total_expense_amount": 0, "avg_discount_percentage": 0},
            "performance_metrics": {"avg_processing_time_hours": null},
            "flagged_count": 0
        }))
        .expect("decode summary");

        assert_eq!(summary.status_counts.get("APPROVED"), Some(&2));
        assert_eq!(summary.performance_metrics.avg_processing_time_hours, None);
    }
}
