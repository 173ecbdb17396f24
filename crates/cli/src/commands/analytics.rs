use approvly_core::config::LoadOptions;
use approvly_core::domain::analytics::{AnalyticsFilter, AnalyticsSummary};
use approvly_core::domain::request::RequestKind;
use approvly_core::domain::user::UserId;
use approvly_core::view::{distribution, title_case, DistributionItem};
use clap::Args;
use serde::Serialize;

use crate::commands::{execute, CommandResult, Reply};

#[derive(Debug, Clone, Default, Args)]
pub struct AnalyticsArgs {
    #[arg(long = "user-id")]
    pub user_id: Option<i64>,
    #[arg(long)]
    pub grade: Option<String>,
    #[arg(long)]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long = "request-type")]
    pub request_type: Option<RequestKind>,
}

impl From<AnalyticsArgs> for AnalyticsFilter {
    fn from(args: AnalyticsArgs) -> Self {
        Self {
            user_id: args.user_id.map(UserId),
            grade: args.grade,
            month: args.month,
            year: args.year,
            request_type: args.request_type,
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalyticsReport {
    summary: AnalyticsSummary,
    status_distribution: Vec<DistributionItem>,
    type_distribution: Vec<DistributionItem>,
}

impl AnalyticsReport {
    fn new(summary: AnalyticsSummary) -> Self {
        let status_distribution = distribution(
            summary.status_counts.iter().map(|(label, count)| (title_case(label), *count as f64)),
        );
        let type_distribution = distribution(
            summary.type_counts.iter().map(|(label, count)| (title_case(label), *count as f64)),
        );
        Self { summary, status_distribution, type_distribution }
    }
}

pub fn run(options: LoadOptions, args: AnalyticsArgs) -> CommandResult {
    execute("analytics", options, |context| async move {
        let summary = context.analytics().summary(&args.into()).await?;
        let message = format!(
            "{} request(s), {} flagged, expenses total {:.2}, average discount {:.1}%",
            summary.total_requests,
            summary.flagged_count,
            summary.financial_summary.total_expense_amount,
            summary.financial_summary.avg_discount_percentage
        );
        Ok(Reply::new(message).with_data(&AnalyticsReport::new(summary)))
    })
}

#[cfg(test)]
mod tests {
    use approvly_core::domain::analytics::AnalyticsSummary;

    use super::AnalyticsReport;

    #[test]
    fn report_derives_rounded_distributions_from_counts() {
        let mut summary = AnalyticsSummary { total_requests: 3, ..AnalyticsSummary::default() };
        summary.status_counts.insert("PENDING".to_string(), 1);
        summary.status_counts.insert("NEEDS_REVIEW".to_string(), 2);

        let report = AnalyticsReport::new(summary);

        let labels: Vec<&str> =
            report.status_distribution.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, ["Needs Review", "Pending"]);
        assert_eq!(report.status_distribution[0].percentage, 67);
        assert_eq!(report.status_distribution[1].percentage, 33);
        assert!(report.type_distribution.is_empty());
    }
}
