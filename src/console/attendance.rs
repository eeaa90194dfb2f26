//! Collector attendance page

use crate::core::controller::ViewStateController;
use crate::core::derive::{DeriveSpec, FilterPredicate, Grouping, Metric};
use crate::core::error::ViewResult;
use crate::core::record::ViewRecord;
use serde::Serialize;
use serde_json::json;

const PRESENCE_RATE: &str = "presence_rate";
const MONTHLY: &str = "monthly";

/// A record counts as present when its status is `present` or `yes`, in any case
pub fn present() -> FilterPredicate {
    FilterPredicate::one_of("status", ["present", "yes"])
}

/// Attendance of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAttendance {
    /// e.g. "June 2025"
    pub month: String,
    pub present: usize,
    pub total: usize,
    /// Rounded percentage, 0 for an empty month
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub presence_rate: f64,
    /// Chronological; only records carrying both a date and a status
    pub months: Vec<MonthlyAttendance>,
}

pub struct AttendancePage {
    controller: ViewStateController,
}

impl AttendancePage {
    pub fn new(controller: ViewStateController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &ViewStateController {
        &self.controller
    }

    pub async fn load(&self) -> ViewResult<Vec<ViewRecord>> {
        self.controller.load().await
    }

    /// Records of one day (`YYYY-MM-DD`); a blank date shows everything
    pub fn on_date(&self, date: &str) -> Vec<ViewRecord> {
        let date = date.trim();
        let spec = if date.is_empty() {
            DeriveSpec::new()
        } else {
            DeriveSpec::new().filter(FilterPredicate::eq("date", json!(date)))
        };
        self.controller.derive(&spec).visible
    }

    pub fn summary(&self) -> AttendanceSummary {
        let overall = self
            .controller
            .derive(&DeriveSpec::new().metric(PRESENCE_RATE, Metric::Ratio(present())));
        let total = overall.total;
        let is_present = present();
        let present_count = overall.visible.iter().filter(|r| is_present.test(r)).count();

        let trend = self.controller.derive(
            &DeriveSpec::new()
                .filter(FilterPredicate::And(vec![
                    FilterPredicate::present("date"),
                    FilterPredicate::present("status"),
                ]))
                .group(Grouping::month(MONTHLY, "date").tally(present())),
        );
        let months = trend
            .buckets(MONTHLY)
            .iter()
            .map(|bucket| MonthlyAttendance {
                month: bucket.key.clone(),
                present: bucket.matched.unwrap_or(0),
                total: bucket.count,
                rate: bucket.rate(),
            })
            .collect();

        AttendanceSummary {
            total,
            present: present_count,
            absent: total - present_count,
            presence_rate: overall.metric(PRESENCE_RATE),
            months,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsoleConfig, resources};
    use crate::storage::InMemoryDocumentStore;
    use std::sync::Arc;

    fn page(store: InMemoryDocumentStore) -> AttendancePage {
        let config = ConsoleConfig::default_config();
        let resource = config.resource(resources::ATTENDANCE).unwrap().clone();
        AttendancePage::new(ViewStateController::new(Arc::new(store), resource))
    }

    #[test]
    fn test_present_predicate() {
        let record = |status: &str| {
            ViewRecord::new("a", [("status".to_string(), json!(status))].into_iter().collect())
        };
        assert!(present().test(&record("Present")));
        assert!(present().test(&record("YES")));
        assert!(!present().test(&record("Absent")));
        assert!(!present().test(&record("late")));
    }

    #[tokio::test]
    async fn test_summary_and_date_filter() {
        let store = InMemoryDocumentStore::with_documents(
            "attendance",
            [
                ("a1", json!({"date": "2025-06-03", "status": "Present"})),
                ("a2", json!({"date": "2025-06-10", "status": "Absent"})),
                ("a3", json!({"date": "2025-07-01", "status": "yes"})),
            ],
        );
        let page = page(store);
        page.load().await.unwrap();

        let summary = page.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.presence_rate, 66.7);
        assert_eq!(
            summary.months,
            vec![
                MonthlyAttendance {
                    month: "June 2025".to_string(),
                    present: 1,
                    total: 2,
                    rate: 50.0,
                },
                MonthlyAttendance {
                    month: "July 2025".to_string(),
                    present: 1,
                    total: 1,
                    rate: 100.0,
                },
            ]
        );

        assert_eq!(page.on_date("2025-06-10").len(), 1);
        assert_eq!(page.on_date(" ").len(), 3);
        assert!(page.on_date("2024-01-01").is_empty());
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let page = page(InMemoryDocumentStore::new());
        page.load().await.unwrap();
        let summary = page.summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.presence_rate, 0.0);
        assert!(summary.months.is_empty());
    }
}
