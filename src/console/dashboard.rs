//! Landing-page totals

use crate::core::controller::ViewStateController;
use crate::core::derive::{DeriveSpec, Metric};
use crate::core::error::ViewResult;
use serde::Serialize;

const AVERAGE_RATING: &str = "average_rating";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub users: usize,
    pub collectors: usize,
    pub attendance_entries: usize,
    pub feedback_entries: usize,
    /// Mean `totalRating`, one decimal; missing ratings count as 0
    pub average_rating: f64,
}

pub struct DashboardPage {
    users: ViewStateController,
    collectors: ViewStateController,
    attendance: ViewStateController,
    feedback: ViewStateController,
}

impl DashboardPage {
    pub fn new(
        users: ViewStateController,
        collectors: ViewStateController,
        attendance: ViewStateController,
        feedback: ViewStateController,
    ) -> Self {
        Self {
            users,
            collectors,
            attendance,
            feedback,
        }
    }

    pub fn users(&self) -> &ViewStateController {
        &self.users
    }

    pub fn collectors(&self) -> &ViewStateController {
        &self.collectors
    }

    pub fn attendance(&self) -> &ViewStateController {
        &self.attendance
    }

    pub fn feedback(&self) -> &ViewStateController {
        &self.feedback
    }

    /// Load every source concurrently and summarize
    ///
    /// All four loads run to completion so each controller settles as
    /// `Ready` or `Failed`; the first failure is returned.
    pub async fn load(&self) -> ViewResult<DashboardSummary> {
        let (users, collectors, attendance, feedback) = tokio::join!(
            self.users.load(),
            self.collectors.load(),
            self.attendance.load(),
            self.feedback.load()
        );
        users?;
        collectors?;
        attendance?;
        feedback?;
        Ok(self.summary())
    }

    pub fn summary(&self) -> DashboardSummary {
        let spec =
            DeriveSpec::new().metric(AVERAGE_RATING, Metric::Average("totalRating".to_string()));
        let feedback = self.feedback.derive(&spec);

        DashboardSummary {
            users: self.users.records().len(),
            collectors: self.collectors.records().len(),
            attendance_entries: self.attendance.records().len(),
            feedback_entries: feedback.total,
            average_rating: feedback.metric(AVERAGE_RATING),
        }
    }
}
