//! Garbage pickup requests and collector assignment

use crate::core::controller::ViewStateController;
use crate::core::derive::{Bucket, DeriveSpec, FilterPredicate};
use crate::core::error::{ValidationError, ViewResult};
use crate::core::field::key_label;
use crate::core::record::{Patch, ViewRecord};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

pub const ASSIGNED: &str = "Assigned";
pub const UNSPECIFIED_COLLECTOR: &str = "Unspecified Collector";

/// Status tabs of the requests table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    Pending,
    Assigned,
    Completed,
    All,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 4] = [
        StatusFilter::Pending,
        StatusFilter::Assigned,
        StatusFilter::Completed,
        StatusFilter::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Pending => "Pending",
            StatusFilter::Assigned => "Assigned",
            StatusFilter::Completed => "Completed",
            StatusFilter::All => "All",
        }
    }

    pub fn predicate(&self) -> FilterPredicate {
        match self {
            StatusFilter::All => FilterPredicate::Always,
            other => FilterPredicate::eq_ignore_case("status", other.as_str()),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusFilter::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "status".to_string(),
                message: format!("unknown status filter '{}'", s),
            })
    }
}

pub struct PickupsPage {
    requests: ViewStateController,
    collectors: ViewStateController,
}

impl PickupsPage {
    pub fn new(requests: ViewStateController, collectors: ViewStateController) -> Self {
        Self {
            requests,
            collectors,
        }
    }

    pub fn requests(&self) -> &ViewStateController {
        &self.requests
    }

    pub fn collectors(&self) -> &ViewStateController {
        &self.collectors
    }

    pub async fn load(&self) -> ViewResult<Vec<ViewRecord>> {
        self.requests.load().await
    }

    pub fn filtered(&self, filter: StatusFilter) -> Vec<ViewRecord> {
        self.requests
            .derive(&DeriveSpec::new().filter(filter.predicate()))
            .visible
    }

    pub fn status_counts(&self) -> Vec<Bucket> {
        self.requests
            .derive(&DeriveSpec::new().group_by("status", "status"))
            .buckets("status")
            .to_vec()
    }

    /// Distinct service areas of all collectors, in first-seen order
    pub async fn collector_areas(&self) -> ViewResult<Vec<String>> {
        let collectors = self.collectors.load().await?;
        let areas: IndexSet<String> = collectors
            .iter()
            .filter_map(|c| c.get("area").and_then(key_label))
            .collect();
        Ok(areas.into_iter().collect())
    }

    /// Collectors serving one area, queried from the store
    pub async fn collectors_in(&self, area: &str) -> ViewResult<Vec<ViewRecord>> {
        let area = area.trim();
        if area.is_empty() {
            return Err(ValidationError::EmptyValue {
                field: "area".to_string(),
            }
            .into());
        }
        let query = self
            .collectors
            .resource()
            .query
            .clone()
            .where_eq("area", json!(area));
        self.collectors.load_query(&query).await
    }

    /// Assign a collector to a request once the store confirms it
    pub async fn assign(&self, request_id: &str, collector: &ViewRecord, area: &str) -> ViewResult<()> {
        let area = area.trim();
        if area.is_empty() {
            return Err(ValidationError::EmptyValue {
                field: "area".to_string(),
            }
            .into());
        }

        let name = collector
            .get_str("fullName")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNSPECIFIED_COLLECTOR);

        let patch = Patch::new()
            .set("status", json!(ASSIGNED))
            .set("assignedCollectorId", json!(collector.id))
            .set("assignedCollectorName", json!(name))
            .set("area", json!(area));

        tracing::info!(request_id = %request_id, collector_id = %collector.id, %area, "assigning collector");
        self.requests.mutate(request_id, patch).await
    }
}
