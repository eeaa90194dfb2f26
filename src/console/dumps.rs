//! Illegal-dump reports: review table, hotspots and map view

use crate::config::MapConfig;
use crate::core::controller::ViewStateController;
use crate::core::derive::{Bucket, BucketOrder, DeriveSpec, FilterPredicate, Grouping, UNKNOWN_LABEL};
use crate::core::error::{ValidationError, ViewResult};
use crate::core::field::GeoPoint;
use crate::core::record::{Patch, ViewRecord};
use serde::Serialize;
use serde_json::json;

pub const PENDING: &str = "Pending";
pub const RESOLVED: &str = "Resolved";

/// One report pinned on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub id: String,
    pub position: GeoPoint,
    pub status: String,
    /// Pending reports are drawn in the alert colour
    pub pending: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: GeoPoint,
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
}

pub struct DumpsPage {
    controller: ViewStateController,
    map: MapConfig,
    unknown_label: String,
}

impl DumpsPage {
    pub fn new(controller: ViewStateController, map: MapConfig) -> Self {
        Self {
            controller,
            map,
            unknown_label: UNKNOWN_LABEL.to_string(),
        }
    }

    /// Label for reports without an area
    pub fn unknown_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_label = label.into();
        self
    }

    pub fn controller(&self) -> &ViewStateController {
        &self.controller
    }

    pub async fn load(&self) -> ViewResult<Vec<ViewRecord>> {
        self.controller.load().await
    }

    /// Mark a pending report as resolved
    pub async fn resolve(&self, id: &str) -> ViewResult<()> {
        let record = self
            .controller
            .find(id)
            .ok_or_else(|| ValidationError::UnknownRecord { id: id.to_string() })?;
        // the dumps resource normalizes a missing status to Pending
        let status = record.get_str("status").unwrap_or(PENDING);
        if !status.eq_ignore_ascii_case(PENDING) {
            return Err(ValidationError::InvalidTransition {
                id: id.to_string(),
                from: status.to_string(),
                to: RESOLVED.to_string(),
            }
            .into());
        }
        self.set_status(id, RESOLVED).await
    }

    /// Overwrite the status of a report
    pub async fn set_status(&self, id: &str, status: &str) -> ViewResult<()> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ValidationError::EmptyValue {
                field: "status".to_string(),
            }
            .into());
        }
        self.controller
            .mutate(id, Patch::new().set("status", json!(status)))
            .await
    }

    pub fn pending(&self) -> Vec<ViewRecord> {
        self.controller
            .derive(&DeriveSpec::new().filter(FilterPredicate::eq_ignore_case("status", PENDING)))
            .visible
    }

    /// Report counts per area, busiest first
    pub fn hotspots(&self) -> Vec<Bucket> {
        let grouping = Grouping::field("hotspots", "area")
            .order(BucketOrder::CountDesc)
            .unknown_label(self.unknown_label.clone());
        self.controller
            .derive(&DeriveSpec::new().group(grouping))
            .buckets("hotspots")
            .to_vec()
    }

    pub fn status_breakdown(&self) -> Vec<Bucket> {
        self.controller
            .derive(&DeriveSpec::new().group_by("status", "status"))
            .buckets("status")
            .to_vec()
    }

    /// Markers for every report with coordinates, centred on their average
    ///
    /// Without coordinates the configured default centre and zoom are used.
    pub fn map_view(&self) -> MapView {
        let view = self.controller.derive(
            &DeriveSpec::new()
                .filter(FilterPredicate::And(vec![
                    FilterPredicate::present("latitude"),
                    FilterPredicate::present("longitude"),
                ]))
                .with_centroid(),
        );

        let markers: Vec<MapMarker> = view
            .visible
            .iter()
            .filter_map(|record| {
                let position =
                    GeoPoint::new(record.get_f64("latitude")?, record.get_f64("longitude")?);
                let status = record.get_str("status").unwrap_or(PENDING).to_string();
                Some(MapMarker {
                    id: record.id.clone(),
                    position,
                    pending: status.eq_ignore_ascii_case(PENDING),
                    status,
                    description: record.get_str("locationDescription").map(str::to_string),
                })
            })
            .collect();

        match view.centroid {
            Some(center) if !markers.is_empty() => MapView {
                center,
                zoom: self.map.focused_zoom,
                markers,
            },
            _ => MapView {
                center: self.map.default_center,
                zoom: self.map.default_zoom,
                markers,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsoleConfig, resources};
    use crate::storage::InMemoryDocumentStore;
    use std::sync::Arc;

    fn page(store: Arc<InMemoryDocumentStore>) -> DumpsPage {
        let config = ConsoleConfig::default_config();
        let resource = config.resource(resources::DUMPS).unwrap().clone();
        DumpsPage::new(ViewStateController::new(store, resource), config.map.clone())
    }

    fn reports() -> Arc<InMemoryDocumentStore> {
        Arc::new(InMemoryDocumentStore::with_documents(
            "alerts",
            [
                (
                    "d1",
                    json!({
                        "date": "2025-06-03",
                        "area": "Market",
                        "location": {"latitude": 10.0, "longitude": 70.0},
                        "locationDescription": "Behind the stalls",
                    }),
                ),
                (
                    "d2",
                    json!({
                        "date": "2025-06-02",
                        "area": "Market",
                        "status": "Resolved",
                        "location": {"latitude": 12.0, "longitude": 72.0},
                    }),
                ),
                ("d3", json!({"date": "2025-06-01"})),
            ],
        ))
    }

    #[tokio::test]
    async fn test_resolve_pending_report() {
        let store = reports();
        let page = page(store.clone());
        page.load().await.unwrap();
        assert_eq!(page.pending().len(), 2);

        page.resolve("d1").await.unwrap();

        assert_eq!(page.controller().find("d1").unwrap().get_str("status"), Some(RESOLVED));
        assert_eq!(store.get("alerts", "d1").unwrap()["status"], RESOLVED);
        assert_eq!(page.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_twice_is_refused() {
        let page = page(reports());
        page.load().await.unwrap();

        let err = page.resolve("d2").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_hotspots_use_sentinel_last() {
        let page = page(reports());
        page.load().await.unwrap();

        let hotspots = page.hotspots();
        assert_eq!(hotspots.len(), 2);
        assert_eq!((hotspots[0].key.as_str(), hotspots[0].count), ("Market", 2));
        assert_eq!((hotspots[1].key.as_str(), hotspots[1].count), (UNKNOWN_LABEL, 1));
    }

    #[tokio::test]
    async fn test_map_view_centres_on_reports() {
        let page = page(reports());
        page.load().await.unwrap();

        let map = page.map_view();
        assert_eq!(map.markers.len(), 2);
        assert_eq!(map.zoom, 10);
        assert_eq!(map.center, GeoPoint::new(11.0, 71.0));
        assert!(map.markers[0].pending);
        assert!(!map.markers[1].pending);
        assert_eq!(map.markers[0].description.as_deref(), Some("Behind the stalls"));
    }

    #[tokio::test]
    async fn test_map_view_without_coordinates() {
        let page = page(Arc::new(InMemoryDocumentStore::new()));
        page.load().await.unwrap();

        let map = page.map_view();
        assert!(map.markers.is_empty());
        assert_eq!(map.zoom, 5);
        assert_eq!(map.center, GeoPoint::new(20.5937, 78.9629));
    }
}
