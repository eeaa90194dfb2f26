//! Console pages built on [`ViewStateController`]
//!
//! [`Console`] wires a store and a [`ConsoleConfig`] together and hands out
//! one page object per screen. Every controller it creates publishes on the
//! same [`EventBus`], so a single subscriber sees activity from all pages.
//!
//! ```rust,ignore
//! let console = Console::new(store, ConsoleConfig::default_config());
//! let dumps = console.dumps()?;
//! dumps.load().await?;
//! dumps.resolve("dump-1").await?;
//! ```

pub mod attendance;
pub mod dashboard;
pub mod directory;
pub mod dumps;
pub mod pickups;
pub mod proofs;

pub use attendance::{AttendancePage, AttendanceSummary, MonthlyAttendance};
pub use dashboard::{DashboardPage, DashboardSummary};
pub use directory::DirectoryPage;
pub use dumps::{DumpsPage, MapMarker, MapView};
pub use pickups::{PickupsPage, StatusFilter};
pub use proofs::{ProofsPage, Review};

use crate::config::{ConsoleConfig, resources};
use crate::core::controller::ViewStateController;
use crate::core::error::ConfigError;
use crate::core::events::{EventBus, EventEnvelope};
use crate::core::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Entry point handing out page objects
#[derive(Clone)]
pub struct Console {
    store: Arc<dyn DocumentStore>,
    config: ConsoleConfig,
    events: EventBus,
}

impl Console {
    pub fn new(store: Arc<dyn DocumentStore>, config: ConsoleConfig) -> Self {
        Self {
            store,
            config,
            events: EventBus::default(),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Subscribe to events from every controller this console creates
    pub fn events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    /// A fresh controller for one configured resource
    pub fn controller(&self, resource: &str) -> Result<ViewStateController, ConfigError> {
        let resource = self.config.resource(resource)?.clone();
        Ok(ViewStateController::with_events(
            self.store.clone(),
            resource,
            self.events.clone(),
        ))
    }

    pub fn attendance(&self) -> Result<AttendancePage, ConfigError> {
        Ok(AttendancePage::new(self.controller(resources::ATTENDANCE)?))
    }

    pub fn dumps(&self) -> Result<DumpsPage, ConfigError> {
        Ok(
            DumpsPage::new(self.controller(resources::DUMPS)?, self.config.map.clone())
                .unknown_label(self.config.unknown_label.clone()),
        )
    }

    pub fn proofs(&self) -> Result<ProofsPage, ConfigError> {
        Ok(ProofsPage::new(self.controller(resources::IMAGE_PROOFS)?))
    }

    pub fn pickups(&self) -> Result<PickupsPage, ConfigError> {
        Ok(PickupsPage::new(
            self.controller(resources::PICKUP_REQUESTS)?,
            self.controller(resources::COLLECTORS)?,
        ))
    }

    pub fn directory(&self) -> Result<DirectoryPage, ConfigError> {
        Ok(DirectoryPage::new(
            self.controller(resources::USERS)?,
            self.controller(resources::COLLECTORS)?,
            self.controller(resources::WARDS)?,
        ))
    }

    pub fn dashboard(&self) -> Result<DashboardPage, ConfigError> {
        Ok(DashboardPage::new(
            self.controller(resources::USERS)?,
            self.controller(resources::COLLECTORS)?,
            self.controller(resources::ATTENDANCE)?,
            self.controller(resources::FEEDBACK)?,
        ))
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("resources", &self.config.resources.len())
            .finish()
    }
}
