//! End users, collectors and wards

use crate::core::controller::ViewStateController;
use crate::core::derive::{DeriveSpec, FilterPredicate};
use crate::core::error::{ValidationError, ViewResult};
use crate::core::record::{Patch, ViewRecord};
use serde_json::json;

pub struct DirectoryPage {
    users: ViewStateController,
    collectors: ViewStateController,
    wards: ViewStateController,
}

impl DirectoryPage {
    pub fn new(
        users: ViewStateController,
        collectors: ViewStateController,
        wards: ViewStateController,
    ) -> Self {
        Self {
            users,
            collectors,
            wards,
        }
    }

    pub fn users(&self) -> &ViewStateController {
        &self.users
    }

    pub fn collectors(&self) -> &ViewStateController {
        &self.collectors
    }

    pub fn wards(&self) -> &ViewStateController {
        &self.wards
    }

    /// Load the three listings concurrently
    ///
    /// Every load runs to completion so each controller settles on its own;
    /// the first failure is returned.
    pub async fn load(&self) -> ViewResult<()> {
        let (users, collectors, wards) =
            tokio::join!(self.users.load(), self.collectors.load(), self.wards.load());
        users?;
        collectors?;
        wards?;
        Ok(())
    }

    /// End users whose area contains `filter`, ignoring case; a blank filter keeps all
    pub fn users_in_area(&self, filter: &str) -> Vec<ViewRecord> {
        let filter = filter.trim();
        let spec = if filter.is_empty() {
            DeriveSpec::new()
        } else {
            DeriveSpec::new().filter(FilterPredicate::contains("area", filter))
        };
        self.users.derive(&spec).visible
    }

    /// Add a ward; the name is trimmed and must not be empty
    pub async fn add_ward(&self, name: &str) -> ViewResult<ViewRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyValue {
                field: "name".to_string(),
            }
            .into());
        }
        self.wards.create(Patch::new().set("name", json!(name))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsoleConfig, resources};
    use crate::storage::InMemoryDocumentStore;
    use std::sync::Arc;

    fn page(store: Arc<InMemoryDocumentStore>) -> DirectoryPage {
        let config = ConsoleConfig::default_config();
        let controller = |name: &str| {
            ViewStateController::new(store.clone(), config.resource(name).unwrap().clone())
        };
        DirectoryPage::new(
            controller(resources::USERS),
            controller(resources::COLLECTORS),
            controller(resources::WARDS),
        )
    }

    fn seeded() -> Arc<InMemoryDocumentStore> {
        let store = InMemoryDocumentStore::new();
        store.insert("users", "u1", json!({"name": "Kiran", "area": "North Ward"}));
        store.insert("users", "u2", json!({"name": "Lata", "area": "south ward"}));
        store.insert("users", "u3", json!({"name": "Omar"}));
        store.insert("collectors", "c1", json!({"fullName": "Ravi", "area": "North"}));
        store.insert("wards", "w1", json!({"name": "Ward 1"}));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_load_and_filter_users() {
        let page = page(seeded());
        page.load().await.unwrap();

        assert_eq!(page.users_in_area("").len(), 3);
        assert_eq!(page.users_in_area("WARD").len(), 2);
        let north = page.users_in_area("north");
        assert_eq!(north.len(), 1);
        assert_eq!(north[0].id, "u1");
        assert_eq!(page.collectors().records().len(), 1);
    }

    #[tokio::test]
    async fn test_add_ward_trims_name() {
        let store = seeded();
        let page = page(store.clone());
        page.load().await.unwrap();

        let ward = page.add_ward("  Ward 2 ").await.unwrap();
        assert_eq!(ward.get_str("name"), Some("Ward 2"));
        assert_eq!(page.wards().records().len(), 2);
        assert_eq!(store.len("wards"), 2);
    }

    #[tokio::test]
    async fn test_blank_ward_is_refused() {
        let store = seeded();
        let page = page(store.clone());
        page.load().await.unwrap();

        assert!(page.add_ward("   ").await.unwrap_err().is_validation());
        assert_eq!(store.len("wards"), 1);
    }
}
