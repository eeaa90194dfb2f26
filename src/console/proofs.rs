//! Image proof verification

use crate::core::controller::ViewStateController;
use crate::core::derive::{Bucket, DeriveSpec, FilterPredicate};
use crate::core::error::{ValidationError, ViewResult};
use crate::core::record::{Patch, ViewRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const PENDING: &str = "Pending";
pub const APPROVED: &str = "Approved";
pub const REJECTED: &str = "Rejected";

/// Outcome of reviewing a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Review {
    Approve,
    Reject,
}

impl Review {
    pub fn status(&self) -> &'static str {
        match self {
            Review::Approve => APPROVED,
            Review::Reject => REJECTED,
        }
    }
}

pub struct ProofsPage {
    controller: ViewStateController,
}

impl ProofsPage {
    pub fn new(controller: ViewStateController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &ViewStateController {
        &self.controller
    }

    pub async fn load(&self) -> ViewResult<Vec<ViewRecord>> {
        self.controller.load().await
    }

    pub async fn approve(&self, id: &str) -> ViewResult<()> {
        self.review(id, Review::Approve).await
    }

    pub async fn reject(&self, id: &str) -> ViewResult<()> {
        self.review(id, Review::Reject).await
    }

    /// Review a proof; only pending proofs can be reviewed
    pub async fn review(&self, id: &str, review: Review) -> ViewResult<()> {
        let record = self
            .controller
            .find(id)
            .ok_or_else(|| ValidationError::UnknownRecord { id: id.to_string() })?;

        // a missing status reads as pending through the resource's normalize default
        let current = record.get_str("status").unwrap_or(PENDING);
        if !current.eq_ignore_ascii_case(PENDING) {
            return Err(ValidationError::InvalidTransition {
                id: id.to_string(),
                from: current.to_string(),
                to: review.status().to_string(),
            }
            .into());
        }

        tracing::debug!(proof_id = %id, status = review.status(), "reviewing proof");
        self.controller
            .mutate(id, Patch::new().set("status", json!(review.status())))
            .await
    }

    /// Proofs still awaiting review
    pub fn pending(&self) -> Vec<ViewRecord> {
        self.controller
            .derive(&DeriveSpec::new().filter(FilterPredicate::eq_ignore_case("status", PENDING)))
            .visible
    }

    pub fn status_breakdown(&self) -> Vec<Bucket> {
        self.controller
            .derive(&DeriveSpec::new().group_by("status", "status"))
            .buckets("status")
            .to_vec()
    }
}
