//! Document signing core
//!
//! Turns drag gestures on a scaled page render into stored placements and
//! drives documents through the signing lifecycle:
//!
//! ```text
//! Uploaded -> PendingSignature -> Signed
//!                              -> Rejected
//! ```
//!
//! - [`geometry`]: render sizes per page and the draft being dragged
//! - [`store`]: mirror of the backend's placements for one document
//! - [`lifecycle`]: place / accept / finalize / reject / remove
//! - [`audit`]: audit trail of signed documents
//! - [`dashboard`]: pending, signed and rejected lists
//! - [`memory`] and [`http`]: [`SigningBackend`] implementations

pub mod audit;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod geometry;
pub mod http;
pub mod lifecycle;
pub mod memory;
pub mod rules;
pub mod store;

pub use audit::{AuditRecorder, AuditTimeline, NO_AUDIT_INFO};
pub use backend::{AuthContext, FinalizeResponse, SigningBackend};
pub use config::{ControllerConfig, ResubmissionPolicy};
pub use dashboard::{load_dashboard, DocumentBuckets};
pub use error::{DocsignError, Result};
pub use geometry::{PageGeometryTracker, RenderedPage, SignatureDraft};
pub use http::HttpBackend;
pub use lifecycle::{DocumentSession, FinalizeOutcome, LifecycleController, Reconcile};
pub use memory::{BackendOp, InMemoryBackend};
pub use store::{PageView, PlacementStore};

// Re-export types from shared crates
pub use shared_pdf::{compute_anchor, rescale};
pub use shared_types::{
    AnchorPoint, AuditEntry, DocumentFilter, DocumentRecord, DocumentStatus, DragDelta,
    PlaceSignatureRequest, PlacementStatus, SignaturePlacement,
};

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = PlacementStatus> {
        prop_oneof![
            Just(PlacementStatus::Placed),
            Just(PlacementStatus::Accepted),
            Just(PlacementStatus::Rejected),
        ]
    }

    fn placements(statuses: &[(u32, PlacementStatus)]) -> Vec<SignaturePlacement> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        statuses
            .iter()
            .enumerate()
            .map(|(i, (page, status))| SignaturePlacement {
                id: format!("p-{}", i),
                document_id: "doc-1".to_string(),
                page_number: *page,
                position: AnchorPoint::new(10.0, 10.0),
                rendered_page_height: 800.0,
                rendered_page_width: None,
                text: "Ada".to_string(),
                font_family: "cursive".to_string(),
                status: *status,
                rejection_reason: None,
                created_at: base + Duration::seconds(i as i64),
            })
            .collect()
    }

    proptest! {
        /// Property: the store derives the same status as the free function
        #[test]
        fn store_status_matches_derivation(
            statuses in prop::collection::vec((1u32..4, status_strategy()), 0..12),
            signed in any::<bool>(),
        ) {
            let list = placements(&statuses);
            let artifact = signed.then_some("signed/doc-1.pdf");
            let mut store = PlacementStore::new("doc-1");
            store.replace_all(list.clone());
            prop_assert_eq!(store.status(artifact), DocumentStatus::derive(&list, artifact));
        }

        /// Property: page views partition the store
        #[test]
        fn page_views_partition_store(
            statuses in prop::collection::vec((1u32..4, status_strategy()), 0..12),
        ) {
            let mut store = PlacementStore::new("doc-1");
            store.replace_all(placements(&statuses));
            let total: usize = (1..4).map(|page| store.by_page(page).count()).sum();
            prop_assert_eq!(total, store.len());
        }

        /// Property: a draft dragged by any delta and rescaled to its own render
        /// lands where the drag put it
        #[test]
        fn dragged_draft_survives_identity_rescale(
            dx in -500.0f64..500.0,
            dy in -500.0f64..500.0,
            height in 200.0f64..3000.0,
        ) {
            let page = RenderedPage::new(height, height * 0.77);
            let mut draft = SignatureDraft::new(1, "Ada");
            draft.begin_drag(page);
            draft.end_drag(DragDelta::new(dx, dy));

            let req = draft.to_request("doc-1", page);
            let stored = rules::new_placement("p".to_string(), &req);
            prop_assert_eq!(rescale(&stored, page.height, page.width), draft.position);
        }
    }
}
