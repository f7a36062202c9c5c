//! Document lifecycle controller
//!
//! Drives a document from `Uploaded` through `PendingSignature` to `Signed` or
//! `Rejected`. The backend is authoritative: nothing in a [`DocumentSession`]
//! changes until the backend has confirmed a mutation, after which the
//! session is re-fetched wholesale.
//!
//! ## Concurrency
//!
//! - At most one mutating call per document is in flight. The guard is taken
//!   before the first await, so an overlapping call fails with
//!   [`DocsignError::Conflict`] instead of racing.
//! - The controller tracks one active view. A session that is no longer the
//!   active view still completes its backend call, but its reconciliation is
//!   discarded.
//! - Every backend call is bounded by the request timeout; finalize by the
//!   finalize timeout.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared_types::{AnchorPoint, DocumentRecord, DocumentStatus, SignaturePlacement};
use tracing::{debug, info, warn};

use crate::audit::AuditRecorder;
use crate::backend::{AuthContext, SigningBackend};
use crate::config::{ControllerConfig, ResubmissionPolicy};
use crate::error::{DocsignError, Result};
use crate::geometry::{PageGeometryTracker, SignatureDraft};
use crate::rules;
use crate::store::PlacementStore;

/// Everything the UI holds for the document currently being viewed
#[derive(Debug, Clone)]
pub struct DocumentSession {
    pub auth: AuthContext,
    document: DocumentRecord,
    store: PlacementStore,
    pub geometry: PageGeometryTracker,
    resubmission: ResubmissionPolicy,
    ticket: u64,
}

impl DocumentSession {
    pub fn document(&self) -> &DocumentRecord {
        &self.document
    }

    pub fn document_id(&self) -> &str {
        &self.document.id
    }

    pub fn store(&self) -> &PlacementStore {
        &self.store
    }

    pub fn status(&self) -> DocumentStatus {
        self.store
            .status(self.document.signed_artifact_path.as_deref())
    }

    pub fn signed_artifact_path(&self) -> Option<&str> {
        self.document
            .signed_artifact_path
            .as_deref()
            .filter(|path| !path.is_empty())
    }

    /// Whether a draft on `page_number` could be placed right now, under the
    /// resubmission policy the session was opened with
    pub fn can_place(&self, page_number: u32) -> bool {
        self.document.contains_page(page_number)
            && self.geometry.can_place(page_number)
            && rules::check_status_allows_place(self.status(), self.resubmission).is_ok()
    }

    /// Placements on `page_number` with their position in the current render
    pub fn displayed(
        &self,
        page_number: u32,
    ) -> impl Iterator<Item = (&SignaturePlacement, AnchorPoint)> + Clone + '_ {
        self.store
            .by_page(page_number)
            .filter_map(move |p| self.geometry.display_position(p).map(|pos| (p, pos)))
    }

    fn apply(&mut self, document: DocumentRecord, placements: Vec<SignaturePlacement>) {
        self.document = document;
        self.store.replace_all(placements);
    }
}

/// What happened to a re-fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    Applied,
    /// The session stopped being the active view while the fetch was in flight
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub signed_artifact_path: String,
    /// The document was already signed and the backend was not called
    pub already_signed: bool,
    pub reconcile: Reconcile,
}

/// Releases the document's in-flight slot when dropped
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    document_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.document_id);
    }
}

pub struct LifecycleController {
    backend: Arc<dyn SigningBackend>,
    config: ControllerConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
    /// Ticket of the active view, 0 when none
    active: AtomicU64,
    next_ticket: AtomicU64,
}

impl LifecycleController {
    pub fn new(backend: Arc<dyn SigningBackend>, config: ControllerConfig) -> Self {
        Self {
            backend,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            active: AtomicU64::new(0),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn SigningBackend> {
        &self.backend
    }

    /// Audit trail reader sharing this controller's backend
    pub fn audit_recorder(&self) -> AuditRecorder {
        AuditRecorder::new(Arc::clone(&self.backend), self.config.request_timeout)
    }

    /// Load a document and make it the active view.
    pub async fn open(&self, auth: AuthContext, document_id: &str) -> Result<DocumentSession> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.active.store(ticket, Ordering::SeqCst);

        let (document, placements) = self.fetch(&auth, document_id).await?;
        let mut store = PlacementStore::new(document_id);
        store.replace_all(placements);

        info!(document_id, ticket, placements = store.len(), "opened document");
        Ok(DocumentSession {
            auth,
            document,
            store,
            geometry: PageGeometryTracker::new(),
            resubmission: self.config.resubmission,
            ticket,
        })
    }

    /// Navigate away. Later reconciliations for this session are discarded.
    pub fn close(&self, session: &DocumentSession) {
        let _ = self.active.compare_exchange(
            session.ticket,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        debug!(document_id = session.document_id(), "closed document view");
    }

    pub fn is_active(&self, session: &DocumentSession) -> bool {
        self.active.load(Ordering::SeqCst) == session.ticket
    }

    /// Whether a mutating call for `document_id` is currently in flight
    pub fn is_busy(&self, document_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(document_id)
    }

    /// Re-fetch the document and its placements into the session.
    pub async fn refresh(&self, session: &mut DocumentSession) -> Result<Reconcile> {
        let (document, placements) = self.fetch(&session.auth, session.document_id()).await?;
        if !self.is_active(session) {
            warn!(
                document_id = session.document_id(),
                "discarding refresh for inactive view"
            );
            return Ok(Reconcile::Discarded);
        }
        session.apply(document, placements);
        Ok(Reconcile::Applied)
    }

    /// Persist a draft as a new `Placed` placement.
    pub async fn place(
        &self,
        session: &mut DocumentSession,
        draft: &SignatureDraft,
    ) -> Result<SignaturePlacement> {
        let page = session.geometry.require(draft.page_number)?;
        let request = draft.to_request(session.document_id(), page);
        rules::check_place(
            &session.document,
            session.store.all(),
            &request,
            self.config.resubmission,
        )?;

        let _guard = self.acquire(session.document_id())?;
        let placement = self
            .bounded(
                self.config.request_timeout,
                "place",
                self.backend.place_signature(&session.auth, &request),
            )
            .await?;

        info!(
            document_id = session.document_id(),
            placement_id = %placement.id,
            page = placement.page_number,
            "placement confirmed"
        );
        self.reconcile_after(session, "place").await;
        Ok(placement)
    }

    /// Accept a placement and finalize the document.
    ///
    /// Skips the accept call if the placement is already accepted, so a failed
    /// finalize can be retried through here as well as through [`finalize`].
    ///
    /// [`finalize`]: LifecycleController::finalize
    pub async fn accept(
        &self,
        session: &mut DocumentSession,
        placement_id: &str,
    ) -> Result<FinalizeOutcome> {
        if let Some(outcome) = self.already_signed(session) {
            return Ok(outcome);
        }

        let target = session
            .store
            .get(placement_id)
            .ok_or_else(|| DocsignError::NotFound(format!("placement {}", placement_id)))?;
        let needs_accept = rules::check_accept(session.store.all(), target)?;

        let _guard = self.acquire(session.document_id())?;
        if needs_accept {
            self.bounded(
                self.config.request_timeout,
                "accept",
                self.backend.accept_placement(&session.auth, placement_id),
            )
            .await?;
            info!(
                document_id = session.document_id(),
                placement_id, "placement accepted"
            );
        } else {
            debug!(placement_id, "placement already accepted, finalizing");
        }

        self.finalize_locked(session).await
    }

    /// Retry entry point for a document whose placement is accepted but whose
    /// artifact was never produced.
    pub async fn finalize(&self, session: &mut DocumentSession) -> Result<FinalizeOutcome> {
        if let Some(outcome) = self.already_signed(session) {
            return Ok(outcome);
        }
        if session.store.accepted().is_none() {
            return Err(DocsignError::InvalidState(
                "no accepted signature to finalize".to_string(),
            ));
        }

        let _guard = self.acquire(session.document_id())?;
        self.finalize_locked(session).await
    }

    /// Reject a placement with a reason. The placement is kept for history.
    pub async fn reject(
        &self,
        session: &mut DocumentSession,
        placement_id: &str,
        reason: &str,
    ) -> Result<()> {
        let reason = rules::check_reason(reason)?;
        let target = session
            .store
            .get(placement_id)
            .ok_or_else(|| DocsignError::NotFound(format!("placement {}", placement_id)))?;
        rules::check_reject(target, reason)?;

        let _guard = self.acquire(session.document_id())?;
        self.bounded(
            self.config.request_timeout,
            "reject",
            self.backend
                .reject_placement(&session.auth, placement_id, reason),
        )
        .await?;

        info!(
            document_id = session.document_id(),
            placement_id, reason, "placement rejected"
        );
        self.reconcile_after(session, "reject").await;
        Ok(())
    }

    /// Delete a placement that has not been decided yet.
    pub async fn remove(&self, session: &mut DocumentSession, placement_id: &str) -> Result<()> {
        let target = session
            .store
            .get(placement_id)
            .ok_or_else(|| DocsignError::NotFound(format!("placement {}", placement_id)))?;
        rules::check_remove(target)?;

        let _guard = self.acquire(session.document_id())?;
        self.bounded(
            self.config.request_timeout,
            "remove",
            self.backend.remove_placement(&session.auth, placement_id),
        )
        .await?;

        info!(
            document_id = session.document_id(),
            placement_id, "placement removed"
        );
        self.reconcile_after(session, "remove").await;
        Ok(())
    }

    /// Delete the whole document and close its view.
    pub async fn delete(&self, session: DocumentSession) -> Result<()> {
        let _guard = self.acquire(session.document_id())?;
        self.bounded(
            self.config.request_timeout,
            "delete",
            self.backend
                .delete_document(&session.auth, session.document_id()),
        )
        .await?;

        info!(document_id = session.document_id(), "document deleted");
        self.close(&session);
        Ok(())
    }

    fn already_signed(&self, session: &DocumentSession) -> Option<FinalizeOutcome> {
        if session.status() != DocumentStatus::Signed {
            return None;
        }
        let path = session.signed_artifact_path()?;
        debug!(
            document_id = session.document_id(),
            "document already signed, skipping finalize"
        );
        Some(FinalizeOutcome {
            signed_artifact_path: path.to_string(),
            already_signed: true,
            reconcile: Reconcile::Applied,
        })
    }

    /// Finalize with the in-flight guard already held by the caller.
    async fn finalize_locked(&self, session: &mut DocumentSession) -> Result<FinalizeOutcome> {
        let result = self
            .bounded(
                self.config.finalize_timeout,
                "finalize",
                self.backend
                    .finalize_document(&session.auth, session.document_id()),
            )
            .await;

        // The accept may have gone through even if finalize did not
        let reconcile = self.reconcile_after(session, "finalize").await;

        let response = result.inspect_err(|e| {
            warn!(
                document_id = session.document_id(),
                error = %e,
                retryable = e.is_retryable(),
                "finalize failed; placement stays accepted"
            );
        })?;

        info!(
            document_id = session.document_id(),
            artifact = %response.signed_artifact_path,
            "document finalized"
        );
        Ok(FinalizeOutcome {
            signed_artifact_path: response.signed_artifact_path,
            already_signed: false,
            reconcile,
        })
    }

    /// Re-fetch after a confirmed mutation. A failed re-fetch leaves the
    /// session as it was; the next refresh picks the change up.
    async fn reconcile_after(&self, session: &mut DocumentSession, op: &'static str) -> Reconcile {
        match self.refresh(session).await {
            Ok(reconcile) => reconcile,
            Err(e) => {
                warn!(
                    document_id = session.document_id(),
                    op,
                    error = %e,
                    "reconciliation failed"
                );
                Reconcile::Discarded
            }
        }
    }

    async fn fetch(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<(DocumentRecord, Vec<SignaturePlacement>)> {
        let timeout = self.config.request_timeout;
        let (document, placements) = tokio::join!(
            self.bounded(
                timeout,
                "get_document",
                self.backend.get_document(auth, document_id)
            ),
            self.bounded(
                timeout,
                "list_placements",
                self.backend.list_placements(auth, document_id)
            ),
        );
        Ok((document?, placements?))
    }

    fn acquire(&self, document_id: &str) -> Result<InFlightGuard> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(document_id.to_string()) {
            warn!(document_id, "rejecting overlapping mutation");
            return Err(DocsignError::Conflict(format!(
                "another operation on document {} is in progress",
                document_id
            )));
        }
        Ok(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            document_id: document_id.to_string(),
        })
    }

    async fn bounded<T, F>(&self, limit: Duration, op: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(op, timeout_ms = limit.as_millis() as u64, "backend call timed out");
                Err(DocsignError::Timeout(limit))
            }
        }
    }
}
