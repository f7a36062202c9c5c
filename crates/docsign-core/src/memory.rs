//! In-process backend
//!
//! Holds documents, placements, audit rows and signed artifacts in memory.
//! Artifacts are real PDFs baked with `shared_pdf`. Latency and one-shot
//! failures can be injected to exercise the controller's timeout, retry and
//! conflict paths.

use async_trait::async_trait;
use chrono::Utc;
use shared_pdf::{bake_signatures, hash_document, PdfDocument};
use shared_types::{
    AuditEntry, DocumentFilter, DocumentRecord, PlaceSignatureRequest, PlacementStatus,
    SignaturePlacement,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{AuthContext, FinalizeResponse, SigningBackend};
use crate::config::ResubmissionPolicy;
use crate::error::{DocsignError, Result};
use crate::rules;

/// Backend calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    ListDocuments,
    GetDocument,
    ListPlacements,
    Place,
    Accept,
    Finalize,
    Reject,
    Remove,
    AuditTrail,
    Delete,
}

struct StoredDocument {
    record: DocumentRecord,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    /// Upload order
    documents: Vec<StoredDocument>,
    /// Creation order, all documents
    placements: Vec<SignaturePlacement>,
    audit: HashMap<String, Vec<AuditEntry>>,
    artifacts: HashMap<String, Vec<u8>>,
}

impl Inner {
    fn owned(&self, auth: &AuthContext, document_id: &str) -> Result<&StoredDocument> {
        self.documents
            .iter()
            .find(|d| d.record.id == document_id && d.record.owner_email == auth.user_email)
            .ok_or_else(|| DocsignError::NotFound(format!("document {}", document_id)))
    }

    fn owned_mut(&mut self, auth: &AuthContext, document_id: &str) -> Result<&mut StoredDocument> {
        self.documents
            .iter_mut()
            .find(|d| d.record.id == document_id && d.record.owner_email == auth.user_email)
            .ok_or_else(|| DocsignError::NotFound(format!("document {}", document_id)))
    }

    fn placements_of(&self, document_id: &str) -> Vec<SignaturePlacement> {
        self.placements
            .iter()
            .filter(|p| p.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Index of a placement on a document the caller owns
    fn owned_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<usize> {
        let idx = self
            .placements
            .iter()
            .position(|p| p.id == placement_id)
            .ok_or_else(|| DocsignError::NotFound(format!("placement {}", placement_id)))?;
        self.owned(auth, &self.placements[idx].document_id)
            .map_err(|_| DocsignError::NotFound(format!("placement {}", placement_id)))?;
        Ok(idx)
    }
}

pub struct InMemoryBackend {
    inner: RwLock<Inner>,
    latency: Duration,
    finalize_latency: Duration,
    policy: ResubmissionPolicy,
    failures: Mutex<HashMap<BackendOp, u32>>,
    artifacts_written: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            latency: Duration::ZERO,
            finalize_latency: Duration::ZERO,
            policy: ResubmissionPolicy::default(),
            failures: Mutex::new(HashMap::new()),
            artifacts_written: AtomicUsize::new(0),
        }
    }

    /// Delay applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Extra delay for finalize on top of the base latency
    pub fn with_finalize_latency(mut self, latency: Duration) -> Self {
        self.finalize_latency = latency;
        self
    }

    pub fn with_policy(mut self, policy: ResubmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Make the next call of `op` fail with a transport error.
    pub fn fail_next(&self, op: BackendOp) {
        self.fail_times(op, 1);
    }

    pub fn fail_times(&self, op: BackendOp, times: u32) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        *failures.entry(op).or_insert(0) += times;
    }

    /// Number of signed artifacts baked so far
    pub fn artifact_count(&self) -> usize {
        self.artifacts_written.load(Ordering::SeqCst)
    }

    pub async fn artifact(&self, document_id: &str) -> Option<Vec<u8>> {
        self.inner.read().await.artifacts.get(document_id).cloned()
    }

    /// Store a PDF for `owner` and return its record.
    pub async fn upload(
        &self,
        owner: &AuthContext,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<DocumentRecord> {
        let page_count = PdfDocument::from_bytes(&bytes)
            .map_err(|e| DocsignError::Validation(format!("not a readable PDF: {}", e)))?
            .page_count();
        if page_count == 0 {
            return Err(DocsignError::Validation("PDF has no pages".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let record = DocumentRecord {
            storage_path: format!("uploads/{}.pdf", id),
            id,
            original_name: original_name.to_string(),
            uploaded_at: Utc::now(),
            page_count,
            owner_email: owner.user_email.clone(),
            document_hash: hash_document(&bytes),
            signed_artifact_path: None,
        };

        tracing::info!(document_id = %record.id, pages = page_count, "stored upload");
        self.inner.write().await.documents.push(StoredDocument {
            record: record.clone(),
            bytes,
        });
        Ok(record)
    }

    /// Simulated round trip: latency, then any injected failure
    async fn round_trip(&self, op: BackendOp) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(remaining) = failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DocsignError::Transport(format!("injected {:?} failure", op)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SigningBackend for InMemoryBackend {
    async fn list_documents(
        &self,
        auth: &AuthContext,
        filter: DocumentFilter,
    ) -> Result<Vec<DocumentRecord>> {
        self.round_trip(BackendOp::ListDocuments).await?;
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .iter()
            .filter(|d| d.record.owner_email == auth.user_email)
            .filter(|d| filter.matches(d.record.status(&inner.placements_of(&d.record.id))))
            .map(|d| d.record.clone())
            .collect())
    }

    async fn get_document(&self, auth: &AuthContext, document_id: &str) -> Result<DocumentRecord> {
        self.round_trip(BackendOp::GetDocument).await?;
        let inner = self.inner.read().await;
        Ok(inner.owned(auth, document_id)?.record.clone())
    }

    async fn list_placements(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<Vec<SignaturePlacement>> {
        self.round_trip(BackendOp::ListPlacements).await?;
        let inner = self.inner.read().await;
        inner.owned(auth, document_id)?;
        Ok(inner.placements_of(document_id))
    }

    async fn place_signature(
        &self,
        auth: &AuthContext,
        request: &PlaceSignatureRequest,
    ) -> Result<SignaturePlacement> {
        self.round_trip(BackendOp::Place).await?;
        let mut inner = self.inner.write().await;
        let document = &inner.owned(auth, &request.document_id)?.record;
        rules::check_place(
            document,
            &inner.placements_of(&request.document_id),
            request,
            self.policy,
        )?;

        let placement = rules::new_placement(Uuid::new_v4().to_string(), request);
        tracing::info!(
            document_id = %placement.document_id,
            placement_id = %placement.id,
            page = placement.page_number,
            "signature placed"
        );
        inner.placements.push(placement.clone());
        Ok(placement)
    }

    async fn accept_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<()> {
        self.round_trip(BackendOp::Accept).await?;
        let mut inner = self.inner.write().await;
        let idx = inner.owned_placement(auth, placement_id)?;
        let document_id = inner.placements[idx].document_id.clone();

        let siblings = inner.placements_of(&document_id);
        if !rules::check_accept(&siblings, &inner.placements[idx])? {
            tracing::debug!(placement_id, "placement already accepted");
            return Ok(());
        }

        inner.placements[idx].status = PlacementStatus::Accepted;
        let entry = AuditEntry::new(
            placement_id,
            &auth.user_name,
            &auth.user_email,
            auth.client_ip.as_deref().unwrap_or("unknown"),
        );
        inner.audit.entry(document_id.clone()).or_default().push(entry);

        tracing::info!(%document_id, placement_id, "placement accepted");
        Ok(())
    }

    async fn finalize_document(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<FinalizeResponse> {
        self.round_trip(BackendOp::Finalize).await?;
        if !self.finalize_latency.is_zero() {
            tokio::time::sleep(self.finalize_latency).await;
        }

        let mut inner = self.inner.write().await;
        let stored = inner.owned(auth, document_id)?;
        if let Some(path) = &stored.record.signed_artifact_path {
            tracing::debug!(document_id, "already finalized");
            return Ok(FinalizeResponse {
                signed_artifact_path: path.clone(),
            });
        }

        let placements = inner.placements_of(document_id);
        if !placements
            .iter()
            .any(|p| p.status == PlacementStatus::Accepted)
        {
            return Err(DocsignError::InvalidState(
                "no accepted signature to finalize".to_string(),
            ));
        }

        let baked = bake_signatures(&stored.bytes, &placements)
            .map_err(|e| DocsignError::Transport(format!("artifact generation failed: {}", e)))?;
        let path = rules::signed_artifact_path(document_id);

        inner.artifacts.insert(document_id.to_string(), baked);
        inner.owned_mut(auth, document_id)?.record.signed_artifact_path = Some(path.clone());
        self.artifacts_written.fetch_add(1, Ordering::SeqCst);

        tracing::info!(document_id, artifact = %path, "document signed");
        Ok(FinalizeResponse {
            signed_artifact_path: path,
        })
    }

    async fn reject_placement(
        &self,
        auth: &AuthContext,
        placement_id: &str,
        reason: &str,
    ) -> Result<()> {
        self.round_trip(BackendOp::Reject).await?;
        let mut inner = self.inner.write().await;
        let idx = inner.owned_placement(auth, placement_id)?;
        let reason = rules::check_reject(&inner.placements[idx], reason)?;

        let placement = &mut inner.placements[idx];
        placement.status = PlacementStatus::Rejected;
        placement.rejection_reason = Some(reason.to_string());

        tracing::info!(document_id = %placement.document_id, placement_id, "placement rejected");
        Ok(())
    }

    async fn remove_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<()> {
        self.round_trip(BackendOp::Remove).await?;
        let mut inner = self.inner.write().await;
        let idx = inner.owned_placement(auth, placement_id)?;
        rules::check_remove(&inner.placements[idx])?;

        let removed = inner.placements.remove(idx);
        tracing::info!(document_id = %removed.document_id, placement_id, "placement removed");
        Ok(())
    }

    async fn get_audit_trail(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<Vec<AuditEntry>> {
        self.round_trip(BackendOp::AuditTrail).await?;
        let inner = self.inner.read().await;
        inner.owned(auth, document_id)?;
        Ok(inner.audit.get(document_id).cloned().unwrap_or_default())
    }

    async fn delete_document(&self, auth: &AuthContext, document_id: &str) -> Result<()> {
        self.round_trip(BackendOp::Delete).await?;
        let mut inner = self.inner.write().await;
        inner.owned(auth, document_id)?;

        inner.documents.retain(|d| d.record.id != document_id);
        inner.placements.retain(|p| p.document_id != document_id);
        inner.audit.remove(document_id);
        inner.artifacts.remove(document_id);

        tracing::info!(document_id, "document deleted");
        Ok(())
    }
}
