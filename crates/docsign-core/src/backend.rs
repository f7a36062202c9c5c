use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{
    AuditEntry, DocumentFilter, DocumentRecord, PlaceSignatureRequest, SignaturePlacement,
};

use crate::error::Result;

/// Who is calling, as established by the surrounding application
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_email: String,
    pub user_name: String,
    /// Address the request came from, recorded in the audit trail
    pub client_ip: Option<String>,
    pub bearer_token: Option<String>,
}

impl AuthContext {
    pub fn new(user_email: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            user_name: user_name.into(),
            client_ip: None,
            bearer_token: None,
        }
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub signed_artifact_path: String,
}

/// The durable side of signing: documents, placements and audit rows.
///
/// Every call is scoped to `auth`; documents owned by someone else behave as
/// if they did not exist.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Documents of the caller matching `filter`, oldest upload first.
    async fn list_documents(
        &self,
        auth: &AuthContext,
        filter: DocumentFilter,
    ) -> Result<Vec<DocumentRecord>>;

    async fn get_document(&self, auth: &AuthContext, document_id: &str) -> Result<DocumentRecord>;

    /// All placements of a document in creation order.
    async fn list_placements(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<Vec<SignaturePlacement>>;

    async fn place_signature(
        &self,
        auth: &AuthContext,
        request: &PlaceSignatureRequest,
    ) -> Result<SignaturePlacement>;

    /// Mark a placement accepted and append its audit entry. Accepting an
    /// already accepted placement is a no-op.
    async fn accept_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<()>;

    /// Bake accepted placements into the signed artifact. Calling it again on
    /// a signed document returns the existing path.
    async fn finalize_document(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<FinalizeResponse>;

    async fn reject_placement(
        &self,
        auth: &AuthContext,
        placement_id: &str,
        reason: &str,
    ) -> Result<()>;

    /// Delete a placement that is still `Placed`.
    async fn remove_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<()>;

    async fn get_audit_trail(&self, auth: &AuthContext, document_id: &str)
        -> Result<Vec<AuditEntry>>;

    async fn delete_document(&self, auth: &AuthContext, document_id: &str) -> Result<()>;
}
