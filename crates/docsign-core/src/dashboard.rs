//! Pending / signed / rejected document lists
//!
//! The three lists are fetched concurrently and may complete in any order, so
//! each lands in its own slot. One failing list does not hide the others.

use std::time::Duration;

use shared_types::{DocumentFilter, DocumentRecord};

use crate::backend::{AuthContext, SigningBackend};
use crate::error::{DocsignError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBuckets {
    pub pending: Result<Vec<DocumentRecord>>,
    pub signed: Result<Vec<DocumentRecord>>,
    pub rejected: Result<Vec<DocumentRecord>>,
}

impl DocumentBuckets {
    pub fn is_complete(&self) -> bool {
        self.pending.is_ok() && self.signed.is_ok() && self.rejected.is_ok()
    }

    /// Documents across all buckets that loaded
    pub fn total(&self) -> usize {
        [&self.pending, &self.signed, &self.rejected]
            .into_iter()
            .filter_map(|slot| slot.as_ref().ok())
            .map(Vec::len)
            .sum()
    }
}

pub async fn load_dashboard(
    backend: &dyn SigningBackend,
    auth: &AuthContext,
    timeout: Duration,
) -> DocumentBuckets {
    let list = |filter: DocumentFilter| async move {
        let result = tokio::time::timeout(timeout, backend.list_documents(auth, filter))
            .await
            .unwrap_or(Err(DocsignError::Timeout(timeout)));
        if let Err(e) = &result {
            tracing::warn!(list = filter.path(), error = %e, "document list failed");
        }
        result
    };

    let (pending, signed, rejected) = tokio::join!(
        list(DocumentFilter::Pending),
        list(DocumentFilter::Signed),
        list(DocumentFilter::Rejected),
    );

    DocumentBuckets {
        pending,
        signed,
        rejected,
    }
}
