//! Read-only view of a signed document's audit trail

use std::sync::Arc;
use std::time::Duration;

use shared_types::{AuditEntry, DocumentStatus};

use crate::backend::SigningBackend;
use crate::error::{DocsignError, Result};
use crate::lifecycle::DocumentSession;

pub const NO_AUDIT_INFO: &str = "no audit info";

#[derive(Debug, Clone, PartialEq)]
pub enum AuditTimeline {
    /// Signed, but the backend has no rows for it
    Empty,
    Entries(Vec<AuditEntry>),
}

impl AuditTimeline {
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        if entries.is_empty() {
            AuditTimeline::Empty
        } else {
            AuditTimeline::Entries(entries)
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        match self {
            AuditTimeline::Empty => &[],
            AuditTimeline::Entries(entries) => entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AuditTimeline::Empty)
    }

    /// One line per entry, or [`NO_AUDIT_INFO`]
    pub fn render(&self) -> String {
        match self {
            AuditTimeline::Empty => NO_AUDIT_INFO.to_string(),
            AuditTimeline::Entries(entries) => entries
                .iter()
                .map(AuditEntry::summary)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

pub struct AuditRecorder {
    backend: Arc<dyn SigningBackend>,
    timeout: Duration,
}

impl AuditRecorder {
    pub fn new(backend: Arc<dyn SigningBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Fetch the trail of the session's document, which must be signed.
    pub async fn fetch(&self, session: &DocumentSession) -> Result<AuditTimeline> {
        let status = session.status();
        if status != DocumentStatus::Signed {
            return Err(DocsignError::InvalidState(format!(
                "audit trail is only available for signed documents (document is {})",
                status
            )));
        }

        let entries = tokio::time::timeout(
            self.timeout,
            self.backend
                .get_audit_trail(&session.auth, session.document_id()),
        )
        .await
        .map_err(|_| DocsignError::Timeout(self.timeout))??;

        tracing::debug!(
            document_id = session.document_id(),
            entries = entries.len(),
            "fetched audit trail"
        );
        Ok(AuditTimeline::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trail_renders_placeholder() {
        let timeline = AuditTimeline::from_entries(Vec::new());
        assert!(timeline.is_empty());
        assert_eq!(timeline.len(), 0);
        assert_eq!(timeline.render(), "no audit info");
    }

    #[test]
    fn test_entries_render_one_line_each() {
        let timeline = AuditTimeline::from_entries(vec![
            AuditEntry::new("p-1", "Ada Lovelace", "ada@example.com", "203.0.113.7"),
            AuditEntry::new("p-2", "Grace Hopper", "grace@example.com", "198.51.100.4"),
        ]);
        assert_eq!(timeline.len(), 2);

        let rendered = timeline.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Ada Lovelace <ada@example.com>"));
        assert!(lines[1].contains("from 198.51.100.4"));
    }
}
