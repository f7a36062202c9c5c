//! Audit entries recorded when a signature is accepted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of a document's audit trail: who signed, when, and from where.
///
/// Entries are appended by the backend at acceptance time, one per accepted
/// placement, and are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub placement_id: String,
    pub signer_name: String,
    pub signer_email: String,
    pub ip_address: String,
    pub signed_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(placement_id: &str, signer_name: &str, signer_email: &str, ip_address: &str) -> Self {
        Self {
            placement_id: placement_id.to_string(),
            signer_name: signer_name.to_string(),
            signer_email: signer_email.to_string(),
            ip_address: ip_address.to_string(),
            signed_at: Utc::now(),
        }
    }

    /// Generate a one-line summary for display
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} <{}> from {}",
            self.signed_at.to_rfc3339(),
            self.signer_name,
            self.signer_email,
            self.ip_address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_contains_signer_and_origin() {
        let entry = AuditEntry::new("p-1", "Ada Lovelace", "ada@example.com", "203.0.113.7");
        let line = entry.summary();
        assert!(line.contains("Ada Lovelace"));
        assert!(line.contains("<ada@example.com>"));
        assert!(line.ends_with("from 203.0.113.7"));
    }

    #[test]
    fn test_json_uses_camel_case() {
        let entry = AuditEntry::new("p-1", "Ada", "ada@example.com", "127.0.0.1");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("signerName").is_some());
        assert!(json.get("signedAt").is_some());
        let back: AuditEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
