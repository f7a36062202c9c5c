//! Data models for DocSign API

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{AnchorPoint, AuditEntry, DocumentRecord, PlacementStatus, SignaturePlacement};
use sqlx::FromRow;

use crate::error::ApiError;

/// Timestamps are stored as fixed-width RFC 3339 text so they sort as written
pub fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Document row
#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: String,
    pub original_name: String,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub page_count: i64,
    pub owner_email: String,
    pub document_hash: String,
    pub signed_artifact_path: Option<String>,
}

impl From<DbDocument> for DocumentRecord {
    fn from(row: DbDocument) -> Self {
        DocumentRecord {
            id: row.id,
            original_name: row.original_name,
            storage_path: row.storage_path,
            uploaded_at: row.uploaded_at,
            page_count: u32::try_from(row.page_count).unwrap_or(0),
            owner_email: row.owner_email,
            document_hash: row.document_hash,
            signed_artifact_path: row.signed_artifact_path,
        }
    }
}

/// Placement row
#[derive(Debug, Clone, FromRow)]
pub struct DbPlacement {
    pub id: String,
    pub document_id: String,
    pub page_number: i64,
    pub x: f64,
    pub y: f64,
    pub rendered_page_height: f64,
    pub rendered_page_width: Option<f64>,
    pub text: String,
    pub font_family: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbPlacement> for SignaturePlacement {
    type Error = ApiError;

    fn try_from(row: DbPlacement) -> Result<Self, Self::Error> {
        let status: PlacementStatus = row
            .status
            .parse()
            .map_err(|e: String| ApiError::Internal(anyhow::anyhow!(e)))?;
        let page_number = u32::try_from(row.page_number).map_err(|_| {
            ApiError::Internal(anyhow::anyhow!(
                "placement {} has page {}",
                row.id,
                row.page_number
            ))
        })?;
        Ok(SignaturePlacement {
            id: row.id,
            document_id: row.document_id,
            page_number,
            position: AnchorPoint::new(row.x, row.y),
            rendered_page_height: row.rendered_page_height,
            rendered_page_width: row.rendered_page_width,
            text: row.text,
            font_family: row.font_family,
            status,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

/// Audit row
#[derive(Debug, Clone, FromRow)]
pub struct DbAuditEntry {
    pub placement_id: String,
    pub signer_name: String,
    pub signer_email: String,
    pub ip_address: String,
    pub signed_at: DateTime<Utc>,
}

impl From<DbAuditEntry> for AuditEntry {
    fn from(row: DbAuditEntry) -> Self {
        AuditEntry {
            placement_id: row.placement_id,
            signer_name: row.signer_name,
            signer_email: row.signer_email,
            ip_address: row.ip_address,
            signed_at: row.signed_at,
        }
    }
}

/// Request to upload a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub file_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(5);
        assert!(db_timestamp(early) < db_timestamp(late));
        assert_eq!(db_timestamp(early).len(), db_timestamp(late).len());
    }

    #[test]
    fn test_placement_row_with_bad_status_is_internal() {
        let row = DbPlacement {
            id: "p-1".to_string(),
            document_id: "doc-1".to_string(),
            page_number: 1,
            x: 1.0,
            y: 2.0,
            rendered_page_height: 800.0,
            rendered_page_width: None,
            text: "Ada".to_string(),
            font_family: "cursive".to_string(),
            status: "signed".to_string(),
            rejection_reason: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            SignaturePlacement::try_from(row),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn test_upload_request_wire_names() {
        let req: UploadRequest =
            serde_json::from_str(r#"{"fileName":"lease.pdf","pdfBase64":"JVBERg=="}"#).unwrap();
        assert_eq!(req.file_name, "lease.pdf");
    }
}
