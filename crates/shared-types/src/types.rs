use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in anchor units: pixels relative to the rendered page that was on
/// screen when the point was taken (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub x: f64,
    pub y: f64,
}

impl AnchorPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Movement reported by a drag gesture, in the same pixel space as the render.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DragDelta {
    pub dx: f64,
    pub dy: f64,
}

impl DragDelta {
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Placed,
    Accepted,
    Rejected,
}

impl std::fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementStatus::Placed => write!(f, "placed"),
            PlacementStatus::Accepted => write!(f, "accepted"),
            PlacementStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for PlacementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(PlacementStatus::Placed),
            "accepted" => Ok(PlacementStatus::Accepted),
            "rejected" => Ok(PlacementStatus::Rejected),
            other => Err(format!("Unknown placement status: {}", other)),
        }
    }
}

/// A signature mark placed on one page of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePlacement {
    pub id: String,
    pub document_id: String,
    /// 1-based
    pub page_number: u32,
    pub position: AnchorPoint,
    /// Height of the rendered page `position` was measured against. Always > 0.
    pub rendered_page_height: f64,
    /// Width of that render, when the client reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_page_width: Option<f64>,
    pub text: String,
    pub font_family: String,
    pub status: PlacementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Document lifecycle status. Never stored: see [`DocumentStatus::derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    PendingSignature,
    Signed,
    Rejected,
}

impl DocumentStatus {
    /// Compute the status from the creation-ordered placements of a document
    /// and its signed artifact path.
    ///
    /// A rejection stays in force until a newer `Placed` placement follows it
    /// (resubmission). An accepted placement without an artifact means
    /// finalization is still outstanding.
    pub fn derive(placements: &[SignaturePlacement], signed_artifact_path: Option<&str>) -> Self {
        let any_accepted = placements
            .iter()
            .any(|p| p.status == PlacementStatus::Accepted);

        if any_accepted {
            return match signed_artifact_path {
                Some(path) if !path.is_empty() => DocumentStatus::Signed,
                _ => DocumentStatus::PendingSignature,
            };
        }

        if let Some(idx) = placements
            .iter()
            .rposition(|p| p.status == PlacementStatus::Rejected)
        {
            let resubmitted = placements[idx + 1..]
                .iter()
                .any(|p| p.status == PlacementStatus::Placed);
            if !resubmitted {
                return DocumentStatus::Rejected;
            }
        }

        if placements.is_empty() {
            DocumentStatus::Uploaded
        } else {
            DocumentStatus::PendingSignature
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Signed | DocumentStatus::Rejected)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Uploaded => write!(f, "uploaded"),
            DocumentStatus::PendingSignature => write!(f, "pending_signature"),
            DocumentStatus::Signed => write!(f, "signed"),
            DocumentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// An uploaded PDF owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub original_name: String,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub page_count: u32,
    pub owner_email: String,
    /// SHA-256 of the uploaded bytes, hex encoded
    pub document_hash: String,
    /// Set once, when the document becomes signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_artifact_path: Option<String>,
}

impl DocumentRecord {
    pub fn status(&self, placements: &[SignaturePlacement]) -> DocumentStatus {
        DocumentStatus::derive(placements, self.signed_artifact_path.as_deref())
    }

    pub fn contains_page(&self, page_number: u32) -> bool {
        page_number >= 1 && page_number <= self.page_count
    }
}

/// Which documents a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFilter {
    #[default]
    All,
    Pending,
    Signed,
    Rejected,
}

impl DocumentFilter {
    pub fn matches(&self, status: DocumentStatus) -> bool {
        match self {
            DocumentFilter::All => true,
            DocumentFilter::Pending => status == DocumentStatus::PendingSignature,
            DocumentFilter::Signed => status == DocumentStatus::Signed,
            DocumentFilter::Rejected => status == DocumentStatus::Rejected,
        }
    }

    /// Path suffix used by the document listing routes
    pub fn path(&self) -> &'static str {
        match self {
            DocumentFilter::All => "/docs",
            DocumentFilter::Pending => "/docs/pending",
            DocumentFilter::Signed => "/docs/signed",
            DocumentFilter::Rejected => "/docs/rejected",
        }
    }
}

/// Payload of a placement call. Field names follow the existing wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSignatureRequest {
    #[serde(rename = "fileId")]
    pub document_id: String,
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    #[serde(rename = "xCoordinate")]
    pub x: f64,
    #[serde(rename = "yCoordinate")]
    pub y: f64,
    #[serde(rename = "signature")]
    pub text: String,
    #[serde(rename = "font")]
    pub font_family: String,
    #[serde(rename = "renderedPageHeight")]
    pub rendered_page_height: f64,
    #[serde(
        rename = "renderedPageWidth",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rendered_page_width: Option<f64>,
}
