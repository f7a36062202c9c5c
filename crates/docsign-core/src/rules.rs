//! Transition rules enforced by backends
//!
//! The controller checks the same conditions up front against its mirror, but
//! the backend is authoritative: these functions run against the stored
//! state inside the backend's write path.

use chrono::Utc;
use shared_types::{
    AnchorPoint, DocumentRecord, DocumentStatus, PlaceSignatureRequest, PlacementStatus,
    SignaturePlacement,
};

use crate::config::ResubmissionPolicy;
use crate::error::{DocsignError, Result};

/// Check a placement request against the document and its current placements.
pub fn check_place(
    document: &DocumentRecord,
    placements: &[SignaturePlacement],
    request: &PlaceSignatureRequest,
    policy: ResubmissionPolicy,
) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(DocsignError::Validation(
            "signature text must not be empty".to_string(),
        ));
    }
    if !document.contains_page(request.page_number) {
        return Err(DocsignError::Validation(format!(
            "page {} is outside 1..={}",
            request.page_number, document.page_count
        )));
    }
    if !(request.x.is_finite() && request.y.is_finite()) {
        return Err(DocsignError::Validation(
            "signature position must be finite".to_string(),
        ));
    }
    check_render_size(request.rendered_page_height, request.rendered_page_width)?;

    check_status_allows_place(document.status(placements), policy)
}

/// Whether a document in `status` may receive a new placement.
pub fn check_status_allows_place(status: DocumentStatus, policy: ResubmissionPolicy) -> Result<()> {
    match status {
        DocumentStatus::Signed => Err(DocsignError::InvalidState(
            "document is already signed".to_string(),
        )),
        DocumentStatus::Rejected if !policy.allows_resubmission() => Err(
            DocsignError::InvalidState("document was rejected; resubmission is disabled".to_string()),
        ),
        _ => Ok(()),
    }
}

pub fn check_render_size(height: f64, width: Option<f64>) -> Result<()> {
    if !(height.is_finite() && height > 0.0) {
        return Err(DocsignError::Validation(
            "rendered page height must be a positive number".to_string(),
        ));
    }
    if let Some(width) = width {
        if !(width.is_finite() && width > 0.0) {
            return Err(DocsignError::Validation(
                "rendered page width must be a positive number".to_string(),
            ));
        }
    }
    Ok(())
}

/// Returns `false` when the placement is already accepted and nothing has to change.
pub fn check_accept(placements: &[SignaturePlacement], target: &SignaturePlacement) -> Result<bool> {
    match target.status {
        PlacementStatus::Accepted => return Ok(false),
        PlacementStatus::Rejected => {
            return Err(DocsignError::InvalidState(format!(
                "placement {} was rejected",
                target.id
            )))
        }
        PlacementStatus::Placed => {}
    }

    if let Some(other) = placements
        .iter()
        .find(|p| p.status == PlacementStatus::Accepted && p.id != target.id)
    {
        return Err(DocsignError::InvalidState(format!(
            "placement {} is already accepted for this document",
            other.id
        )));
    }
    Ok(true)
}

/// Returns the trimmed reason to persist.
pub fn check_reject<'a>(target: &SignaturePlacement, reason: &'a str) -> Result<&'a str> {
    let reason = check_reason(reason)?;
    if target.status != PlacementStatus::Placed {
        return Err(DocsignError::InvalidState(format!(
            "cannot reject a placement that is {}",
            target.status
        )));
    }
    Ok(reason)
}

pub fn check_reason(reason: &str) -> Result<&str> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DocsignError::Validation(
            "a rejection reason is required".to_string(),
        ));
    }
    Ok(reason)
}

pub fn check_remove(target: &SignaturePlacement) -> Result<()> {
    if target.status != PlacementStatus::Placed {
        return Err(DocsignError::InvalidState(format!(
            "cannot remove a placement that is {}",
            target.status
        )));
    }
    Ok(())
}

/// Build the stored placement for an accepted request
pub fn new_placement(id: String, request: &PlaceSignatureRequest) -> SignaturePlacement {
    SignaturePlacement {
        id,
        document_id: request.document_id.clone(),
        page_number: request.page_number,
        position: AnchorPoint::new(request.x, request.y),
        rendered_page_height: request.rendered_page_height,
        rendered_page_width: request.rendered_page_width,
        text: request.text.clone(),
        font_family: request.font_family.clone(),
        status: PlacementStatus::Placed,
        rejection_reason: None,
        created_at: Utc::now(),
    }
}

/// Relative path of a document's signed artifact
pub fn signed_artifact_path(document_id: &str) -> String {
    format!("signed/{}.pdf", document_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn document(page_count: u32) -> DocumentRecord {
        DocumentRecord {
            id: "doc-1".into(),
            original_name: "lease.pdf".into(),
            storage_path: "uploads/doc-1.pdf".into(),
            uploaded_at: Utc::now(),
            page_count,
            owner_email: "ada@example.com".into(),
            document_hash: "00".repeat(32),
            signed_artifact_path: None,
        }
    }

    fn request(page: u32, text: &str) -> PlaceSignatureRequest {
        PlaceSignatureRequest {
            document_id: "doc-1".into(),
            page_number: page,
            x: 100.0,
            y: 100.0,
            text: text.into(),
            font_family: "cursive".into(),
            rendered_page_height: 800.0,
            rendered_page_width: None,
        }
    }

    fn with_status(id: &str, status: PlacementStatus) -> SignaturePlacement {
        let mut p = new_placement(id.to_string(), &request(1, "Ada"));
        p.status = status;
        p
    }

    #[test]
    fn test_place_validation() {
        let doc = document(2);
        let policy = ResubmissionPolicy::Disallow;
        assert!(check_place(&doc, &[], &request(1, "Ada"), policy).is_ok());
        assert!(check_place(&doc, &[], &request(2, "Ada"), policy).is_ok());

        for bad in [request(0, "Ada"), request(3, "Ada"), request(1, "   ")] {
            assert!(matches!(
                check_place(&doc, &[], &bad, policy),
                Err(DocsignError::Validation(_))
            ));
        }

        let mut no_height = request(1, "Ada");
        no_height.rendered_page_height = 0.0;
        assert!(matches!(
            check_place(&doc, &[], &no_height, policy),
            Err(DocsignError::Validation(_))
        ));

        let mut nan = request(1, "Ada");
        nan.y = f64::NAN;
        assert!(check_place(&doc, &[], &nan, policy).is_err());
    }

    #[test]
    fn test_place_on_signed_document_fails() {
        let mut doc = document(1);
        doc.signed_artifact_path = Some("signed/doc-1.pdf".into());
        let existing = [with_status("a", PlacementStatus::Accepted)];
        assert!(matches!(
            check_place(&doc, &existing, &request(1, "Ada"), ResubmissionPolicy::Allow),
            Err(DocsignError::InvalidState(_))
        ));
    }

    #[test]
    fn test_resubmission_policy() {
        let doc = document(1);
        let existing = [with_status("a", PlacementStatus::Rejected)];
        assert!(matches!(
            check_place(&doc, &existing, &request(1, "Ada"), ResubmissionPolicy::Disallow),
            Err(DocsignError::InvalidState(_))
        ));
        assert!(check_place(&doc, &existing, &request(1, "Ada"), ResubmissionPolicy::Allow).is_ok());
    }

    #[test]
    fn test_accept_rules() {
        let a = with_status("a", PlacementStatus::Placed);
        let b = with_status("b", PlacementStatus::Accepted);
        let c = with_status("c", PlacementStatus::Rejected);
        let all = [a.clone(), b.clone(), c.clone()];

        assert_eq!(check_accept(&[a.clone()], &a), Ok(true));
        assert_eq!(check_accept(&all, &b), Ok(false));
        assert!(matches!(check_accept(&all, &a), Err(DocsignError::InvalidState(_))));
        assert!(matches!(check_accept(&all, &c), Err(DocsignError::InvalidState(_))));
    }

    #[test]
    fn test_reject_requires_reason() {
        let a = with_status("a", PlacementStatus::Placed);
        assert!(matches!(check_reject(&a, ""), Err(DocsignError::Validation(_))));
        assert!(matches!(check_reject(&a, "   "), Err(DocsignError::Validation(_))));
        assert_eq!(check_reject(&a, "  wrong page \n"), Ok("wrong page"));

        let accepted = with_status("b", PlacementStatus::Accepted);
        assert!(matches!(
            check_reject(&accepted, "late"),
            Err(DocsignError::InvalidState(_))
        ));
    }

    #[test]
    fn test_remove_only_placed() {
        assert!(check_remove(&with_status("a", PlacementStatus::Placed)).is_ok());
        assert!(matches!(
            check_remove(&with_status("b", PlacementStatus::Accepted)),
            Err(DocsignError::InvalidState(_))
        ));
        assert!(matches!(
            check_remove(&with_status("c", PlacementStatus::Rejected)),
            Err(DocsignError::InvalidState(_))
        ));
    }
}
