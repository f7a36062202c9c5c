//! Coordinate transformation between on-screen renders and PDF user space
//!
//! Placements are recorded in the pixel space of whatever render was on screen
//! when the user dropped the mark, together with that render's height. Every
//! consumer that shows or bakes the mark at a different size goes through
//! [`rescale`], never through the raw stored pixels.

use shared_types::{AnchorPoint, DragDelta, SignaturePlacement};

/// New absolute position after a drag: start plus delta, same pixel space.
pub fn compute_anchor(drag_start: AnchorPoint, drag_delta: DragDelta) -> AnchorPoint {
    AnchorPoint {
        x: drag_start.x + drag_delta.dx,
        y: drag_start.y + drag_delta.dy,
    }
}

/// Position of `placement` in a render that is `new_height` x `new_width`.
///
/// `y` scales by the height ratio. `x` scales by the width ratio when the
/// placement recorded its render width, otherwise by the height ratio (the
/// renderer preserves the page aspect ratio). Returns the stored position
/// untouched if the stored denominators are degenerate.
pub fn rescale(placement: &SignaturePlacement, new_height: f64, new_width: f64) -> AnchorPoint {
    let stored_height = placement.rendered_page_height;
    if !(stored_height.is_finite() && stored_height > 0.0) {
        return placement.position;
    }

    let y_ratio = new_height / stored_height;
    let x_ratio = match placement.rendered_page_width {
        Some(stored_width) if stored_width.is_finite() && stored_width > 0.0 => {
            new_width / stored_width
        }
        _ => y_ratio,
    };

    AnchorPoint {
        x: placement.position.x * x_ratio,
        y: placement.position.y * y_ratio,
    }
}

/// Where a placement lands in PDF user space (bottom-left origin, points).
///
/// The placement is first rescaled to the page's intrinsic MediaBox size, then
/// the Y axis is flipped. `media_box` is `[x, y, width, height]`.
pub fn anchor_to_pdf(placement: &SignaturePlacement, media_box: [f64; 4]) -> (f64, f64) {
    let [mb_x, mb_y, mb_width, mb_height] = media_box;
    let intrinsic = rescale(placement, mb_height, mb_width);
    (mb_x + intrinsic.x, mb_y + (mb_height - intrinsic.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::PlacementStatus;

    fn placement_at(x: f64, y: f64, height: f64, width: Option<f64>) -> SignaturePlacement {
        SignaturePlacement {
            id: "p-1".to_string(),
            document_id: "doc-1".to_string(),
            page_number: 1,
            position: AnchorPoint::new(x, y),
            rendered_page_height: height,
            rendered_page_width: width,
            text: "Ada".to_string(),
            font_family: "cursive".to_string(),
            status: PlacementStatus::Placed,
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_compute_anchor_sums_delta() {
        let anchor = compute_anchor(AnchorPoint::new(100.0, 100.0), DragDelta::new(35.5, -20.0));
        assert_eq!(anchor, AnchorPoint::new(135.5, 80.0));
    }

    #[test]
    fn test_rescale_same_height_is_identity() {
        let p = placement_at(123.4, 567.8, 800.0, None);
        assert_eq!(rescale(&p, 800.0, 580.0), p.position);

        let p = placement_at(123.4, 567.8, 800.0, Some(580.0));
        assert_eq!(rescale(&p, 800.0, 580.0), p.position);
    }

    #[test]
    fn test_rescale_double_height() {
        let p = placement_at(50.0, 400.0, 800.0, None);
        let scaled = rescale(&p, 1600.0, 1160.0);
        assert_eq!(scaled.y, 800.0);
        assert_eq!(scaled.x, 100.0);
    }

    #[test]
    fn test_rescale_uses_width_ratio_when_known() {
        // Desktop render 580 wide, shown again on a 290 wide phone render
        let p = placement_at(290.0, 400.0, 800.0, Some(580.0));
        let scaled = rescale(&p, 400.0, 290.0);
        assert!((scaled.x - 145.0).abs() < 1e-9);
        assert!((scaled.y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_rescale_degenerate_height_returns_stored_position() {
        let p = placement_at(10.0, 20.0, 0.0, None);
        assert_eq!(rescale(&p, 800.0, 600.0), p.position);
    }

    #[test]
    fn test_anchor_to_pdf_letter_page() {
        // 800px tall render of a Letter page, mark at the top-left quarter point
        let p = placement_at(150.0, 200.0, 800.0, Some(618.18));
        let (x, y) = anchor_to_pdf(&p, [0.0, 0.0, 612.0, 792.0]);
        assert!((x - 150.0 * 612.0 / 618.18).abs() < 1e-6);
        assert!((y - (792.0 - 198.0)).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_to_pdf_respects_media_box_origin() {
        let p = placement_at(0.0, 0.0, 792.0, None);
        let (x, y) = anchor_to_pdf(&p, [10.0, 20.0, 612.0, 792.0]);
        assert_eq!((x, y), (10.0, 812.0));
    }
}
