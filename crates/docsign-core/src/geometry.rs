//! Per-page render geometry and the signature draft being dragged around
//!
//! The tracker remembers, for every page, the pixel size of the render that is
//! actually on screen. Placement is only possible once that size is known;
//! nothing is ever computed against a missing or zero height.

use crate::error::{DocsignError, Result};
use shared_pdf::{compute_anchor, rescale};
use shared_types::{AnchorPoint, DragDelta, PlaceSignatureRequest, SignaturePlacement};
use std::collections::HashMap;

/// Where a new draft appears before the user drags it
pub const DEFAULT_DRAFT_POSITION: AnchorPoint = AnchorPoint::new(100.0, 100.0);

pub const DEFAULT_SIGNATURE_FONT: &str = "'Great Vibes', cursive";

/// Size of one page render, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedPage {
    pub height: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PageGeometryTracker {
    rendered: HashMap<u32, RenderedPage>,
}

impl RenderedPage {
    pub const fn new(height: f64, width: f64) -> Self {
        Self { height, width }
    }
}

impl PageGeometryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the size a page was just rendered at, replacing any earlier one.
    pub fn record_render(&mut self, page_number: u32, height: f64, width: f64) -> Result<()> {
        if page_number == 0 {
            return Err(DocsignError::Validation(
                "page numbers start at 1".to_string(),
            ));
        }
        if !(height.is_finite() && height > 0.0 && width.is_finite() && width > 0.0) {
            return Err(DocsignError::Validation(format!(
                "page {} rendered with unusable size {}x{}",
                page_number, width, height
            )));
        }
        self.rendered
            .insert(page_number, RenderedPage { height, width });
        Ok(())
    }

    /// The page is loading again (zoom, resize); placement waits for the next render.
    pub fn invalidate(&mut self, page_number: u32) {
        self.rendered.remove(&page_number);
    }

    pub fn clear(&mut self) {
        self.rendered.clear();
    }

    pub fn rendered(&self, page_number: u32) -> Option<RenderedPage> {
        self.rendered.get(&page_number).copied()
    }

    pub fn require(&self, page_number: u32) -> Result<RenderedPage> {
        self.rendered(page_number).ok_or_else(|| {
            DocsignError::Validation(format!("page {} not rendered", page_number))
        })
    }

    pub fn can_place(&self, page_number: u32) -> bool {
        self.rendered.contains_key(&page_number)
    }

    /// Where `placement` should be drawn in the current render of its page,
    /// or `None` while that page has no render.
    pub fn display_position(&self, placement: &SignaturePlacement) -> Option<AnchorPoint> {
        self.rendered(placement.page_number)
            .map(|page| rescale(placement, page.height, page.width))
    }
}

/// An unsaved signature being positioned on a page.
///
/// `position` is in pixels of the render the draft was last positioned on.
/// When that render is unknown the position is taken to belong to whatever
/// render is current at placement time.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureDraft {
    pub page_number: u32,
    pub position: AnchorPoint,
    pub text: String,
    pub font_family: String,
    measured_on: Option<RenderedPage>,
    drag_start: Option<AnchorPoint>,
}

impl SignatureDraft {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            position: DEFAULT_DRAFT_POSITION,
            text: text.into(),
            font_family: DEFAULT_SIGNATURE_FONT.to_string(),
            measured_on: None,
            drag_start: None,
        }
    }

    pub fn with_font(mut self, font_family: impl Into<String>) -> Self {
        self.font_family = font_family.into();
        self
    }

    pub fn at(mut self, position: AnchorPoint) -> Self {
        self.position = position;
        self
    }

    /// Pin `position` to the render it is expressed in
    pub fn measured_on(mut self, page: RenderedPage) -> Self {
        self.measured_on = Some(page);
        self
    }

    pub fn render(&self) -> Option<RenderedPage> {
        self.measured_on
    }

    /// Start a gesture on `page`. If the page was re-rendered since the draft
    /// was last positioned, the position is first carried over to the new
    /// render so the gesture's deltas apply in the same pixel space.
    pub fn begin_drag(&mut self, page: RenderedPage) {
        self.position = self.position_on(page);
        self.measured_on = Some(page);
        self.drag_start = Some(self.position);
    }

    /// Move to drag start + `delta`. The delta is always the total movement
    /// since `begin_drag`, as drag libraries report it.
    pub fn drag(&mut self, delta: DragDelta) {
        let start = *self.drag_start.get_or_insert(self.position);
        self.position = compute_anchor(start, delta);
    }

    pub fn end_drag(&mut self, delta: DragDelta) {
        self.drag(delta);
        self.drag_start = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_start.is_some()
    }

    /// The position expressed in pixels of `page`
    pub fn position_on(&self, page: RenderedPage) -> AnchorPoint {
        match self.measured_on {
            Some(from) if from != page => AnchorPoint::new(
                self.position.x * (page.width / from.width),
                self.position.y * (page.height / from.height),
            ),
            _ => self.position,
        }
    }

    /// Build the wire request for the current render of the page. The
    /// position is converted into that render so the stored pixels and the
    /// stored render size always belong together.
    pub fn to_request(&self, document_id: &str, page: RenderedPage) -> PlaceSignatureRequest {
        let position = self.position_on(page);
        PlaceSignatureRequest {
            document_id: document_id.to_string(),
            page_number: self.page_number,
            x: position.x,
            y: position.y,
            text: self.text.clone(),
            font_family: self.font_family.clone(),
            rendered_page_height: page.height,
            rendered_page_width: Some(page.width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::PlacementStatus;

    #[test]
    fn test_unrendered_page_cannot_place() {
        let tracker = PageGeometryTracker::new();
        assert!(!tracker.can_place(1));
        let err = tracker.require(1).unwrap_err();
        assert_eq!(err, DocsignError::Validation("page 1 not rendered".into()));
    }

    #[test]
    fn test_record_render_rejects_zero_height() {
        let mut tracker = PageGeometryTracker::new();
        assert!(tracker.record_render(1, 0.0, 600.0).is_err());
        assert!(tracker.record_render(1, f64::NAN, 600.0).is_err());
        assert!(tracker.record_render(1, 800.0, -1.0).is_err());
        assert!(tracker.record_render(0, 800.0, 600.0).is_err());
        assert!(!tracker.can_place(1));
    }

    #[test]
    fn test_latest_render_wins() {
        let mut tracker = PageGeometryTracker::new();
        tracker.record_render(2, 800.0, 618.0).unwrap();
        tracker.record_render(2, 400.0, 309.0).unwrap();
        assert_eq!(
            tracker.require(2).unwrap(),
            RenderedPage {
                height: 400.0,
                width: 309.0
            }
        );

        tracker.invalidate(2);
        assert!(!tracker.can_place(2));
    }

    #[test]
    fn test_display_position_rescales_to_current_render() {
        let mut tracker = PageGeometryTracker::new();
        let placement = SignaturePlacement {
            id: "p-1".into(),
            document_id: "doc-1".into(),
            page_number: 1,
            position: AnchorPoint::new(100.0, 400.0),
            rendered_page_height: 800.0,
            rendered_page_width: Some(600.0),
            text: "Ada".into(),
            font_family: "cursive".into(),
            status: PlacementStatus::Placed,
            rejection_reason: None,
            created_at: Utc::now(),
        };
        assert_eq!(tracker.display_position(&placement), None);

        // Phone render at half the desktop size
        tracker.record_render(1, 400.0, 300.0).unwrap();
        assert_eq!(
            tracker.display_position(&placement),
            Some(AnchorPoint::new(50.0, 200.0))
        );
    }

    #[test]
    fn test_draft_starts_at_default_position() {
        let draft = SignatureDraft::new(1, "Ada Lovelace");
        assert_eq!(draft.position, AnchorPoint::new(100.0, 100.0));
        assert_eq!(draft.font_family, DEFAULT_SIGNATURE_FONT);
        assert!(!draft.is_dragging());
    }

    const DESKTOP: RenderedPage = RenderedPage::new(800.0, 618.0);
    const PHONE: RenderedPage = RenderedPage::new(400.0, 309.0);

    #[test]
    fn test_drag_deltas_are_relative_to_drag_start() {
        let mut draft = SignatureDraft::new(1, "Ada");
        draft.begin_drag(DESKTOP);
        draft.drag(DragDelta::new(10.0, 5.0));
        draft.drag(DragDelta::new(30.0, 20.0));
        assert_eq!(draft.position, AnchorPoint::new(130.0, 120.0));
        draft.end_drag(DragDelta::new(40.0, -50.0));
        assert_eq!(draft.position, AnchorPoint::new(140.0, 50.0));
        assert!(!draft.is_dragging());

        // A second gesture starts where the first ended
        draft.begin_drag(DESKTOP);
        draft.end_drag(DragDelta::new(-40.0, 0.0));
        assert_eq!(draft.position, AnchorPoint::new(100.0, 50.0));
    }

    #[test]
    fn test_to_request_carries_render_size() {
        let draft = SignatureDraft::new(3, "Ada").at(AnchorPoint::new(12.0, 34.0));
        let req = draft.to_request(
            "doc-9",
            RenderedPage {
                height: 800.0,
                width: 618.0,
            },
        );
        assert_eq!(req.document_id, "doc-9");
        assert_eq!(req.page_number, 3);
        assert_eq!((req.x, req.y), (12.0, 34.0));
        assert_eq!(req.rendered_page_height, 800.0);
        assert_eq!(req.rendered_page_width, Some(618.0));
    }

    #[test]
    fn test_request_after_rerender_keeps_relative_position() {
        let mut draft = SignatureDraft::new(1, "Ada");
        draft.begin_drag(DESKTOP);
        draft.end_drag(DragDelta::new(0.0, 300.0));
        assert_eq!(draft.position, AnchorPoint::new(100.0, 400.0));
        assert_eq!(draft.render(), Some(DESKTOP));

        // The page shrank to half size before the draft was saved
        let req = draft.to_request("doc-1", PHONE);
        assert_eq!((req.x, req.y), (50.0, 200.0));
        assert_eq!(req.rendered_page_height, 400.0);
        assert_eq!(req.y / req.rendered_page_height, 0.5);
    }

    #[test]
    fn test_new_gesture_on_new_render_starts_from_carried_position() {
        let mut draft = SignatureDraft::new(1, "Ada").measured_on(DESKTOP);
        draft.begin_drag(PHONE);
        assert_eq!(draft.position, AnchorPoint::new(50.0, 50.0));
        draft.end_drag(DragDelta::new(10.0, 10.0));
        assert_eq!(draft.position, AnchorPoint::new(60.0, 60.0));
        assert_eq!(draft.to_request("doc-1", PHONE).y, 60.0);
    }

    #[test]
    fn test_unpinned_draft_uses_current_render() {
        let draft = SignatureDraft::new(1, "Ada").at(AnchorPoint::new(12.0, 34.0));
        let req = draft.to_request("doc-1", PHONE);
        assert_eq!((req.x, req.y), (12.0, 34.0));
    }
}
