//! Bake accepted signature placements into the original PDF

use crate::coords::anchor_to_pdf;
use crate::error::PdfError;
use crate::parser::PdfDocument;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use shared_types::{PlacementStatus, SignaturePlacement};

/// Font size of the signature on screen, in CSS pixels
const SCREEN_FONT_PX: f64 = 20.0;
/// Horizontal and vertical padding around the signature on screen
const SCREEN_PADDING_X_PX: f64 = 8.0;
const SCREEN_PADDING_Y_PX: f64 = 4.0;
/// Rough advance width of a glyph relative to the font size
const GLYPH_WIDTH_RATIO: f64 = 0.6;

/// Escape special characters for PDF string literals
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            _ if c.is_ascii() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Map a CSS font-family list onto one of the PDF standard 14 fonts
pub fn standard_font(font_family: &str) -> &'static str {
    let lower = font_family.to_lowercase();
    if lower.contains("cursive")
        || lower.contains("script")
        || lower.contains("hand")
        || lower.contains("vibes")
    {
        "Times-Italic"
    } else if lower.contains("mono") || lower.contains("courier") {
        "Courier"
    } else if lower.contains("serif") && !lower.contains("sans") {
        "Times-Roman"
    } else {
        "Helvetica"
    }
}

/// Geometry of one stamp in PDF user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
}

/// Compute where a placement's stamp goes on a page with the given MediaBox.
///
/// The anchor is the top-left corner of the on-screen signature box; sizes
/// are scaled from screen pixels to points with the same ratio as the anchor.
pub fn stamp_rect(placement: &SignaturePlacement, media_box: [f64; 4]) -> StampRect {
    let (left, top) = anchor_to_pdf(placement, media_box);
    let scale = media_box[3] / placement.rendered_page_height;

    let font_size = SCREEN_FONT_PX * scale;
    let pad_x = SCREEN_PADDING_X_PX * scale;
    let pad_y = SCREEN_PADDING_Y_PX * scale;
    let chars = placement.text.chars().count().max(1) as f64;

    let width = chars * font_size * GLYPH_WIDTH_RATIO + 2.0 * pad_x;
    let height = font_size + 2.0 * pad_y;

    StampRect {
        x: left,
        y: top - height,
        width,
        height,
        font_size,
    }
}

/// Bake every `Accepted` placement into `pdf_bytes` and return the new file.
///
/// Placements in any other state are ignored. Each stamp is a printable
/// FreeText annotation carrying its own appearance stream, so viewers show the
/// same text regardless of their form support.
pub fn bake_signatures(
    pdf_bytes: &[u8],
    placements: &[SignaturePlacement],
) -> Result<Vec<u8>, PdfError> {
    let mut pdf = PdfDocument::from_bytes(pdf_bytes)?;

    for placement in placements
        .iter()
        .filter(|p| p.status == PlacementStatus::Accepted)
    {
        if !(placement.rendered_page_height.is_finite() && placement.rendered_page_height > 0.0) {
            return Err(PdfError::GeometryError(format!(
                "Placement {} has no rendered page height",
                placement.id
            )));
        }

        let page_id = pdf
            .page_id(placement.page_number)
            .ok_or(PdfError::PageNotFound(placement.page_number))?;
        let media_box = pdf.page_dimensions(placement.page_number)?;
        let rect = stamp_rect(placement, media_box);

        let doc = pdf.doc_mut();
        let appearance_id = doc.add_object(appearance_stream(placement, &rect));
        let annot = stamp_annotation(placement, &rect, appearance_id);
        let annot_id = doc.add_object(Object::Dictionary(annot));
        add_annotation_to_page(doc, page_id, annot_id)?;
    }

    pdf.save_to_bytes()
}

fn stamp_annotation(
    placement: &SignaturePlacement,
    rect: &StampRect,
    appearance_id: ObjectId,
) -> Dictionary {
    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"FreeText".to_vec()));
    annot.set(
        "Rect",
        Object::Array(vec![
            Object::Real(rect.x as f32),
            Object::Real(rect.y as f32),
            Object::Real((rect.x + rect.width) as f32),
            Object::Real((rect.y + rect.height) as f32),
        ]),
    );
    annot.set(
        "Contents",
        Object::String(
            placement.text.as_bytes().to_vec(),
            lopdf::StringFormat::Literal,
        ),
    );
    annot.set(
        "NM",
        Object::String(placement.id.as_bytes().to_vec(), lopdf::StringFormat::Literal),
    );
    let da = format!("/F1 {:.2} Tf 0 g", rect.font_size);
    annot.set("DA", Object::String(da.into_bytes(), lopdf::StringFormat::Literal));

    // Print flag
    annot.set("F", Object::Integer(4));

    let mut bs = Dictionary::new();
    bs.set("W", Object::Integer(0));
    annot.set("BS", Object::Dictionary(bs));

    let mut ap = Dictionary::new();
    ap.set("N", Object::Reference(appearance_id));
    annot.set("AP", Object::Dictionary(ap));

    annot
}

fn appearance_stream(placement: &SignaturePlacement, rect: &StampRect) -> Object {
    let pad_x = (rect.width - placement.text.chars().count().max(1) as f64
        * rect.font_size
        * GLYPH_WIDTH_RATIO)
        / 2.0;
    let baseline = (rect.height - rect.font_size) / 2.0 + rect.font_size * 0.2;

    let content = format!(
        "q\n\
0 0 0 rg\n\
BT\n\
/F1 {fs:.2} Tf\n\
{x:.2} {y:.2} Td\n\
({text}) Tj\n\
ET\n\
Q",
        fs = rect.font_size,
        x = pad_x,
        y = baseline,
        text = escape_pdf_string(&placement.text),
    );

    let mut stream_dict = Dictionary::new();
    stream_dict.set("Type", Object::Name(b"XObject".to_vec()));
    stream_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    stream_dict.set("FormType", Object::Integer(1));
    stream_dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(rect.width as f32),
            Object::Real(rect.height as f32),
        ]),
    );

    let mut f1 = Dictionary::new();
    f1.set("Type", Object::Name(b"Font".to_vec()));
    f1.set("Subtype", Object::Name(b"Type1".to_vec()));
    f1.set(
        "BaseFont",
        Object::Name(standard_font(&placement.font_family).as_bytes().to_vec()),
    );
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Dictionary(f1));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    stream_dict.set("Resources", Object::Dictionary(resources));

    Object::Stream(Stream::new(stream_dict, content.into_bytes()))
}

fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), PdfError> {
    // Annots may be an indirect array
    let annots_ref = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .and_then(|page| page.get(b"Annots"))
        .and_then(Object::as_reference)
        .ok();

    if let Some(annots_id) = annots_ref {
        let annots = doc
            .get_object_mut(annots_id)
            .and_then(Object::as_array_mut)
            .map_err(|e| PdfError::OperationError(format!("Annots array: {}", e)))?;
        annots.push(Object::Reference(annot_id));
        return Ok(());
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::OperationError(e.to_string()))?;

    if let Ok(Object::Array(ref mut arr)) = page_dict.get_mut(b"Annots") {
        arr.push(Object::Reference(annot_id));
    } else {
        page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::create_test_pdf;
    use chrono::Utc;
    use shared_types::AnchorPoint;

    fn accepted(page: u32, x: f64, y: f64, text: &str) -> SignaturePlacement {
        SignaturePlacement {
            id: format!("p-{}-{}", page, text),
            document_id: "doc-1".to_string(),
            page_number: page,
            position: AnchorPoint::new(x, y),
            rendered_page_height: 800.0,
            rendered_page_width: None,
            text: text.to_string(),
            font_family: "'Great Vibes', cursive".to_string(),
            status: PlacementStatus::Accepted,
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    fn stamps_on_page(bytes: &[u8], page: u32) -> Vec<Dictionary> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        let page_dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let Ok(annots) = page_dict.get(b"Annots") else {
            return Vec::new();
        };
        annots
            .as_array()
            .unwrap()
            .iter()
            .map(|obj| {
                let id = obj.as_reference().unwrap();
                doc.get_object(id).unwrap().as_dict().unwrap().clone()
            })
            .collect()
    }

    #[test]
    fn test_standard_font_mapping() {
        assert_eq!(standard_font("'Great Vibes', cursive"), "Times-Italic");
        assert_eq!(standard_font("'Dancing Script', cursive"), "Times-Italic");
        assert_eq!(standard_font("monospace"), "Courier");
        assert_eq!(standard_font("Georgia, serif"), "Times-Roman");
        assert_eq!(standard_font("Arial, sans-serif"), "Helvetica");
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_pdf_string("Zoë"), "Zo?");
    }

    #[test]
    fn test_stamp_rect_scales_to_page() {
        // 800px render of a 792pt page
        let rect = stamp_rect(&accepted(1, 100.0, 100.0, "Ada"), [0.0, 0.0, 612.0, 792.0]);
        let scale = 792.0 / 800.0;
        assert!((rect.x - 100.0 * scale).abs() < 1e-9);
        assert!((rect.y + rect.height - (792.0 - 100.0 * scale)).abs() < 1e-9);
        assert!((rect.font_size - 20.0 * scale).abs() < 1e-9);
    }

    #[test]
    fn test_bake_adds_stamp_on_the_right_page() {
        let pdf = create_test_pdf(&[(612, 792), (612, 792)]);
        let baked = bake_signatures(&pdf, &[accepted(2, 100.0, 100.0, "Ada Lovelace")]).unwrap();
        assert!(baked.starts_with(b"%PDF-"));

        assert!(stamps_on_page(&baked, 1).is_empty());
        let stamps = stamps_on_page(&baked, 2);
        assert_eq!(stamps.len(), 1);
        assert_eq!(
            stamps[0].get(b"Subtype").unwrap().as_name().unwrap(),
            b"FreeText"
        );
        assert_eq!(
            stamps[0].get(b"Contents").unwrap().as_str().unwrap(),
            b"Ada Lovelace"
        );
    }

    #[test]
    fn test_bake_ignores_non_accepted() {
        let pdf = create_test_pdf(&[(612, 792)]);
        let mut placed = accepted(1, 10.0, 10.0, "Draft");
        placed.status = PlacementStatus::Placed;
        let mut rejected = accepted(1, 20.0, 20.0, "No");
        rejected.status = PlacementStatus::Rejected;

        let baked = bake_signatures(&pdf, &[placed, rejected]).unwrap();
        assert!(stamps_on_page(&baked, 1).is_empty());
    }

    #[test]
    fn test_bake_keeps_page_count() {
        let pdf = create_test_pdf(&[(612, 792), (595, 842), (612, 792)]);
        let baked = bake_signatures(
            &pdf,
            &[accepted(1, 50.0, 700.0, "A"), accepted(3, 300.0, 20.0, "B")],
        )
        .unwrap();
        let reloaded = PdfDocument::from_bytes(&baked).unwrap();
        assert_eq!(reloaded.page_count(), 3);
        assert_eq!(stamps_on_page(&baked, 1).len(), 1);
        assert_eq!(stamps_on_page(&baked, 3).len(), 1);
    }

    #[test]
    fn test_bake_out_of_range_page_fails() {
        let pdf = create_test_pdf(&[(612, 792)]);
        let result = bake_signatures(&pdf, &[accepted(4, 10.0, 10.0, "Ada")]);
        assert!(matches!(result, Err(PdfError::PageNotFound(4))));
    }
}
