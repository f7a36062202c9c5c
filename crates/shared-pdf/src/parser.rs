//! PDF parsing using lopdf

use crate::error::PdfError;
use lopdf::{dictionary, Document, Object, ObjectId};

/// US Letter, used when neither the page nor its parent carries a MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Wrapper around lopdf::Document with the page lookups signing needs
pub struct PdfDocument {
    pub(crate) doc: Document,
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::ParseError(e.to_string()))?;
        Ok(Self { doc })
    }

    /// Get the number of pages
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get page object ID for a given page number (1-indexed)
    pub fn page_id(&self, page_num: u32) -> Option<ObjectId> {
        self.doc.get_pages().get(&page_num).copied()
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4], PdfError> {
        let page_id = self
            .page_id(page_num)
            .ok_or(PdfError::PageNotFound(page_num))?;

        let page_dict = self
            .doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| PdfError::ParseError(format!("Page {} object: {}", page_num, e)))?;

        let media_box = self.media_box(page_dict)?;
        if media_box[2] <= 0.0 || media_box[3] <= 0.0 {
            return Err(PdfError::GeometryError(format!(
                "Page {} has an empty MediaBox",
                page_num
            )));
        }
        Ok(media_box)
    }

    /// MediaBox from the page dictionary, falling back to its parent
    fn media_box(&self, page_dict: &lopdf::Dictionary) -> Result<[f64; 4], PdfError> {
        if let Ok(media_box) = page_dict.get(b"MediaBox") {
            return self.parse_rect(media_box);
        }

        let parent_box = page_dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| self.doc.get_object(id))
            .and_then(Object::as_dict)
            .and_then(|parent| parent.get(b"MediaBox"));
        if let Ok(media_box) = parent_box {
            return self.parse_rect(media_box);
        }

        Ok(DEFAULT_MEDIA_BOX)
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    fn parse_rect(&self, obj: &Object) -> Result<[f64; 4], PdfError> {
        let arr = match obj {
            Object::Array(a) => a,
            Object::Reference(id) => self
                .doc
                .get_object(*id)
                .and_then(Object::as_array)
                .map_err(|e| PdfError::ParseError(format!("MediaBox reference: {}", e)))?,
            _ => return Err(PdfError::ParseError("MediaBox is not an array".to_string())),
        };

        if arr.len() != 4 {
            return Err(PdfError::ParseError(format!(
                "MediaBox has {} elements, expected 4",
                arr.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (i, obj) in arr.iter().enumerate() {
            values[i] = self.extract_number(obj)?;
        }

        // [x1, y1, x2, y2] -> [x, y, width, height]
        Ok([
            values[0],
            values[1],
            values[2] - values[0],
            values[3] - values[1],
        ])
    }

    fn extract_number(&self, obj: &Object) -> Result<f64, PdfError> {
        match obj {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r as f64),
            Object::Reference(id) => {
                let resolved = self
                    .doc
                    .get_object(*id)
                    .map_err(|e| PdfError::ParseError(format!("Failed to resolve: {}", e)))?;
                self.extract_number(resolved)
            }
            _ => Err(PdfError::ParseError(
                "Expected number in rectangle".to_string(),
            )),
        }
    }

    /// Get mutable access to the internal document
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::OperationError(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }
}

/// Build an empty PDF whose pages have the given MediaBox sizes in points
pub fn blank_pdf(page_sizes: &[(i64, i64)]) -> Result<Vec<u8>, PdfError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = page_sizes
        .iter()
        .map(|(w, h)| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), (*w).into(), (*h).into()],
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_sizes.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    PdfDocument { doc }.save_to_bytes()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn create_test_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
        blank_pdf(sizes).unwrap()
    }

    #[test]
    fn test_page_count_and_dimensions() {
        let bytes = create_test_pdf(&[(612, 792), (595, 842)]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert_eq!(pdf.page_dimensions(1).unwrap(), [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(pdf.page_dimensions(2).unwrap(), [0.0, 0.0, 595.0, 842.0]);
    }

    #[test]
    fn test_missing_page_is_reported() {
        let bytes = create_test_pdf(&[(612, 792)]);
        let pdf = PdfDocument::from_bytes(&bytes).unwrap();
        assert!(matches!(
            pdf.page_dimensions(3),
            Err(PdfError::PageNotFound(3))
        ));
    }

    #[test]
    fn test_from_bytes_html_fails() {
        // fetch() returning an SPA fallback instead of the PDF
        let html = b"<!DOCTYPE html><html><body>Not a PDF</body></html>";
        assert!(matches!(
            PdfDocument::from_bytes(html),
            Err(PdfError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_bytes_empty_fails() {
        assert!(PdfDocument::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_parse_rect_array() {
        let pdf = PdfDocument {
            doc: Document::new(),
        };
        let arr = Object::Array(vec![
            Object::Integer(10),
            Object::Integer(20),
            Object::Integer(622),
            Object::Real(812.0),
        ]);
        assert_eq!(pdf.parse_rect(&arr).unwrap(), [10.0, 20.0, 612.0, 792.0]);
    }
}
