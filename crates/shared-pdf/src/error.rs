use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("PDF parse error: {0}")]
    ParseError(String),

    #[error("Page {0} not found")]
    PageNotFound(u32),

    #[error("Invalid page geometry: {0}")]
    GeometryError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}
