pub mod audit;
pub mod types;

pub use audit::AuditEntry;
pub use types::{
    AnchorPoint, DocumentFilter, DocumentRecord, DocumentStatus, DragDelta,
    PlaceSignatureRequest, PlacementStatus, SignaturePlacement,
};
