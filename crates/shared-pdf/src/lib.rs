//! Shared PDF handling utilities
//!
//! Coordinate mapping between on-screen renders and PDF user space, page
//! geometry lookup, and baking accepted signatures into the original file.

pub mod coords;
pub mod error;
pub mod parser;
pub mod stamp;

pub use coords::{anchor_to_pdf, compute_anchor, rescale};
pub use error::PdfError;
pub use parser::{blank_pdf, PdfDocument};
pub use stamp::bake_signatures;

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of document bytes
pub fn hash_document(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_document_is_hex_sha256() {
        let hash = hash_document(b"%PDF-1.7");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_document(b"%PDF-1.7"));
        assert_ne!(hash, hash_document(b"%PDF-1.6"));
    }
}
