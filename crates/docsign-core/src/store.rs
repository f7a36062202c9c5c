//! Per-document mirror of the backend's placements

use shared_types::{DocumentStatus, PlacementStatus, SignaturePlacement};
use std::collections::HashMap;

/// Placements of one document, in creation order, keyed by id.
///
/// Never updated optimistically: the controller replaces the whole content
/// with a fresh backend listing after every confirmed mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementStore {
    document_id: String,
    placements: Vec<SignaturePlacement>,
    index: HashMap<String, usize>,
}

impl PlacementStore {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            ..Default::default()
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Replace everything with a backend listing.
    ///
    /// Entries for other documents are dropped. Order is by `created_at`,
    /// ties keep the listing order.
    pub fn replace_all(&mut self, mut placements: Vec<SignaturePlacement>) {
        placements.retain(|p| p.document_id == self.document_id);
        placements.sort_by_key(|p| p.created_at);

        self.index = placements
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        self.placements = placements;
    }

    pub fn all(&self) -> &[SignaturePlacement] {
        &self.placements
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SignaturePlacement> {
        self.index.get(id).map(|&i| &self.placements[i])
    }

    /// Lazy view of the placements on one page. Clone it to iterate again.
    pub fn by_page(&self, page_number: u32) -> PageView<'_> {
        PageView {
            inner: self.placements.iter(),
            page_number,
        }
    }

    pub fn accepted(&self) -> Option<&SignaturePlacement> {
        self.placements
            .iter()
            .find(|p| p.status == PlacementStatus::Accepted)
    }

    /// Most recent placement still awaiting a decision; the default target
    /// for accept and reject.
    pub fn latest_placed(&self) -> Option<&SignaturePlacement> {
        self.placements
            .iter()
            .rev()
            .find(|p| p.status == PlacementStatus::Placed)
    }

    pub fn status(&self, signed_artifact_path: Option<&str>) -> DocumentStatus {
        DocumentStatus::derive(&self.placements, signed_artifact_path)
    }
}

#[derive(Debug, Clone)]
pub struct PageView<'a> {
    inner: std::slice::Iter<'a, SignaturePlacement>,
    page_number: u32,
}

impl<'a> Iterator for PageView<'a> {
    type Item = &'a SignaturePlacement;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.page_number;
        self.inner.find(|p| p.page_number == page)
    }
}
