use crate::types::Region;

/// Ordered regions drawn on the page currently being annotated.
///
/// Insertion order matters only for undo: the most recent region goes first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionStore {
    regions: Vec<Region>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, region: Region) {
        self.regions.push(region);
    }

    /// Remove the most recently appended region, if any.
    pub fn undo_last(&mut self) -> Option<Region> {
        self.regions.pop()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn snapshot(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn into_vec(self) -> Vec<Region> {
        self.regions
    }
}
