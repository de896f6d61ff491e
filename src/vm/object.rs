/*!
 * VM Object
 * Per-file page cache ordered by file-relative page index
 *
 * The cache is a `BTreeMap` keyed by page offset, so iteration is always in
 * ascending offset order and lookups are logarithmic. Inserting an offset that
 * is already cached is never a valid call sequence and is reported as a fatal
 * invariant violation.
 */

use super::page::{ObjectId, Page};
use super::pager::Pager;
use crate::core::errors::InvariantViolation;
use crate::core::types::PageIndex;
use crate::memory::PhysicalMemory;
use log::{debug, error, warn};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug)]
pub struct VmObject {
    id: ObjectId,
    pages: BTreeMap<PageIndex, Page>,
    npages: usize,
    pager: Arc<dyn Pager>,
}

impl VmObject {
    pub fn new(id: ObjectId, pager: Arc<dyn Pager>) -> Self {
        Self {
            id,
            pages: BTreeMap::new(),
            npages: 0,
            pager,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Resident page count
    pub fn npages(&self) -> usize {
        self.npages
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The pager capability attached to this object
    pub fn pager(&self) -> Arc<dyn Pager> {
        Arc::clone(&self.pager)
    }

    /// Insert a page keeping strict ascending order by offset
    pub fn insert_page(&mut self, mut page: Page) -> Result<(), InvariantViolation> {
        match self.pages.entry(page.offset) {
            Entry::Occupied(_) => {
                error!(
                    "Object {}: page offset {} is already cached",
                    self.id, page.offset
                );
                Err(InvariantViolation::DuplicatePage {
                    object: self.id,
                    offset: page.offset,
                })
            }
            Entry::Vacant(slot) => {
                page.owner = self.id;
                slot.insert(page);
                self.npages += 1;
                Ok(())
            }
        }
    }

    pub fn find_page(&self, offset: PageIndex) -> Option<&Page> {
        self.pages.get(&offset)
    }

    pub fn find_page_mut(&mut self, offset: PageIndex) -> Option<&mut Page> {
        self.pages.get_mut(&offset)
    }

    pub fn contains(&self, offset: PageIndex) -> bool {
        self.pages.contains_key(&offset)
    }

    /// All cached pages in offset order
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn offsets(&self) -> Vec<PageIndex> {
        self.pages.keys().copied().collect()
    }

    /// Cached pages whose offsets fall in `range`, in order; gaps are skipped
    pub fn run(&self, range: Range<PageIndex>) -> impl Iterator<Item = &Page> {
        self.pages.range(range).map(|(_, page)| page)
    }

    pub fn mark_dirty(&mut self, range: Range<PageIndex>) {
        for (_, page) in self.pages.range_mut(range) {
            page.dirty = true;
        }
    }

    pub fn dirty_offsets(&self) -> Vec<PageIndex> {
        self.pages
            .values()
            .filter(|page| page.dirty)
            .map(|page| page.offset)
            .collect()
    }

    /// Drop every page and return its frame to `memory`
    pub fn release_pages(&mut self, memory: &PhysicalMemory) -> usize {
        let released = self.pages.len();
        for page in std::mem::take(&mut self.pages).into_values() {
            if page.dirty {
                warn!(
                    "Object {}: releasing dirty page at offset {}",
                    self.id, page.offset
                );
            }
            if let Err(e) = memory.free_pages(page.pfn, 1) {
                warn!("Object {}: could not free pfn {}: {}", self.id, page.pfn, e);
            }
        }
        self.npages = 0;
        debug!("Object {}: released {} pages", self.id, released);
        released
    }
}
