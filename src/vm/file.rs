/*!
 * VM File
 * An open backing file: its length and its page cache
 */

use super::object::VmObject;
use super::page::Page;
use crate::core::errors::{InvariantViolation, PagerResult};
use crate::core::types::{pages_spanning, PageIndex, Vnum};
use crate::memory::PhysicalMemory;
use log::{debug, error};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What backs a VM file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmFileKind {
    /// Served by the VFS server
    Vfs,
    /// Zero-filled, no backing store
    Anonymous,
}

/// Mutable state of a file, guarded by the file's lock
#[derive(Debug)]
pub struct VmFileState {
    /// Authoritative byte length
    pub length: u32,
    pub object: VmObject,
}

/// One open file shared by every descriptor that references it
#[derive(Debug)]
pub struct VmFile {
    kind: VmFileKind,
    vnum: Vnum,
    refcount: AtomicUsize,
    state: Mutex<VmFileState>,
}

impl VmFile {
    pub fn new(kind: VmFileKind, vnum: Vnum, length: u32, object: VmObject) -> Self {
        Self {
            kind,
            vnum,
            refcount: AtomicUsize::new(0),
            state: Mutex::new(VmFileState { length, object }),
        }
    }

    pub fn kind(&self) -> VmFileKind {
        self.kind
    }

    pub fn vnum(&self) -> Vnum {
        self.vnum
    }

    /// Descriptors currently bound to this file
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop one descriptor reference, returning how many remain
    pub(crate) fn release(&self) -> usize {
        let prev = self
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    /// Serialize all cache and length access to this file
    pub fn lock(&self) -> MutexGuard<'_, VmFileState> {
        self.state.lock()
    }

    pub fn length(&self) -> u32 {
        self.state.lock().length
    }
}

impl VmFileState {
    /// Page in every page in `range`
    ///
    /// Stops at the first failure; pages already brought in stay cached.
    pub fn read_file_pages(&mut self, vnum: Vnum, range: Range<PageIndex>) -> PagerResult<()> {
        let pager = self.object.pager();
        for offset in range {
            if let Err(e) = pager.page_in(&mut self.object, offset) {
                error!(
                    "Could not read page {} from file with vnum 0x{:x}: {}",
                    offset, vnum, e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Page out `range`, which must end at the file's last page
    pub fn write_file_pages(&mut self, vnum: Vnum, range: Range<PageIndex>) -> PagerResult<()> {
        let expected = pages_spanning(self.length as u64);
        if range.end != expected {
            return Err(InvariantViolation::FlushRange {
                end: range.end,
                expected,
            }
            .into());
        }

        let pager = self.object.pager();
        for offset in range {
            if let Err(e) = pager.page_out(&mut self.object, offset) {
                error!(
                    "Could not write page {} to file with vnum 0x{:x}: {}",
                    offset, vnum, e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Extend the cache with fresh zeroed pages for `range`
    ///
    /// The block is allocated physically contiguous in one step. Insertion is
    /// not rolled back if it fails midway; that only happens on a duplicate
    /// offset, which is fatal.
    pub fn new_file_pages(
        &mut self,
        memory: &PhysicalMemory,
        range: Range<PageIndex>,
    ) -> PagerResult<()> {
        if range.is_empty() {
            return Ok(());
        }
        let npages = (range.end - range.start) as usize;
        let base = memory.alloc_pages(npages)?;

        for (i, offset) in range.clone().enumerate() {
            let mut page = Page::new(base + i, offset);
            page.refcount = 1;
            self.object.insert_page(page)?;
        }
        debug!(
            "Object {}: extended with pages {}..{} at pfn {}",
            self.object.id(),
            range.start,
            range.end,
            base
        );
        Ok(())
    }
}
