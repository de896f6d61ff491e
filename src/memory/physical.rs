/*!
 * Physical Memory
 * Bitmap-managed frame pool with temporary per-frame mappings
 */

use super::types::{MemoryError, MemoryResult, PhysicalMemoryStats};
use crate::core::limits::PAGE_SIZE;
use crate::core::types::{Pfn, Size};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};

/// Pool of page frames
///
/// Frame contents are materialized on first mapping and zeroed on allocation.
pub struct PhysicalMemory {
    frames: Box<[Mutex<Vec<u8>>]>,
    bitmap: Mutex<Vec<bool>>,
}

/// A frame mapped into the pager for the lifetime of the guard
pub struct MappedFrame<'a> {
    pfn: Pfn,
    bytes: MutexGuard<'a, Vec<u8>>,
}

impl MappedFrame<'_> {
    pub fn pfn(&self) -> Pfn {
        self.pfn
    }
}

impl Deref for MappedFrame<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for MappedFrame<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl PhysicalMemory {
    pub fn new(total_pages: Size) -> Self {
        debug!("Physical memory initialized with {} pages", total_pages);
        Self {
            frames: (0..total_pages).map(|_| Mutex::new(Vec::new())).collect(),
            bitmap: Mutex::new(vec![false; total_pages]),
        }
    }

    pub fn total_pages(&self) -> Size {
        self.frames.len()
    }

    /// Allocate `npages` physically contiguous zeroed frames (first fit)
    pub fn alloc_pages(&self, npages: Size) -> MemoryResult<Pfn> {
        let mut bitmap = self.bitmap.lock();
        let free = bitmap.iter().filter(|used| !**used).count();

        if npages == 0 || npages > free {
            return Err(MemoryError::OutOfMemory {
                requested: npages,
                available: free,
            });
        }

        let mut run = 0;
        for pfn in 0..bitmap.len() {
            if bitmap[pfn] {
                run = 0;
                continue;
            }
            run += 1;
            if run == npages {
                let first = pfn + 1 - npages;
                for slot in &mut bitmap[first..=pfn] {
                    *slot = true;
                }
                drop(bitmap);

                for frame in &self.frames[first..=pfn] {
                    let mut bytes = frame.lock();
                    bytes.clear();
                    bytes.resize(PAGE_SIZE, 0);
                }
                debug!("Allocated {} pages at pfn {}", npages, first);
                return Ok(first);
            }
        }

        warn!(
            "No run of {} contiguous pages ({} pages free)",
            npages, free
        );
        Err(MemoryError::OutOfMemory {
            requested: npages,
            available: free,
        })
    }

    /// Return `npages` frames starting at `pfn` to the pool
    pub fn free_pages(&self, pfn: Pfn, npages: Size) -> MemoryResult<()> {
        let mut bitmap = self.bitmap.lock();
        let end = pfn.checked_add(npages).ok_or(MemoryError::InvalidFrame(pfn))?;
        if end > bitmap.len() {
            return Err(MemoryError::InvalidFrame(pfn));
        }
        if let Some(offset) = bitmap[pfn..end].iter().position(|used| !*used) {
            return Err(MemoryError::InvalidFrame(pfn + offset));
        }
        for slot in &mut bitmap[pfn..end] {
            *slot = false;
        }
        debug!("Freed {} pages at pfn {}", npages, pfn);
        Ok(())
    }

    pub fn is_allocated(&self, pfn: Pfn) -> bool {
        self.bitmap.lock().get(pfn).copied().unwrap_or(false)
    }

    /// Map an allocated frame; dropping the guard unmaps it
    pub fn map(&self, pfn: Pfn) -> MemoryResult<MappedFrame<'_>> {
        if !self.is_allocated(pfn) {
            return Err(MemoryError::InvalidFrame(pfn));
        }
        let mut bytes = self.frames[pfn].lock();
        if bytes.len() != PAGE_SIZE {
            bytes.resize(PAGE_SIZE, 0);
        }
        Ok(MappedFrame { pfn, bytes })
    }

    pub fn stats(&self) -> PhysicalMemoryStats {
        let bitmap = self.bitmap.lock();
        let used = bitmap.iter().filter(|used| **used).count();
        PhysicalMemoryStats {
            total_pages: bitmap.len(),
            used_pages: used,
            free_pages: bitmap.len() - used,
        }
    }
}

impl std::fmt::Debug for PhysicalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalMemory")
            .field("stats", &self.stats())
            .finish()
    }
}
