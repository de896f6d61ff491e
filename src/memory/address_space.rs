/*!
 * Task Address Space
 * Page-backed regions of a client task, with access validation and
 * virtual-to-physical translation
 */

use super::physical::PhysicalMemory;
use super::types::{MemoryError, MemoryResult, VmFlags};
use crate::core::errors::{PagerError, PagerResult};
use crate::core::limits::PAGE_SIZE;
use crate::core::types::{is_page_aligned, Pfn, VirtAddr};
use log::debug;

/// One mapped region; page `i` of the region is backed by `frames[i]`
#[derive(Debug, Clone)]
pub struct VmRegion {
    pub start: VirtAddr,
    pub end: VirtAddr,
    pub flags: VmFlags,
    frames: Vec<Pfn>,
}

impl VmRegion {
    fn contains(&self, addr: VirtAddr) -> bool {
        addr >= self.start && addr < self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    regions: Vec<VmRegion>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `len` bytes at page-aligned `start`, backing each page with its own frame
    pub fn map_region(
        &mut self,
        memory: &PhysicalMemory,
        start: VirtAddr,
        len: usize,
        flags: VmFlags,
    ) -> MemoryResult<()> {
        if !is_page_aligned(start) {
            return Err(MemoryError::AlignmentError {
                address: start,
                alignment: PAGE_SIZE,
            });
        }
        let npages = len.div_ceil(PAGE_SIZE);
        let end = start + npages * PAGE_SIZE;
        if self.regions.iter().any(|r| start < r.end && r.start < end) {
            return Err(MemoryError::Overlap { start, end });
        }

        let mut frames = Vec::with_capacity(npages);
        for _ in 0..npages {
            match memory.alloc_pages(1) {
                Ok(pfn) => frames.push(pfn),
                Err(e) => {
                    for pfn in frames {
                        let _ = memory.free_pages(pfn, 1);
                    }
                    return Err(e);
                }
            }
        }

        debug!(
            "Mapped region 0x{:x}..0x{:x} ({} pages, {:?})",
            start, end, npages, flags
        );
        let at = self.regions.partition_point(|r| r.start < start);
        self.regions.insert(
            at,
            VmRegion {
                start,
                end,
                flags,
                frames,
            },
        );
        Ok(())
    }

    /// Check `[start, end)` is fully mapped with at least `required` access
    pub fn validate_range(
        &self,
        start: VirtAddr,
        end: VirtAddr,
        required: VmFlags,
    ) -> PagerResult<()> {
        let bad = PagerError::BadAddress { start, end };
        if end < start {
            return Err(bad);
        }

        let mut addr = start;
        while addr < end {
            let region = self
                .regions
                .iter()
                .find(|r| r.contains(addr))
                .ok_or_else(|| bad.clone())?;
            if !region.flags.contains(required) {
                return Err(bad);
            }
            addr = region.end;
        }
        Ok(())
    }

    /// Frame backing the page that contains `addr`
    pub fn virt_to_page(&self, addr: VirtAddr) -> Option<Pfn> {
        let region = self.regions.iter().find(|r| r.contains(addr))?;
        region.frames.get((addr - region.start) / PAGE_SIZE).copied()
    }

    /// Store bytes into the task's memory (client side of a syscall)
    pub fn write_bytes(
        &self,
        memory: &PhysicalMemory,
        addr: VirtAddr,
        data: &[u8],
    ) -> PagerResult<()> {
        self.validate_range(addr, addr + data.len(), VmFlags::WRITE)?;
        let mut done = 0;
        while done < data.len() {
            let cur = addr + done;
            let in_page = cur % PAGE_SIZE;
            let size = (PAGE_SIZE - in_page).min(data.len() - done);
            let pfn = self.frame_for(cur)?;
            memory.map(pfn)?[in_page..in_page + size].copy_from_slice(&data[done..done + size]);
            done += size;
        }
        Ok(())
    }

    /// Load bytes from the task's memory (client side of a syscall)
    pub fn read_bytes(
        &self,
        memory: &PhysicalMemory,
        addr: VirtAddr,
        len: usize,
    ) -> PagerResult<Vec<u8>> {
        self.validate_range(addr, addr + len, VmFlags::READ)?;
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let cur = addr + out.len();
            let in_page = cur % PAGE_SIZE;
            let size = (PAGE_SIZE - in_page).min(len - out.len());
            let pfn = self.frame_for(cur)?;
            out.extend_from_slice(&memory.map(pfn)?[in_page..in_page + size]);
        }
        Ok(out)
    }

    /// Release every region's frames
    pub fn unmap_all(&mut self, memory: &PhysicalMemory) {
        for region in self.regions.drain(..) {
            for pfn in region.frames {
                let _ = memory.free_pages(pfn, 1);
            }
        }
    }

    fn frame_for(&self, addr: VirtAddr) -> PagerResult<Pfn> {
        self.virt_to_page(addr).ok_or(PagerError::BadAddress {
            start: addr,
            end: addr + 1,
        })
    }
}
