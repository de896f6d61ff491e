/*!
 * Cache Transfer
 * Copies between a task's buffer and a contiguous run of cached pages
 *
 * Each copy segment stays inside one cache page and one buffer page, so the
 * buffer may start at any address. Callers only request ranges they have made
 * resident: a gap in the run or a transfer that falls short is fatal.
 */

use super::object::VmObject;
use crate::core::errors::{InvariantViolation, PagerResult};
use crate::core::limits::PAGE_SIZE;
use crate::core::types::{PageIndex, Pfn, Size, VirtAddr};
use crate::memory::{page_copy, AddressSpace, PhysicalMemory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// cache -> buffer
    ToBuffer,
    /// buffer -> cache
    ToCache,
}

/// Byte range of a transfer
#[derive(Debug, Clone, Copy)]
pub struct CacheRange {
    pub pfn_start: PageIndex,
    pub pfn_end: PageIndex,
    /// Offset of the cursor inside the first page
    pub cursor_offset: usize,
    pub count: Size,
}

/// Copy `range.count` bytes from the cache into the task buffer at `buf`
///
/// Returns 0 when the first page is not cached.
pub fn read_cache_pages(
    memory: &PhysicalMemory,
    space: &AddressSpace,
    object: &VmObject,
    buf: VirtAddr,
    range: CacheRange,
) -> PagerResult<Size> {
    if !object.contains(range.pfn_start) {
        return Ok(0);
    }
    let run: Vec<(PageIndex, Pfn)> = object
        .run(range.pfn_start..range.pfn_end)
        .map(|page| (page.offset, page.pfn))
        .collect();
    transfer(memory, space, &run, buf, range, Direction::ToBuffer).map(|(copied, _)| copied)
}

/// Copy `range.count` bytes from the task buffer at `buf` into the cache
///
/// Every page touched is marked dirty.
pub fn write_cache_pages(
    memory: &PhysicalMemory,
    space: &AddressSpace,
    object: &mut VmObject,
    buf: VirtAddr,
    range: CacheRange,
) -> PagerResult<Size> {
    if !object.contains(range.pfn_start) {
        return Err(InvariantViolation::MissingCachePage {
            offset: range.pfn_start,
        }
        .into());
    }
    let run: Vec<(PageIndex, Pfn)> = object
        .run(range.pfn_start..range.pfn_end)
        .map(|page| (page.offset, page.pfn))
        .collect();
    let (copied, last) = transfer(memory, space, &run, buf, range, Direction::ToCache)?;
    object.mark_dirty(range.pfn_start..last + 1);
    Ok(copied)
}

/// Walk the run page by page; returns bytes copied and the last page touched
fn transfer(
    memory: &PhysicalMemory,
    space: &AddressSpace,
    run: &[(PageIndex, Pfn)],
    buf: VirtAddr,
    range: CacheRange,
    direction: Direction,
) -> PagerResult<(Size, PageIndex)> {
    let mut left = range.count;
    let mut page_off = range.cursor_offset;
    let mut addr = buf;
    let mut expected = range.pfn_start;
    let mut last = range.pfn_start;

    for &(offset, cache_pfn) in run {
        if left == 0 {
            break;
        }
        if offset != expected {
            return Err(InvariantViolation::NonContiguousCache {
                expected,
                found: offset,
            }
            .into());
        }
        if !memory.is_allocated(cache_pfn) {
            return Err(InvariantViolation::CachedFrame { pfn: cache_pfn }.into());
        }

        while left > 0 && page_off < PAGE_SIZE {
            let buf_off = addr % PAGE_SIZE;
            let size = left.min(PAGE_SIZE - page_off).min(PAGE_SIZE - buf_off);
            let user_pfn = space
                .virt_to_page(addr)
                .ok_or(InvariantViolation::UnmappedBuffer { addr })?;

            match direction {
                Direction::ToBuffer => {
                    page_copy(memory, user_pfn, cache_pfn, buf_off, page_off, size)?
                }
                Direction::ToCache => {
                    page_copy(memory, cache_pfn, user_pfn, page_off, buf_off, size)?
                }
            }

            left -= size;
            page_off += size;
            addr += size;
        }

        page_off = 0;
        last = offset;
        expected = offset + 1;
    }

    if left != 0 {
        return Err(InvariantViolation::ShortTransfer {
            requested: range.count,
            transferred: range.count - left,
        }
        .into());
    }
    Ok((range.count, last))
}
