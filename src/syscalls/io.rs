/*!
 * Read and Write Syscalls
 *
 * Both run with the calling task locked, then the file. The page range covering
 * the transfer is made resident first, and the cursor only moves once the copy
 * has completed.
 */

use super::executor::SyscallExecutor;
use crate::core::errors::{PagerError, PagerResult};
use crate::core::limits::MAX_FILE_OFFSET;
use crate::core::types::{
    page_index, page_offset, pages_spanning, Fd, PageIndex, Size, TaskId, VirtAddr,
};
use crate::memory::VmFlags;
use crate::vm::{read_cache_pages, write_cache_pages, CacheRange};
use log::debug;
use std::ops::Range;

/// Split the write `[wstart, wend)` against a file of `flen` bytes
///
/// Returns the pages that already hold file data and the pages past the end of
/// the file. Either may be empty.
pub fn split_write_range(
    wstart: u64,
    wend: u64,
    flen: u64,
) -> (Range<PageIndex>, Range<PageIndex>) {
    let first = page_index(wstart);
    let last = pages_spanning(wend);
    let file_end = pages_spanning(flen);

    let existing = first.min(file_end)..last.min(file_end);
    let fresh = first.max(file_end)..last.max(file_end);
    (existing, fresh)
}

fn validate_count(count: i32) -> PagerResult<Size> {
    usize::try_from(count)
        .map_err(|_| PagerError::invalid_argument(format!("negative byte count {}", count)))
}

fn buffer_end(buf: VirtAddr, count: Size) -> PagerResult<VirtAddr> {
    buf.checked_add(count).ok_or(PagerError::BadAddress {
        start: buf,
        end: VirtAddr::MAX,
    })
}

impl SyscallExecutor {
    /// Read up to `count` bytes at the cursor into the task's buffer at `buf`
    pub fn read(&self, sender: TaskId, fd: Fd, buf: VirtAddr, count: i32) -> PagerResult<Size> {
        let task = self.caller(sender)?;
        let mut task = task.lock();
        let (file, cursor) = task.bound_file(fd)?;

        let count = validate_count(count)?;
        if count == 0 {
            return Ok(0);
        }
        task.space
            .validate_range(buf, buffer_end(buf, count)?, VmFlags::READ)?;

        let mut state = file.lock();
        if cursor >= state.length {
            return Ok(0);
        }
        let count = count.min((state.length - cursor) as usize);
        let start = cursor as u64;
        let end = start + count as u64;
        let pages = page_index(start)..pages_spanning(end);

        state.read_file_pages(file.vnum(), pages.clone())?;
        let copied = read_cache_pages(
            &self.memory,
            &task.space,
            &state.object,
            buf,
            CacheRange {
                pfn_start: pages.start,
                pfn_end: pages.end,
                cursor_offset: page_offset(start),
                count,
            },
        )?;
        drop(state);

        task.descriptor_mut(fd)?.cursor = cursor + copied as u32;
        debug!(
            "Task {} read {} bytes from fd {} at {}",
            sender, copied, fd, cursor
        );
        Ok(copied)
    }

    /// Write `count` bytes from the task's buffer at `buf` at the cursor
    pub fn write(&self, sender: TaskId, fd: Fd, buf: VirtAddr, count: i32) -> PagerResult<Size> {
        let task = self.caller(sender)?;
        let mut task = task.lock();
        let (file, cursor) = task.bound_file(fd)?;

        let count = validate_count(count)?;
        if count == 0 {
            return Ok(0);
        }
        task.space
            .validate_range(buf, buffer_end(buf, count)?, VmFlags::READ_WRITE)?;

        let start = cursor as u64;
        let end = start + count as u64;
        if end > MAX_FILE_OFFSET {
            return Err(PagerError::invalid_argument(format!(
                "write to {} passes the largest file offset",
                end
            )));
        }

        let mut state = file.lock();
        let (existing, fresh) = split_write_range(start, end, state.length as u64);
        state.read_file_pages(file.vnum(), existing)?;
        state.new_file_pages(&self.memory, fresh)?;

        let copied = write_cache_pages(
            &self.memory,
            &task.space,
            &mut state.object,
            buf,
            CacheRange {
                pfn_start: page_index(start),
                pfn_end: pages_spanning(end),
                cursor_offset: page_offset(start),
                count,
            },
        )?;
        if end > state.length as u64 {
            state.length = end as u32;
        }
        drop(state);

        task.descriptor_mut(fd)?.cursor = cursor + copied as u32;
        debug!(
            "Task {} wrote {} bytes to fd {} at {}",
            sender, copied, fd, cursor
        );
        Ok(copied)
    }
}
