/*!
 * Core Types
 * Common types used across the pager
 */

use super::limits::{PAGE_MASK, PAGE_SIZE};

/// Task (thread) identifier as seen by the IPC layer
pub type TaskId = u32;

/// File descriptor index; signed at the syscall boundary
pub type Fd = i32;

/// Remote file identity assigned by the VFS server
pub type Vnum = u64;

/// Physical frame number
pub type Pfn = usize;

/// File-relative page index
pub type PageIndex = u64;

/// Virtual address inside a task's address space
pub type VirtAddr = usize;

/// Size type for memory operations
pub type Size = usize;

/// Page index containing a byte offset
#[inline]
pub const fn page_index(byte: u64) -> PageIndex {
    byte / PAGE_SIZE as u64
}

/// Round a byte offset up to the next page boundary
#[inline]
pub const fn page_align_up(byte: u64) -> u64 {
    (byte + PAGE_MASK as u64) & !(PAGE_MASK as u64)
}

/// Byte offset within its page
#[inline]
pub const fn page_offset(byte: u64) -> usize {
    (byte & PAGE_MASK as u64) as usize
}

/// Number of pages needed to hold `len` bytes
#[inline]
pub const fn pages_spanning(len: u64) -> PageIndex {
    page_index(page_align_up(len))
}

#[inline]
pub const fn is_page_aligned(addr: usize) -> bool {
    addr & PAGE_MASK == 0
}
