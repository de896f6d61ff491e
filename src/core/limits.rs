/*!
 * System Limits and Constants
 *
 * Centralized location for pager-wide limits and well-known identities.
 * Organized by domain for discoverability.
 */

use super::types::TaskId;

// =============================================================================
// MEMORY LIMITS
// =============================================================================

/// Size of one physical page / cache page
pub const PAGE_SIZE: usize = 4096;

/// Mask selecting the in-page byte offset
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Default physical pool managed by the pager (16MB)
pub const DEFAULT_PHYSICAL_PAGES: usize = 4096;

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Descriptor slots per task
pub const TASK_FILES_MAX: usize = 32;

/// Largest representable file offset or cursor (cursors are 32-bit)
pub const MAX_FILE_OFFSET: u64 = 0xFFFF_FFFF;

// =============================================================================
// IPC LIMITS
// =============================================================================

/// Message registers carried by one IPC call
pub const MR_COUNT: usize = 6;

/// Task id of the memory manager (this pager)
pub const DEFAULT_PAGER_TID: TaskId = 0;

/// Task id of the VFS server
pub const DEFAULT_VFS_TID: TaskId = 1;
