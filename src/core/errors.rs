/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 *
 * Two classes are kept strictly apart:
 * - `PagerError` variants other than `Invariant` are recoverable and reach the
 *   client as a negative status.
 * - `InvariantViolation` means the cache or call protocol reached a state that
 *   is never valid. It is never converted to an errno.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Fd, PageIndex, Pfn, TaskId, VirtAddr};

// Re-export subsystem errors
pub use crate::ipc::IpcError;
pub use crate::memory::MemoryError;

use crate::ipc::IpcTag;

/// Pager operation result
pub type PagerResult<T> = Result<T, PagerError>;

/// POSIX-style error numbers returned to clients as negative statuses
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Errno {
    #[error("operation not permitted")]
    EPERM = 1,
    #[error("no such file")]
    ENOENT = 2,
    #[error("I/O error")]
    EIO = 5,
    #[error("bad file descriptor")]
    EBADF = 9,
    #[error("out of memory")]
    ENOMEM = 12,
    #[error("bad address")]
    EFAULT = 14,
    #[error("invalid argument")]
    EINVAL = 22,
}

impl Errno {
    /// Negative status as carried in a reply register
    pub fn as_status(self) -> i64 {
        -(self as i32 as i64)
    }

    pub fn from_status(status: i64) -> Option<Self> {
        match -status {
            1 => Some(Errno::EPERM),
            2 => Some(Errno::ENOENT),
            5 => Some(Errno::EIO),
            9 => Some(Errno::EBADF),
            12 => Some(Errno::ENOMEM),
            14 => Some(Errno::EFAULT),
            22 => Some(Errno::EINVAL),
            _ => None,
        }
    }
}

/// Conditions the pager is built never to reach
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum InvariantViolation {
    #[error("page offset {offset} inserted twice into object {object}")]
    #[diagnostic(code(pager::invariant::duplicate_page))]
    DuplicatePage { object: u64, offset: PageIndex },

    #[error("page cache not contiguous: expected offset {expected}, found {found}")]
    #[diagnostic(code(pager::invariant::non_contiguous))]
    NonContiguousCache { expected: PageIndex, found: PageIndex },

    #[error("write target page {offset} is not resident")]
    #[diagnostic(code(pager::invariant::missing_page))]
    MissingCachePage { offset: PageIndex },

    #[error("short transfer: {transferred} of {requested} bytes")]
    #[diagnostic(code(pager::invariant::short_transfer))]
    ShortTransfer { requested: usize, transferred: usize },

    #[error("page copy out of bounds: offset {offset} + size {size}")]
    #[diagnostic(code(pager::invariant::copy_bounds))]
    CopyOutOfBounds { offset: usize, size: usize },

    #[error("validated buffer address 0x{addr:x} has no backing page")]
    #[diagnostic(code(pager::invariant::unmapped_buffer))]
    UnmappedBuffer { addr: VirtAddr },

    #[error("cached frame {pfn} is not mapped")]
    #[diagnostic(code(pager::invariant::cached_frame))]
    CachedFrame { pfn: Pfn },

    #[error("calling task {0} does not exist")]
    #[diagnostic(code(pager::invariant::unknown_task))]
    UnknownTask(TaskId),

    #[error("flush range ends at page {end}, file spans {expected} pages")]
    #[diagnostic(code(pager::invariant::flush_range))]
    FlushRange { end: PageIndex, expected: PageIndex },
}

/// Pager errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum PagerError {
    #[error("Bad file descriptor: {0}")]
    #[diagnostic(
        code(pager::bad_descriptor),
        help("The descriptor is out of range or not bound to an open file.")
    )]
    BadDescriptor(Fd),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(pager::invalid_argument))]
    InvalidArgument(String),

    #[error("Bad address: 0x{start:x}..0x{end:x}")]
    #[diagnostic(
        code(pager::bad_address),
        help("The buffer must lie inside a mapped region with the required access.")
    )]
    BadAddress { start: VirtAddr, end: VirtAddr },

    #[error("Memory error: {0}")]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error("Permission denied: {0}")]
    #[diagnostic(code(pager::permission_denied))]
    PermissionDenied(String),

    #[error("VFS {op:?} failed with status {status}")]
    #[diagnostic(code(pager::remote))]
    Remote { op: IpcTag, status: i64 },

    #[error("IPC transport failure: {0}")]
    #[diagnostic(transparent)]
    Transport(#[from] IpcError),

    #[error("Internal invariant violated: {0}")]
    #[diagnostic(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl PagerError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        PagerError::InvalidArgument(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PagerError::Invariant(_))
    }

    /// Negative reply status for recoverable errors, `None` for fatal ones
    pub fn status(&self) -> Option<i64> {
        let errno = match self {
            PagerError::BadDescriptor(_) => Errno::EBADF,
            PagerError::InvalidArgument(_) => Errno::EINVAL,
            PagerError::BadAddress { .. } => Errno::EFAULT,
            PagerError::Memory(MemoryError::OutOfMemory { .. }) => Errno::ENOMEM,
            PagerError::Memory(_) => Errno::EFAULT,
            PagerError::PermissionDenied(_) => Errno::EPERM,
            PagerError::Remote { status, .. } => return Some(*status),
            PagerError::Transport(_) => Errno::EIO,
            PagerError::Invariant(_) => return None,
        };
        Some(errno.as_status())
    }
}
