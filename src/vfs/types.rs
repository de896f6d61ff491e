/*!
 * VFS Types
 * Shared types for the VFS server model
 */

use crate::core::errors::Errno;
use crate::core::types::{Fd, PageIndex, Size, TaskId, Vnum};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// VFS operation result
pub type VfsResult<T> = Result<T, VfsError>;

/// VFS errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
pub enum VfsError {
    #[error("No file with vnum 0x{0:x}")]
    #[diagnostic(code(vfs::not_found))]
    NotFound(Vnum),

    #[error("Task {tid} has no open file on descriptor {fd}")]
    #[diagnostic(
        code(vfs::not_open),
        help("The task must open the file before the pager can close it.")
    )]
    NotOpen { tid: TaskId, fd: Fd },

    #[error("Frame {0} is not mapped")]
    #[diagnostic(code(vfs::bad_buffer))]
    BadBuffer(usize),

    #[error("Pager notification failed with status {0}")]
    #[diagnostic(code(vfs::notify_failed))]
    Notify(i64),
}

impl VfsError {
    /// Negative reply status
    pub fn status(&self) -> i64 {
        match self {
            VfsError::NotFound(_) => Errno::ENOENT.as_status(),
            VfsError::NotOpen { .. } => Errno::EBADF.as_status(),
            VfsError::BadBuffer(_) => Errno::EFAULT.as_status(),
            VfsError::Notify(status) => *status,
        }
    }
}

/// A page range stored by a `PagerWrite` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWrite {
    pub vnum: Vnum,
    pub offset: PageIndex,
    pub npages: Size,
}
