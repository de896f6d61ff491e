/*!
 * Task Types
 * Client tasks and their descriptor tables
 */

use crate::core::errors::{PagerError, PagerResult};
use crate::core::limits::TASK_FILES_MAX;
use crate::core::types::{Fd, TaskId, Vnum};
use crate::memory::AddressSpace;
use crate::vm::VmFile;
use std::sync::Arc;

/// One descriptor slot
#[derive(Debug, Clone, Default)]
pub struct FileDescriptor {
    pub vnum: Vnum,
    pub cursor: u32,
    pub file: Option<Arc<VmFile>>,
}

impl FileDescriptor {
    pub fn is_bound(&self) -> bool {
        self.file.is_some()
    }

    pub fn clear(&mut self) {
        self.vnum = 0;
        self.cursor = 0;
        self.file = None;
    }
}

/// A client task as seen by the pager
#[derive(Debug)]
pub struct Task {
    pub tid: TaskId,
    pub fds: Vec<FileDescriptor>,
    pub space: AddressSpace,
}

impl Task {
    pub fn new(tid: TaskId) -> Self {
        Self {
            tid,
            fds: vec![FileDescriptor::default(); TASK_FILES_MAX],
            space: AddressSpace::new(),
        }
    }

    /// Slot index for `fd` when it is within the table
    pub fn slot(fd: Fd) -> PagerResult<usize> {
        usize::try_from(fd)
            .ok()
            .filter(|&i| i < TASK_FILES_MAX)
            .ok_or(PagerError::BadDescriptor(fd))
    }

    /// A descriptor that is in range and bound to a file
    pub fn descriptor(&self, fd: Fd) -> PagerResult<&FileDescriptor> {
        let desc = &self.fds[Self::slot(fd)?];
        if !desc.is_bound() {
            return Err(PagerError::BadDescriptor(fd));
        }
        Ok(desc)
    }

    pub fn descriptor_mut(&mut self, fd: Fd) -> PagerResult<&mut FileDescriptor> {
        let desc = &mut self.fds[Self::slot(fd)?];
        if !desc.is_bound() {
            return Err(PagerError::BadDescriptor(fd));
        }
        Ok(desc)
    }

    /// The file and cursor bound to `fd`
    pub fn bound_file(&self, fd: Fd) -> PagerResult<(Arc<VmFile>, u32)> {
        let desc = self.descriptor(fd)?;
        match &desc.file {
            Some(file) => Ok((Arc::clone(file), desc.cursor)),
            None => Err(PagerError::BadDescriptor(fd)),
        }
    }

    pub fn open_descriptors(&self) -> usize {
        self.fds.iter().filter(|d| d.is_bound()).count()
    }
}
