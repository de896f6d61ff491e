/*!
 * Fsync and Close Syscalls
 */

use super::executor::SyscallExecutor;
use crate::core::errors::PagerResult;
use crate::core::types::{pages_spanning, Fd, TaskId};
use crate::vm::{VmFile, VmFileKind};
use log::{debug, info, warn};
use std::sync::Arc;

impl SyscallExecutor {
    /// Write back every dirty page of `file`, then push its length
    pub fn flush(&self, file: &VmFile) -> PagerResult<()> {
        let mut state = file.lock();
        let npages = pages_spanning(state.length as u64);
        state.write_file_pages(file.vnum(), 0..npages)?;

        if file.kind() == VmFileKind::Vfs {
            self.vfs.update_stats(file.vnum(), state.length)?;
        }
        debug!(
            "Flushed vnum 0x{:x}: {} pages, {} bytes",
            file.vnum(),
            npages,
            state.length
        );
        Ok(())
    }

    pub fn fsync(&self, sender: TaskId, fd: Fd) -> PagerResult<()> {
        let task = self.caller(sender)?;
        let task = task.lock();
        let (file, _) = task.bound_file(fd)?;
        self.flush(&file)
    }

    /// Flush, tell the VFS server, then unbind the descriptor
    ///
    /// The slot is only cleared once both remote steps succeeded.
    pub fn close(&self, sender: TaskId, fd: Fd) -> PagerResult<()> {
        let task = self.caller(sender)?;
        let mut task = task.lock();
        let (file, _) = task.bound_file(fd)?;

        self.flush(&file)?;
        self.vfs.close(sender, fd)?;

        let desc = task.descriptor_mut(fd)?;
        desc.clear();
        let remaining = self.registry.release(&file);
        info!(
            "Task {} closed fd {} (vnum 0x{:x}, {} references left)",
            sender,
            fd,
            file.vnum(),
            remaining
        );
        Ok(())
    }

    /// Tear down `tid`: every bound descriptor is flushed and closed at the
    /// VFS server before the task's file references and frames are dropped
    ///
    /// Teardown always completes. The first recoverable failure is returned
    /// afterwards; a fatal one aborts immediately. Returns false when the
    /// task is unknown.
    pub fn exit_task(&self, tid: TaskId) -> PagerResult<bool> {
        let Some(task) = self.tasks.find(tid) else {
            return Ok(false);
        };

        let mut first_error = None;
        {
            let task = task.lock();
            let bound = task.fds.iter().enumerate().filter_map(|(slot, desc)| {
                desc.file.as_ref().map(|file| (slot, Arc::clone(file)))
            });

            for (slot, file) in bound {
                let fd = slot as Fd;
                let result = self
                    .flush(&file)
                    .and_then(|_| self.vfs.close(tid, fd).map(|_| ()));
                if let Err(e) = result {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!("Task {} exit: fd {} not closed cleanly: {}", tid, fd, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(task);

        self.tasks.remove(tid, &self.registry, &self.memory);
        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }
}
