/*!
 * Open Notification
 * Binds a task's descriptor to a shared VM file
 */

use super::executor::SyscallExecutor;
use crate::core::errors::{PagerError, PagerResult};
use crate::core::types::{Fd, TaskId, Vnum};
use crate::task::Task;
use crate::vm::{FilePager, Pager, VmFileKind};
use log::{info, warn};
use std::sync::Arc;

impl SyscallExecutor {
    /// Handle the VFS server's notice that `opener` opened `vnum` on `fd`
    pub fn open_notify(
        &self,
        sender: TaskId,
        opener: TaskId,
        fd: Fd,
        vnum: Vnum,
        length: u32,
    ) -> PagerResult<()> {
        if sender != self.config.vfs_tid {
            warn!(
                "Open notification from task {}, expected VFS task {}",
                sender, self.config.vfs_tid
            );
            return Err(PagerError::PermissionDenied(format!(
                "task {} is not the VFS server",
                sender
            )));
        }

        let slot = Task::slot(fd)?;
        let task = self.tasks.find(opener).ok_or_else(|| {
            PagerError::invalid_argument(format!("opener {} is not a known task", opener))
        })?;
        let mut task = task.lock();

        let file = self.registry.open(VmFileKind::Vfs, vnum, length, || {
            let pager: Arc<dyn Pager> = Arc::new(FilePager::new(
                vnum,
                self.vfs.clone(),
                Arc::clone(&self.memory),
            ));
            pager
        });

        let desc = &mut task.fds[slot];
        if let Some(previous) = desc.file.take() {
            warn!(
                "Task {} fd {} rebound from vnum 0x{:x} without a close",
                opener, fd, desc.vnum
            );
            self.registry.release(&previous);
        }
        desc.vnum = vnum;
        desc.cursor = 0;
        desc.file = Some(file);

        info!(
            "Task {} opened vnum 0x{:x} on fd {} ({} bytes)",
            opener, vnum, fd, length
        );
        Ok(())
    }
}
