/*!
 * Syscall Executor
 * Shared state the file syscalls run against
 */

use super::types::PagerStats;
use crate::core::config::PagerConfig;
use crate::core::errors::{InvariantViolation, PagerResult};
use crate::core::types::TaskId;
use crate::ipc::{IpcTransport, VfsClient};
use crate::memory::PhysicalMemory;
use crate::task::{TaskManager, TaskRef};
use crate::vm::VmFileRegistry;
use log::info;
use std::sync::Arc;

/// Runs file syscalls on behalf of client tasks
///
/// Handlers live in sibling modules as further `impl` blocks. Each handler
/// locks the calling task first and the file second.
#[derive(Clone)]
pub struct SyscallExecutor {
    pub(super) memory: Arc<PhysicalMemory>,
    pub(super) tasks: TaskManager,
    pub(super) registry: VmFileRegistry,
    pub(super) vfs: VfsClient,
    pub(super) config: PagerConfig,
}

impl SyscallExecutor {
    pub fn new(
        config: PagerConfig,
        memory: Arc<PhysicalMemory>,
        transport: Arc<dyn IpcTransport>,
    ) -> Self {
        info!(
            "Pager {} serving files from VFS task {} ({} frames)",
            config.pager_tid,
            config.vfs_tid,
            memory.total_pages()
        );
        Self {
            registry: VmFileRegistry::new(Arc::clone(&memory)),
            tasks: TaskManager::new(),
            vfs: VfsClient::new(transport, config.vfs_tid),
            memory,
            config,
        }
    }

    /// Share an existing task table
    pub fn with_tasks(mut self, tasks: TaskManager) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn memory(&self) -> &Arc<PhysicalMemory> {
        &self.memory
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn registry(&self) -> &VmFileRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    pub fn stats(&self) -> PagerStats {
        let frames = self.memory.stats();
        PagerStats {
            tasks: self.tasks.len(),
            open_files: self.registry.len(),
            resident_pages: self.registry.resident_pages(),
            used_frames: frames.used_pages,
            total_frames: frames.total_pages,
        }
    }

    /// The calling task; requests only arrive from tasks the pager knows
    pub(super) fn caller(&self, sender: TaskId) -> PagerResult<TaskRef> {
        self.tasks
            .find(sender)
            .ok_or_else(|| InvariantViolation::UnknownTask(sender).into())
    }
}
