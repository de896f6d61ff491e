/*!
 * Task Manager
 * Tasks known to the pager, indexed by task id
 */

use super::types::Task;
use crate::core::types::TaskId;
use crate::memory::PhysicalMemory;
use crate::vm::VmFileRegistry;
use ahash::RandomState;
use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

pub type TaskRef = Arc<Mutex<Task>>;

#[derive(Clone, Default)]
pub struct TaskManager {
    tasks: Arc<DashMap<TaskId, TaskRef, RandomState>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `tid`, or return it if it already exists
    pub fn create(&self, tid: TaskId) -> TaskRef {
        Arc::clone(
            self.tasks
                .entry(tid)
                .or_insert_with(|| {
                    info!("Task {} registered", tid);
                    Arc::new(Mutex::new(Task::new(tid)))
                })
                .value(),
        )
    }

    pub fn find(&self, tid: TaskId) -> Option<TaskRef> {
        self.tasks.get(&tid).map(|t| Arc::clone(t.value()))
    }

    /// Forget `tid`, dropping its file references and returning its frames
    pub fn remove(&self, tid: TaskId, registry: &VmFileRegistry, memory: &PhysicalMemory) -> bool {
        let Some((_, task)) = self.tasks.remove(&tid) else {
            return false;
        };
        let mut task = task.lock();
        for desc in task.fds.iter_mut() {
            if let Some(file) = desc.file.take() {
                registry.release(&file);
            }
            desc.clear();
        }
        task.space.unmap_all(memory);
        info!("Task {} removed", tid);
        true
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
