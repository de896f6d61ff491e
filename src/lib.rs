/*!
 * VM Pager Library
 * File-backed page cache and file syscalls of a microkernel memory manager
 */

pub mod core;
pub mod ipc;
pub mod memory;
pub mod monitoring;
pub mod syscalls;
pub mod task;
pub mod vfs;
pub mod vm;

// Re-exports
pub use crate::core::{
    ConfigError, Errno, InvariantViolation, PagerConfig, PagerError, PagerResult,
};
pub use ipc::{ChannelTransport, IpcRouter, IpcTag, IpcTransport, MessageRegisters, VfsClient};
pub use memory::{AddressSpace, PhysicalMemory, VmFlags};
pub use monitoring::{generate_trace_id, init_tracing};
pub use syscalls::{PagerRequest, PagerServer, PagerStats, SyscallExecutor, Whence};
pub use task::{Task, TaskManager};
pub use vfs::MemVfs;
pub use vm::{VmFile, VmFileKind, VmFileRegistry, VmObject};
