/*!
 * IPC Types
 * Protocol tags, message registers and transport errors
 */

use crate::core::limits::MR_COUNT;
use crate::core::types::TaskId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// IPC operation result
pub type IpcResult<T> = Result<T, IpcError>;

/// Argument register slots
pub const ARG0: usize = 0;
pub const ARG1: usize = 1;
pub const ARG2: usize = 2;
pub const ARG3: usize = 3;

/// Transport-level IPC failures, distinct from a remote negative status
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum IpcError {
    #[error("No IPC endpoint for task {0}")]
    #[diagnostic(
        code(ipc::no_such_task),
        help("The destination task is not registered with the router.")
    )]
    NoSuchTask(TaskId),

    #[error("IPC peer disconnected: {0}")]
    #[diagnostic(
        code(ipc::disconnected),
        help("The remote server stopped before replying.")
    )]
    Disconnected(String),

    #[error("Endpoint already registered for task {0}")]
    #[diagnostic(code(ipc::endpoint_exists))]
    EndpointExists(TaskId),
}

/// Every message kind exchanged by the pager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum IpcTag {
    /// pager -> VFS: fill pages from the backing file
    PagerRead = 0x10,
    /// pager -> VFS: store pages into the backing file
    PagerWrite = 0x11,
    /// pager -> VFS: a task's descriptor is closing
    PagerClose = 0x12,
    /// pager -> VFS: push the file length
    PagerUpdateStats = 0x13,
    /// client -> VFS: open a file on a descriptor slot
    VfsOpen = 0x20,
    /// VFS -> pager: a file was opened
    NotifyOpen = 0x21,
    SysRead = 0x30,
    SysWrite = 0x31,
    SysLseek = 0x32,
    SysClose = 0x33,
    SysFsync = 0x34,
}

impl TryFrom<u32> for IpcTag {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        Ok(match raw {
            0x10 => IpcTag::PagerRead,
            0x11 => IpcTag::PagerWrite,
            0x12 => IpcTag::PagerClose,
            0x13 => IpcTag::PagerUpdateStats,
            0x20 => IpcTag::VfsOpen,
            0x21 => IpcTag::NotifyOpen,
            0x30 => IpcTag::SysRead,
            0x31 => IpcTag::SysWrite,
            0x32 => IpcTag::SysLseek,
            0x33 => IpcTag::SysClose,
            0x34 => IpcTag::SysFsync,
            other => return Err(other),
        })
    }
}

/// Message registers of one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRegisters([u64; MR_COUNT]);

impl MessageRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, index: usize, value: u64) -> &mut Self {
        self.0[index] = value;
        self
    }

    pub fn read(&self, index: usize) -> u64 {
        self.0[index]
    }

    /// Store a signed value using two's complement
    pub fn write_signed(&mut self, index: usize, value: i64) -> &mut Self {
        self.write(index, value as u64)
    }

    pub fn read_signed(&self, index: usize) -> i64 {
        self.0[index] as i64
    }
}

/// A message as delivered to a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: TaskId,
    pub tag: IpcTag,
    pub mrs: MessageRegisters,
}

/// A delivered message paired with its reply channel
#[derive(Debug)]
pub struct IpcCall {
    pub message: Message,
    pub reply: flume::Sender<i64>,
}

impl IpcCall {
    /// Send the reply status; a caller that went away is not an error here
    pub fn respond(self, status: i64) -> bool {
        self.reply.send(status).is_ok()
    }
}
