/*!
 * Syscall Types
 * Requests served by the pager and their register encoding
 */

use crate::core::errors::{PagerError, PagerResult};
use crate::core::types::{Fd, TaskId, VirtAddr, Vnum};
use crate::ipc::{IpcResult, IpcTag, IpcTransport, MessageRegisters, ARG0, ARG1, ARG2, ARG3};
use serde::{Deserialize, Serialize};

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum Whence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl TryFrom<i32> for Whence {
    type Error = PagerError;

    fn try_from(raw: i32) -> PagerResult<Self> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            other => Err(PagerError::invalid_argument(format!(
                "unknown seek origin {}",
                other
            ))),
        }
    }
}

/// One inbound request to the pager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PagerRequest {
    /// Sent by the VFS server after a task opened a file
    NotifyOpen {
        opener: TaskId,
        fd: Fd,
        vnum: Vnum,
        length: u32,
    },
    Read {
        fd: Fd,
        buf: VirtAddr,
        count: i32,
    },
    Write {
        fd: Fd,
        buf: VirtAddr,
        count: i32,
    },
    Lseek {
        fd: Fd,
        offset: i64,
        whence: i32,
    },
    Close {
        fd: Fd,
    },
    Fsync {
        fd: Fd,
    },
}

impl PagerRequest {
    pub fn tag(&self) -> IpcTag {
        match self {
            PagerRequest::NotifyOpen { .. } => IpcTag::NotifyOpen,
            PagerRequest::Read { .. } => IpcTag::SysRead,
            PagerRequest::Write { .. } => IpcTag::SysWrite,
            PagerRequest::Lseek { .. } => IpcTag::SysLseek,
            PagerRequest::Close { .. } => IpcTag::SysClose,
            PagerRequest::Fsync { .. } => IpcTag::SysFsync,
        }
    }

    pub fn encode(&self) -> MessageRegisters {
        let mut mrs = MessageRegisters::new();
        match *self {
            PagerRequest::NotifyOpen {
                opener,
                fd,
                vnum,
                length,
            } => {
                mrs.write(ARG0, opener as u64)
                    .write_signed(ARG1, fd as i64)
                    .write(ARG2, vnum)
                    .write(ARG3, length as u64);
            }
            PagerRequest::Read { fd, buf, count } | PagerRequest::Write { fd, buf, count } => {
                mrs.write_signed(ARG0, fd as i64)
                    .write(ARG1, buf as u64)
                    .write_signed(ARG2, count as i64);
            }
            PagerRequest::Lseek { fd, offset, whence } => {
                mrs.write_signed(ARG0, fd as i64)
                    .write_signed(ARG1, offset)
                    .write_signed(ARG2, whence as i64);
            }
            PagerRequest::Close { fd } | PagerRequest::Fsync { fd } => {
                mrs.write_signed(ARG0, fd as i64);
            }
        }
        mrs
    }

    /// Rebuild a request from a delivered message
    ///
    /// Register values that do not fit their field are rejected.
    pub fn decode(tag: IpcTag, mrs: &MessageRegisters) -> PagerResult<Self> {
        let request = match tag {
            IpcTag::NotifyOpen => PagerRequest::NotifyOpen {
                opener: narrow(mrs.read(ARG0), "opener task id")?,
                fd: fd_arg(mrs, ARG1)?,
                vnum: mrs.read(ARG2),
                length: narrow(mrs.read(ARG3), "file length")?,
            },
            IpcTag::SysRead => PagerRequest::Read {
                fd: fd_arg(mrs, ARG0)?,
                buf: narrow(mrs.read(ARG1), "buffer address")?,
                count: narrow(mrs.read_signed(ARG2), "byte count")?,
            },
            IpcTag::SysWrite => PagerRequest::Write {
                fd: fd_arg(mrs, ARG0)?,
                buf: narrow(mrs.read(ARG1), "buffer address")?,
                count: narrow(mrs.read_signed(ARG2), "byte count")?,
            },
            IpcTag::SysLseek => PagerRequest::Lseek {
                fd: fd_arg(mrs, ARG0)?,
                offset: mrs.read_signed(ARG1),
                whence: narrow(mrs.read_signed(ARG2), "seek origin")?,
            },
            IpcTag::SysClose => PagerRequest::Close {
                fd: fd_arg(mrs, ARG0)?,
            },
            IpcTag::SysFsync => PagerRequest::Fsync {
                fd: fd_arg(mrs, ARG0)?,
            },
            other => {
                return Err(PagerError::invalid_argument(format!(
                    "{:?} is not a pager request",
                    other
                )))
            }
        };
        Ok(request)
    }

    /// Send this request to the pager and wait for the reply status
    pub fn send(&self, transport: &dyn IpcTransport, pager: TaskId) -> IpcResult<i64> {
        transport.send_recv(pager, self.tag(), self.encode())
    }
}

fn narrow<S, T>(raw: S, what: &str) -> PagerResult<T>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(raw)
        .map_err(|_| PagerError::invalid_argument(format!("{} {} out of range", what, raw)))
}

/// A descriptor register wider than `Fd` names no descriptor
fn fd_arg(mrs: &MessageRegisters, index: usize) -> PagerResult<Fd> {
    Fd::try_from(mrs.read_signed(index)).map_err(|_| PagerError::BadDescriptor(-1))
}

/// Snapshot of pager resource usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerStats {
    pub tasks: usize,
    pub open_files: usize,
    pub resident_pages: usize,
    pub used_frames: usize,
    pub total_frames: usize,
}
