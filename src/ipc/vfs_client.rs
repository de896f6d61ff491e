/*!
 * VFS IPC Client
 * The four synchronous calls the pager makes to the VFS server
 */

use super::traits::IpcTransport;
use super::types::{IpcTag, MessageRegisters, ARG0, ARG1, ARG2, ARG3};
use crate::core::errors::{PagerError, PagerResult};
use crate::core::types::{Fd, PageIndex, Pfn, Size, TaskId, Vnum};
use log::error;
use std::sync::Arc;

/// Call stubs bound to one VFS server identity
#[derive(Clone)]
pub struct VfsClient {
    transport: Arc<dyn IpcTransport>,
    server: TaskId,
}

impl VfsClient {
    pub fn new(transport: Arc<dyn IpcTransport>, server: TaskId) -> Self {
        Self { transport, server }
    }

    pub fn server(&self) -> TaskId {
        self.server
    }

    /// Fill `npages` frames starting at `buffer` from the file at page `file_offset`
    pub fn read_pages(
        &self,
        vnum: Vnum,
        file_offset: PageIndex,
        npages: Size,
        buffer: Pfn,
    ) -> PagerResult<i64> {
        let mut mrs = MessageRegisters::new();
        mrs.write(ARG0, vnum)
            .write(ARG1, file_offset)
            .write(ARG2, npages as u64)
            .write(ARG3, buffer as u64);
        self.call(IpcTag::PagerRead, mrs)
    }

    /// Store `npages` frames starting at `buffer` into the file at page `file_offset`
    pub fn write_pages(
        &self,
        vnum: Vnum,
        file_offset: PageIndex,
        npages: Size,
        buffer: Pfn,
    ) -> PagerResult<i64> {
        let mut mrs = MessageRegisters::new();
        mrs.write(ARG0, vnum)
            .write(ARG1, file_offset)
            .write(ARG2, npages as u64)
            .write(ARG3, buffer as u64);
        self.call(IpcTag::PagerWrite, mrs)
    }

    /// Tell the server that `requester` is closing `fd`
    pub fn close(&self, requester: TaskId, fd: Fd) -> PagerResult<i64> {
        let mut mrs = MessageRegisters::new();
        mrs.write(ARG0, requester as u64)
            .write_signed(ARG1, fd as i64);
        self.call(IpcTag::PagerClose, mrs)
    }

    /// Push the file length held by the pager
    pub fn update_stats(&self, vnum: Vnum, length: u32) -> PagerResult<i64> {
        let mut mrs = MessageRegisters::new();
        mrs.write(ARG0, vnum).write(ARG1, length as u64);
        self.call(IpcTag::PagerUpdateStats, mrs)
    }

    fn call(&self, tag: IpcTag, mrs: MessageRegisters) -> PagerResult<i64> {
        let status = self
            .transport
            .send_recv(self.server, tag, mrs)
            .map_err(|e| {
                error!("{:?}: IPC error talking to task {}: {}", tag, self.server, e);
                PagerError::Transport(e)
            })?;

        if status < 0 {
            error!("{:?}: VFS returned error {}", tag, status);
            return Err(PagerError::Remote { op: tag, status });
        }
        Ok(status)
    }
}

impl std::fmt::Debug for VfsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VfsClient")
            .field("server", &self.server)
            .finish()
    }
}
