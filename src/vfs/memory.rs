/*!
 * In-Memory VFS Server
 *
 * Backing store for the pager, speaking the pager side of the IPC protocol.
 * Page buffers are exchanged as physical frame numbers in the shared pool.
 */

use super::types::{PageWrite, VfsError, VfsResult};
use crate::core::errors::Errno;
use crate::core::limits::{DEFAULT_PAGER_TID, PAGE_SIZE};
use crate::core::types::{Fd, PageIndex, Pfn, Size, TaskId, Vnum};
use crate::ipc::{
    IpcCall, IpcError, IpcResult, IpcTag, IpcTransport, Message, MessageRegisters, ARG0, ARG1,
    ARG2, ARG3,
};
use crate::memory::PhysicalMemory;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct VfsFile {
    data: Vec<u8>,
    length: u32,
}

/// Link used to notify the pager of opens
struct PagerLink {
    transport: Arc<dyn IpcTransport>,
    tid: TaskId,
}

pub struct MemVfs {
    tid: TaskId,
    memory: Arc<PhysicalMemory>,
    files: RwLock<HashMap<Vnum, VfsFile>>,
    opens: RwLock<HashMap<(TaskId, Fd), Vnum>>,
    pager: RwLock<Option<PagerLink>>,
    calls: Mutex<HashMap<IpcTag, usize>>,
    writes: Mutex<Vec<PageWrite>>,
}

impl MemVfs {
    pub fn new(tid: TaskId, memory: Arc<PhysicalMemory>) -> Self {
        info!("VFS server model initialized as task {}", tid);
        Self {
            tid,
            memory,
            files: RwLock::new(HashMap::new()),
            opens: RwLock::new(HashMap::new()),
            pager: RwLock::new(None),
            calls: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn tid(&self) -> TaskId {
        self.tid
    }

    /// Forward open notifications to the pager at `pager_tid`
    pub fn link_pager(&self, transport: Arc<dyn IpcTransport>, pager_tid: TaskId) {
        *self.pager.write() = Some(PagerLink {
            transport,
            tid: pager_tid,
        });
    }

    pub fn create_file(&self, vnum: Vnum, contents: &[u8]) {
        let length = contents.len() as u32;
        self.files.write().insert(
            vnum,
            VfsFile {
                data: contents.to_vec(),
                length,
            },
        );
        debug!("Created vnum 0x{:x} ({} bytes)", vnum, length);
    }

    /// File contents up to the stored length
    pub fn contents(&self, vnum: Vnum) -> Option<Vec<u8>> {
        let files = self.files.read();
        let file = files.get(&vnum)?;
        let mut data = file.data.clone();
        data.resize(file.length as usize, 0);
        Some(data)
    }

    pub fn length(&self, vnum: Vnum) -> Option<u32> {
        self.files.read().get(&vnum).map(|f| f.length)
    }

    /// Record that `opener` opened `vnum` on `fd`, returning the file length
    pub fn open(&self, opener: TaskId, fd: Fd, vnum: Vnum) -> VfsResult<u32> {
        let length = self.length(vnum).ok_or(VfsError::NotFound(vnum))?;
        self.opens.write().insert((opener, fd), vnum);
        debug!("Task {} opened vnum 0x{:x} on fd {}", opener, vnum, fd);
        Ok(length)
    }

    pub fn is_open(&self, opener: TaskId, fd: Fd) -> bool {
        self.opens.read().contains_key(&(opener, fd))
    }

    /// Calls received with `tag`
    pub fn call_count(&self, tag: IpcTag) -> usize {
        self.calls.lock().get(&tag).copied().unwrap_or(0)
    }

    pub fn page_writes(&self) -> Vec<PageWrite> {
        self.writes.lock().clone()
    }

    pub fn reset_counters(&self) {
        self.calls.lock().clear();
        self.writes.lock().clear();
    }

    /// Serve one message, returning the reply status
    pub fn handle(&self, message: &Message) -> i64 {
        *self.calls.lock().entry(message.tag).or_insert(0) += 1;
        let mrs = &message.mrs;

        let result = match message.tag {
            IpcTag::PagerRead => self.read_pages(
                mrs.read(ARG0),
                mrs.read(ARG1),
                mrs.read(ARG2) as Size,
                mrs.read(ARG3) as Pfn,
            ),
            IpcTag::PagerWrite => self.write_pages(
                mrs.read(ARG0),
                mrs.read(ARG1),
                mrs.read(ARG2) as Size,
                mrs.read(ARG3) as Pfn,
            ),
            IpcTag::PagerClose => {
                self.close(mrs.read(ARG0) as TaskId, mrs.read_signed(ARG1) as Fd)
            }
            IpcTag::PagerUpdateStats => self.update_stats(mrs.read(ARG0), mrs.read(ARG1) as u32),
            IpcTag::VfsOpen => self.open_and_notify(
                message.sender,
                mrs.read_signed(ARG0) as Fd,
                mrs.read(ARG1),
            ),
            other => {
                warn!("VFS: unexpected {:?} from task {}", other, message.sender);
                return Errno::EINVAL.as_status();
            }
        };

        match result {
            Ok(status) => status,
            Err(e) => {
                warn!("VFS: {:?} failed: {}", message.tag, e);
                e.status()
            }
        }
    }

    /// Serve calls until every sender is gone
    pub fn serve(&self, rx: flume::Receiver<IpcCall>) {
        info!("VFS server {} serving", self.tid);
        while let Ok(call) = rx.recv() {
            let status = self.handle(&call.message);
            let sender = call.message.sender;
            if !call.respond(status) {
                warn!("VFS: caller {} went away before the reply", sender);
            }
        }
        info!("VFS server {} stopped", self.tid);
    }

    fn read_pages(
        &self,
        vnum: Vnum,
        offset: PageIndex,
        npages: Size,
        buffer: Pfn,
    ) -> VfsResult<i64> {
        let files = self.files.read();
        let file = files.get(&vnum).ok_or(VfsError::NotFound(vnum))?;

        for i in 0..npages {
            let mut frame = self
                .memory
                .map(buffer + i)
                .map_err(|_| VfsError::BadBuffer(buffer + i))?;
            let start = (offset as usize + i) * PAGE_SIZE;
            let end = (start + PAGE_SIZE).min(file.data.len());
            let have = end.saturating_sub(start);
            if have > 0 {
                frame[..have].copy_from_slice(&file.data[start..end]);
            }
            frame[have..].fill(0);
        }
        Ok(npages as i64)
    }

    fn write_pages(
        &self,
        vnum: Vnum,
        offset: PageIndex,
        npages: Size,
        buffer: Pfn,
    ) -> VfsResult<i64> {
        let mut files = self.files.write();
        let file = files.get_mut(&vnum).ok_or(VfsError::NotFound(vnum))?;

        for i in 0..npages {
            let frame = self
                .memory
                .map(buffer + i)
                .map_err(|_| VfsError::BadBuffer(buffer + i))?;
            let start = (offset as usize + i) * PAGE_SIZE;
            if file.data.len() < start + PAGE_SIZE {
                file.data.resize(start + PAGE_SIZE, 0);
            }
            file.data[start..start + PAGE_SIZE].copy_from_slice(&frame);
        }
        self.writes.lock().push(PageWrite {
            vnum,
            offset,
            npages,
        });
        Ok(npages as i64)
    }

    fn close(&self, requester: TaskId, fd: Fd) -> VfsResult<i64> {
        self.opens
            .write()
            .remove(&(requester, fd))
            .ok_or(VfsError::NotOpen { tid: requester, fd })?;
        debug!("Task {} closed fd {}", requester, fd);
        Ok(0)
    }

    fn update_stats(&self, vnum: Vnum, length: u32) -> VfsResult<i64> {
        let mut files = self.files.write();
        let file = files.get_mut(&vnum).ok_or(VfsError::NotFound(vnum))?;
        file.length = length;
        debug!("vnum 0x{:x} length now {}", vnum, length);
        Ok(0)
    }

    fn open_and_notify(&self, opener: TaskId, fd: Fd, vnum: Vnum) -> VfsResult<i64> {
        let length = self.open(opener, fd, vnum)?;

        let pager = self.pager.read();
        let Some(link) = pager.as_ref() else {
            return Ok(0);
        };

        let mut mrs = MessageRegisters::new();
        mrs.write(ARG0, opener as u64)
            .write_signed(ARG1, fd as i64)
            .write(ARG2, vnum)
            .write(ARG3, length as u64);
        let status = link
            .transport
            .send_recv(link.tid, IpcTag::NotifyOpen, mrs)
            .unwrap_or_else(|e| {
                warn!("VFS: open notification to pager failed: {}", e);
                Errno::EIO.as_status()
            });

        if status < 0 {
            self.opens.write().remove(&(opener, fd));
            return Err(VfsError::Notify(status));
        }
        Ok(status)
    }
}

/// Direct in-process calls; the sender is taken to be the pager
impl IpcTransport for MemVfs {
    fn send_recv(&self, to: TaskId, tag: IpcTag, mrs: MessageRegisters) -> IpcResult<i64> {
        if to != self.tid {
            return Err(IpcError::NoSuchTask(to));
        }
        Ok(self.handle(&Message {
            sender: DEFAULT_PAGER_TID,
            tag,
            mrs,
        }))
    }
}
