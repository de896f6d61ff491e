/*!
 * Dispatch Tests
 * Full request path over IPC channels with server threads
 */

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use vm_pager::core::limits::PAGE_SIZE;
use vm_pager::ipc::{IpcError, ARG0, ARG1, ARG2};
use vm_pager::{
    Errno, InvariantViolation, IpcRouter, IpcTag, IpcTransport, MemVfs, MessageRegisters,
    PagerConfig, PagerRequest, PagerServer, PhysicalMemory, SyscallExecutor, VmFlags, Whence,
};

const CLIENT: u32 = 20;
const STRANGER: u32 = 21;
const BUF: usize = 0x8000_0000;
const VNUM: u64 = 0x400;

struct Harness {
    config: PagerConfig,
    router: IpcRouter,
    memory: Arc<PhysicalMemory>,
    vfs: Arc<MemVfs>,
    executor: Arc<SyscallExecutor>,
    pager: thread::JoinHandle<Result<(), InvariantViolation>>,
    vfs_server: thread::JoinHandle<()>,
}

impl Harness {
    fn start() -> Self {
        let config = PagerConfig::default().with_physical_pages(64);
        let memory = Arc::new(PhysicalMemory::new(config.physical_pages));
        let router = IpcRouter::new();
        let pager_rx = router.register(config.pager_tid).unwrap();
        let vfs_rx = router.register(config.vfs_tid).unwrap();

        let vfs = Arc::new(MemVfs::new(config.vfs_tid, Arc::clone(&memory)));
        vfs.link_pager(Arc::new(router.transport(config.vfs_tid)), config.pager_tid);
        let executor = Arc::new(SyscallExecutor::new(
            config.clone(),
            Arc::clone(&memory),
            Arc::new(router.transport(config.pager_tid)),
        ));
        executor
            .tasks()
            .create(CLIENT)
            .lock()
            .space
            .map_region(&memory, BUF, 2 * PAGE_SIZE, VmFlags::READ_WRITE)
            .unwrap();

        let server = PagerServer::new(Arc::clone(&executor));
        let pager = thread::spawn(move || server.serve(pager_rx));
        let vfs_for_thread = Arc::clone(&vfs);
        let vfs_server = thread::spawn(move || vfs_for_thread.serve(vfs_rx));

        Self {
            config,
            router,
            memory,
            vfs,
            executor,
            pager,
            vfs_server,
        }
    }

    fn call(&self, from: u32, request: PagerRequest) -> Result<i64, IpcError> {
        request.send(&self.router.transport(from), self.config.pager_tid)
    }

    fn open(&self, fd: i32, vnum: u64) -> i64 {
        let mut mrs = MessageRegisters::new();
        mrs.write_signed(ARG0, fd as i64).write(ARG1, vnum);
        self.router
            .transport(CLIENT)
            .send_recv(self.config.vfs_tid, IpcTag::VfsOpen, mrs)
            .unwrap()
    }

    fn stop(self) -> Result<(), InvariantViolation> {
        self.router.unregister(self.config.pager_tid);
        self.router.unregister(self.config.vfs_tid);
        self.vfs_server.join().unwrap();
        self.pager.join().unwrap()
    }
}

#[test]
fn test_session_over_channels() {
    let h = Harness::start();
    h.vfs.create_file(VNUM, b"served ");
    assert_eq!(h.open(3, VNUM), 0);
    assert_eq!(h.vfs.call_count(IpcTag::VfsOpen), 1);

    let task = h.executor.tasks().find(CLIENT).unwrap();
    task.lock()
        .space
        .write_bytes(&h.memory, BUF, b"by channels")
        .unwrap();

    let end = PagerRequest::Lseek {
        fd: 3,
        offset: 0,
        whence: Whence::End as i32,
    };
    assert_eq!(h.call(CLIENT, end).unwrap(), 7);
    let write = PagerRequest::Write {
        fd: 3,
        buf: BUF,
        count: 11,
    };
    assert_eq!(h.call(CLIENT, write).unwrap(), 11);
    let rewind = PagerRequest::Lseek {
        fd: 3,
        offset: 0,
        whence: Whence::Set as i32,
    };
    assert_eq!(h.call(CLIENT, rewind).unwrap(), 0);
    let read = PagerRequest::Read {
        fd: 3,
        buf: BUF + PAGE_SIZE,
        count: 100,
    };
    assert_eq!(h.call(CLIENT, read).unwrap(), 18);
    assert_eq!(
        task.lock()
            .space
            .read_bytes(&h.memory, BUF + PAGE_SIZE, 18)
            .unwrap(),
        b"served by channels".to_vec()
    );

    assert_eq!(h.call(CLIENT, PagerRequest::Close { fd: 3 }).unwrap(), 0);
    assert_eq!(h.vfs.contents(VNUM).unwrap(), b"served by channels".to_vec());
    assert_eq!(
        h.call(CLIENT, PagerRequest::Fsync { fd: 3 }).unwrap(),
        Errno::EBADF.as_status()
    );

    let stats = h.executor.stats();
    assert_eq!(stats.open_files, 0);
    assert_eq!(stats.resident_pages, 0);
    assert_eq!(stats.used_frames, 2);

    drop(task);
    assert_eq!(h.stop(), Ok(()));
}

#[test]
fn test_recoverable_errors_become_statuses() {
    let h = Harness::start();
    h.vfs.create_file(VNUM, b"");
    assert_eq!(h.open(3, VNUM), 0);

    let forged = PagerRequest::NotifyOpen {
        opener: CLIENT,
        fd: 4,
        vnum: VNUM,
        length: 0,
    };
    assert_eq!(h.call(CLIENT, forged).unwrap(), Errno::EPERM.as_status());

    let bad_whence = PagerRequest::Lseek {
        fd: 3,
        offset: 0,
        whence: 9,
    };
    assert_eq!(h.call(CLIENT, bad_whence).unwrap(), Errno::EINVAL.as_status());

    let bad_buffer = PagerRequest::Write {
        fd: 3,
        buf: 0x10,
        count: 4,
    };
    assert_eq!(h.call(CLIENT, bad_buffer).unwrap(), Errno::EFAULT.as_status());

    // A pager-to-VFS tag sent to the pager is not a request it serves
    let status = h
        .router
        .transport(CLIENT)
        .send_recv(h.config.pager_tid, IpcTag::PagerRead, MessageRegisters::new())
        .unwrap();
    assert_eq!(status, Errno::EINVAL.as_status());

    // Opening a file the server does not have never reaches the pager
    assert_eq!(h.open(5, 0xdead), Errno::ENOENT.as_status());
    assert_eq!(h.executor.registry().len(), 1);

    assert_eq!(h.stop(), Ok(()));
}

#[test]
fn test_wide_registers_are_rejected() {
    let h = Harness::start();
    h.vfs.create_file(VNUM, b"");
    assert_eq!(h.open(3, VNUM), 0);
    let high = 1u64 << 32;
    let client = h.router.transport(CLIENT);

    let mut mrs = MessageRegisters::new();
    mrs.write(ARG0, 3).write(ARG1, BUF as u64).write(ARG2, high + 5);
    let status = client
        .send_recv(h.config.pager_tid, IpcTag::SysWrite, mrs)
        .unwrap();
    assert_eq!(status, Errno::EINVAL.as_status());

    let mut mrs = MessageRegisters::new();
    mrs.write(ARG0, high + 3);
    let status = client
        .send_recv(h.config.pager_tid, IpcTag::SysFsync, mrs)
        .unwrap();
    assert_eq!(status, Errno::EBADF.as_status());

    // Nothing reached the file
    let end = PagerRequest::Lseek {
        fd: 3,
        offset: 0,
        whence: Whence::End as i32,
    };
    assert_eq!(h.call(CLIENT, end).unwrap(), 0);
    assert_eq!(h.vfs.call_count(IpcTag::PagerUpdateStats), 0);

    assert_eq!(h.stop(), Ok(()));
}

#[test]
fn test_unknown_task_stops_the_pager() {
    let h = Harness::start();

    let read = PagerRequest::Read {
        fd: 0,
        buf: BUF,
        count: 1,
    };
    assert!(matches!(
        h.call(STRANGER, read),
        Err(IpcError::Disconnected(_))
    ));

    let config = h.config.clone();
    let router = h.router.clone();
    assert_eq!(h.stop(), Err(InvariantViolation::UnknownTask(STRANGER)));
    assert!(router
        .transport(CLIENT)
        .send_recv(config.pager_tid, IpcTag::SysClose, MessageRegisters::new())
        .is_err());
}
