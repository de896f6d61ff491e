/*!
 * Close and Fsync Tests
 * Write-back, shared files, registry teardown and remote failures
 */

use super::fixture::{Fixture, BUF, CLIENT, P};
use mockall::mock;
use mockall::predicate::eq;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use vm_pager::core::types::TaskId;
use vm_pager::ipc::{IpcError, IpcResult, IpcTag, MessageRegisters};
use vm_pager::vfs::PageWrite;
use vm_pager::{Errno, IpcTransport, MemVfs, PagerConfig, PagerError, PhysicalMemory, Whence};

const VNUM: u64 = 0x300;

mock! {
    pub Transport {}

    impl IpcTransport for Transport {
        fn send_recv(&self, to: TaskId, tag: IpcTag, mrs: MessageRegisters) -> IpcResult<i64>;
    }
}

fn mocked(transport: MockTransport) -> Fixture {
    let config = PagerConfig::default().with_physical_pages(64);
    let memory = Arc::new(PhysicalMemory::new(config.physical_pages));
    let vfs = Arc::new(MemVfs::new(config.vfs_tid, Arc::clone(&memory)));
    Fixture::with_transport(config, memory, vfs, Arc::new(transport))
}

#[test]
fn test_close_writes_back_then_clears() {
    let fx = Fixture::new();
    fx.open(3, VNUM, b"");
    fx.write(3, b"hello").unwrap();
    fx.vfs.reset_counters();

    fx.executor.close(CLIENT, 3).unwrap();

    assert_eq!(fx.vfs.call_count(IpcTag::PagerWrite), 1);
    assert_eq!(
        fx.vfs.page_writes(),
        vec![PageWrite {
            vnum: VNUM,
            offset: 0,
            npages: 1
        }]
    );
    assert_eq!(fx.vfs.call_count(IpcTag::PagerUpdateStats), 1);
    assert_eq!(fx.vfs.call_count(IpcTag::PagerClose), 1);
    assert_eq!(fx.vfs.contents(VNUM).unwrap(), b"hello".to_vec());
    assert!(!fx.vfs.is_open(CLIENT, 3));

    assert_eq!(
        fx.executor.read(CLIENT, 3, BUF, 1).unwrap_err(),
        PagerError::BadDescriptor(3)
    );
    assert!(fx.executor.registry().is_empty());
    assert_eq!(fx.cache_frames(), 0);
}

#[test]
fn test_fsync_only_sends_dirty_pages() {
    let fx = Fixture::new();
    fx.open(3, VNUM, &vec![b'a'; 3 * P]);
    fx.read(3, 3 * P).unwrap();

    fx.seek(3, (P + 1) as i64, Whence::Set).unwrap();
    fx.write(3, b"zz").unwrap();
    fx.executor.fsync(CLIENT, 3).unwrap();

    assert_eq!(
        fx.vfs.page_writes(),
        vec![PageWrite {
            vnum: VNUM,
            offset: 1,
            npages: 1
        }]
    );
    assert!(fx.file(3).lock().object.dirty_offsets().is_empty());

    // Nothing left to write back
    fx.executor.fsync(CLIENT, 3).unwrap();
    assert_eq!(fx.vfs.call_count(IpcTag::PagerWrite), 1);
    assert_eq!(fx.vfs.call_count(IpcTag::PagerUpdateStats), 2);
    assert!(fx.vfs.is_open(CLIENT, 3));
}

#[test]
fn test_fsync_pushes_extended_length() {
    let fx = Fixture::new();
    fx.open(3, VNUM, b"abc");
    fx.seek(3, 0, Whence::End).unwrap();
    fx.write(3, &[b'd'; P]).unwrap();
    assert_eq!(fx.vfs.length(VNUM), Some(3));

    fx.executor.fsync(CLIENT, 3).unwrap();
    assert_eq!(fx.vfs.length(VNUM), Some(3 + P as u32));
    let mut expected = b"abc".to_vec();
    expected.extend_from_slice(&[b'd'; P]);
    assert_eq!(fx.vfs.contents(VNUM).unwrap(), expected);
}

#[test]
fn test_shared_file_survives_one_close() {
    let fx = Fixture::new();
    fx.open(3, VNUM, b"");
    fx.open(4, VNUM, b"");

    let file = fx.file(3);
    assert!(Arc::ptr_eq(&file, &fx.file(4)));
    assert_eq!(file.refcount(), 2);

    fx.write(3, b"shared").unwrap();
    fx.executor.close(CLIENT, 4).unwrap();
    assert_eq!(file.refcount(), 1);
    assert_eq!(fx.executor.registry().len(), 1);
    assert_eq!(file.lock().object.npages(), 1);

    fx.seek(3, 0, Whence::Set).unwrap();
    assert_eq!(fx.read(3, 10).unwrap(), b"shared".to_vec());

    fx.executor.close(CLIENT, 3).unwrap();
    assert!(fx.executor.registry().is_empty());
    assert_eq!(fx.cache_frames(), 0);
}

#[test]
fn test_reopen_keeps_cached_length() {
    let fx = Fixture::new();
    fx.open(3, VNUM, b"abc");
    fx.seek(3, 0, Whence::End).unwrap();
    fx.write(3, b"def").unwrap();

    // The server still reports 3 bytes; the pager's copy wins
    fx.open(5, VNUM, b"");
    assert_eq!(fx.file(5).length(), 6);
    assert_eq!(fx.read(5, 10).unwrap(), b"abcdef".to_vec());
}

#[test]
fn test_transport_failure_keeps_descriptor() {
    let mut transport = MockTransport::new();
    transport
        .expect_send_recv()
        .with(eq(1), eq(IpcTag::PagerWrite), mockall::predicate::always())
        .times(1)
        .returning(|_, _, _| Err(IpcError::Disconnected("vfs gone".into())));

    let fx = mocked(transport);
    fx.executor
        .open_notify(fx.config.vfs_tid, CLIENT, 3, VNUM, 0)
        .unwrap();
    fx.write(3, b"dirty").unwrap();

    let err = fx.executor.close(CLIENT, 3).unwrap_err();
    assert!(matches!(err, PagerError::Transport(_)));
    assert_eq!(err.status(), Some(Errno::EIO.as_status()));

    // Still open, still dirty
    assert_eq!(fx.file(3).lock().object.dirty_offsets(), vec![0]);
    assert_eq!(fx.cursor(3), 5);
}

#[test]
fn test_remote_error_status_passes_through() {
    let mut transport = MockTransport::new();
    transport
        .expect_send_recv()
        .withf(|_, tag, _| *tag == IpcTag::PagerRead)
        .times(1)
        .returning(|_, _, _| Ok(Errno::ENOENT.as_status()));

    let fx = mocked(transport);
    fx.executor
        .open_notify(fx.config.vfs_tid, CLIENT, 3, VNUM, 100)
        .unwrap();
    let used = fx.memory.stats().used_pages;

    let err = fx.executor.read(CLIENT, 3, BUF, 10).unwrap_err();
    assert_eq!(
        err,
        PagerError::Remote {
            op: IpcTag::PagerRead,
            status: Errno::ENOENT.as_status()
        }
    );
    assert_eq!(err.status(), Some(-2));
    assert_eq!(fx.cursor(3), 0);
    assert_eq!(fx.memory.stats().used_pages, used);
}

#[test]
fn test_stats_failure_aborts_close() {
    let mut transport = MockTransport::new();
    transport
        .expect_send_recv()
        .withf(|_, tag, _| *tag == IpcTag::PagerUpdateStats)
        .times(1)
        .returning(|_, _, _| Ok(Errno::EIO.as_status()));

    let fx = mocked(transport);
    fx.executor
        .open_notify(fx.config.vfs_tid, CLIENT, 3, VNUM, 0)
        .unwrap();

    // Nothing dirty, so the only call is the stats update
    assert!(matches!(
        fx.executor.close(CLIENT, 3),
        Err(PagerError::Remote {
            op: IpcTag::PagerUpdateStats,
            ..
        })
    ));
    assert_eq!(fx.executor.registry().len(), 1);
}

#[test]
fn test_open_notify_checks() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.executor.open_notify(CLIENT, CLIENT, 3, VNUM, 0),
        Err(PagerError::PermissionDenied(_))
    ));
    assert_eq!(
        fx.executor
            .open_notify(fx.config.vfs_tid, CLIENT, 32, VNUM, 0)
            .unwrap_err(),
        PagerError::BadDescriptor(32)
    );
    assert!(matches!(
        fx.executor.open_notify(fx.config.vfs_tid, 55, 3, VNUM, 0),
        Err(PagerError::InvalidArgument(_))
    ));
    assert!(fx.executor.registry().is_empty());
}

#[test]
fn test_task_removal_releases_files() {
    let fx = Fixture::new();
    fx.open(3, VNUM, b"");
    fx.write(3, &[1; 2 * P]).unwrap();
    assert_eq!(fx.cache_frames(), 2);

    assert!(fx
        .executor
        .tasks()
        .remove(CLIENT, fx.executor.registry(), &fx.memory));
    assert!(fx.executor.registry().is_empty());
    assert_eq!(fx.memory.stats().used_pages, 0);
}

#[test]
fn test_task_exit_writes_back_and_closes() {
    let fx = Fixture::new();
    fx.open(3, VNUM, b"");
    fx.open(4, VNUM + 1, b"kept");
    fx.write(3, b"unsaved").unwrap();
    fx.vfs.reset_counters();

    assert_eq!(fx.executor.exit_task(CLIENT), Ok(true));

    assert_eq!(fx.vfs.contents(VNUM).unwrap(), b"unsaved".to_vec());
    assert_eq!(fx.vfs.contents(VNUM + 1).unwrap(), b"kept".to_vec());
    assert_eq!(fx.vfs.call_count(IpcTag::PagerWrite), 1);
    assert_eq!(fx.vfs.call_count(IpcTag::PagerClose), 2);
    assert!(!fx.vfs.is_open(CLIENT, 3));
    assert!(!fx.vfs.is_open(CLIENT, 4));

    assert!(fx.executor.tasks().find(CLIENT).is_none());
    assert!(fx.executor.registry().is_empty());
    assert_eq!(fx.memory.stats().used_pages, 0);

    assert_eq!(fx.executor.exit_task(CLIENT), Ok(false));
}

#[test]
fn test_task_exit_completes_after_failed_write_back() {
    let mut transport = MockTransport::new();
    transport
        .expect_send_recv()
        .with(eq(1), eq(IpcTag::PagerWrite), mockall::predicate::always())
        .times(1)
        .returning(|_, _, _| Err(IpcError::Disconnected("vfs gone".into())));

    let fx = mocked(transport);
    fx.executor
        .open_notify(fx.config.vfs_tid, CLIENT, 3, VNUM, 0)
        .unwrap();
    fx.write(3, b"dirty").unwrap();

    let err = fx.executor.exit_task(CLIENT).unwrap_err();
    assert_eq!(err.status(), Some(Errno::EIO.as_status()));
    assert!(fx.executor.tasks().find(CLIENT).is_none());
    assert!(fx.executor.registry().is_empty());
    assert_eq!(fx.memory.stats().used_pages, 0);
}
