/*!
 * Page Cache Tests
 * File-backed page-in, extension and write-back against the VFS model
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use vm_pager::core::limits::PAGE_SIZE;
use vm_pager::ipc::IpcTag;
use vm_pager::memory::MemoryError;
use vm_pager::vm::{FilePager, Page, Pager};
use vm_pager::{
    Errno, InvariantViolation, IpcTransport, MemVfs, PagerError, PhysicalMemory, VfsClient,
    VmFile, VmFileKind, VmObject,
};

const VFS_TID: u32 = 1;
const VNUM: u64 = 0x500;

fn file_with(frames: usize, contents: &[u8]) -> (Arc<PhysicalMemory>, Arc<MemVfs>, VmFile) {
    let memory = Arc::new(PhysicalMemory::new(frames));
    let vfs = Arc::new(MemVfs::new(VFS_TID, Arc::clone(&memory)));
    vfs.create_file(VNUM, contents);

    let transport: Arc<dyn IpcTransport> = vfs.clone();
    let pager: Arc<dyn Pager> = Arc::new(FilePager::new(
        VNUM,
        VfsClient::new(transport, VFS_TID),
        Arc::clone(&memory),
    ));
    let file = VmFile::new(
        VmFileKind::Vfs,
        VNUM,
        contents.len() as u32,
        VmObject::new(1, pager),
    );
    (memory, vfs, file)
}

#[test]
fn test_page_in_fills_from_backing_store() {
    let contents: Vec<u8> = (0..PAGE_SIZE + 20).map(|i| (i % 13) as u8).collect();
    let (memory, vfs, file) = file_with(8, &contents);

    let mut state = file.lock();
    state.read_file_pages(VNUM, 0..2).unwrap();
    assert_eq!(state.object.offsets(), vec![0, 1]);

    let second = state.object.find_page(1).unwrap();
    let frame = memory.map(second.pfn).unwrap();
    assert_eq!(&frame[..20], &contents[PAGE_SIZE..]);
    assert!(frame[20..].iter().all(|b| *b == 0));
    drop(frame);

    // Resident pages are cache hits
    state.read_file_pages(VNUM, 0..2).unwrap();
    assert_eq!(vfs.call_count(IpcTag::PagerRead), 2);
}

#[test]
fn test_page_in_keeps_partial_progress() {
    let (memory, _vfs, file) = file_with(2, &vec![9; 3 * PAGE_SIZE]);

    let mut state = file.lock();
    let err = state.read_file_pages(VNUM, 0..3).unwrap_err();
    assert!(matches!(
        err,
        PagerError::Memory(MemoryError::OutOfMemory { .. })
    ));
    assert_eq!(err.status(), Some(Errno::ENOMEM.as_status()));
    assert_eq!(state.object.offsets(), vec![0, 1]);
    assert_eq!(memory.stats().free_pages, 0);
}

#[test]
fn test_extension_is_contiguous() {
    let (memory, _vfs, file) = file_with(8, b"");

    let mut state = file.lock();
    state.new_file_pages(&memory, 2..5).unwrap();
    let pfns: Vec<_> = state.object.pages().map(|p| p.pfn).collect();
    assert_eq!(pfns.len(), 3);
    assert!(pfns.windows(2).all(|w| w[1] == w[0] + 1));
    assert!(state.object.pages().all(|p| p.refcount == 1 && !p.dirty));

    // An empty range allocates nothing
    state.new_file_pages(&memory, 5..5).unwrap();
    assert_eq!(memory.stats().used_pages, 3);
}

#[test]
fn test_duplicate_insert_is_fatal() {
    let (memory, _vfs, file) = file_with(8, b"");
    let mut state = file.lock();
    state.new_file_pages(&memory, 0..2).unwrap();

    let err = state.new_file_pages(&memory, 1..2).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(
        err,
        PagerError::Invariant(InvariantViolation::DuplicatePage {
            object: 1,
            offset: 1
        })
    );
}

#[test]
fn test_flush_range_must_cover_file() {
    let (_memory, _vfs, file) = file_with(8, &vec![1; PAGE_SIZE + 1]);
    let mut state = file.lock();

    state.write_file_pages(VNUM, 0..2).unwrap();
    assert_eq!(
        state.write_file_pages(VNUM, 0..1).unwrap_err(),
        PagerError::Invariant(InvariantViolation::FlushRange {
            end: 1,
            expected: 2
        })
    );
}

#[test]
fn test_page_out_writes_dirty_pages_only() {
    let (_memory, vfs, file) = file_with(8, &vec![b'a'; 2 * PAGE_SIZE]);
    let mut state = file.lock();
    state.read_file_pages(VNUM, 0..2).unwrap();
    state.object.mark_dirty(1..2);

    state.write_file_pages(VNUM, 0..2).unwrap();
    assert_eq!(vfs.call_count(IpcTag::PagerWrite), 1);
    assert_eq!(vfs.page_writes()[0].offset, 1);
    assert!(state.object.dirty_offsets().is_empty());
}

proptest! {
    #[test]
    fn prop_insertions_stay_ordered(offsets in prop::collection::vec(0u64..64, 1..40)) {
        let (_memory, _vfs, file) = file_with(1, b"");
        let mut state = file.lock();

        let mut seen = std::collections::BTreeSet::new();
        for (i, offset) in offsets.iter().enumerate() {
            let result = state.object.insert_page(Page::new(i, *offset));
            prop_assert_eq!(result.is_ok(), seen.insert(*offset));
        }

        let cached = state.object.offsets();
        prop_assert!(cached.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(cached.len(), seen.len());
        prop_assert_eq!(state.object.npages(), seen.len());
    }
}
