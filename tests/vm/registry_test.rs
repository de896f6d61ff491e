/*!
 * VM File Registry Stress Tests
 * Concurrent open/release against one shared registry
 */

use std::sync::Arc;
use std::thread;
use vm_pager::vm::{AnonymousPager, Pager};
use vm_pager::{PhysicalMemory, VmFileKind, VmFileRegistry};

#[test]
fn test_concurrent_open_release_balances() {
    let memory = Arc::new(PhysicalMemory::new(64));
    let registry = VmFileRegistry::new(Arc::clone(&memory));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = registry.clone();
            let memory = Arc::clone(&memory);
            thread::spawn(move || {
                for i in 0..200u64 {
                    let vnum = (t + i) % 4;
                    let file = registry.open(VmFileKind::Vfs, vnum, 0, || -> Arc<dyn Pager> {
                        Arc::new(AnonymousPager::new(Arc::clone(&memory)))
                    });
                    {
                        let mut state = file.lock();
                        if state.object.is_empty() {
                            state.new_file_pages(&memory, 0..1).unwrap();
                        }
                    }
                    registry.release(&file);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(registry.is_empty());
    assert_eq!(registry.resident_pages(), 0);
    assert_eq!(memory.stats().used_pages, 0);
}

#[test]
fn test_held_reference_keeps_file_alive() {
    let memory = Arc::new(PhysicalMemory::new(16));
    let registry = VmFileRegistry::new(Arc::clone(&memory));
    let pager = || -> Arc<dyn Pager> { Arc::new(AnonymousPager::new(Arc::clone(&memory))) };

    let held = registry.open(VmFileKind::Anonymous, 9, 0, pager);
    held.lock().new_file_pages(&memory, 0..2).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let memory = Arc::clone(&memory);
            thread::spawn(move || {
                for _ in 0..100 {
                    let file = registry.open(VmFileKind::Anonymous, 9, 0, || -> Arc<dyn Pager> {
                        Arc::new(AnonymousPager::new(Arc::clone(&memory)))
                    });
                    registry.release(&file);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(held.refcount(), 1);
    assert_eq!(registry.resident_pages(), 2);
    assert_eq!(registry.release(&held), 0);
    assert_eq!(memory.stats().used_pages, 0);
}
