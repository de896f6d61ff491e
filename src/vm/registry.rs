/*!
 * VM File Registry
 * Open files deduplicated by backing kind and vnum
 *
 * Entries are reference counted by the descriptors bound to them. Releasing
 * the last reference removes the entry and returns its cached frames.
 */

use super::file::{VmFile, VmFileKind};
use super::object::VmObject;
use super::pager::Pager;
use crate::core::types::Vnum;
use crate::memory::PhysicalMemory;
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileKey {
    kind: VmFileKind,
    vnum: Vnum,
}

#[derive(Clone)]
pub struct VmFileRegistry {
    files: Arc<DashMap<FileKey, Arc<VmFile>, RandomState>>,
    next_object_id: Arc<AtomicU64>,
    memory: Arc<PhysicalMemory>,
}

impl VmFileRegistry {
    pub fn new(memory: Arc<PhysicalMemory>) -> Self {
        Self {
            files: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_object_id: Arc::new(AtomicU64::new(1)),
            memory,
        }
    }

    /// Find the file for `vnum` or create it, and take a reference
    ///
    /// An existing file keeps its own length; `length` only seeds a new one.
    pub fn open(
        &self,
        kind: VmFileKind,
        vnum: Vnum,
        length: u32,
        pager: impl FnOnce() -> Arc<dyn Pager>,
    ) -> Arc<VmFile> {
        // References are taken under the shard lock so release() cannot race
        let (file, refs) = match self.files.entry(FileKey { kind, vnum }) {
            Entry::Occupied(entry) => {
                let file = Arc::clone(entry.get());
                let refs = file.acquire();
                (file, refs)
            }
            Entry::Vacant(slot) => {
                let id = self.next_object_id.fetch_add(1, Ordering::Relaxed);
                let object = VmObject::new(id, pager());
                let file = Arc::new(VmFile::new(kind, vnum, length, object));
                let refs = file.acquire();
                info!(
                    "Registered {:?} file vnum 0x{:x} ({} bytes, object {})",
                    kind, vnum, length, id
                );
                (Arc::clone(slot.insert(file).value()), refs)
            }
        };
        debug!("vnum 0x{:x} now has {} references", vnum, refs);
        file
    }

    /// Drop one reference; the last one tears the file down
    pub fn release(&self, file: &Arc<VmFile>) -> usize {
        let key = FileKey {
            kind: file.kind(),
            vnum: file.vnum(),
        };
        let mut remaining = None;
        let removed = self.files.remove_if(&key, |_, entry| {
            if !Arc::ptr_eq(entry, file) {
                return false;
            }
            let left = file.release();
            remaining = Some(left);
            left == 0
        });

        let remaining = match remaining {
            Some(left) => left,
            // Not the registered instance; just drop the count
            None => file.release(),
        };

        if removed.is_some() {
            let pages = file.lock().object.release_pages(&self.memory);
            info!(
                "Released vnum 0x{:x} ({} cached pages returned)",
                file.vnum(),
                pages
            );
        }
        remaining
    }

    pub fn lookup(&self, kind: VmFileKind, vnum: Vnum) -> Option<Arc<VmFile>> {
        self.files
            .get(&FileKey { kind, vnum })
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resident pages across every open file
    pub fn resident_pages(&self) -> usize {
        self.files
            .iter()
            .map(|entry| entry.value().lock().object.npages())
            .sum()
    }
}
