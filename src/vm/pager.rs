/*!
 * Pagers
 * Page-in/page-out capabilities attached to a VM object
 */

use super::object::VmObject;
use super::page::Page;
use crate::core::errors::PagerResult;
use crate::core::types::{PageIndex, Pfn, Vnum};
use crate::ipc::VfsClient;
use crate::memory::PhysicalMemory;
use log::{debug, error};
use std::sync::Arc;

/// Moves pages between a VM object's cache and its backing store
pub trait Pager: Send + Sync + std::fmt::Debug {
    /// Make the page at `offset` resident, returning its frame
    fn page_in(&self, object: &mut VmObject, offset: PageIndex) -> PagerResult<Pfn>;

    /// Write the page at `offset` back if it is resident and dirty
    fn page_out(&self, object: &mut VmObject, offset: PageIndex) -> PagerResult<()>;

    fn name(&self) -> &'static str;
}

/// Pager for files served by the VFS server
#[derive(Debug)]
pub struct FilePager {
    vnum: Vnum,
    client: VfsClient,
    memory: Arc<PhysicalMemory>,
}

impl FilePager {
    pub fn new(vnum: Vnum, client: VfsClient, memory: Arc<PhysicalMemory>) -> Self {
        Self {
            vnum,
            client,
            memory,
        }
    }
}

impl Pager for FilePager {
    fn page_in(&self, object: &mut VmObject, offset: PageIndex) -> PagerResult<Pfn> {
        if let Some(page) = object.find_page(offset) {
            return Ok(page.pfn);
        }

        let pfn = self.memory.alloc_pages(1)?;
        if let Err(e) = self.client.read_pages(self.vnum, offset, 1, pfn) {
            let _ = self.memory.free_pages(pfn, 1);
            return Err(e);
        }

        let mut page = Page::new(pfn, offset);
        page.refcount = 1;
        if let Err(e) = object.insert_page(page) {
            let _ = self.memory.free_pages(pfn, 1);
            return Err(e.into());
        }
        debug!(
            "vnum 0x{:x}: paged in offset {} to pfn {}",
            self.vnum, offset, pfn
        );
        Ok(pfn)
    }

    fn page_out(&self, object: &mut VmObject, offset: PageIndex) -> PagerResult<()> {
        let Some(page) = object.find_page_mut(offset) else {
            return Ok(());
        };
        if !page.dirty {
            return Ok(());
        }

        if let Err(e) = self.client.write_pages(self.vnum, offset, 1, page.pfn) {
            error!(
                "vnum 0x{:x}: could not page out offset {}: {}",
                self.vnum, offset, e
            );
            return Err(e);
        }
        page.dirty = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Zero-fill pager with no backing store
#[derive(Debug)]
pub struct AnonymousPager {
    memory: Arc<PhysicalMemory>,
}

impl AnonymousPager {
    pub fn new(memory: Arc<PhysicalMemory>) -> Self {
        Self { memory }
    }
}

impl Pager for AnonymousPager {
    fn page_in(&self, object: &mut VmObject, offset: PageIndex) -> PagerResult<Pfn> {
        if let Some(page) = object.find_page(offset) {
            return Ok(page.pfn);
        }
        let pfn = self.memory.alloc_pages(1)?;
        let mut page = Page::new(pfn, offset);
        page.refcount = 1;
        if let Err(e) = object.insert_page(page) {
            let _ = self.memory.free_pages(pfn, 1);
            return Err(e.into());
        }
        Ok(pfn)
    }

    fn page_out(&self, _object: &mut VmObject, _offset: PageIndex) -> PagerResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "anonymous"
    }
}
