/*!
 * Cached Page
 */

use crate::core::types::{PageIndex, Pfn};

/// Identity of the VM object a page belongs to
pub type ObjectId = u64;

/// One physical page of cached file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub pfn: Pfn,
    /// File-relative page index, unique within the owning cache
    pub offset: PageIndex,
    /// Back-reference only; the object owns the page, not the other way round
    pub owner: ObjectId,
    pub refcount: u32,
    pub dirty: bool,
}

impl Page {
    pub fn new(pfn: Pfn, offset: PageIndex) -> Self {
        Self {
            pfn,
            offset,
            owner: 0,
            refcount: 0,
            dirty: false,
        }
    }
}
