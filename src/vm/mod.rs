/*!
 * VM Module
 * File-backed virtual memory: pages, page caches, pagers and open files
 */

pub mod cache_io;
pub mod file;
pub mod object;
pub mod page;
pub mod pager;
pub mod registry;

// Re-export for convenience
pub use cache_io::{read_cache_pages, write_cache_pages, CacheRange};
pub use file::{VmFile, VmFileKind, VmFileState};
pub use object::VmObject;
pub use page::{ObjectId, Page};
pub use pager::{AnonymousPager, FilePager, Pager};
pub use registry::VmFileRegistry;
