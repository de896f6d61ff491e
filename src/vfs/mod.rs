/*!
 * VFS Module
 * In-memory VFS server backing the pager
 */

pub mod memory;
pub mod types;

pub use memory::MemVfs;
pub use types::{PageWrite, VfsError, VfsResult};
