/*!
 * Memory Types
 * Common types for physical memory and address spaces
 */

use crate::core::types::{Pfn, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
pub enum MemoryError {
    #[error("Out of memory: requested {requested} contiguous pages, {available} pages free")]
    #[diagnostic(
        code(memory::out_of_memory),
        help("The physical pool is exhausted or too fragmented. Close files to release pages.")
    )]
    OutOfMemory { requested: Size, available: Size },

    #[error("Invalid physical frame: {0}")]
    #[diagnostic(code(memory::invalid_frame))]
    InvalidFrame(Pfn),

    #[error("Region 0x{start:x}..0x{end:x} overlaps an existing mapping")]
    #[diagnostic(code(memory::overlap))]
    Overlap { start: usize, end: usize },

    #[error("Alignment error: address 0x{address:x}, required alignment {alignment}")]
    #[diagnostic(code(memory::alignment))]
    AlignmentError { address: usize, alignment: usize },
}

/// Access flags of an address-space region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmFlags {
    pub read: bool,
    pub write: bool,
}

impl VmFlags {
    pub const READ: Self = Self {
        read: true,
        write: false,
    };

    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };

    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    /// True when every access in `required` is granted
    pub fn contains(&self, required: VmFlags) -> bool {
        (self.read || !required.read) && (self.write || !required.write)
    }
}

/// Physical pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalMemoryStats {
    pub total_pages: Size,
    pub used_pages: Size,
    pub free_pages: Size,
}
