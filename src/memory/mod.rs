/*!
 * Memory Module
 * Physical frames, page transfer and task address spaces
 */

pub mod address_space;
pub mod physical;
pub mod transfer;
pub mod types;

// Re-export for convenience
pub use address_space::{AddressSpace, VmRegion};
pub use physical::{MappedFrame, PhysicalMemory};
pub use transfer::page_copy;
pub use types::*;
