/*!
 * Task Module
 * Client tasks, descriptor tables and address spaces
 */

pub mod manager;
pub mod types;

pub use manager::{TaskManager, TaskRef};
pub use types::{FileDescriptor, Task};
