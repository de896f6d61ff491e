/*!
 * Syscalls Module
 * File syscalls served by the pager and the loop that dispatches them
 */

pub mod dispatch;
pub mod executor;
pub mod io;
pub mod open;
pub mod seek;
pub mod sync;
pub mod types;

pub use dispatch::PagerServer;
pub use executor::SyscallExecutor;
pub use io::split_write_range;
pub use types::{PagerRequest, PagerStats, Whence};
