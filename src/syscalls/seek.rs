/*!
 * Lseek Syscall
 */

use super::executor::SyscallExecutor;
use super::types::Whence;
use crate::core::errors::{PagerError, PagerResult};
use crate::core::limits::MAX_FILE_OFFSET;
use crate::core::types::{Fd, TaskId};
use log::debug;

impl SyscallExecutor {
    /// Move the cursor of `fd`, returning its new value
    ///
    /// Offsets are never negative. Results are computed in 64 bits and
    /// rejected when they leave the 32-bit cursor range.
    pub fn lseek(&self, sender: TaskId, fd: Fd, offset: i64, whence: i32) -> PagerResult<u32> {
        let task = self.caller(sender)?;
        let mut task = task.lock();
        let (file, cursor) = task.bound_file(fd)?;

        let whence = Whence::try_from(whence)?;
        let offset = u64::try_from(offset)
            .map_err(|_| PagerError::invalid_argument(format!("negative offset {}", offset)))?;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => cursor as u64,
            Whence::End => file.length() as u64,
        };
        let target = base
            .checked_add(offset)
            .filter(|&t| t <= MAX_FILE_OFFSET)
            .ok_or_else(|| {
                PagerError::invalid_argument(format!(
                    "{:?} + {} leaves the 32-bit offset range",
                    whence, offset
                ))
            })?;

        task.descriptor_mut(fd)?.cursor = target as u32;
        debug!("Task {} fd {} cursor {} -> {}", sender, fd, cursor, target);
        Ok(target as u32)
    }
}
