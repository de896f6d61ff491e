/*!
 * Page Transfer
 * Copies bytes between two physical pages through temporary mappings
 */

use super::physical::PhysicalMemory;
use crate::core::errors::{InvariantViolation, PagerResult};
use crate::core::limits::PAGE_SIZE;
use crate::core::types::{Pfn, Size};

/// Copy `size` bytes from `src` at `src_offset` into `dst` at `dst_offset`
///
/// Neither range may cross the end of its page.
pub fn page_copy(
    memory: &PhysicalMemory,
    dst: Pfn,
    src: Pfn,
    dst_offset: usize,
    src_offset: usize,
    size: Size,
) -> PagerResult<()> {
    if dst_offset + size > PAGE_SIZE {
        return Err(InvariantViolation::CopyOutOfBounds {
            offset: dst_offset,
            size,
        }
        .into());
    }
    if src_offset + size > PAGE_SIZE {
        return Err(InvariantViolation::CopyOutOfBounds {
            offset: src_offset,
            size,
        }
        .into());
    }

    if dst == src {
        let mut frame = memory.map(dst)?;
        frame.copy_within(src_offset..src_offset + size, dst_offset);
        return Ok(());
    }

    // Map in ascending pfn order
    let (src_frame, mut dst_frame) = if src < dst {
        let s = memory.map(src)?;
        (s, memory.map(dst)?)
    } else {
        let d = memory.map(dst)?;
        (memory.map(src)?, d)
    };

    dst_frame[dst_offset..dst_offset + size]
        .copy_from_slice(&src_frame[src_offset..src_offset + size]);
    Ok(())
}
