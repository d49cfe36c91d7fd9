use crate::error::{Result, VmError};
use log::{trace, warn};
use mokernel_shared::mem::{page_base, PAGE_FRAME_SIZE};

/// Watermark frame allocator.
///
/// Hands out frames by advancing a cursor from `start` towards the top of
/// physical memory. Frames are never taken back, so once the cursor reaches
/// the top the allocator stays exhausted.
#[derive(Debug)]
pub struct FrameAllocator {
    next_free: usize,
    // Last usable frame boundary, i.e. total memory rounded down to a frame.
    limit: usize,
    allocated: usize,
}

impl FrameAllocator {
    /// `start` is rounded up and `total_memory` down to frame boundaries, so
    /// only whole frames are ever handed out.
    pub fn new(total_memory: usize, start: usize) -> Self {
        let limit = page_base(total_memory);
        Self {
            next_free: start.next_multiple_of(PAGE_FRAME_SIZE).min(limit),
            limit,
            allocated: 0,
        }
    }

    /// Returns the next free frame.
    ///
    /// # Errors
    ///
    /// [`VmError::OutOfPhysicalMemory`] once the cursor has reached the top of
    /// memory. Every later call fails the same way.
    pub fn allocate(&mut self) -> Result<usize> {
        if self.next_free >= self.limit {
            warn!("out of physical frames, {} handed out", self.allocated);
            return Err(VmError::OutOfPhysicalMemory);
        }

        let frame = self.next_free;
        self.next_free += PAGE_FRAME_SIZE;
        self.allocated += 1;
        trace!("allocated frame {frame:#010X}");
        Ok(frame)
    }

    /// Frames cannot be returned to a watermark allocator. Reclaiming them
    /// needs a free list or a bitmap on top of the cursor.
    pub fn release(&mut self, frame: usize) {
        trace!("ignoring release of frame {frame:#010X}");
    }

    pub fn next_free(&self) -> usize {
        self.next_free
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn remaining(&self) -> usize {
        (self.limit - self.next_free) / PAGE_FRAME_SIZE
    }
}
