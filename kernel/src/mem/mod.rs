pub mod frame_allocator;
#[cfg(target_os = "none")]
pub mod heap;

use crate::error::{Result, VmError};
use alloc::{boxed::Box, vec};
use mokernel_shared::mem::{is_page_aligned, PAGE_FRAME_SIZE};

pub type Frame = [u8; PAGE_FRAME_SIZE];

/// Access to physical memory by physical address.
///
/// The paging structures are plain words in physical memory and are walked
/// through this, the same way the MMU walks them. Word accesses only ever
/// target those structures, which the configuration keeps inside the identity
/// region. Frames can be anything a page table entry names, so reaching one is
/// fallible.
pub trait PhysicalMemory {
    fn read_u32(&self, address: usize) -> u32;

    fn write_u32(&mut self, address: usize, value: u32);

    /// # Errors
    ///
    /// [`VmError::NoSuchFrame`] if `frame` is misaligned or outside RAM.
    fn frame_mut(&mut self, frame: usize) -> Result<&mut Frame>;

    fn zero_frame(&mut self, frame: usize) -> Result<()> {
        self.frame_mut(frame)?.fill(0);
        Ok(())
    }
}

/// Zeroed RAM for hosted builds. Frame 0 is physical address 0.
pub struct SimulatedMemory {
    frames: Box<[Frame]>,
}

impl SimulatedMemory {
    pub fn new(size: usize) -> Self {
        let frames = size.div_ceil(PAGE_FRAME_SIZE);
        Self {
            frames: vec![[0; PAGE_FRAME_SIZE]; frames].into_boxed_slice(),
        }
    }

    pub fn size(&self) -> usize {
        self.frames.len() * PAGE_FRAME_SIZE
    }

    pub fn frame(&self, frame: usize) -> Option<&Frame> {
        if !is_page_aligned(frame) {
            return None;
        }
        self.frames.get(frame / PAGE_FRAME_SIZE)
    }

    /// Copies `buffer.len()` bytes starting at `address`, which may cross
    /// frame boundaries.
    pub fn read(&self, address: usize, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            let address = address + i;
            *byte = self.frames[address / PAGE_FRAME_SIZE][address % PAGE_FRAME_SIZE];
        }
    }

    pub fn write(&mut self, address: usize, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let address = address + i;
            self.frames[address / PAGE_FRAME_SIZE][address % PAGE_FRAME_SIZE] = *byte;
        }
    }

    fn word(address: usize) -> (usize, usize) {
        debug_assert!(address % 4 == 0, "unaligned word access at {address:#X}");
        (address / PAGE_FRAME_SIZE, address % PAGE_FRAME_SIZE)
    }
}

impl PhysicalMemory for SimulatedMemory {
    fn read_u32(&self, address: usize) -> u32 {
        let (frame, offset) = Self::word(address);
        let bytes = &self.frames[frame][offset..offset + 4];
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_u32(&mut self, address: usize, value: u32) {
        let (frame, offset) = Self::word(address);
        self.frames[frame][offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn frame_mut(&mut self, frame: usize) -> Result<&mut Frame> {
        if !is_page_aligned(frame) {
            return Err(VmError::NoSuchFrame { frame });
        }
        self.frames
            .get_mut(frame / PAGE_FRAME_SIZE)
            .ok_or(VmError::NoSuchFrame { frame })
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use identity::IdentityMemory;

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod identity {
    use super::{Frame, PhysicalMemory};
    use crate::error::{Result, VmError};
    use core::{arch::asm, ptr};
    use mokernel_shared::{
        mem::{is_page_aligned, IDENTITY_MAP_SIZE, PAGE_FRAME_SIZE},
        paging::{PageFlags, PageTableEntry, VirtualAddress},
    };

    /// Physical memory as seen from inside the kernel once paging is on.
    ///
    /// The low 4MB is identity mapped, so those addresses are used directly.
    /// Anything above is reached by pointing the window page at the frame. The
    /// window sits above the identity region in a pool table of its own, so
    /// the identity map is never touched. Only one frame can be borrowed at a
    /// time, which the `&mut self` receiver of `frame_mut` guarantees.
    pub struct IdentityMemory {
        window_table: usize,
        window: usize,
        limit: usize,
    }

    impl IdentityMemory {
        /// # Safety
        ///
        /// `window_table` must be the installed, identity mapped page table
        /// that covers `window`, and nothing else may map `window`. `limit` is
        /// the top of RAM.
        pub unsafe fn new(window_table: usize, window: usize, limit: usize) -> Self {
            Self {
                window_table,
                window,
                limit,
            }
        }

        fn reach(&mut self, frame: usize) -> Result<*mut Frame> {
            if !is_page_aligned(frame) || frame >= self.limit {
                return Err(VmError::NoSuchFrame { frame });
            }
            if frame < IDENTITY_MAP_SIZE {
                return Ok(frame as *mut Frame);
            }

            let index = VirtualAddress::try_from_address(self.window)
                .ok_or(VmError::Unaddressable {
                    address: self.window,
                })?
                .table_index();
            let entry = PageTableEntry::mapping(frame, PageFlags::WRITABLE);
            // SAFETY: The window table is identity mapped and its window entry
            // belongs to us.
            unsafe {
                ptr::write_volatile(
                    (self.window_table + index * 4) as *mut u32,
                    entry.raw_value(),
                );
                asm!("invlpg [{}]", in(reg) self.window, options(nostack, preserves_flags));
            }
            Ok(self.window as *mut Frame)
        }
    }

    impl PhysicalMemory for IdentityMemory {
        fn read_u32(&self, address: usize) -> u32 {
            // SAFETY: Paging structures live in the identity region.
            unsafe { ptr::read_volatile(address as *const u32) }
        }

        fn write_u32(&mut self, address: usize, value: u32) {
            // SAFETY: As above.
            unsafe { ptr::write_volatile(address as *mut u32, value) }
        }

        fn frame_mut(&mut self, frame: usize) -> Result<&mut Frame> {
            let frame = self.reach(frame)?;
            // SAFETY: `reach` returns a mapped, page aligned page, and
            // `&mut self` keeps the window from moving while it is borrowed.
            Ok(unsafe { &mut *frame })
        }
    }

    const _: () = assert!(PAGE_FRAME_SIZE == core::mem::size_of::<Frame>());
}
