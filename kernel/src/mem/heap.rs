use core::{
    alloc::{GlobalAlloc, Layout},
    cell::UnsafeCell,
    ptr,
};

/// Bump allocator for the kernel heap.
///
/// Deallocation is a no-op; the heap only holds things that live as long as
/// the kernel (the swap store, the allocator bookkeeping).
pub struct KernelHeap {
    start: usize,
    next: UnsafeCell<usize>,
    end: usize,
}

// SAFETY: Single core, and nothing allocates from an interrupt handler while
// another allocation is in progress.
unsafe impl Sync for KernelHeap {}

impl KernelHeap {
    pub const fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            next: UnsafeCell::new(start),
            end,
        }
    }

    pub fn used(&self) -> usize {
        // SAFETY: See the Sync impl.
        unsafe { *self.next.get() - self.start }
    }
}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let next = &mut *self.next.get();
        let start = next.next_multiple_of(layout.align());
        let Some(end) = start.checked_add(layout.size()) else {
            return ptr::null_mut();
        };
        if end > self.end {
            return ptr::null_mut();
        }
        *next = end;
        start as *mut u8
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}
}
