use alloc::vec::Vec;

/// The two things the virtual memory core needs from the MMU.
pub trait Mmu {
    /// Makes the directory at physical address `page_directory` the active
    /// translation root, turning paging on if it is not on yet.
    fn activate(&mut self, page_directory: usize);

    /// Drops any cached translation for the page containing `address`. Other
    /// cached translations stay valid.
    fn invalidate(&mut self, address: usize);
}

/// An MMU that only records what it was asked to do. Hosted builds and tests
/// use it to check that mappings invalidate exactly the address they touch.
#[derive(Debug, Default)]
pub struct SoftMmu {
    root: Option<usize>,
    invalidations: Vec<usize>,
}

impl SoftMmu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn invalidations(&self) -> &[usize] {
        &self.invalidations
    }

    pub fn clear_invalidations(&mut self) {
        self.invalidations.clear();
    }
}

impl Mmu for SoftMmu {
    fn activate(&mut self, page_directory: usize) {
        self.root = Some(page_directory);
        // Loading CR3 flushes everything.
        self.invalidations.clear();
    }

    fn invalidate(&mut self, address: usize) {
        self.invalidations.push(address);
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use x86::X86Mmu;

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod x86 {
    use super::Mmu;
    use core::arch::asm;

    const CR0_PG: usize = 1 << 31;
    const CR0_WP: usize = 1 << 16;

    pub struct X86Mmu {
        _private: (),
    }

    impl X86Mmu {
        /// # Safety
        ///
        /// There must be at most one of these, and whatever directory it is
        /// asked to activate must identity map the code that is running.
        pub unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Mmu for X86Mmu {
        fn activate(&mut self, page_directory: usize) {
            // SAFETY: Guaranteed by the contract of `X86Mmu::new`.
            unsafe {
                asm!(
                    "
                    mov cr3, {directory}
                    mov {cr0}, cr0
                    or {cr0}, {flags}
                    mov cr0, {cr0}
                    ",
                    directory = in(reg) page_directory,
                    cr0 = out(reg) _,
                    flags = const CR0_PG | CR0_WP,
                    options(nostack),
                );
            }
        }

        fn invalidate(&mut self, address: usize) {
            // SAFETY: invlpg only drops a TLB entry.
            unsafe {
                asm!("invlpg [{}]", in(reg) address, options(nostack, preserves_flags));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_mmu_records_root_and_invalidations() {
        let mut mmu = SoftMmu::new();
        assert_eq!(mmu.root(), None);

        mmu.invalidate(0x1000);
        mmu.activate(0x0030_0000);
        assert_eq!(mmu.root(), Some(0x0030_0000));
        assert!(mmu.invalidations().is_empty());

        mmu.invalidate(0x0050_0000);
        mmu.invalidate(0x0050_1000);
        assert_eq!(mmu.invalidations(), &[0x0050_0000, 0x0050_1000]);

        mmu.clear_invalidations();
        assert!(mmu.invalidations().is_empty());
    }
}
