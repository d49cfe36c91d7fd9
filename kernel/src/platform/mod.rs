//! Bare metal glue: the kernel-wide virtual memory manager, the trap path into
//! the page fault handler, and CPU bring-up.

mod boot;
pub mod gdt;
pub mod idt;

use crate::{
    config::VmConfig,
    error::{Result, VmError},
    mem::IdentityMemory,
    mmu::X86Mmu,
    page_fault::FaultResolution,
    vmm::VirtualMemoryManager,
};
use core::{arch::asm, ptr};
use log::debug;
use mokernel_shared::{
    eprintln,
    mem::SELF_TEST_ADDRESS,
    paging::PageFlags,
    println,
};

pub type KernelVirtualMemory = VirtualMemoryManager<IdentityMemory, X86Mmu>;

// Synchronizing this in a safe way is hard. Single core, and the page fault
// handler is never entered while another user of it is running.
static mut VIRTUAL_MEMORY: Option<KernelVirtualMemory> = None;

/// # Safety
///
/// No other reference to the manager may be live.
pub unsafe fn virtual_memory() -> Result<&'static mut KernelVirtualMemory> {
    (*ptr::addr_of_mut!(VIRTUAL_MEMORY))
        .as_mut()
        .ok_or(VmError::Uninitialized)
}

/// Builds the page directory and identity table, turns paging on, and sets up
/// the frame allocator and swap store for `total_memory` bytes of RAM.
///
/// # Safety
///
/// Must run once, with interrupts disabled, while the kernel is executing
/// from the low 4MB.
pub unsafe fn init_virtual_memory(total_memory: usize) -> Result<()> {
    let config = VmConfig::new(total_memory);
    let memory = IdentityMemory::new(
        config.frame_window_table(),
        config.frame_window(),
        config.total_memory,
    );
    let manager = VirtualMemoryManager::init(memory, X86Mmu::new(), config)?;
    *ptr::addr_of_mut!(VIRTUAL_MEMORY) = Some(manager);
    Ok(())
}

/// # Safety
///
/// See [`virtual_memory`].
pub unsafe fn map_page(frame: usize, address: usize, flags: PageFlags) -> Result<()> {
    virtual_memory()?.map_page(frame, address, flags)
}

/// # Safety
///
/// See [`virtual_memory`].
pub unsafe fn unmap_page(address: usize) -> Result<bool> {
    virtual_memory()?.unmap_page(address)
}

/// # Safety
///
/// See [`virtual_memory`].
pub unsafe fn handle_page_fault(address: usize) -> Result<FaultResolution> {
    virtual_memory()?.handle_page_fault(address)
}

/// Entered from `page_fault_stub` with the contents of CR2. Returns only if
/// the page is now mapped, so the faulting instruction can be retried.
extern "C" fn page_fault_trap(address: usize) {
    // SAFETY: Interrupt gates keep interrupts off, and nothing touches the
    // manager while a fault can be raised from inside it.
    match unsafe { handle_page_fault(address) } {
        Ok(resolution) => {
            debug!("{resolution:?}");
            println!("Page Fault Handled: Loaded from Swap!");
        }
        Err(err) => {
            eprintln!("PAGE FAULT DETECTED! {err}");
            halt();
        }
    }
}

extern "C" fn unhandled_trap() -> ! {
    eprintln!("unhandled interrupt");
    halt();
}

/// Stops the CPU for good.
pub fn halt() -> ! {
    loop {
        // SAFETY: Only stops execution.
        unsafe { asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

/// Waits for interrupts forever.
pub fn idle() -> ! {
    loop {
        // SAFETY: Only stops execution until the next interrupt.
        unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) };
    }
}

/// Writes a word through the identity map and checks it reads back from the
/// same physical address.
///
/// # Safety
///
/// Paging must be on, and nothing else may use [`SELF_TEST_ADDRESS`].
pub unsafe fn self_test() -> bool {
    const PATTERN: u32 = 0xDEAD_BEEF;

    let word = SELF_TEST_ADDRESS as *mut u32;
    ptr::write_volatile(word, PATTERN);
    let identity = virtual_memory()
        .map(|vm| vm.translate(SELF_TEST_ADDRESS) == Some(SELF_TEST_ADDRESS))
        .unwrap_or(false);
    identity && ptr::read_volatile(word) == PATTERN
}

/// Seeds a page in swap and touches it, so the first access goes through the
/// page fault handler.
///
/// # Safety
///
/// See [`virtual_memory`]. The page fault handler must be installed.
#[cfg(feature = "demand_paging_demo")]
pub unsafe fn demand_paging_demo() {
    const PAGE: usize = 0x0050_0000;
    const MESSAGE: &[u8] = b"HELLO";

    if let Err(err) = virtual_memory().and_then(|vm| vm.swap_mut().seed(PAGE, MESSAGE)) {
        log::error!("could not seed swap: {err}");
        return;
    }

    let mut buffer = [0; MESSAGE.len()];
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = ptr::read_volatile((PAGE + i) as *const u8);
    }
    match core::str::from_utf8(&buffer) {
        Ok(text) => println!("Read from {PAGE:#010X}: {text}"),
        Err(_) => log::error!("unexpected bytes at {PAGE:#010X}: {buffer:?}"),
    }
}
