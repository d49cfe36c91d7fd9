#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod kernel {
    use mokernel::{logging, mem::heap::KernelHeap, platform};
    use mokernel_shared::{
        eprintln,
        mem::{KERNEL_HEAP_END, KERNEL_HEAP_START},
        println,
        sizes::{KB, MB},
        video_memory::{self, Attribute, Colour, VIDEO_MEMORY_COLS, VIDEO_MEMORY_LINES},
    };

    #[global_allocator]
    static KERNEL_HEAP: KernelHeap = KernelHeap::new(KERNEL_HEAP_START, KERNEL_HEAP_END);

    #[panic_handler]
    fn panic(args: &core::panic::PanicInfo) -> ! {
        eprintln!("{}", args);
        platform::halt();
    }

    #[no_mangle]
    extern "C" fn main(mem_upper: usize) -> ! {
        // SAFETY: Single core, interrupts disabled since boot.
        unsafe {
            video_memory::writer().clear();
            video_memory::writer().write_status(
                0,
                "Booting MOKernel...",
                Attribute::new(Colour::Green, Colour::Black),
            );
            video_memory::writer().cursor = VIDEO_MEMORY_COLS;
        }

        if let Err(err) = logging::init() {
            eprintln!("logger already installed: {err}");
        }

        // SAFETY: As above.
        unsafe {
            platform::gdt::load();
            platform::idt::load();
        }

        let total_memory = MB + mem_upper * KB;
        println!("Enabling paging for {} KB of memory", total_memory / KB);
        // SAFETY: As above, and we are still running from the low 4MB.
        if let Err(err) = unsafe { platform::init_virtual_memory(total_memory) } {
            eprintln!("could not set up virtual memory: {err}");
            platform::halt();
        }
        println!("Paging enabled!");

        // SAFETY: Paging is on and nothing else holds the manager.
        if unsafe { platform::self_test() } {
            println!("Identity map self test passed");
        } else {
            eprintln!("Identity map self test failed");
            platform::halt();
        }

        // SAFETY: The page fault handler is installed.
        #[cfg(feature = "demand_paging_demo")]
        unsafe {
            platform::demand_paging_demo();
        }

        println!("Heap in use: {} bytes", KERNEL_HEAP.used());
        // SAFETY: As above.
        unsafe {
            video_memory::writer().write_status(
                VIDEO_MEMORY_LINES - 1,
                "Kernel Message",
                Attribute::new(Colour::Gray, Colour::Black),
            );
        }

        platform::idle()
    }
}

/// Walks through demand paging on simulated memory: a page seeded in swap is
/// loaded on first touch, a page that is nowhere to be found is fatal.
#[cfg(not(target_os = "none"))]
fn main() {
    use mokernel::{logging, VirtualMemoryManager, VmConfig};

    if let Err(err) = logging::init() {
        eprintln!("logger already installed: {err}");
    }

    let mut vm = match VirtualMemoryManager::simulated(VmConfig::default()) {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("could not set up virtual memory: {err}");
            std::process::exit(1);
        }
    };
    println!("* Initialized virtual memory, directory at {:#010X}.", vm.config().page_directory);

    const PAGE: usize = 0x0050_0000;
    if let Err(err) = vm.swap_mut().seed(PAGE, b"HELLO") {
        eprintln!("could not seed swap: {err}");
        std::process::exit(1);
    }
    println!("* Seeded {PAGE:#010X} in swap.");

    for address in [PAGE, 0x0060_0000] {
        let mut buffer = [0; 5];
        loop {
            match vm.read_virtual(address, &mut buffer) {
                Ok(()) => {
                    println!(
                        "* Read {:?} from {address:#010X}.",
                        String::from_utf8_lossy(&buffer)
                    );
                    break;
                }
                Err(faulting) => match vm.handle_page_fault(faulting) {
                    Ok(_) => println!("Page Fault Handled: Loaded from Swap!"),
                    Err(err) => {
                        eprintln!("PAGE FAULT DETECTED! {err}");
                        std::process::exit(1);
                    }
                },
            }
        }
    }
}
