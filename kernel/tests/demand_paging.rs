use mokernel::{
    mem::SimulatedMemory,
    mmu::SoftMmu,
    FaultResolution, VirtualMemoryManager, VmConfig, VmError,
};
use mokernel_shared::{
    mem::{IDENTITY_MAP_SIZE, PAGE_FRAME_SIZE},
    paging::PageFlags,
    sizes::MB,
};

type SimulatedVm = VirtualMemoryManager<SimulatedMemory, SoftMmu>;

fn boot(total_memory: usize) -> SimulatedVm {
    VirtualMemoryManager::simulated(VmConfig::new(total_memory))
        .expect("default layout should initialize")
}

/// Reads like a program would, resolving faults through the handler.
fn touch(vm: &mut SimulatedVm, address: usize, buffer: &mut [u8]) -> Result<(), VmError> {
    loop {
        match vm.read_virtual(address, buffer) {
            Ok(()) => return Ok(()),
            Err(faulting) => {
                vm.handle_page_fault(faulting)?;
            }
        }
    }
}

#[test]
fn identity_map_after_init() {
    let vm = boot(16 * MB);
    for address in [0, 0x1000, 0x000B_8000, 0x0010_0000, IDENTITY_MAP_SIZE - 1] {
        assert_eq!(vm.translate(address), Some(address));
    }
    assert_eq!(vm.translate(IDENTITY_MAP_SIZE), None);
}

#[test]
fn hello_is_loaded_on_first_touch() {
    let mut vm = boot(16 * MB);
    vm.swap_mut()
        .seed(0x0050_0000, b"HELLO")
        .expect("swap has room");

    let mut buffer = [0; 5];
    touch(&mut vm, 0x0050_0000, &mut buffer).expect("fault should be resolved");
    assert_eq!(&buffer, b"HELLO");

    assert_eq!(vm.frames().allocated(), 1);
    let entry = vm.entry(0x0050_0000).expect("page is now present");
    assert_eq!(entry.frame(), 0x0040_0000);
    assert_eq!(entry.flags(), PageFlags::USER_READ_WRITE);
    assert_eq!(vm.memory().frame(0x0040_0000).unwrap()[..5], *b"HELLO");

    // A second touch needs no fault.
    touch(&mut vm, 0x0050_0002, &mut buffer[..3]).expect("page is mapped");
    assert_eq!(vm.frames().allocated(), 1);
}

#[test]
fn unknown_page_is_fatal() {
    let mut vm = boot(16 * MB);
    let mut buffer = [0; 1];
    assert_eq!(
        touch(&mut vm, 0x0060_0000, &mut buffer),
        Err(VmError::UnresolvableFault {
            address: 0x0060_0000
        })
    );
    assert_eq!(vm.frames().allocated(), 0);
    assert_eq!(vm.translate(0x0060_0000), None);
}

#[test]
fn map_and_unmap_are_symmetric() {
    let mut vm = boot(16 * MB);
    let frame = 0x0080_0000;
    let address = 0x0070_0123;

    vm.map_page(frame, address, PageFlags::WRITABLE)
        .expect("table exists");
    assert_eq!(vm.translate(address), Some(frame + 0x123));
    assert_eq!(vm.unmap_page(address), Ok(true));
    assert_eq!(vm.translate(address), None);

    // Each change invalidated only the page it touched.
    assert_eq!(vm.mmu().invalidations(), &[0x0070_0000, 0x0070_0000]);
}

#[test]
fn swapped_out_page_comes_back_in_a_new_frame() {
    let mut vm = boot(16 * MB);
    let first = vm
        .allocate_page(0x0050_0000, PageFlags::USER_READ_WRITE)
        .expect("frames available");
    vm.memory_mut().write(first + 16, b"persist");

    assert_eq!(vm.swap_out(0x0050_0000), Ok(Some(first)));
    assert_eq!(vm.translate(0x0050_0000), None);

    let mut buffer = [0; 7];
    touch(&mut vm, 0x0050_0010, &mut buffer).expect("page is in swap");
    assert_eq!(&buffer, b"persist");
    let second = vm.entry(0x0050_0000).map(|entry| entry.frame());
    assert_eq!(second, Some(first + PAGE_FRAME_SIZE));
}

#[test]
fn running_out_of_frames_during_a_fault_is_fatal() {
    let mut vm = boot(IDENTITY_MAP_SIZE);
    vm.swap_mut().seed(0x0050_0000, b"HELLO").expect("room");

    assert_eq!(
        vm.handle_page_fault(0x0050_0000),
        Err(VmError::OutOfPhysicalMemory)
    );
    assert_eq!(vm.entry(0x0050_0000), None);
}

#[test]
fn pages_beyond_the_table_pool_cannot_be_mapped() {
    let mut vm = boot(16 * MB);
    let address = vm.config().page_table_pool_len * IDENTITY_MAP_SIZE;
    vm.swap_mut().seed(address, b"far").expect("room");

    assert_eq!(
        vm.handle_page_fault(address),
        Err(VmError::MissingIntermediateTable { address })
    );
    assert_eq!(
        vm.map_page(0x0080_0000, address, PageFlags::WRITABLE),
        Err(VmError::MissingIntermediateTable { address })
    );
    assert_eq!(vm.frames().allocated(), 0);
}

#[test]
fn identity_region_is_protected() {
    let mut vm = boot(16 * MB);
    assert_eq!(
        vm.map_page(0x0080_0000, 0x000B_8000, PageFlags::WRITABLE),
        Err(VmError::IdentityRegion {
            address: 0x000B_8000
        })
    );
    assert_eq!(vm.translate(0x000B_8000), Some(0x000B_8000));
}

#[test]
fn swap_exhaustion_is_reported() {
    let mut vm = VirtualMemoryManager::simulated(VmConfig::default().with_swap_slots(1))
        .expect("valid layout");
    vm.swap_mut().seed(0x0050_0000, b"a").expect("one slot");
    assert_eq!(
        vm.swap_mut().seed(0x0050_1000, b"b"),
        Err(VmError::SwapStoreExhausted { page: 0x0050_1000 })
    );
}

#[test]
fn faults_resolve_in_allocation_order() {
    let mut vm = boot(16 * MB);
    for i in 0..3 {
        vm.swap_mut()
            .seed(0x0050_0000 + i * PAGE_FRAME_SIZE, &[i as u8; 4])
            .expect("room");
    }

    let resolutions: Vec<FaultResolution> = (0..3)
        .rev()
        .map(|i| {
            vm.handle_page_fault(0x0050_0000 + i * PAGE_FRAME_SIZE)
                .expect("in swap")
        })
        .collect();

    assert_eq!(
        resolutions.iter().map(|r| r.frame).collect::<Vec<_>>(),
        [0x0040_0000, 0x0040_1000, 0x0040_2000]
    );
    for resolution in &resolutions {
        let tag = ((resolution.page - 0x0050_0000) / PAGE_FRAME_SIZE) as u8;
        assert_eq!(vm.memory().frame(resolution.frame).unwrap()[0], tag);
    }
}

#[test]
fn frame_window_never_disturbs_the_identity_map() {
    let mut vm = boot(16 * MB);
    let window = vm.config().frame_window();
    assert!(window >= IDENTITY_MAP_SIZE);
    assert_eq!(
        vm.map_page(0x0080_0000, window, PageFlags::WRITABLE),
        Err(VmError::FrameWindow { address: window })
    );

    // Faults above the identity region go through frame access; the identity
    // map must look the same afterwards.
    vm.swap_mut().seed(0x0050_0000, b"HELLO").expect("room");
    vm.handle_page_fault(0x0050_0000).expect("in swap");
    vm.swap_out(0x0050_0000).expect("resident");
    for address in (0..IDENTITY_MAP_SIZE).step_by(PAGE_FRAME_SIZE) {
        assert_eq!(vm.translate(address), Some(address));
    }
}

#[test]
fn swapping_out_a_page_backed_by_no_ram_fails_cleanly() {
    let mut vm = boot(16 * MB);
    vm.map_page(0x8000_0000, 0x0050_0000, PageFlags::WRITABLE)
        .expect("table exists");
    assert_eq!(
        vm.swap_out(0x0050_0000),
        Err(VmError::NoSuchFrame { frame: 0x8000_0000 })
    );
    assert!(vm.swap().is_empty());
    assert_eq!(vm.translate(0x0050_0000), Some(0x8000_0000));
}

#[cfg(target_pointer_width = "64")]
#[test]
fn addresses_beyond_32_bits_never_alias_low_pages() {
    let mut vm = boot(16 * MB);
    assert_eq!(
        vm.map_page(0x0080_0000, 0x1_0050_0000, PageFlags::WRITABLE),
        Err(VmError::Unaddressable {
            address: 0x1_0050_0000
        })
    );
    assert_eq!(vm.translate(0x0050_0000), None);

    vm.swap_mut().seed(0x1_0060_0000, b"high").expect("room");
    assert_eq!(
        vm.handle_page_fault(0x1_0060_0000),
        Err(VmError::Unaddressable {
            address: 0x1_0060_0000
        })
    );
    assert_eq!(vm.frames().allocated(), 0);
    assert_eq!(vm.translate(0x0060_0000), None);
}
