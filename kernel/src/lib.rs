//! Virtual memory core of MOKernel: a watermark frame allocator, an in-memory
//! swap store, two-level i386 translation tables, and a demand-paging page
//! fault handler that restores pages from swap.
//!
//! Everything except [`platform`] runs hosted as well, against
//! [`mem::SimulatedMemory`] and [`mmu::SoftMmu`].

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod logging;
pub mod mem;
pub mod mmu;
pub mod page_fault;
pub mod paging;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod platform;
pub mod swapping;
pub mod vmm;

pub use config::VmConfig;
pub use error::{Result, VmError};
pub use page_fault::FaultResolution;
pub use vmm::VirtualMemoryManager;
