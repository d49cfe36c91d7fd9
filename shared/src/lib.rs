#![cfg_attr(target_os = "none", no_std)]

pub mod macros;
pub mod mem;
pub mod paging;
pub mod sizes;

#[cfg(target_os = "none")]
pub mod serial;
#[cfg(target_os = "none")]
pub mod video_memory;
