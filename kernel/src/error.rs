use core::fmt::{Display, Formatter};

/// Everything that can go wrong inside the virtual memory subsystem.
///
/// The page fault handler treats every error it returns as fatal; the platform
/// prints it and halts. Administrative callers of `map_page` and the swap store
/// decide for themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The frame allocator's cursor reached the top of physical memory
    OutOfPhysicalMemory,
    /// The faulting page is neither in swap nor a page we can restore
    UnresolvableFault { address: usize },
    /// Every swap slot is in use, nothing was written
    SwapStoreExhausted { page: usize },
    /// The directory slot for this address has no page table behind it
    MissingIntermediateTable { address: usize },
    /// No swap slot holds this page, the destination was left untouched
    SwapMiss { address: usize },
    /// The first 4MB is identity mapped for the kernel and cannot be changed
    IdentityRegion { address: usize },
    /// The page is the kernel's window onto frames above the identity region
    FrameWindow { address: usize },
    /// The address does not fit in the 32-bit address space
    Unaddressable { address: usize },
    /// No page aligned frame exists at this physical address
    NoSuchFrame { frame: usize },
    /// The memory layout handed to `init` is unusable
    InvalidConfig(&'static str),
    /// The kernel-wide manager was used before `init_virtual_memory`
    Uninitialized,
}

impl VmError {
    pub fn summary(&self) -> &'static str {
        match self {
            Self::OutOfPhysicalMemory => "out of physical memory",
            Self::UnresolvableFault { .. } => "unresolvable page fault",
            Self::SwapStoreExhausted { .. } => "swap store exhausted",
            Self::MissingIntermediateTable { .. } => "no page table for address",
            Self::SwapMiss { .. } => "page not in swap",
            Self::IdentityRegion { .. } => "address is in the identity mapped region",
            Self::FrameWindow { .. } => "address is reserved for the frame window",
            Self::Unaddressable { .. } => "address is beyond 32 bits",
            Self::NoSuchFrame { .. } => "no such physical frame",
            Self::InvalidConfig(_) => "invalid virtual memory configuration",
            Self::Uninitialized => "virtual memory is not initialized",
        }
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfPhysicalMemory | Self::Uninitialized => write!(f, "{}", self.summary()),
            Self::UnresolvableFault { address }
            | Self::MissingIntermediateTable { address }
            | Self::SwapMiss { address }
            | Self::IdentityRegion { address }
            | Self::FrameWindow { address }
            | Self::Unaddressable { address } => {
                write!(f, "{} ({address:#010X})", self.summary())
            }
            Self::SwapStoreExhausted { page } => {
                write!(f, "{} (page {page:#010X})", self.summary())
            }
            Self::NoSuchFrame { frame } => {
                write!(f, "{} (frame {frame:#010X})", self.summary())
            }
            Self::InvalidConfig(reason) => write!(f, "{}: {reason}", self.summary()),
        }
    }
}

impl core::error::Error for VmError {}

pub type Result<T> = core::result::Result<T, VmError>;
