use core::fmt;

use alloc::vec::Vec;

use memory::{parse_efi_memory_map, EfiMemoryDescriptor, PhysAddr};
use multiboot2::{FramebufferInfo, RsdpDescriptor};

/// Status codes the firmware surface can report. Mirrors the handful of
/// EFI statuses the boot path actually reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareError {
    OutOfResources,
    InvalidParameter,
    DeviceError,
    Unsupported,
}

impl fmt::Display for FirmwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FirmwareError::OutOfResources => "out of resources",
            FirmwareError::InvalidParameter => "invalid parameter",
            FirmwareError::DeviceError => "device error",
            FirmwareError::Unsupported => "unsupported",
        };
        write!(f, "{}", text)
    }
}

/// One fetch of the firmware memory map. The `key` identifies this exact
/// snapshot; surrendering boot services requires the key of the latest
/// fetch.
pub struct RawMemoryMap {
    pub buffer: Vec<u8>,
    pub descriptor_size: usize,
    pub descriptor_version: u32,
    pub key: usize,
}

impl RawMemoryMap {
    pub fn descriptors(&self) -> Vec<EfiMemoryDescriptor> {
        parse_efi_memory_map(&self.buffer, self.descriptor_size)
    }
}

/// The firmware surface the boot path consumes. All addresses are
/// physical; memory is identity mapped for the whole boot.
///
/// After `exit_boot_services` succeeds only `staging_slice` and
/// `memmove` remain valid, they touch raw memory, not firmware state.
/// Calling anything else afterwards is a programming error.
pub trait Firmware {
    /// Fetches the current memory map. Note: the fetch itself may
    /// allocate and therefore invalidate earlier keys.
    fn memory_map(&mut self) -> Result<RawMemoryMap, FirmwareError>;

    /// Allocates `pages` pages somewhere at or below `max_addr`. The
    /// firmware picks the address; there is no exact-placement call.
    fn allocate_pages(&mut self, max_addr: PhysAddr, pages: u64)
        -> Result<PhysAddr, FirmwareError>;

    fn free_pages(&mut self, addr: PhysAddr, pages: u64);

    /// One-shot surrender of boot services. `key` must come from the
    /// latest `memory_map` fetch.
    fn exit_boot_services(&mut self, key: usize) -> Result<(), FirmwareError>;

    fn system_table_addr(&self) -> u64;

    fn rsdp(&self) -> Option<RsdpDescriptor>;

    fn framebuffer(&self) -> Option<FramebufferInfo>;

    /// A byte view of staged physical memory.
    fn staging_slice(&mut self, addr: PhysAddr, len: usize) -> &mut [u8];

    /// Overlap-safe physical copy.
    fn memmove(&mut self, dest: PhysAddr, src: PhysAddr, size: u64);
}
