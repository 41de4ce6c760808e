//! The EFI boot path: stage a multiboot2 kernel and its modules through
//! firmware allocations, assemble the boot information block, surrender
//! boot services and relocate everything to its final physical layout.
//!
//! Firmware access goes through the [`Firmware`] trait; the platform
//! bindings and the hand-off trampoline live outside this crate.

#![no_std]

mod cmdline;
mod env;
mod error;
mod exec;
mod firmware;
mod loadfile;
mod staging;

extern crate alloc;

pub use cmdline::kernel_cmdline;
pub use env::Environment;
pub use error::{FileError, LoadError};
pub use exec::{exec, HandOffFrame};
pub use firmware::{Firmware, FirmwareError, RawMemoryMap};
pub use loadfile::{load_image, load_module, ImageFile};
pub use relocation::ScratchRegion;
pub use staging::{StagingAllocator, STAGING_CEILING};

/// Routes `log` records into the boot log buffer. Call once, early.
pub fn init_logging() {
    boot_logger::init();
}
