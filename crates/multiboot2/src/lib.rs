//! The multiboot2 boot information format, producer side: header
//! scanning/validation of a candidate kernel image, and the two-pass
//! (size, write) construction of the tag-encoded boot information block.
//!
//! For the memory layout of the structures see
//! https://www.gnu.org/software/grub/manual/multiboot2/multiboot.pdf

#![no_std]

mod builder;
mod header;
mod info;
mod tag;
mod writer;

extern crate alloc;

pub use builder::{BootInfoRequest, BuildError, InfoBlockBuilder, ModulePlacement, PhysicalLayout, Platform};
pub use header::{scan_header, HeaderError, LoadHints};
pub use info::{
    BasicMemInfo, EfiMemoryMapInfo, FramebufferInfo, ImageDescriptor, ModuleDescriptor,
    RsdpDescriptor,
};
pub use tag::{efi_mmap_size_hint, InfoTag};
pub use writer::{TagWriter, WriteError};

/// The magic value starting a multiboot2 header inside a kernel image.
pub const HEADER_MAGIC: u32 = 0xe852_50d6;

/// Passed to the kernel in a register to identify the boot protocol.
pub const BOOTLOADER_MAGIC: u32 = 0x36d7_6289;

/// How many bytes from the start of the file we search for the header.
pub const HEADER_SEARCH: usize = 32768;

/// The header must start on this alignment within the image.
pub const HEADER_ALIGN: usize = 8;

/// Every tag starts on this alignment, in the header and the info block.
pub const TAG_ALIGN: u64 = 8;

/// Modules and the info block are placed on this physical alignment.
pub const MOD_ALIGN: u64 = 0x1000;

pub(crate) fn align_up(value: usize, align: usize) -> usize {
    value.next_multiple_of(align)
}
