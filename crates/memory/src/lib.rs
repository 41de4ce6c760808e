#![no_std]

mod efi;
mod paddr;
mod smap;

extern crate alloc;

pub use efi::*;
pub use paddr::*;
pub use smap::*;

pub const PAGE_SHIFT: u64 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Number of pages needed to hold `size` bytes.
pub const fn pages_for(size: u64) -> u64 {
    (size + PAGE_SIZE - 1) >> PAGE_SHIFT
}
