use alloc::vec::Vec;

use log::debug;
use memory::{pages_for, PhysAddr, PAGE_SIZE};
use zeroize::Zeroize;

use crate::error::LoadError;
use crate::firmware::Firmware;

/// Staging stays below 4 GiB so every staged address fits the 32-bit
/// fields of the info block.
pub const STAGING_CEILING: PhysAddr = PhysAddr::new(0xffff_ffff);

/// Page-granular staging memory with bookkeeping for the error path.
/// Acquire never retries; if the firmware cannot satisfy a request the
/// whole boot attempt is abandoned and everything staged so far is
/// released.
pub struct StagingAllocator {
    allocations: Vec<(PhysAddr, u64)>,
}

impl StagingAllocator {
    pub fn new() -> Self {
        Self {
            allocations: Vec::new(),
        }
    }

    pub fn acquire(
        &mut self,
        firmware: &mut impl Firmware,
        bytes: u64,
    ) -> Result<PhysAddr, LoadError> {
        let pages = pages_for(bytes);
        let addr = firmware
            .allocate_pages(STAGING_CEILING, pages)
            .map_err(|err| LoadError::Firmware {
                op: "allocate_pages",
                err,
            })?;

        debug!("staged {} pages at {}", pages, addr);
        self.allocations.push((addr, pages));

        Ok(addr)
    }

    /// Scrubs and frees the allocation starting at `addr`. Used when a
    /// single component fails to stage; allocations made for earlier
    /// components stay live.
    pub fn release(&mut self, firmware: &mut impl Firmware, addr: PhysAddr) {
        if let Some(pos) = self.allocations.iter().position(|(start, _)| *start == addr) {
            let (addr, pages) = self.allocations.remove(pos);
            scrub_and_free(firmware, addr, pages);
        }
    }

    /// Scrubs and frees every staged allocation. Only valid while boot
    /// services are still running.
    pub fn release_all(&mut self, firmware: &mut impl Firmware) {
        for (addr, pages) in self.allocations.drain(..) {
            scrub_and_free(firmware, addr, pages);
        }
    }

    /// Drops the bookkeeping without freeing. Once components reach
    /// their final layout the memory belongs to the kernel.
    pub fn forget(&mut self) {
        self.allocations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

fn scrub_and_free(firmware: &mut impl Firmware, addr: PhysAddr, pages: u64) {
    let len = (pages * PAGE_SIZE) as usize;
    firmware.staging_slice(addr, len).zeroize();
    firmware.free_pages(addr, pages);
}

impl Default for StagingAllocator {
    fn default() -> Self {
        Self::new()
    }
}
