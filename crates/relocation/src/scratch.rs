use memory::{EfiMemoryDescriptor, EfiMemoryKind, PhysAddr, PAGE_SIZE};

/// Pages the scratch region spans: chunk list, trampoline, copy
/// routine, memmove routine, stack.
pub const SCRATCH_PAGES: u64 = 5;

/// A small run of conventional memory below the kernel load address
/// that holds everything relocation needs once boot services are gone.
/// It is picked so that no relocation target can land on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchRegion {
    base: PhysAddr,
}

impl ScratchRegion {
    /// Searches the firmware memory map for the first usable run of
    /// `SCRATCH_PAGES` pages ending at or below `below`. Page 0 is
    /// skipped. Returns `None` when conventional memory is that tight,
    /// which means the machine cannot boot this way at all.
    pub fn find(map: &[EfiMemoryDescriptor], below: PhysAddr) -> Option<Self> {
        for desc in map {
            if desc.kind != EfiMemoryKind::Conventional {
                continue;
            }

            let mut base = desc.physical_start;
            let mut pages = desc.number_of_pages;

            if base.is_zero() {
                base += PAGE_SIZE;
                pages = pages.saturating_sub(1);
            }

            if pages < SCRATCH_PAGES {
                continue;
            }

            if below < base + SCRATCH_PAGES * PAGE_SIZE {
                continue;
            }

            return Some(Self { base });
        }

        None
    }

    pub fn base(&self) -> PhysAddr {
        self.base
    }

    pub fn end(&self) -> PhysAddr {
        self.base + SCRATCH_PAGES * PAGE_SIZE
    }

    /// First page, holds the chunk list the copy routine walks.
    pub fn chunk_list_page(&self) -> PhysAddr {
        self.base
    }

    /// Second page, the mode-switch trampoline.
    pub fn trampoline_page(&self) -> PhysAddr {
        self.base + PAGE_SIZE
    }

    /// Third page, the chunk-walking copy routine.
    pub fn copy_routine_page(&self) -> PhysAddr {
        self.base + 2 * PAGE_SIZE
    }

    /// Fourth page, the raw memmove the copy routine calls.
    pub fn memmove_page(&self) -> PhysAddr {
        self.base + 3 * PAGE_SIZE
    }

    /// Top of the fifth page, grows downward.
    pub fn stack_top(&self) -> PhysAddr {
        self.end() - 8
    }

    pub fn overlaps(&self, start: PhysAddr, end: PhysAddr) -> bool {
        self.base < end && start < self.end()
    }
}
