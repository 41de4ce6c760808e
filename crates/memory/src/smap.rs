use alloc::vec::Vec;
use core::fmt;

use crate::{EfiMemoryDescriptor, EfiMemoryKind, PhysAddr};

/// Address range types of the ACPI-style system memory map
/// (ACPI 6.1 Table 15-330).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SmapKind {
    Memory = 1,
    Reserved = 2,
    AcpiReclaim = 3,
    AcpiNvs = 4,
    Bad = 5,
}

impl SmapKind {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }
}

impl From<EfiMemoryKind> for SmapKind {
    fn from(kind: EfiMemoryKind) -> Self {
        match kind {
            EfiMemoryKind::LoaderCode
            | EfiMemoryKind::LoaderData
            | EfiMemoryKind::BootServicesCode
            | EfiMemoryKind::BootServicesData
            | EfiMemoryKind::Conventional => SmapKind::Memory,
            EfiMemoryKind::AcpiReclaim => SmapKind::AcpiReclaim,
            EfiMemoryKind::AcpiNvs => SmapKind::AcpiNvs,
            // unusable memory lands in the reserved bucket, never Bad
            _ => SmapKind::Reserved,
        }
    }
}

/// One merged system memory map entry, with exactly the fields the
/// multiboot2 memory map tag encodes per entry.
#[derive(Debug, Clone, Copy)]
pub struct SmapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: SmapKind,
}

impl SmapEntry {
    pub fn end(&self) -> u64 {
        self.base + self.length
    }
}

impl fmt::Display for SmapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SMAP type={:02x} base={:016x} len={:016x}",
            self.kind.to_u32(),
            self.base,
            self.length
        )
    }
}

/// The system memory map derived from the firmware map, with adjacent
/// runs of the same type merged into single entries.
#[derive(Debug, Clone)]
pub struct MemoryMapSnapshot {
    entries: Vec<SmapEntry>,
}

impl MemoryMapSnapshot {
    /// Builds the snapshot from firmware memory descriptors.
    ///
    /// Page 0 is always reported as normal memory even when the firmware
    /// maps it otherwise (vmware reports it as ACPI reclaimable, ACPI 6.1
    /// wants lower memory reported as normal).
    pub fn from_descriptors(descriptors: &[EfiMemoryDescriptor]) -> Self {
        let mut entries: Vec<SmapEntry> = Vec::new();

        for desc in descriptors {
            let kind = if desc.physical_start.is_zero() {
                SmapKind::Memory
            } else {
                SmapKind::from(desc.kind)
            };

            match entries.last_mut() {
                Some(last) if last.kind == kind && last.end() == desc.physical_start.to_inner() => {
                    last.length += desc.size();
                }
                _ => entries.push(SmapEntry {
                    base: desc.physical_start.to_inner(),
                    length: desc.size(),
                    kind,
                }),
            }
        }

        Self { entries }
    }

    pub fn from_entries(entries: Vec<SmapEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SmapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total usable memory above 1 MiB, in bytes.
    pub fn upper_memory(&self) -> u64 {
        const ONE_MB: u64 = 0x10_0000;

        self.entries
            .iter()
            .filter(|entry| entry.kind == SmapKind::Memory && entry.end() > ONE_MB)
            .map(|entry| entry.end() - entry.base.max(ONE_MB))
            .sum()
    }

    /// Checks whether `[addr, addr + size)` lies inside a single usable entry.
    pub fn is_usable(&self, addr: PhysAddr, size: u64) -> bool {
        let start = addr.to_inner();
        self.entries.iter().any(|entry| {
            entry.kind == SmapKind::Memory
                && entry.base <= start
                && start + size <= entry.end()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EfiAttributes;

    fn desc(kind: EfiMemoryKind, start: u64, pages: u64) -> EfiMemoryDescriptor {
        EfiMemoryDescriptor {
            kind,
            physical_start: PhysAddr::new(start),
            virtual_start: 0,
            number_of_pages: pages,
            attributes: EfiAttributes::WB,
        }
    }

    #[test]
    fn merges_adjacent_runs_of_same_type() {
        let descriptors = [
            desc(EfiMemoryKind::Conventional, 0x0, 16),
            desc(EfiMemoryKind::BootServicesData, 0x10000, 16),
            desc(EfiMemoryKind::Conventional, 0x20000, 16),
            desc(EfiMemoryKind::Reserved, 0x30000, 4),
            desc(EfiMemoryKind::MemoryMappedIo, 0x34000, 4),
        ];

        let snapshot = MemoryMapSnapshot::from_descriptors(&descriptors);

        // loader/boot-services/conventional all map to Memory and are
        // contiguous, reserved and MMIO merge into one reserved run
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.entries()[0].kind, SmapKind::Memory);
        assert_eq!(snapshot.entries()[0].base, 0);
        assert_eq!(snapshot.entries()[0].length, 0x30000);
        assert_eq!(snapshot.entries()[1].kind, SmapKind::Reserved);
        assert_eq!(snapshot.entries()[1].length, 0x8000);
    }

    #[test]
    fn page_zero_forced_usable() {
        let descriptors = [desc(EfiMemoryKind::AcpiReclaim, 0x0, 1)];
        let snapshot = MemoryMapSnapshot::from_descriptors(&descriptors);
        assert_eq!(snapshot.entries()[0].kind, SmapKind::Memory);
    }

    #[test]
    fn unusable_memory_is_reported_reserved() {
        let descriptors = [desc(EfiMemoryKind::Unusable, 0x10000, 1)];
        let snapshot = MemoryMapSnapshot::from_descriptors(&descriptors);
        assert_eq!(snapshot.entries()[0].kind, SmapKind::Reserved);
    }

    #[test]
    fn non_adjacent_runs_stay_split() {
        let descriptors = [
            desc(EfiMemoryKind::Conventional, 0x0, 1),
            desc(EfiMemoryKind::Conventional, 0x10000, 1),
        ];
        let snapshot = MemoryMapSnapshot::from_descriptors(&descriptors);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn usable_range_check() {
        let descriptors = [
            desc(EfiMemoryKind::Conventional, 0x10000, 16),
            desc(EfiMemoryKind::Reserved, 0x20000, 16),
        ];
        let snapshot = MemoryMapSnapshot::from_descriptors(&descriptors);

        assert!(snapshot.is_usable(PhysAddr::new(0x10000), 0x10000));
        assert!(!snapshot.is_usable(PhysAddr::new(0x18000), 0x10000));
        assert!(!snapshot.is_usable(PhysAddr::new(0x20000), 0x1000));
    }
}
