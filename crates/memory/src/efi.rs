use alloc::vec::Vec;

use bitflags::bitflags;

use crate::PhysAddr;

bitflags! {
    /// Memory attribute bits of an EFI memory descriptor (UEFI spec 2.x).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EfiAttributes: u64 {
        const UC = 1 << 0;
        const WC = 1 << 1;
        const WT = 1 << 2;
        const WB = 1 << 3;
        const UCE = 1 << 4;
        const WP = 1 << 12;
        const RP = 1 << 13;
        const XP = 1 << 14;
        const NV = 1 << 15;
        const MORE_RELIABLE = 1 << 16;
        const RO = 1 << 17;
        const RUNTIME = 1 << 63;
    }
}

/// Memory types of an EFI memory descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfiMemoryKind {
    Reserved,
    LoaderCode,
    LoaderData,
    BootServicesCode,
    BootServicesData,
    RuntimeServicesCode,
    RuntimeServicesData,
    Conventional,
    Unusable,
    AcpiReclaim,
    AcpiNvs,
    MemoryMappedIo,
    MemoryMappedIoPortSpace,
    PalCode,
    Unknown(u32),
}

impl From<u32> for EfiMemoryKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Reserved,
            1 => Self::LoaderCode,
            2 => Self::LoaderData,
            3 => Self::BootServicesCode,
            4 => Self::BootServicesData,
            5 => Self::RuntimeServicesCode,
            6 => Self::RuntimeServicesData,
            7 => Self::Conventional,
            8 => Self::Unusable,
            9 => Self::AcpiReclaim,
            10 => Self::AcpiNvs,
            11 => Self::MemoryMappedIo,
            12 => Self::MemoryMappedIoPortSpace,
            13 => Self::PalCode,
            other => Self::Unknown(other),
        }
    }
}

/// One entry of the firmware memory map.
#[derive(Debug, Clone, Copy)]
pub struct EfiMemoryDescriptor {
    pub kind: EfiMemoryKind,
    pub physical_start: PhysAddr,
    pub virtual_start: u64,
    pub number_of_pages: u64,
    pub attributes: EfiAttributes,
}

impl EfiMemoryDescriptor {
    pub fn size(&self) -> u64 {
        self.number_of_pages << crate::PAGE_SHIFT
    }

    pub fn end(&self) -> PhysAddr {
        self.physical_start + self.size()
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

/// Decodes a raw `GetMemoryMap` buffer into descriptors.
///
/// The buffer holds entries strided by `descriptor_size`, which may be
/// larger than the fields we read (firmware revisions append fields).
///
/// Some 32-bit firmware (observed on qemu and vbox) stores the 64-bit
/// descriptor fields in the high word. `Attribute` can never be zero, so
/// when the low word of the first entry's attributes is zero, every 64-bit
/// field of every entry is shifted down by 32 bits.
pub fn parse_efi_memory_map(buf: &[u8], descriptor_size: usize) -> Vec<EfiMemoryDescriptor> {
    assert!(descriptor_size >= 40, "descriptor size too small");

    let count = buf.len() / descriptor_size;
    let mut entries = Vec::with_capacity(count);

    let first_attr = if count > 0 { read_u64(buf, 32) } else { 0 };
    let shift = if count > 0 && first_attr & 0xffff_ffff == 0 {
        32
    } else {
        0
    };

    for i in 0..count {
        let off = i * descriptor_size;
        let kind = EfiMemoryKind::from(read_u32(buf, off));
        let physical_start = read_u64(buf, off + 8) >> shift;
        let virtual_start = read_u64(buf, off + 16) >> shift;
        let number_of_pages = read_u64(buf, off + 24) >> shift;
        let attributes = EfiAttributes::from_bits_truncate(read_u64(buf, off + 32) >> shift);

        entries.push(EfiMemoryDescriptor {
            kind,
            physical_start: PhysAddr::new(physical_start),
            virtual_start,
            number_of_pages,
            attributes,
        });
    }

    entries
}
