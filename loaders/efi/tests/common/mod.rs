//! Vec-backed firmware stand-in: 128 MiB of flat physical memory, a
//! synthesized memory map and page-granular allocation, enough to run
//! the whole boot path on the host.

use efi_loader::{FileError, Firmware, FirmwareError, ImageFile, RawMemoryMap};
use memory::{PhysAddr, PAGE_SIZE};
use multiboot2::{FramebufferInfo, RsdpDescriptor};

pub const MEM_SIZE: u64 = 0x0800_0000;

const KIND_RESERVED: u32 = 0;
const KIND_LOADER_DATA: u32 = 2;
const KIND_CONVENTIONAL: u32 = 7;

pub struct MockFirmware {
    pub memory: Vec<u8>,
    /// Live allocations as (first page, page count).
    pub allocations: Vec<(u64, u64)>,
    pub exited: bool,
    pub map_key: usize,
    pub system_table: u64,
    pub rsdp: Option<RsdpDescriptor>,
    pub framebuffer: Option<FramebufferInfo>,
}

impl MockFirmware {
    pub fn new() -> Self {
        Self {
            memory: vec![0u8; MEM_SIZE as usize],
            allocations: Vec::new(),
            exited: false,
            map_key: 0,
            system_table: 0x07f0_0000,
            rsdp: None,
            framebuffer: None,
        }
    }

    pub fn read(&self, addr: u64, len: usize) -> &[u8] {
        &self.memory[addr as usize..addr as usize + len]
    }

    /// Per-page memory kinds: conventional everywhere except a reserved
    /// hole below 1 MiB and the live allocations.
    fn page_kinds(&self) -> Vec<u32> {
        let pages = (MEM_SIZE / PAGE_SIZE) as usize;
        let mut kinds = vec![KIND_CONVENTIONAL; pages];

        for kind in kinds.iter_mut().take(0x100).skip(0x9f) {
            *kind = KIND_RESERVED;
        }

        for (start, count) in &self.allocations {
            for page in *start..start + count {
                kinds[page as usize] = KIND_LOADER_DATA;
            }
        }

        kinds
    }

    fn assert_services(&self, op: &str) {
        assert!(!self.exited, "{} called after exit_boot_services", op);
    }
}

impl Firmware for MockFirmware {
    fn memory_map(&mut self) -> Result<RawMemoryMap, FirmwareError> {
        self.assert_services("memory_map");

        let kinds = self.page_kinds();
        let mut buffer = Vec::new();

        let mut run_start = 0usize;
        for page in 1..=kinds.len() {
            if page < kinds.len() && kinds[page] == kinds[run_start] {
                continue;
            }

            // 48-byte descriptor stride, as common firmware uses
            buffer.extend(kinds[run_start].to_le_bytes());
            buffer.extend([0u8; 4]);
            buffer.extend((run_start as u64 * PAGE_SIZE).to_le_bytes());
            buffer.extend(0u64.to_le_bytes());
            buffer.extend(((page - run_start) as u64).to_le_bytes());
            buffer.extend(0xfu64.to_le_bytes());
            buffer.extend([0u8; 8]);

            run_start = page;
        }

        self.map_key += 1;
        Ok(RawMemoryMap {
            buffer,
            descriptor_size: 48,
            descriptor_version: 1,
            key: self.map_key,
        })
    }

    fn allocate_pages(
        &mut self,
        max_addr: PhysAddr,
        pages: u64,
    ) -> Result<PhysAddr, FirmwareError> {
        self.assert_services("allocate_pages");

        let kinds = self.page_kinds();
        let limit = ((max_addr.to_inner() + 1) / PAGE_SIZE).min(kinds.len() as u64) as usize;
        let pages = pages as usize;

        if pages == 0 || pages > limit {
            return Err(FirmwareError::InvalidParameter);
        }

        // top down, page 0 stays untouched
        for start in (1..=limit - pages).rev() {
            if kinds[start..start + pages]
                .iter()
                .all(|kind| *kind == KIND_CONVENTIONAL)
            {
                self.allocations.push((start as u64, pages as u64));
                return Ok(PhysAddr::new(start as u64 * PAGE_SIZE));
            }
        }

        Err(FirmwareError::OutOfResources)
    }

    fn free_pages(&mut self, addr: PhysAddr, pages: u64) {
        self.assert_services("free_pages");

        let start = addr.to_inner() / PAGE_SIZE;
        let before = self.allocations.len();
        self.allocations
            .retain(|alloc| *alloc != (start, pages));
        assert_eq!(before, self.allocations.len() + 1, "free of unknown pages");
    }

    fn exit_boot_services(&mut self, key: usize) -> Result<(), FirmwareError> {
        self.assert_services("exit_boot_services");

        if key != self.map_key {
            return Err(FirmwareError::InvalidParameter);
        }

        self.exited = true;
        Ok(())
    }

    fn system_table_addr(&self) -> u64 {
        self.system_table
    }

    fn rsdp(&self) -> Option<RsdpDescriptor> {
        self.rsdp.clone()
    }

    fn framebuffer(&self) -> Option<FramebufferInfo> {
        self.framebuffer.clone()
    }

    fn staging_slice(&mut self, addr: PhysAddr, len: usize) -> &mut [u8] {
        let start = addr.to_inner() as usize;
        &mut self.memory[start..start + len]
    }

    fn memmove(&mut self, dest: PhysAddr, src: PhysAddr, size: u64) {
        let src = src.to_inner() as usize;
        let dest = dest.to_inner() as usize;
        self.memory.copy_within(src..src + size as usize, dest);
    }
}

pub struct MockFile(pub Vec<u8>);

impl ImageFile for MockFile {
    fn size(&self) -> u64 {
        self.0.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), FileError> {
        let start = offset as usize;
        if start + buf.len() > self.0.len() {
            return Err(FileError::ShortRead {
                offset,
                wanted: buf.len(),
            });
        }
        buf.copy_from_slice(&self.0[start..start + buf.len()]);
        Ok(())
    }
}

/// Reports a larger size than it can deliver, so reads beyond the
/// actual data fail the way a dying disk would.
pub struct TruncatedFile {
    pub data: Vec<u8>,
    pub reported: u64,
}

impl ImageFile for TruncatedFile {
    fn size(&self) -> u64 {
        self.reported
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), FileError> {
        let start = offset as usize;
        if start + buf.len() > self.data.len() {
            return Err(FileError::ShortRead {
                offset,
                wanted: buf.len(),
            });
        }
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

fn push_tag(data: &mut Vec<u8>, tag_type: u16, payload: &[u8]) {
    data.extend(tag_type.to_le_bytes());
    data.extend(0u16.to_le_bytes());
    data.extend((8 + payload.len() as u32).to_le_bytes());
    data.extend(payload);
    while data.len() % 8 != 0 {
        data.push(0);
    }
}

/// A synthetic kernel image with a valid multiboot2 header and `0x5a`
/// filler up to `total_size`.
pub fn kernel_image(load_addr: u32, entry_addr: u32, total_size: usize) -> Vec<u8> {
    kernel_image_with(load_addr, entry_addr, total_size, false)
}

pub fn kernel_image_with(
    load_addr: u32,
    entry_addr: u32,
    total_size: usize,
    keep_boot_services: bool,
) -> Vec<u8> {
    let architecture = 0u32;
    let header_length = 64u32;
    let checksum = 0u32
        .wrapping_sub(multiboot2::HEADER_MAGIC)
        .wrapping_sub(architecture)
        .wrapping_sub(header_length);

    let mut data = Vec::new();
    data.extend(multiboot2::HEADER_MAGIC.to_le_bytes());
    data.extend(architecture.to_le_bytes());
    data.extend(header_length.to_le_bytes());
    data.extend(checksum.to_le_bytes());

    let mut address = Vec::new();
    address.extend(0u32.to_le_bytes());
    address.extend(load_addr.to_le_bytes());
    address.extend(0u32.to_le_bytes());
    address.extend(0u32.to_le_bytes());
    push_tag(&mut data, 2, &address);

    push_tag(&mut data, 3, &entry_addr.to_le_bytes());

    if keep_boot_services {
        push_tag(&mut data, 7, &[]);
    }

    push_tag(&mut data, 0, &[]);

    assert!(total_size >= data.len());
    data.resize(total_size, 0x5a);
    data
}

/// Walks a written info block, yielding `(type, size, offset)` per tag.
pub fn walk_tags(buf: &[u8]) -> Vec<(u32, usize, usize)> {
    let total = read_u32(buf, 0) as usize;
    let mut tags = Vec::new();
    let mut off = 8;
    loop {
        assert!(off < total, "tag list not terminated within total_size");
        let tag_type = read_u32(buf, off);
        let size = read_u32(buf, off + 4) as usize;
        tags.push((tag_type, size, off));
        if tag_type == 0 {
            break;
        }
        off += (size + 7) & !7;
    }
    tags
}

pub fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}
