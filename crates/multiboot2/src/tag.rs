use memory::MemoryMapSnapshot;

use crate::{
    align_up,
    writer::{put_u32, put_u64},
    BasicMemInfo, EfiMemoryMapInfo, FramebufferInfo, ModuleDescriptor, RsdpDescriptor, TagWriter,
    WriteError, TAG_ALIGN,
};

pub(crate) const TAG_TYPE_END: u32 = 0;
pub(crate) const TAG_TYPE_CMDLINE: u32 = 1;
pub(crate) const TAG_TYPE_BOOT_LOADER_NAME: u32 = 2;
pub(crate) const TAG_TYPE_MODULE: u32 = 3;
pub(crate) const TAG_TYPE_BASIC_MEMINFO: u32 = 4;
pub(crate) const TAG_TYPE_MMAP: u32 = 6;
pub(crate) const TAG_TYPE_FRAMEBUFFER: u32 = 8;
pub(crate) const TAG_TYPE_EFI64: u32 = 12;
pub(crate) const TAG_TYPE_ACPI_OLD: u32 = 14;
pub(crate) const TAG_TYPE_ACPI_NEW: u32 = 15;
pub(crate) const TAG_TYPE_EFI_MMAP: u32 = 17;

/// Size of one memory map tag entry: u64 base, u64 length, u32 type,
/// u32 reserved zero.
const MMAP_ENTRY_SIZE: usize = 24;

/// One info block tag. Each variant knows its exact encoded size and how
/// to write itself, so the size pass and the write pass cannot diverge.
pub enum InfoTag<'a> {
    Cmdline(&'a str),
    BootLoaderName(&'a str),
    BasicMemInfo(BasicMemInfo),
    Module {
        module: &'a ModuleDescriptor,
        mod_start: u32,
        mod_end: u32,
    },
    MemoryMap(&'a MemoryMapSnapshot),
    AcpiOld(&'a RsdpDescriptor),
    AcpiNew(&'a RsdpDescriptor),
    EfiSystemTable(u64),
    Framebuffer(&'a FramebufferInfo),
    EfiMemoryMap(&'a EfiMemoryMapInfo),
    End,
}

impl InfoTag<'_> {
    pub fn tag_type(&self) -> u32 {
        match self {
            InfoTag::Cmdline(_) => TAG_TYPE_CMDLINE,
            InfoTag::BootLoaderName(_) => TAG_TYPE_BOOT_LOADER_NAME,
            InfoTag::BasicMemInfo(_) => TAG_TYPE_BASIC_MEMINFO,
            InfoTag::Module { .. } => TAG_TYPE_MODULE,
            InfoTag::MemoryMap(_) => TAG_TYPE_MMAP,
            InfoTag::AcpiOld(_) => TAG_TYPE_ACPI_OLD,
            InfoTag::AcpiNew(_) => TAG_TYPE_ACPI_NEW,
            InfoTag::EfiSystemTable(_) => TAG_TYPE_EFI64,
            InfoTag::Framebuffer(_) => TAG_TYPE_FRAMEBUFFER,
            InfoTag::EfiMemoryMap(_) => TAG_TYPE_EFI_MMAP,
            InfoTag::End => TAG_TYPE_END,
        }
    }

    /// Exact encoded size including the 8-byte tag header, before
    /// alignment padding.
    pub fn size(&self) -> usize {
        match self {
            InfoTag::Cmdline(s) | InfoTag::BootLoaderName(s) => 8 + s.len() + 1,
            InfoTag::BasicMemInfo(_) => 16,
            InfoTag::Module { module, .. } => 16 + module.cmdline_len(),
            InfoTag::MemoryMap(snapshot) => 16 + snapshot.len() * MMAP_ENTRY_SIZE,
            InfoTag::AcpiOld(rsdp) | InfoTag::AcpiNew(rsdp) => 8 + rsdp.body().len(),
            InfoTag::EfiSystemTable(_) => 16,
            InfoTag::Framebuffer(_) => 40,
            InfoTag::EfiMemoryMap(info) => 16 + info.buffer.len(),
            InfoTag::End => 8,
        }
    }

    /// Cursor advance this tag causes.
    pub fn aligned_size(&self) -> usize {
        align_up(self.size(), TAG_ALIGN as usize)
    }

    pub fn write(&self, writer: &mut TagWriter) -> Result<(), WriteError> {
        let size = self.size();
        let buf = writer.allocate(size)?;

        put_u32(buf, 0, self.tag_type());
        put_u32(buf, 4, size as u32);

        match self {
            InfoTag::Cmdline(s) | InfoTag::BootLoaderName(s) => {
                buf[8..8 + s.len()].copy_from_slice(s.as_bytes());
                buf[8 + s.len()] = 0;
            }
            InfoTag::BasicMemInfo(info) => {
                put_u32(buf, 8, info.mem_lower);
                put_u32(buf, 12, info.mem_upper);
            }
            InfoTag::Module {
                module,
                mod_start,
                mod_end,
            } => {
                put_u32(buf, 8, *mod_start);
                put_u32(buf, 12, *mod_end);

                let mut off = 16;
                for piece in [module.name.as_bytes(), b" type=", module.mod_type.as_bytes()] {
                    buf[off..off + piece.len()].copy_from_slice(piece);
                    off += piece.len();
                }
                if let Some(args) = &module.args {
                    buf[off] = b' ';
                    off += 1;
                    buf[off..off + args.len()].copy_from_slice(args.as_bytes());
                    off += args.len();
                }
                buf[off] = 0;
                debug_assert_eq!(off + 1, size);
            }
            InfoTag::MemoryMap(snapshot) => {
                put_u32(buf, 8, MMAP_ENTRY_SIZE as u32); // entry_size
                put_u32(buf, 12, 0); // entry_version

                let mut off = 16;
                for entry in snapshot.entries() {
                    put_u64(buf, off, entry.base);
                    put_u64(buf, off + 8, entry.length);
                    put_u32(buf, off + 16, entry.kind.to_u32());
                    put_u32(buf, off + 20, 0);
                    off += MMAP_ENTRY_SIZE;
                }
            }
            InfoTag::AcpiOld(rsdp) | InfoTag::AcpiNew(rsdp) => {
                buf[8..8 + rsdp.body().len()].copy_from_slice(rsdp.body());
            }
            InfoTag::EfiSystemTable(pointer) => {
                put_u64(buf, 8, *pointer);
            }
            InfoTag::Framebuffer(fb) => {
                put_u64(buf, 8, fb.addr);
                put_u32(buf, 16, fb.pitch);
                put_u32(buf, 20, fb.width);
                put_u32(buf, 24, fb.height);
                buf[28] = fb.bpp;
                buf[29] = 1; // direct RGB
                buf[30] = 0;
                buf[31] = 0;
                buf[32] = fb.red_field_position;
                buf[33] = fb.red_mask_size;
                buf[34] = fb.green_field_position;
                buf[35] = fb.green_mask_size;
                buf[36] = fb.blue_field_position;
                buf[37] = fb.blue_mask_size;
            }
            InfoTag::EfiMemoryMap(info) => {
                put_u32(buf, 8, info.descriptor_size);
                put_u32(buf, 12, info.descriptor_version);
                buf[16..16 + info.buffer.len()].copy_from_slice(&info.buffer);
            }
            InfoTag::End => {}
        }

        Ok(())
    }
}

/// Upper bound for the firmware memory-map tag, computed before the info
/// block is allocated. The map grows once we allocate, so the probed size
/// gets three pages of slack, rounded to whole descriptors.
pub fn efi_mmap_size_hint(probed_bytes: usize, descriptor_size: usize) -> usize {
    let mut size = probed_bytes + 3 * memory::PAGE_SIZE as usize;
    size = align_up(size, descriptor_size);
    16 + size
}
