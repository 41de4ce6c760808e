use alloc::vec::Vec;
use core::fmt;

use log::info;
use memory::{MemoryMapSnapshot, PhysAddr};

use crate::{
    align_up, BasicMemInfo, EfiMemoryMapInfo, FramebufferInfo, ImageDescriptor, InfoTag,
    ModuleDescriptor, RsdpDescriptor, TagWriter, WriteError, MOD_ALIGN, TAG_ALIGN,
};

/// Which flavor of optional tags the info block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Basic memory info, no firmware tags.
    Bios,
    /// System table pointer, framebuffer, firmware memory map.
    Efi,
}

/// Everything the builder needs to size and write one info block.
pub struct BootInfoRequest<'a> {
    pub platform: Platform,
    pub cmdline: &'a str,
    pub loader_name: &'a str,
    pub image: &'a ImageDescriptor,
    pub modules: &'a [ModuleDescriptor],
    pub snapshot: &'a MemoryMapSnapshot,
    pub basic_meminfo: Option<BasicMemInfo>,
    pub rsdp: Option<&'a RsdpDescriptor>,
    pub efi_system_table: Option<u64>,
    pub framebuffer: Option<&'a FramebufferInfo>,
    /// Full firmware memory-map tag size bound from `efi_mmap_size_hint`.
    pub efi_mmap_hint: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// No module carries the `rootfs` type label (or there are no
    /// modules at all). The kernel cannot mount root; abort this boot.
    NoRootFsModule,
    /// No system memory snapshot was captured for the image.
    NoMemoryMap,
    /// BIOS info block without basic memory amounts.
    MissingBasicMemInfo,
    /// EFI info block without a system table pointer.
    MissingSystemTable,
    /// EFI info block without a firmware memory map (or size bound).
    MissingEfiMemoryMap,
    /// A component would be placed above what 32-bit tag fields encode.
    AddressOverflow(PhysAddr),
    Write(WriteError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::NoRootFsModule => write!(f, "no rootfs module provided"),
            BuildError::NoMemoryMap => write!(f, "no memory smap"),
            BuildError::MissingBasicMemInfo => write!(f, "no basic memory info"),
            BuildError::MissingSystemTable => write!(f, "no firmware system table pointer"),
            BuildError::MissingEfiMemoryMap => write!(f, "no firmware memory map"),
            BuildError::AddressOverflow(addr) => {
                write!(f, "component at {} not addressable by info block", addr)
            }
            BuildError::Write(err) => write!(f, "{}", err),
        }
    }
}

impl From<WriteError> for BuildError {
    fn from(err: WriteError) -> Self {
        BuildError::Write(err)
    }
}

/// Final physical addresses of one module.
#[derive(Debug, Clone, Copy)]
pub struct ModulePlacement {
    pub start: PhysAddr,
    pub end: PhysAddr,
}

/// Final physical placement of every boot component: kernel at its
/// demanded load address, modules on page boundaries after it, the info
/// block on the next page boundary after the last module.
#[derive(Debug, Clone)]
pub struct PhysicalLayout {
    pub kernel: PhysAddr,
    pub modules: Vec<ModulePlacement>,
    pub info_block: PhysAddr,
}

impl PhysicalLayout {
    fn compute(image: &ImageDescriptor, modules: &[ModuleDescriptor]) -> Self {
        let kernel = image.load_addr();
        let mut next = (kernel + image.size).align_up(MOD_ALIGN);

        let mut placements = Vec::with_capacity(modules.len());
        for module in modules {
            let start = next;
            let end = start + module.size;
            next = end.align_up(MOD_ALIGN);
            placements.push(ModulePlacement { start, end });
        }

        Self {
            kernel,
            modules: placements,
            info_block: next,
        }
    }
}

/// Builds one boot information block: validate, size, write. Strictly
/// sequential, one instance per boot attempt.
pub struct InfoBlockBuilder<'a> {
    request: BootInfoRequest<'a>,
    layout: PhysicalLayout,
}

impl<'a> InfoBlockBuilder<'a> {
    pub fn new(request: BootInfoRequest<'a>) -> Result<Self, BuildError> {
        if !request.modules.iter().any(|module| module.is_rootfs()) {
            return Err(BuildError::NoRootFsModule);
        }

        if request.snapshot.is_empty() {
            return Err(BuildError::NoMemoryMap);
        }

        match request.platform {
            Platform::Bios => {
                if request.basic_meminfo.is_none() {
                    return Err(BuildError::MissingBasicMemInfo);
                }
            }
            Platform::Efi => {
                if request.efi_system_table.is_none() {
                    return Err(BuildError::MissingSystemTable);
                }
                if request.efi_mmap_hint.is_none() {
                    return Err(BuildError::MissingEfiMemoryMap);
                }
            }
        }

        let layout = PhysicalLayout::compute(request.image, request.modules);

        Ok(Self { request, layout })
    }

    pub fn layout(&self) -> &PhysicalLayout {
        &self.layout
    }

    /// The tag sequence, in write order. The firmware memory map is
    /// passed in only for the write pass; it stays last before END since
    /// it is fetched at the latest possible moment.
    fn tags<'s>(
        &'s self,
        efi_mmap: Option<&'s EfiMemoryMapInfo>,
    ) -> Result<Vec<InfoTag<'s>>, BuildError> {
        let request = &self.request;
        let mut tags = Vec::new();

        tags.push(InfoTag::Cmdline(request.cmdline));
        tags.push(InfoTag::BootLoaderName(request.loader_name));

        if request.platform == Platform::Bios {
            // checked in new()
            let meminfo = request.basic_meminfo.ok_or(BuildError::MissingBasicMemInfo)?;
            tags.push(InfoTag::BasicMemInfo(meminfo));
        }

        for (module, placement) in request.modules.iter().zip(&self.layout.modules) {
            tags.push(InfoTag::Module {
                module,
                mod_start: addr_to_u32(placement.start)?,
                mod_end: addr_to_u32(placement.end)?,
            });
        }

        tags.push(InfoTag::MemoryMap(request.snapshot));

        if let Some(rsdp) = request.rsdp {
            if rsdp.revision() == 0 {
                tags.push(InfoTag::AcpiOld(rsdp));
            } else {
                tags.push(InfoTag::AcpiNew(rsdp));
            }
        }

        if request.platform == Platform::Efi {
            let pointer = request.efi_system_table.ok_or(BuildError::MissingSystemTable)?;
            tags.push(InfoTag::EfiSystemTable(pointer));

            if let Some(fb) = request.framebuffer {
                tags.push(InfoTag::Framebuffer(fb));
            }

            if let Some(info) = efi_mmap {
                tags.push(InfoTag::EfiMemoryMap(info));
            }
        }

        tags.push(InfoTag::End);

        Ok(tags)
    }

    /// Exact byte count the write pass will produce, except that on EFI
    /// the firmware memory-map tag is an upper bound (the map grows once
    /// the info block itself is allocated).
    pub fn size_hint(&self) -> Result<usize, BuildError> {
        // block header: total_size, reserved
        let mut size = 8;

        for tag in self.tags(None)? {
            size += tag.aligned_size();
        }

        if self.request.platform == Platform::Efi {
            let hint = self.request.efi_mmap_hint.ok_or(BuildError::MissingEfiMemoryMap)?;
            size += align_up(hint, TAG_ALIGN as usize);
        }

        Ok(size)
    }

    /// Writes the block into `buf` and returns `total_size`. On EFI the
    /// caller passes the just-fetched firmware memory map.
    pub fn write(
        &self,
        buf: &mut [u8],
        efi_mmap: Option<&EfiMemoryMapInfo>,
    ) -> Result<usize, BuildError> {
        if self.request.platform == Platform::Efi && efi_mmap.is_none() {
            return Err(BuildError::MissingEfiMemoryMap);
        }

        let mut writer = TagWriter::new(buf);
        writer.allocate(8)?;

        for tag in self.tags(efi_mmap)? {
            let at = writer.position();
            debug_assert!(at % TAG_ALIGN as usize == 0);

            tag.write(&mut writer)?;

            // any size/write divergence is a defect in the shared tag
            // description, not a runtime condition
            debug_assert_eq!(writer.position() - at, tag.aligned_size());
        }

        let total = writer.position();
        writer.patch(0, &(total as u32).to_le_bytes());
        writer.patch(4, &0u32.to_le_bytes());

        info!(
            "boot info block: {} tags, {} bytes, {} modules",
            self.tags(efi_mmap)?.len(),
            total,
            self.request.modules.len()
        );

        Ok(total)
    }
}

fn addr_to_u32(addr: PhysAddr) -> Result<u32, BuildError> {
    u32::try_from(addr.to_inner()).map_err(|_| BuildError::AddressOverflow(addr))
}
