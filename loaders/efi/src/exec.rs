use log::info;
use memory::PhysAddr;
use relocation::{Chunk, ChunkList, Mover, Relocator, ScratchRegion};

use multiboot2::{
    efi_mmap_size_hint, BootInfoRequest, EfiMemoryMapInfo, ImageDescriptor, InfoBlockBuilder,
    ModuleDescriptor, Platform, BOOTLOADER_MAGIC,
};

use crate::cmdline::kernel_cmdline;
use crate::env::Environment;
use crate::error::LoadError;
use crate::firmware::{Firmware, FirmwareError};
use crate::staging::StagingAllocator;

const LOADER_NAME: &str = "illumos-loader";

/// What the external trampoline needs to start the kernel: the protocol
/// magic for a register, the final info block address for another, the
/// entry point to jump to, and the scratch pages holding its code and
/// stack. Control never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandOffFrame {
    pub magic: u32,
    pub info_block: PhysAddr,
    pub entry: PhysAddr,
    pub scratch: ScratchRegion,
}

struct FirmwareMover<'a, F: Firmware>(&'a mut F);

impl<F: Firmware> Mover for FirmwareMover<'_, F> {
    fn memmove(&mut self, dest: PhysAddr, src: PhysAddr, size: u64) {
        self.0.memmove(dest, src, size);
    }
}

/// Address-only mover for checking a move plan ahead of time.
struct DryRun;

impl Mover for DryRun {
    fn memmove(&mut self, _dest: PhysAddr, _src: PhysAddr, _size: u64) {}
}

struct Prepared {
    chunks: ChunkList,
    info_block: PhysAddr,
    scratch: ScratchRegion,
    map_key: usize,
}

fn firmware_err(op: &'static str) -> impl FnOnce(FirmwareError) -> LoadError {
    move |err| LoadError::Firmware { op, err }
}

/// Runs a staged boot to the point of hand-off: assemble the command
/// line and the info block, surrender boot services, move everything to
/// its final physical layout. On any error before the surrender all
/// staging memory is released and the firmware is still usable.
pub fn exec(
    firmware: &mut impl Firmware,
    staging: &mut StagingAllocator,
    env: &Environment,
    image: &ImageDescriptor,
    modules: &[ModuleDescriptor],
) -> Result<HandOffFrame, LoadError> {
    let prepared = match prepare(firmware, staging, env, image, modules) {
        Ok(prepared) => prepared,
        Err(err) => {
            staging.release_all(firmware);
            return Err(err);
        }
    };

    if !image.hints.keep_boot_services {
        if let Err(err) = firmware.exit_boot_services(prepared.map_key) {
            staging.release_all(firmware);
            return Err(LoadError::Firmware {
                op: "exit_boot_services",
                err,
            });
        }
    }

    // Point of no return. The plan was already checked for cycles, so
    // this cannot fail; the chunk walk only touches raw memory.
    let mut mover = FirmwareMover(firmware);
    Relocator::new(prepared.chunks).run(&mut mover)?;

    // the moved components now belong to the kernel
    staging.forget();

    info!(
        "hand-off: entry {} info block {}",
        image.entry_addr(),
        prepared.info_block
    );

    Ok(HandOffFrame {
        magic: BOOTLOADER_MAGIC,
        info_block: prepared.info_block,
        entry: image.entry_addr(),
        scratch: prepared.scratch,
    })
}

fn prepare(
    firmware: &mut impl Firmware,
    staging: &mut StagingAllocator,
    env: &Environment,
    image: &ImageDescriptor,
    modules: &[ModuleDescriptor],
) -> Result<Prepared, LoadError> {
    let cmdline = kernel_cmdline(&image.name, env);
    info!("command line: {}", cmdline);

    // probe fetch, only for the memory-map tag upper bound
    let probe = firmware.memory_map().map_err(firmware_err("memory_map"))?;
    let mmap_hint = efi_mmap_size_hint(probe.buffer.len(), probe.descriptor_size);

    let rsdp = firmware.rsdp();
    let framebuffer = firmware.framebuffer();

    let builder = InfoBlockBuilder::new(BootInfoRequest {
        platform: Platform::Efi,
        cmdline: &cmdline,
        loader_name: LOADER_NAME,
        image,
        modules,
        snapshot: &image.smap,
        basic_meminfo: None,
        rsdp: rsdp.as_ref(),
        efi_system_table: Some(firmware.system_table_addr()),
        framebuffer: framebuffer.as_ref(),
        efi_mmap_hint: Some(mmap_hint),
    })?;

    let estimate = builder.size_hint()?;
    let staged_info = staging.acquire(firmware, estimate as u64)?;

    // final fetch, its key is what the surrender call wants
    let raw = firmware.memory_map().map_err(firmware_err("memory_map"))?;
    let efi_mmap = EfiMemoryMapInfo {
        descriptor_size: raw.descriptor_size as u32,
        descriptor_version: raw.descriptor_version,
        buffer: raw.buffer.clone(),
    };

    let written = builder.write(
        firmware.staging_slice(staged_info, estimate),
        Some(&efi_mmap),
    )?;

    let scratch = ScratchRegion::find(&raw.descriptors(), image.load_addr())
        .ok_or(LoadError::NoScratchRegion)?;
    info!("scratch region {}..{}", scratch.base(), scratch.end());

    let layout = builder.layout();
    info!(
        "layout: kernel {} info block {} ({} modules)",
        layout.kernel,
        layout.info_block,
        layout.modules.len()
    );

    let mut chunks = ChunkList::new();
    chunks
        .try_push(Chunk::new(image.addr, layout.kernel, image.size))
        .map_err(|_| LoadError::TooManyComponents)?;
    for (module, placement) in modules.iter().zip(&layout.modules) {
        chunks
            .try_push(Chunk::new(module.addr, placement.start, module.size))
            .map_err(|_| LoadError::TooManyComponents)?;
    }
    chunks
        .try_push(Chunk::new(staged_info, layout.info_block, written as u64))
        .map_err(|_| LoadError::TooManyComponents)?;

    debug_assert!(!chunks
        .iter()
        .any(|chunk| scratch.overlaps(chunk.target, chunk.target + chunk.size)));

    // detect an unmovable layout while the firmware can still clean up
    Relocator::new(chunks.clone()).run(&mut DryRun)?;

    Ok(Prepared {
        chunks,
        info_block: layout.info_block,
        scratch,
        map_key: raw.key,
    })
}
