use alloc::string::{String, ToString};
use alloc::vec;

use log::info;
use memory::MemoryMapSnapshot;
use multiboot2::{scan_header, ImageDescriptor, ModuleDescriptor, HEADER_SEARCH};

use crate::error::{FileError, LoadError};
use crate::firmware::Firmware;
use crate::staging::StagingAllocator;

/// A readable boot file. The actual sources (disk, network, memory)
/// live with the platform bindings.
pub trait ImageFile {
    fn size(&self) -> u64;
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), FileError>;
}

fn file_error(name: &str, err: FileError) -> LoadError {
    LoadError::File {
        name: name.to_string(),
        err,
    }
}

/// Validates a candidate kernel image and stages it whole. The header
/// scan runs over the first 32 KiB before any memory is committed; the
/// descriptor also captures a system memory snapshot for the memory-map
/// tag.
pub fn load_image(
    firmware: &mut impl Firmware,
    staging: &mut StagingAllocator,
    file: &mut impl ImageFile,
    name: &str,
) -> Result<ImageDescriptor, LoadError> {
    let size = file.size();

    let head_len = size.min(HEADER_SEARCH as u64) as usize;
    let mut head = vec![0u8; head_len];
    file.read_at(0, &mut head)
        .map_err(|err| file_error(name, err))?;

    let hints = scan_header(&head)?;

    info!(
        "{}: multiboot2, load {} entry {}{}",
        name,
        hints.load_addr,
        hints.entry_addr,
        if hints.keep_boot_services {
            ", keeps boot services"
        } else {
            ""
        }
    );

    let addr = staging.acquire(firmware, size)?;
    if let Err(err) = file.read_at(0, firmware.staging_slice(addr, size as usize)) {
        staging.release(firmware, addr);
        return Err(file_error(name, err));
    }

    let raw = match firmware.memory_map() {
        Ok(raw) => raw,
        Err(err) => {
            staging.release(firmware, addr);
            return Err(LoadError::Firmware {
                op: "memory_map",
                err,
            });
        }
    };
    let smap = MemoryMapSnapshot::from_descriptors(&raw.descriptors());

    Ok(ImageDescriptor {
        name: String::from(name),
        addr,
        size,
        hints,
        smap,
    })
}

/// Stages one module file.
pub fn load_module(
    firmware: &mut impl Firmware,
    staging: &mut StagingAllocator,
    file: &mut impl ImageFile,
    name: &str,
    mod_type: &str,
    args: Option<&str>,
) -> Result<ModuleDescriptor, LoadError> {
    let size = file.size();
    let addr = staging.acquire(firmware, size)?;

    if let Err(err) = file.read_at(0, firmware.staging_slice(addr, size as usize)) {
        staging.release(firmware, addr);
        return Err(file_error(name, err));
    }

    info!("{}: {} bytes staged at {}", name, size, addr);

    Ok(ModuleDescriptor {
        name: String::from(name),
        mod_type: String::from(mod_type),
        args: args.map(String::from),
        addr,
        size,
    })
}
