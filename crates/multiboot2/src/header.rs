use core::fmt;

use log::warn;
use memory::PhysAddr;

use crate::{align_up, HEADER_ALIGN, HEADER_MAGIC, HEADER_SEARCH};

const HEADER_TAG_END: u16 = 0;
const HEADER_TAG_INFORMATION_REQUEST: u16 = 1;
const HEADER_TAG_ADDRESS: u16 = 2;
const HEADER_TAG_ENTRY_ADDRESS: u16 = 3;
const HEADER_TAG_CONSOLE_FLAGS: u16 = 4;
const HEADER_TAG_FRAMEBUFFER: u16 = 5;
const HEADER_TAG_MODULE_ALIGN: u16 = 6;
const HEADER_TAG_EFI_BS: u16 = 7;

const HEADER_TAG_OPTIONAL: u16 = 1;

/// Info tag types the builder can produce on request. SMBIOS (13) is
/// deliberately absent: a mandatory request for it must fail the load
/// so another boot method gets a chance.
fn info_request_supported(request: u32) -> bool {
    matches!(request, 0..=12 | 14..=18)
}

/// What the header of a valid candidate image told us about placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadHints {
    /// Physical address the kernel wants to be loaded at.
    pub load_addr: PhysAddr,
    /// Physical address of the kernel entry point.
    pub entry_addr: PhysAddr,
    /// The image asked for boot services to be left running.
    pub keep_boot_services: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// No header magic within the first 32 KiB of the image.
    NotFound,
    /// A header or tag extends past the searched region.
    Truncated,
    BadChecksum {
        magic: u32,
        architecture: u32,
        header_length: u32,
        checksum: u32,
    },
    /// A mandatory header tag we do not understand.
    UnsupportedTag(u16),
    /// A mandatory information request for a tag we cannot produce.
    UnsupportedInfoRequest(u32),
    /// The image carries no address tag, so we cannot place it.
    MissingAddressTag,
    /// The image carries no entry address tag.
    MissingEntryTag,
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::NotFound => write!(f, "no multiboot2 header found"),
            HeaderError::Truncated => write!(f, "multiboot2 header truncated"),
            HeaderError::BadChecksum {
                magic,
                architecture,
                header_length,
                checksum,
            } => write!(
                f,
                "multiboot2 checksum failed, magic: {:#x} architecture: {:#x} \
                 header_length: {:#x} checksum: {:#x}",
                magic, architecture, header_length, checksum
            ),
            HeaderError::UnsupportedTag(tag) => {
                write!(f, "unsupported multiboot2 header tag: {:#x}", tag)
            }
            HeaderError::UnsupportedInfoRequest(req) => {
                write!(f, "unsupported information tag: {:#x}", req)
            }
            HeaderError::MissingAddressTag => write!(f, "multiboot2 address tag missing"),
            HeaderError::MissingEntryTag => write!(f, "multiboot2 entry address tag missing"),
        }
    }
}

fn read_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(data[off..off + 2].try_into().unwrap())
}

fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(data[off..off + 4].try_into().unwrap())
}

/// Searches `data` (the first 32 KiB of a candidate image) for a valid
/// multiboot2 header and extracts the load hints from its tag list.
///
/// The header starts 8-byte aligned with `{magic, architecture,
/// header_length, checksum}` such that the four words sum to zero mod 2^32,
/// followed by 8-byte aligned header tags terminated by an END tag.
pub fn scan_header(data: &[u8]) -> Result<LoadHints, HeaderError> {
    let search = data.len().min(HEADER_SEARCH);
    if search < 16 {
        return Err(HeaderError::NotFound);
    }

    let mut header_at = None;
    for off in (0..=search - 16).step_by(HEADER_ALIGN) {
        if read_u32(data, off) == HEADER_MAGIC {
            header_at = Some(off);
            break;
        }
    }

    let start = header_at.ok_or(HeaderError::NotFound)?;

    let magic = read_u32(data, start);
    let architecture = read_u32(data, start + 4);
    let header_length = read_u32(data, start + 8);
    let checksum = read_u32(data, start + 12);

    if header_length < 16 || start + header_length as usize > search {
        return Err(HeaderError::Truncated);
    }

    if magic
        .wrapping_add(architecture)
        .wrapping_add(header_length)
        .wrapping_add(checksum)
        != 0
    {
        return Err(HeaderError::BadChecksum {
            magic,
            architecture,
            header_length,
            checksum,
        });
    }

    let mut load_addr = None;
    let mut entry_addr = None;
    let mut keep_boot_services = false;

    let mut off = start + 16;
    loop {
        if off + 8 > search {
            return Err(HeaderError::Truncated);
        }

        let tag_type = read_u16(data, off);
        let flags = read_u16(data, off + 2);
        let size = read_u32(data, off + 4) as usize;

        if size < 8 || off + size > search {
            return Err(HeaderError::Truncated);
        }

        match tag_type {
            HEADER_TAG_END => break,
            HEADER_TAG_INFORMATION_REQUEST => {
                check_info_request(&data[off..off + size], flags)?;
            }
            HEADER_TAG_ADDRESS => {
                // header_addr, load_addr, load_end_addr, bss_end_addr
                load_addr = Some(PhysAddr::new(read_u32(data, off + 12) as u64));
            }
            HEADER_TAG_ENTRY_ADDRESS => {
                entry_addr = Some(PhysAddr::new(read_u32(data, off + 8) as u64));
            }
            HEADER_TAG_CONSOLE_FLAGS => {}
            HEADER_TAG_FRAMEBUFFER => {}
            HEADER_TAG_MODULE_ALIGN => {
                // modules are always placed page aligned
            }
            HEADER_TAG_EFI_BS => keep_boot_services = true,
            other => {
                if flags & HEADER_TAG_OPTIONAL == 0 {
                    return Err(HeaderError::UnsupportedTag(other));
                }
                warn!("ignoring optional multiboot2 header tag: {:#x}", other);
            }
        }

        off += align_up(size, HEADER_ALIGN);
    }

    let load_addr = load_addr.ok_or(HeaderError::MissingAddressTag)?;
    let entry_addr = entry_addr.ok_or(HeaderError::MissingEntryTag)?;

    Ok(LoadHints {
        load_addr,
        entry_addr,
        keep_boot_services,
    })
}

/// A mandatory information request must only ask for tags the builder can
/// produce. Optional requests are ignored.
fn check_info_request(tag: &[u8], flags: u16) -> Result<(), HeaderError> {
    if flags & HEADER_TAG_OPTIONAL != 0 {
        return Ok(());
    }

    let requests = &tag[8..];
    for req in requests.chunks_exact(4) {
        let request = u32::from_le_bytes(req.try_into().unwrap());
        if !info_request_supported(request) {
            return Err(HeaderError::UnsupportedInfoRequest(request));
        }
    }

    Ok(())
}
