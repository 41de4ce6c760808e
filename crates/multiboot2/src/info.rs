use alloc::{string::String, vec::Vec};

use memory::{MemoryMapSnapshot, PhysAddr};

use crate::LoadHints;

/// A validated, staged kernel image. Created once header validation
/// succeeds and not mutated afterwards; relocation rebinds the staged
/// bytes, not this descriptor.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub name: String,
    /// Where the image bytes currently live.
    pub addr: PhysAddr,
    pub size: u64,
    /// Placement demanded by the image header.
    pub hints: LoadHints,
    /// System memory snapshot captured when the image was staged.
    pub smap: MemoryMapSnapshot,
}

impl ImageDescriptor {
    pub fn load_addr(&self) -> PhysAddr {
        self.hints.load_addr
    }

    pub fn entry_addr(&self) -> PhysAddr {
        self.hints.entry_addr
    }
}

/// A module trailing the kernel. Insertion order is boot order; exactly
/// the modules with type label `rootfs` satisfy the root filesystem
/// requirement.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub mod_type: String,
    pub args: Option<String>,
    /// Where the module bytes currently live.
    pub addr: PhysAddr,
    pub size: u64,
}

impl ModuleDescriptor {
    pub fn is_rootfs(&self) -> bool {
        self.mod_type == "rootfs"
    }

    /// Byte length of the module tag string `"<name> type=<type>[ <args>]"`
    /// including the terminating NUL.
    pub fn cmdline_len(&self) -> usize {
        let mut len = self.name.len() + 1;
        len += self.mod_type.len() + 5 + 1;
        if let Some(args) = &self.args {
            len += args.len() + 1;
        }
        len
    }
}

/// Basic memory amounts reported by the BIOS, in KiB.
#[derive(Debug, Clone, Copy)]
pub struct BasicMemInfo {
    pub mem_lower: u32,
    pub mem_upper: u32,
}

/// A copy of the ACPI root pointer structure. Revision 0 means the
/// 20-byte v1 structure, anything else the length-prefixed v2 one.
#[derive(Debug, Clone)]
pub struct RsdpDescriptor {
    revision: u8,
    table: Vec<u8>,
}

impl RsdpDescriptor {
    pub const V1_LEN: usize = 20;

    pub fn new(revision: u8, table: Vec<u8>) -> Self {
        assert!(table.len() >= Self::V1_LEN);
        Self { revision, table }
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// The bytes the info block carries: the v1 prefix for revision 0,
    /// the whole table otherwise.
    pub fn body(&self) -> &[u8] {
        if self.revision == 0 {
            &self.table[..Self::V1_LEN]
        } else {
            &self.table
        }
    }
}

/// Framebuffer geometry in the form the framebuffer tag encodes,
/// direct-RGB only.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferInfo {
    pub addr: u64,
    pub pitch: u32,
    pub width: u32,
    pub height: u32,
    pub bpp: u8,
    pub red_field_position: u8,
    pub red_mask_size: u8,
    pub green_field_position: u8,
    pub green_mask_size: u8,
    pub blue_field_position: u8,
    pub blue_mask_size: u8,
}

impl FramebufferInfo {
    /// Derives the tag fields from a linear framebuffer mode description.
    ///
    /// Bits per pixel is the highest set bit over all channel masks; the
    /// red/blue positions depend on whether red occupies the low byte.
    pub fn from_mode(
        addr: u64,
        width: u32,
        height: u32,
        stride: u32,
        mask_red: u32,
        mask_green: u32,
        mask_blue: u32,
        mask_reserved: u32,
    ) -> Self {
        let bpp = (32 - (mask_red | mask_green | mask_blue | mask_reserved).leading_zeros()) as u8;

        let (red_field_position, blue_field_position) = if mask_red & 0x0000_00ff != 0 {
            (0, 16)
        } else {
            (16, 0)
        };

        Self {
            addr,
            pitch: stride * (bpp as u32 / 8),
            width,
            height,
            bpp,
            red_field_position,
            red_mask_size: 8,
            green_field_position: 8,
            green_mask_size: 8,
            blue_field_position,
            blue_mask_size: 8,
        }
    }
}

/// The raw firmware memory map as the firmware memory-map tag carries it.
#[derive(Debug, Clone)]
pub struct EfiMemoryMapInfo {
    pub descriptor_size: u32,
    pub descriptor_version: u32,
    pub buffer: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_cmdline_len_matches_rendering() {
        let with_args = ModuleDescriptor {
            name: "/platform/i86pc/amd64/boot_archive".into(),
            mod_type: "rootfs".into(),
            args: Some("verbose".into()),
            addr: PhysAddr::new(0x10_0000),
            size: 4096,
        };
        let rendered = alloc::format!(
            "{} type={} {}",
            with_args.name, with_args.mod_type, with_args.args.as_ref().unwrap()
        );
        assert_eq!(with_args.cmdline_len(), rendered.len() + 1);

        let without_args = ModuleDescriptor {
            args: None,
            ..with_args
        };
        let rendered = alloc::format!("{} type={}", without_args.name, without_args.mod_type);
        assert_eq!(without_args.cmdline_len(), rendered.len() + 1);
    }

    #[test]
    fn rsdp_body_depends_on_revision() {
        let table = alloc::vec![0xabu8; 36];
        let v1 = RsdpDescriptor::new(0, table.clone());
        let v2 = RsdpDescriptor::new(2, table);

        assert_eq!(v1.body().len(), RsdpDescriptor::V1_LEN);
        assert_eq!(v2.body().len(), 36);
    }

    #[test]
    fn framebuffer_mode_derivation() {
        let fb = FramebufferInfo::from_mode(
            0xfd00_0000,
            1024,
            768,
            1024,
            0x00ff_0000,
            0x0000_ff00,
            0x0000_00ff,
            0xff00_0000,
        );

        assert_eq!(fb.bpp, 32);
        assert_eq!(fb.pitch, 4096);
        assert_eq!(fb.red_field_position, 16);
        assert_eq!(fb.blue_field_position, 0);
    }
}
