use core::fmt;

use alloc::string::String;

use multiboot2::{BuildError, HeaderError};
use relocation::RelocationError;

use crate::firmware::FirmwareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// The source ended before the requested range.
    ShortRead { offset: u64, wanted: usize },
    /// The device gave up on the read.
    Device,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ShortRead { offset, wanted } => {
                write!(f, "short read of {} bytes at offset {:#x}", wanted, offset)
            }
            FileError::Device => write!(f, "device error"),
        }
    }
}

/// Everything that can sink a boot attempt. Configuration errors mean
/// the operator has to fix the setup; resource errors name what ran
/// out; a relocation cycle means the computed layout is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Header(HeaderError),
    Build(BuildError),
    Relocation(RelocationError),
    File { name: String, err: FileError },
    Firmware { op: &'static str, err: FirmwareError },
    /// No five-page run of conventional memory below the kernel.
    NoScratchRegion,
    /// More components than the relocation chunk list can hold.
    TooManyComponents,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Header(err) => write!(f, "{}", err),
            LoadError::Build(err) => write!(f, "{}", err),
            LoadError::Relocation(err) => write!(f, "{}", err),
            LoadError::File { name, err } => write!(f, "{}: {}", name, err),
            LoadError::Firmware { op, err } => write!(f, "{} failed: {}", op, err),
            LoadError::NoScratchRegion => {
                write!(f, "no scratch memory below the kernel load address")
            }
            LoadError::TooManyComponents => {
                write!(f, "too many components to relocate")
            }
        }
    }
}

impl From<HeaderError> for LoadError {
    fn from(err: HeaderError) -> Self {
        LoadError::Header(err)
    }
}

impl From<BuildError> for LoadError {
    fn from(err: BuildError) -> Self {
        LoadError::Build(err)
    }
}

impl From<RelocationError> for LoadError {
    fn from(err: RelocationError) -> Self {
        LoadError::Relocation(err)
    }
}
