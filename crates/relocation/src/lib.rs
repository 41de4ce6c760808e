//! Moves staged boot components to their final physical addresses after
//! boot services are gone. Works on a fixed-capacity chunk list and a
//! small scratch region, so nothing here allocates.

#![no_std]

#[cfg(test)]
extern crate std;

mod chunk;
mod scratch;

pub use chunk::{Chunk, ChunkList, Mover, RelocationError, Relocator, MAX_CHUNKS};
pub use scratch::{ScratchRegion, SCRATCH_PAGES};
