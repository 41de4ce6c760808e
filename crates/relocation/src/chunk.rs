use core::fmt;

use arrayvec::ArrayVec;
use log::debug;
use memory::PhysAddr;

/// Upper bound on relocatable components. The chunk list has to fit in
/// one scratch page, and a boot rarely carries more than a handful of
/// modules.
pub const MAX_CHUNKS: usize = 64;

pub type ChunkList = ArrayVec<Chunk, MAX_CHUNKS>;

/// One staged component and where it has to end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub current: PhysAddr,
    pub target: PhysAddr,
    pub size: u64,
}

impl Chunk {
    pub fn new(current: PhysAddr, target: PhysAddr, size: u64) -> Self {
        Self {
            current,
            target,
            size,
        }
    }

    pub fn in_place(&self) -> bool {
        self.current == self.target
    }

    fn current_end(&self) -> PhysAddr {
        self.current + self.size
    }

    fn target_end(&self) -> PhysAddr {
        self.target + self.size
    }
}

/// The raw copy primitive. The real implementation is the memmove
/// routine staged in the scratch region; tests substitute a byte arena.
///
/// Implementations must handle overlapping source and destination, a
/// chunk is allowed to slide over itself.
pub trait Mover {
    fn memmove(&mut self, dest: PhysAddr, src: PhysAddr, size: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationError {
    /// Every pending chunk's target overlaps another pending chunk.
    /// No move order exists; the layout itself is wrong.
    Cycle,
}

impl fmt::Display for RelocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocationError::Cycle => {
                write!(f, "relocation chunks form a dependency cycle")
            }
        }
    }
}

/// Drives the chunk list to its fixed point: a chunk may move once its
/// target range overlaps no other pending chunk's current range, and
/// after every move the scan restarts from the first chunk.
pub struct Relocator {
    chunks: ChunkList,
}

impl Relocator {
    pub fn new(chunks: ChunkList) -> Self {
        Self { chunks }
    }

    pub fn run(mut self, mover: &mut impl Mover) -> Result<ChunkList, RelocationError> {
        'scan: loop {
            let mut pending = false;

            for i in 0..self.chunks.len() {
                let chunk = self.chunks[i];

                if chunk.in_place() {
                    continue;
                }

                pending = true;

                if self.blocked(i) {
                    continue;
                }

                debug!(
                    "relocating {:#x} bytes: {} -> {}",
                    chunk.size, chunk.current, chunk.target
                );
                mover.memmove(chunk.target, chunk.current, chunk.size);
                self.chunks[i].current = chunk.target;

                continue 'scan;
            }

            if pending {
                return Err(RelocationError::Cycle);
            }

            return Ok(self.chunks);
        }
    }

    /// Whether moving chunk `idx` now would clobber bytes some other
    /// pending chunk still has to read. Ranges are half open, a target
    /// ending exactly where another chunk starts does not conflict.
    fn blocked(&self, idx: usize) -> bool {
        let chunk = &self.chunks[idx];

        self.chunks.iter().enumerate().any(|(other_idx, other)| {
            other_idx != idx
                && !other.in_place()
                && overlaps(chunk.target, chunk.target_end(), other.current, other.current_end())
        })
    }
}

fn overlaps(a_start: PhysAddr, a_end: PhysAddr, b_start: PhysAddr, b_end: PhysAddr) -> bool {
    a_start < b_end && b_start < a_end
}
