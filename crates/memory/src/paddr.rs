use core::{fmt, ops};

use crate::{PAGE_SHIFT, PAGE_SIZE};

pub type Inner = u64;

/// A physical memory address.
///
/// The loader runs identity mapped, so staged data and final placement
/// targets are both described with `PhysAddr`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(Inner);

impl PhysAddr {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn new(addr: Inner) -> Self {
        Self(addr)
    }

    pub const fn to_inner(self) -> Inner {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Aligns the address up to `align`.
    ///
    /// ### Panics
    /// based on the `overflow-checks` setting
    pub fn align_up(self, align: Inner) -> Self {
        Self(self.0.next_multiple_of(align))
    }

    /// Aligns the address down to `align`.
    pub fn align_down(self, align: Inner) -> Self {
        Self((self.0 / align) * align)
    }

    /// Checks if the address is a multiple of `align`.
    pub fn is_aligned(self, align: Inner) -> bool {
        self.0 % align == 0
    }

    /// Aligns the address up to `PAGE_SIZE`.
    pub fn page_align_up(self) -> Self {
        self.align_up(PAGE_SIZE)
    }

    /// Aligns the address down to `PAGE_SIZE`.
    pub fn page_align_down(self) -> Self {
        let addr = self.0 >> PAGE_SHIFT;
        Self(addr << PAGE_SHIFT)
    }

    pub fn is_page_aligned(self) -> bool {
        self == self.page_align_down()
    }
}

impl From<Inner> for PhysAddr {
    fn from(num: Inner) -> Self {
        Self(num)
    }
}

impl From<PhysAddr> for Inner {
    fn from(addr: PhysAddr) -> Self {
        addr.0
    }
}

impl ops::Add<Inner> for PhysAddr {
    type Output = Self;

    fn add(self, rhs: Inner) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl ops::AddAssign<Inner> for PhysAddr {
    fn add_assign(&mut self, rhs: Inner) {
        self.0 += rhs;
    }
}

impl ops::Sub for PhysAddr {
    type Output = Inner;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl ops::Sub<Inner> for PhysAddr {
    type Output = Self;

    fn sub(self, rhs: Inner) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
