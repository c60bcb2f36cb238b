//! Module bitmasks.

use std::fmt;

/// Counts the bits set in `value` by testing each bit position.
pub fn count_set_bits(value: u32) -> u32 {
    (0..u32::BITS).filter(|bit| value & (1 << bit) != 0).count() as u32
}

/// Bitmask over the entropy modules of one device; bit `n` is module `n`.
///
/// The same layout is used for module presence ([`Device::modules_mask`])
/// and module status ([`Device::modules_status`]).
///
/// [`Device::modules_mask`]: crate::Device::modules_mask
/// [`Device::modules_status`]: crate::Device::modules_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModuleMask(pub u32);

impl ModuleMask {
    /// No module selected.
    pub const NONE: ModuleMask = ModuleMask(0);
    /// Every module selected.
    pub const ALL: ModuleMask = ModuleMask(u32::MAX);

    /// Mask selecting a single module (0-31).
    ///
    /// An index of 32 or more selects nothing, matching [`contains`].
    ///
    /// [`contains`]: ModuleMask::contains
    #[inline]
    pub fn module(index: u8) -> Self {
        ModuleMask(1u32.checked_shl(u32::from(index)).unwrap_or(0))
    }

    /// Returns the raw bit pattern.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns the number of modules selected.
    #[inline]
    pub fn count(&self) -> u32 {
        count_set_bits(self.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if module `index` is selected.
    #[inline]
    pub fn contains(&self, index: u8) -> bool {
        index < 32 && self.0 & (1u32 << index) != 0
    }

    /// Iterates the indices of the selected modules, lowest first.
    pub fn modules(&self) -> impl Iterator<Item = u8> + '_ {
        (0..32u8).filter(move |&i| self.contains(i))
    }
}

impl From<u32> for ModuleMask {
    fn from(bits: u32) -> Self {
        ModuleMask(bits)
    }
}

impl From<ModuleMask> for u32 {
    fn from(mask: ModuleMask) -> Self {
        mask.0
    }
}

impl std::ops::BitOr for ModuleMask {
    type Output = ModuleMask;
    fn bitor(self, rhs: Self) -> Self {
        ModuleMask(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for ModuleMask {
    type Output = ModuleMask;
    fn bitand(self, rhs: Self) -> Self {
        ModuleMask(self.0 & rhs.0)
    }
}

impl std::ops::Not for ModuleMask {
    type Output = ModuleMask;
    fn not(self) -> Self {
        ModuleMask(!self.0)
    }
}

impl fmt::Display for ModuleMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:b}", self.0)
    }
}
