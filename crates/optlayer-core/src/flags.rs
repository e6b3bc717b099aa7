//! Option flags and engine-wide constants

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of per-option behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OptionFlags(u32);

impl OptionFlags {
    pub const NONE: Self = Self(0);
    /// Never written to config files
    pub const NO_SAVE: Self = Self(1 << 0);
    /// Value survives a layer being disabled (but not the layer's removal)
    pub const NO_RESET: Self = Self(1 << 1);
    /// Edits belong in an end-user layer rather than a developer layer
    pub const USER_SETTING: Self = Self(1 << 2);

    /// Flags that decide which layers an option's values belong in
    pub const CATEGORY_MASK: Self = Self::USER_SETTING;

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Category bits of this mask.
    pub const fn category(self) -> Self {
        self.intersection(Self::CATEGORY_MASK)
    }
}

impl BitOr for OptionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OptionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for OptionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::NO_SAVE, "NoSave"),
            (Self::NO_RESET, "NoReset"),
            (Self::USER_SETTING, "UserSetting"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            f.write_str("None")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

/// Lowest priority a dynamic (non-system) layer may use.
pub const MIN_DYNAMIC_PRIORITY: u32 = 100;
/// Highest priority a dynamic (non-system) layer may use.
pub const MAX_DYNAMIC_PRIORITY: u32 = 10_000_000;
/// Priority given to dynamic layers that do not ask for one.
pub const DEFAULT_DYNAMIC_PRIORITY: u32 = 10_000;

/// Blend threshold used by system layers and by default.
pub const DEFAULT_BLEND_THRESHOLD: f32 = 0.1;

/// Resolution passes per frame before remaining dirty options are abandoned.
pub const MAX_RESOLVES: usize = 4;

/// Pending strength request meaning "nobody asked this frame" (max-aggregated).
pub(crate) const EMPTY_STRENGTH_REQUEST: f32 = -1.0;
/// Pending threshold request meaning "nobody asked this frame" (min-aggregated).
pub(crate) const EMPTY_THRESHOLD_REQUEST: f32 = 2.0;

pub(crate) const fn is_dynamic_priority(priority: u32) -> bool {
    priority >= MIN_DYNAMIC_PRIORITY && priority <= MAX_DYNAMIC_PRIORITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_query() {
        let flags = OptionFlags::NO_SAVE | OptionFlags::USER_SETTING;
        assert!(flags.contains(OptionFlags::NO_SAVE));
        assert!(!flags.contains(OptionFlags::NO_RESET));
        assert_eq!(flags.category(), OptionFlags::USER_SETTING);
        assert_eq!(flags.to_string(), "NoSave | UserSetting");
        assert_eq!(OptionFlags::NONE.to_string(), "None");
    }

    #[test]
    fn dynamic_range_bounds_are_inclusive() {
        assert!(!is_dynamic_priority(MIN_DYNAMIC_PRIORITY - 1));
        assert!(is_dynamic_priority(MIN_DYNAMIC_PRIORITY));
        assert!(is_dynamic_priority(DEFAULT_DYNAMIC_PRIORITY));
        assert!(is_dynamic_priority(MAX_DYNAMIC_PRIORITY));
        assert!(!is_dynamic_priority(MAX_DYNAMIC_PRIORITY + 1));
    }
}
