//! Parameter types for hash encoding.
//!
//! - [`ComponentRatio`]: horizontal and vertical blur hash component
//!   counts (each 1–9, default 4×3). Higher counts keep more detail in the
//!   placeholder at the cost of a longer hash string.

use std::fmt;

/// Blur hash component counts, both within `1..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRatio {
    x: u8,
    y: u8,
}

impl ComponentRatio {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 9;

    /// `None` when either value is out of range.
    pub fn new(x: u32, y: u32) -> Option<Self> {
        let in_range = |v: u32| (u32::from(Self::MIN)..=u32::from(Self::MAX)).contains(&v);
        if in_range(x) && in_range(y) {
            Some(Self {
                x: x as u8,
                y: y as u8,
            })
        } else {
            None
        }
    }

    pub fn x(self) -> u8 {
        self.x
    }

    pub fn y(self) -> u8 {
        self.y
    }
}

impl Default for ComponentRatio {
    fn default() -> Self {
        Self { x: 4, y: 3 }
    }
}

impl fmt::Display for ComponentRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}
