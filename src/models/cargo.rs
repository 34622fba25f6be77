//! Cargo types and cargo masks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of distinct cargo types a mask can hold.
pub const NUM_CARGO: u8 = 64;

/// A cargo type, `0..NUM_CARGO`.
pub type CargoType = u8;

/// A set of cargo types.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CargoMask(u64);

impl CargoMask {
    /// No cargo.
    pub const EMPTY: CargoMask = CargoMask(0);
    /// Every cargo type.
    pub const ALL: CargoMask = CargoMask(u64::MAX);

    /// Mask from raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Mask holding exactly one cargo type.
    pub fn single(cargo: CargoType) -> Self {
        assert!(cargo < NUM_CARGO, "cargo type {cargo} out of range");
        Self(1u64 << cargo)
    }

    /// Raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, cargo: CargoType) -> bool {
        cargo < NUM_CARGO && self.0 & (1u64 << cargo) != 0
    }

    pub fn union(self, other: CargoMask) -> CargoMask {
        CargoMask(self.0 | other.0)
    }

    pub fn intersection(self, other: CargoMask) -> CargoMask {
        CargoMask(self.0 & other.0)
    }

    pub fn difference(self, other: CargoMask) -> CargoMask {
        CargoMask(self.0 & !other.0)
    }

    /// Adds a cargo type to the mask.
    pub fn with(self, cargo: CargoType) -> CargoMask {
        self.union(CargoMask::single(cargo))
    }

    /// Cargo types in ascending order.
    pub fn iter(self) -> impl Iterator<Item = CargoType> {
        (0..NUM_CARGO).filter(move |&c| self.contains(c))
    }
}

impl fmt::Debug for CargoMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == CargoMask::ALL {
            return f.write_str("CargoMask(ALL)");
        }
        write!(f, "CargoMask({:#x})", self.0)
    }
}

impl FromIterator<CargoType> for CargoMask {
    fn from_iter<I: IntoIterator<Item = CargoType>>(iter: I) -> Self {
        iter.into_iter().fold(CargoMask::EMPTY, CargoMask::with)
    }
}

/// Which cargo a next-stop query is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CargoFilter {
    /// Answer for the vehicle as a whole.
    #[default]
    Ignore,
    /// Answer per cargo type in the mask.
    Mask(CargoMask),
}

impl CargoFilter {
    /// The mask a query starts with.
    pub fn initial_mask(self) -> CargoMask {
        match self {
            CargoFilter::Ignore => CargoMask::ALL,
            CargoFilter::Mask(mask) => mask,
        }
    }
}
