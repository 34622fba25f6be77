//! Typed identifiers.
//!
//! Every registry the order engine talks to is keyed by a distinct newtype
//! so a station id can never be handed to a depot lookup. All ids are
//! `Ord` so they can key the `BTreeMap`s that keep iteration deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an order inside its [`OrderList`](super::OrderList).
pub type OrderIndex = usize;

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident => $prefix:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u32);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!($prefix, "#{}"), self.0)
                }
            }

            impl From<u32> for $name {
                fn from(raw: u32) -> Self {
                    Self(raw)
                }
            }
        )*
    };
}

id_type! {
    /// A station (rail platform, road stop, dock or airport).
    StationId => "station",
    /// A depot or hangar.
    DepotId => "depot",
    /// A waypoint (pass-through marker, never loads).
    WaypointId => "waypoint",
    /// A capacity slot vehicles can occupy.
    SlotId => "slot",
    /// A named group of slots.
    SlotGroupId => "slot-group",
    /// A shared integer counter.
    CounterId => "counter",
    /// A vehicle.
    VehicleId => "vehicle",
    /// An order list owned by the fleet.
    OrderListId => "order-list",
    /// The company owning vehicles and infrastructure.
    CompanyId => "company",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        assert_eq!(StationId(4).to_string(), "station#4");
        assert_eq!(SlotGroupId(1).to_string(), "slot-group#1");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&VehicleId(17)).unwrap();
        assert_eq!(json, "17");
        let back: VehicleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VehicleId(17));
    }
}
