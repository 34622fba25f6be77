//! Destination reference counts.
//!
//! Answers "is any order still sending vehicles here" without scanning
//! every list. The table is a side structure owned by the fleet and
//! threaded by reference through every list mutation, so it cannot drift
//! from the orders it counts without the audit noticing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{CompanyId, Order, OrderKind, OrderList, VehicleType};

/// Which order kind a reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DestinationKind {
    Station,
    Implicit,
    Waypoint,
}

/// Key of one reference count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DestinationKey {
    /// Raw station or waypoint id.
    pub destination: u32,
    pub owner: CompanyId,
    pub kind: DestinationKind,
    pub vehicle_type: VehicleType,
}

impl DestinationKey {
    /// Key for an order, if the order references a station or waypoint.
    pub fn for_order(order: &Order, owner: CompanyId, vehicle_type: VehicleType) -> Option<Self> {
        let (destination, kind) = match &order.kind {
            OrderKind::GoToStation(so) => (so.station.0, DestinationKind::Station),
            OrderKind::Implicit(station) => (station.0, DestinationKind::Implicit),
            OrderKind::GoToWaypoint(wo) => (wo.waypoint.0, DestinationKind::Waypoint),
            _ => return None,
        };
        Some(Self {
            destination,
            owner,
            kind,
            vehicle_type,
        })
    }
}

/// Reference counts keyed by destination, owner, order kind and vehicle type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRefCounts {
    counts: BTreeMap<DestinationKey, u32>,
}

impl DestinationRefCounts {
    /// Recounts from scratch.
    pub fn from_lists<'a>(lists: impl IntoIterator<Item = &'a OrderList>) -> Self {
        let mut refs = Self::default();
        for list in lists {
            list.register_all(&mut refs);
        }
        refs
    }

    pub(crate) fn register(&mut self, order: &Order, owner: CompanyId, vehicle_type: VehicleType) {
        if let Some(key) = DestinationKey::for_order(order, owner, vehicle_type) {
            *self.counts.entry(key).or_insert(0) += 1;
        }
    }

    /// # Panics
    /// If the order was never registered.
    pub(crate) fn unregister(&mut self, order: &Order, owner: CompanyId, vehicle_type: VehicleType) {
        let Some(key) = DestinationKey::for_order(order, owner, vehicle_type) else {
            return;
        };
        let count = self
            .counts
            .get_mut(&key)
            .unwrap_or_else(|| panic!("destination reference {key:?} released below zero"));
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&key);
        }
    }

    pub fn count(&self, key: &DestinationKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Whether any order of any owner or vehicle type names the destination.
    pub fn is_used(&self, kind: DestinationKind, destination: u32) -> bool {
        self.counts
            .keys()
            .any(|k| k.kind == kind && k.destination == destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DestinationKey, u32)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
