//! Shared capacity slots, slot groups and counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{CompanyId, CounterId, SlotGroupId, SlotId, VehicleId};

/// A capacity resource a bounded number of vehicles can occupy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub owner: CompanyId,
    pub max_occupancy: u32,
    occupants: BTreeSet<VehicleId>,
}

impl Slot {
    pub fn new(id: SlotId, owner: CompanyId, max_occupancy: u32) -> Self {
        Self {
            id,
            owner,
            max_occupancy,
            occupants: BTreeSet::new(),
        }
    }

    pub fn occupancy(&self) -> u32 {
        self.occupants.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.max_occupancy
    }

    pub fn contains(&self, vehicle: VehicleId) -> bool {
        self.occupants.contains(&vehicle)
    }

    pub fn occupants(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.occupants.iter().copied()
    }

    /// Whether `try_occupy` would succeed, without occupying.
    pub fn can_occupy(&self, vehicle: VehicleId) -> bool {
        self.contains(vehicle) || !self.is_full()
    }

    /// Takes a place in the slot. Succeeds if the vehicle already holds one.
    pub fn try_occupy(&mut self, vehicle: VehicleId) -> bool {
        if !self.can_occupy(vehicle) {
            return false;
        }
        self.occupants.insert(vehicle);
        true
    }

    /// Leaves the slot. Returns false if the vehicle was not in it.
    pub fn vacate(&mut self, vehicle: VehicleId) -> bool {
        self.occupants.remove(&vehicle)
    }
}

/// A named group of slots released together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotGroup {
    pub id: SlotGroupId,
    pub owner: CompanyId,
    pub slots: Vec<SlotId>,
}

impl SlotGroup {
    pub fn new(id: SlotGroupId, owner: CompanyId, slots: Vec<SlotId>) -> Self {
        Self { id, owner, slots }
    }
}

/// A shared non-negative integer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    pub id: CounterId,
    pub owner: CompanyId,
    pub value: u32,
}

impl Counter {
    pub fn new(id: CounterId, owner: CompanyId) -> Self {
        Self { id, owner, value: 0 }
    }
}
