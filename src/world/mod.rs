//! Collaborator registries.
//!
//! The order engine does not own stations, depots, slots or counters; it
//! only queries them by id and, for slots and counters, applies the side
//! effects of orders. `World` is that query surface.
//!
//! All registries are ordered maps so iteration (for example the
//! nearest-depot search) is identical on every peer.

mod slot;
mod station;

pub use slot::{Counter, Slot, SlotGroup};
pub use station::{Depot, Station, StationFacilities, WaitingCargo, Waypoint};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    CounterId, DepotId, RoadStopKind, SlotGroupId, SlotId, StationId, TimeDateField, Vehicle,
    VehicleId, VehicleType, WaypointId,
};

/// A map tile coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Location) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn distance_squared(self, other: Location) -> u64 {
        let dx = u64::from(self.x.abs_diff(other.x));
        let dy = u64::from(self.y.abs_diff(other.y));
        dx * dx + dy * dy
    }
}

/// Simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimDate {
    /// Monotonic simulation tick.
    pub tick: i64,
    pub year: i32,
    /// `1..=12`
    pub month: u8,
    /// `1..=31`
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl Default for SimDate {
    fn default() -> Self {
        Self {
            tick: 0,
            year: 1950,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
        }
    }
}

impl SimDate {
    pub fn field(&self, field: TimeDateField) -> i64 {
        match field {
            TimeDateField::Minute => i64::from(self.minute),
            TimeDateField::Hour => i64::from(self.hour),
            TimeDateField::HourMinute => i64::from(self.hour) * 100 + i64::from(self.minute),
            TimeDateField::Day => i64::from(self.day),
            TimeDateField::Month => i64::from(self.month),
            TimeDateField::Year => i64::from(self.year),
        }
    }
}

/// Registries the order engine consults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    stations: BTreeMap<StationId, Station>,
    depots: BTreeMap<DepotId, Depot>,
    waypoints: BTreeMap<WaypointId, Waypoint>,
    slots: BTreeMap<SlotId, Slot>,
    slot_groups: BTreeMap<SlotGroupId, SlotGroup>,
    counters: BTreeMap<CounterId, Counter>,
    pub date: SimDate,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_station(mut self, station: Station) -> Self {
        self.add_station(station);
        self
    }

    pub fn with_depot(mut self, depot: Depot) -> Self {
        self.depots.insert(depot.id, depot);
        self
    }

    pub fn with_waypoint(mut self, waypoint: Waypoint) -> Self {
        self.waypoints.insert(waypoint.id, waypoint);
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.insert(slot.id, slot);
        self
    }

    pub fn with_slot_group(mut self, group: SlotGroup) -> Self {
        self.slot_groups.insert(group.id, group);
        self
    }

    pub fn with_counter(mut self, counter: Counter) -> Self {
        self.counters.insert(counter.id, counter);
        self
    }

    pub fn add_station(&mut self, station: Station) {
        self.stations.insert(station.id, station);
    }

    pub fn remove_station(&mut self, id: StationId) -> Option<Station> {
        self.stations.remove(&id)
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    pub fn station_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.stations.get_mut(&id)
    }

    pub fn depot(&self, id: DepotId) -> Option<&Depot> {
        self.depots.get(&id)
    }

    pub fn waypoint(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.get(&id)
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(&id)
    }

    pub fn slot_group(&self, id: SlotGroupId) -> Option<&SlotGroup> {
        self.slot_groups.get(&id)
    }

    pub fn counter(&self, id: CounterId) -> Option<&Counter> {
        self.counters.get(&id)
    }

    pub fn counter_mut(&mut self, id: CounterId) -> Option<&mut Counter> {
        self.counters.get_mut(&id)
    }

    /// Whether the station has the facility (and road type) the vehicle needs.
    pub fn can_vehicle_use_station(&self, vehicle: &Vehicle, station: StationId) -> bool {
        let Some(st) = self.station(station) else {
            return false;
        };
        let f = st.facilities;
        match vehicle.vehicle_type {
            VehicleType::Train => f.rail,
            VehicleType::Road => {
                let stop = match vehicle.road_stop {
                    RoadStopKind::Bus => f.bus,
                    RoadStopKind::Truck => f.truck,
                };
                stop && st.road_types.contains(&vehicle.road_type)
            }
            VehicleType::Ship => f.dock,
            VehicleType::Aircraft => f.airport,
        }
    }

    /// Closest depot of the vehicle's owner and type; ties go to the lower id.
    pub fn closest_depot(&self, vehicle: &Vehicle) -> Option<&Depot> {
        self.depots
            .values()
            .filter(|d| d.owner == vehicle.owner && d.vehicle_type == vehicle.vehicle_type)
            .min_by_key(|d| (d.location.manhattan(vehicle.location), d.id))
    }

    /// Whether the vehicle holds a place in any slot of the group.
    pub fn is_in_slot_group(&self, vehicle: VehicleId, group: SlotGroupId) -> bool {
        self.slot_group(group).is_some_and(|g| {
            g.slots
                .iter()
                .any(|s| self.slot(*s).is_some_and(|slot| slot.contains(vehicle)))
        })
    }

    /// Frees the vehicle's place in every slot of the group.
    pub fn release_slot_group(&mut self, vehicle: VehicleId, group: SlotGroupId) {
        let Some(slots) = self.slot_groups.get(&group).map(|g| g.slots.clone()) else {
            return;
        };
        for id in slots {
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.vacate(vehicle);
            }
        }
    }

    /// Frees every slot place the vehicle holds.
    pub fn release_all_slots(&mut self, vehicle: VehicleId) {
        for slot in self.slots.values_mut() {
            slot.vacate(vehicle);
        }
    }
}
