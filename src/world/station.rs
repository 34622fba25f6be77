//! Stations, depots and waypoints as seen by the order engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::Location;
use crate::models::{CargoType, CompanyId, DepotId, StationId, VehicleType, WaypointId};

/// Which vehicle types a station can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StationFacilities {
    pub rail: bool,
    pub bus: bool,
    pub truck: bool,
    pub airport: bool,
    pub dock: bool,
}

/// Cargo waiting at a station for one cargo type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaitingCargo {
    pub total: u32,
    /// Portion of `total` routed via a given next hop.
    pub via: BTreeMap<StationId, u32>,
}

/// A station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    /// `None` for neutral stations usable by every company.
    pub owner: Option<CompanyId>,
    pub location: Location,
    pub facilities: StationFacilities,
    /// Road types served by the road stops.
    pub road_types: BTreeSet<u8>,
    pub waiting: BTreeMap<CargoType, WaitingCargo>,
    pub free_platforms: u32,
}

impl Station {
    pub fn new(id: StationId, location: Location) -> Self {
        Self {
            id,
            owner: None,
            location,
            facilities: StationFacilities::default(),
            road_types: BTreeSet::new(),
            waiting: BTreeMap::new(),
            free_platforms: 0,
        }
    }

    pub fn with_owner(mut self, owner: CompanyId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_rail(mut self, platforms: u32) -> Self {
        self.facilities.rail = true;
        self.free_platforms = platforms;
        self
    }

    pub fn with_bus_stop(mut self, road_type: u8) -> Self {
        self.facilities.bus = true;
        self.road_types.insert(road_type);
        self
    }

    pub fn with_truck_stop(mut self, road_type: u8) -> Self {
        self.facilities.truck = true;
        self.road_types.insert(road_type);
        self
    }

    pub fn with_airport(mut self) -> Self {
        self.facilities.airport = true;
        self
    }

    pub fn with_dock(mut self) -> Self {
        self.facilities.dock = true;
        self
    }

    pub fn with_waiting(mut self, cargo: CargoType, amount: u32) -> Self {
        self.waiting.entry(cargo).or_default().total += amount;
        self
    }

    /// Adds cargo waiting to travel via `next_hop`.
    pub fn with_waiting_via(mut self, cargo: CargoType, next_hop: StationId, amount: u32) -> Self {
        let entry = self.waiting.entry(cargo).or_default();
        entry.total += amount;
        *entry.via.entry(next_hop).or_default() += amount;
        self
    }

    /// Amount of `cargo` waiting, optionally only the part routed via `via`.
    pub fn waiting_amount(&self, cargo: CargoType, via: Option<StationId>) -> u32 {
        let Some(w) = self.waiting.get(&cargo) else {
            return 0;
        };
        match via {
            None => w.total,
            Some(hop) => w.via.get(&hop).copied().unwrap_or(0),
        }
    }

    pub fn has_waiting(&self, cargo: CargoType) -> bool {
        self.waiting_amount(cargo, None) > 0
    }

    /// Whether `company` may send vehicles here.
    pub fn is_usable_by(&self, company: CompanyId) -> bool {
        self.owner.is_none_or(|o| o == company)
    }
}

/// A depot for one vehicle type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub id: DepotId,
    pub owner: CompanyId,
    pub location: Location,
    pub vehicle_type: VehicleType,
}

impl Depot {
    pub fn new(id: DepotId, owner: CompanyId, location: Location, vehicle_type: VehicleType) -> Self {
        Self {
            id,
            owner,
            location,
            vehicle_type,
        }
    }
}

/// A rail or road waypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    pub owner: Option<CompanyId>,
    pub location: Location,
}

impl Waypoint {
    pub fn new(id: WaypointId, location: Location) -> Self {
        Self {
            id,
            owner: None,
            location,
        }
    }

    pub fn with_owner(mut self, owner: CompanyId) -> Self {
        self.owner = Some(owner);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_amounts() {
        let st = Station::new(StationId(1), Location::new(0, 0))
            .with_waiting(3, 40)
            .with_waiting_via(3, StationId(2), 25);

        assert_eq!(st.waiting_amount(3, None), 65);
        assert_eq!(st.waiting_amount(3, Some(StationId(2))), 25);
        assert_eq!(st.waiting_amount(3, Some(StationId(9))), 0);
        assert!(st.has_waiting(3));
        assert!(!st.has_waiting(4));
    }

    #[test]
    fn test_station_ownership() {
        let neutral = Station::new(StationId(1), Location::new(0, 0));
        let owned = Station::new(StationId(2), Location::new(0, 0)).with_owner(CompanyId(1));
        assert!(neutral.is_usable_by(CompanyId(7)));
        assert!(owned.is_usable_by(CompanyId(1)));
        assert!(!owned.is_usable_by(CompanyId(2)));
    }
}
