//! `CloneOrders`: share, copy or unshare another vehicle's list.

use log::info;

use super::insert::check_range_all;
use super::{CloneMode, CommandCost, CommandError, CommandResult, ExecMode};
use crate::fleet::Fleet;
use crate::models::{OrderList, Vehicle, VehicleId};
use crate::world::World;

impl Fleet {
    /// Shares, copies or unshares order lists.
    ///
    /// `Share` links `vehicle` to the source's list, `Copy` gives it a
    /// private duplicate, and `Unshare` moves it off a shared list onto its
    /// own copy. The vehicle's previous list is released first.
    pub fn clone_orders(
        &mut self,
        vehicle: VehicleId,
        source: Option<VehicleId>,
        clone: CloneMode,
        mode: ExecMode,
        world: &World,
    ) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        if clone == CloneMode::Unshare {
            let shared = v
                .order_list
                .and_then(|id| self.lists.get(&id))
                .is_some_and(OrderList::is_shared);
            if shared && !self.can_allocate_list() {
                return Err(CommandError::NoSpace);
            }
            if mode.is_execute() {
                self.unshare(vehicle)?;
            }
            return Ok(CommandCost::new());
        }

        let source = source.ok_or(CommandError::MissingSource)?;
        if source == vehicle {
            return Err(CommandError::CannotCloneSelf);
        }
        let src = self.command_vehicle(source)?;
        if src.vehicle_type != v.vehicle_type {
            return Err(CommandError::VehicleTypeMismatch);
        }
        if src.owner != v.owner {
            return Err(CommandError::NotOwner);
        }
        let list = src
            .order_list
            .and_then(|id| self.lists.get(&id))
            .ok_or(CommandError::NoOrders)?;
        if clone == CloneMode::Share && v.order_list == Some(list.id()) {
            return Err(CommandError::AlreadyShared);
        }
        check_stations(v, src, list, clone, world)?;
        check_range_all(v, list, world)?;
        if clone == CloneMode::Copy && !self.can_allocate_list() {
            return Err(CommandError::NoSpace);
        }
        if !mode.is_execute() {
            return Ok(CommandCost::new());
        }

        let source_list = list.id();
        self.detach(vehicle);
        let target = match clone {
            CloneMode::Share => source_list,
            _ => self.duplicate_list(source_list).ok_or(CommandError::NoSpace)?,
        };
        self.attach(vehicle, target);
        info!("{vehicle}: {clone:?} orders of {source} via {target}");
        Ok(CommandCost::new())
    }
}

/// Every station order must be usable by the destination vehicle.
///
/// Sharing tolerates a station neither vehicle can use, since the list
/// already carries that order for the source.
fn check_stations(
    dst: &Vehicle,
    src: &Vehicle,
    list: &OrderList,
    clone: CloneMode,
    world: &World,
) -> Result<(), CommandError> {
    for station in list.orders().iter().filter_map(|o| o.station_order().map(|so| so.station)) {
        if world.can_vehicle_use_station(dst, station) {
            continue;
        }
        if clone == CloneMode::Share && !world.can_vehicle_use_station(src, station) {
            continue;
        }
        return Err(CommandError::CannotUseStation(station));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::DestinationKey;
    use crate::models::{CompanyId, Order, RoadStopKind, StationId, VehicleType};
    use crate::world::{Location, Station};

    fn world() -> World {
        World::new()
            .with_station(Station::new(StationId(1), Location::new(0, 0)).with_bus_stop(1).with_airport())
            .with_station(Station::new(StationId(2), Location::new(60, 0)).with_bus_stop(1).with_airport())
            .with_station(Station::new(StationId(3), Location::new(90, 0)).with_bus_stop(2).with_airport())
    }

    fn fleet() -> Fleet {
        let mut fleet = Fleet::default();
        for id in 1..=3 {
            fleet.add_vehicle(
                Vehicle::new(VehicleId(id), CompanyId(1), VehicleType::Road).with_road_stop(RoadStopKind::Bus, 1),
            );
        }
        fleet.install_list(VehicleId(1), vec![Order::station(StationId(1)), Order::station(StationId(2))]);
        fleet
    }

    fn clone(fleet: &mut Fleet, vehicle: u32, source: u32, mode: CloneMode) -> CommandResult {
        fleet.clone_orders(VehicleId(vehicle), Some(VehicleId(source)), mode, ExecMode::Execute, &world())
    }

    #[test]
    fn test_share_then_unshare() {
        let mut fleet = fleet();
        clone(&mut fleet, 2, 1, CloneMode::Share).unwrap();
        let shared = fleet.vehicle(VehicleId(1)).unwrap().order_list;
        assert_eq!(fleet.vehicle(VehicleId(2)).unwrap().order_list, shared);
        assert_eq!(fleet.list_of(VehicleId(1)).unwrap().shared_count(), 2);
        assert_eq!(clone(&mut fleet, 2, 1, CloneMode::Share), Err(CommandError::AlreadyShared));

        fleet
            .clone_orders(VehicleId(2), None, CloneMode::Unshare, ExecMode::Execute, &world())
            .unwrap();
        assert_ne!(fleet.vehicle(VehicleId(2)).unwrap().order_list, shared);
        assert_eq!(fleet.list_of(VehicleId(2)).unwrap().len(), 2);
        assert_eq!(fleet.list_of(VehicleId(1)).unwrap().shared_count(), 1);
        assert!(fleet.check_invariants().is_ok());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut fleet = fleet();
        clone(&mut fleet, 2, 1, CloneMode::Copy).unwrap();
        fleet
            .insert_order(VehicleId(2), 2, Order::station(StationId(1)), ExecMode::Execute, &world())
            .unwrap();

        assert_eq!(fleet.list_of(VehicleId(1)).unwrap().len(), 2);
        assert_eq!(fleet.list_of(VehicleId(2)).unwrap().len(), 3);
        let key = DestinationKey::for_order(&Order::station(StationId(1)), CompanyId(1), VehicleType::Road).unwrap();
        assert_eq!(fleet.destinations().count(&key), 3);
    }

    #[test]
    fn test_clone_replaces_previous_list() {
        let mut fleet = fleet();
        fleet.install_list(VehicleId(2), vec![Order::station(StationId(2))]);
        clone(&mut fleet, 2, 1, CloneMode::Share).unwrap();

        assert_eq!(fleet.order_lists().count(), 1);
        assert_eq!(fleet.vehicle(VehicleId(2)).unwrap().cursor.real_order_index, 0);
    }

    #[test]
    fn test_clone_rejections() {
        let mut fleet = fleet();
        fleet.add_vehicle(Vehicle::new(VehicleId(4), CompanyId(1), VehicleType::Train));
        fleet.add_vehicle(
            Vehicle::new(VehicleId(5), CompanyId(2), VehicleType::Road).with_road_stop(RoadStopKind::Bus, 1),
        );

        assert_eq!(clone(&mut fleet, 1, 1, CloneMode::Share), Err(CommandError::CannotCloneSelf));
        assert_eq!(clone(&mut fleet, 4, 1, CloneMode::Share), Err(CommandError::VehicleTypeMismatch));
        assert_eq!(clone(&mut fleet, 5, 1, CloneMode::Copy), Err(CommandError::NotOwner));
        assert_eq!(clone(&mut fleet, 2, 3, CloneMode::Copy), Err(CommandError::NoOrders));
        assert_eq!(
            fleet.clone_orders(VehicleId(2), None, CloneMode::Share, ExecMode::Execute, &world()),
            Err(CommandError::MissingSource)
        );
    }

    #[test]
    fn test_station_usability() {
        let mut fleet = fleet();
        // Vehicle 3 runs on road type 2 only.
        fleet.vehicle_mut(VehicleId(3)).unwrap().road_type = 2;
        assert_eq!(
            clone(&mut fleet, 3, 1, CloneMode::Copy),
            Err(CommandError::CannotUseStation(StationId(1)))
        );
        assert_eq!(
            clone(&mut fleet, 3, 1, CloneMode::Share),
            Err(CommandError::CannotUseStation(StationId(1)))
        );

        // A station the source could not use either is tolerated when sharing.
        fleet.install_list(VehicleId(1), vec![Order::station(StationId(3))]);
        fleet.vehicle_mut(VehicleId(3)).unwrap().road_type = 3;
        assert!(clone(&mut fleet, 3, 1, CloneMode::Share).is_ok());
    }

    #[test]
    fn test_aircraft_range_includes_wrap_leg() {
        let mut fleet = Fleet::default();
        for id in 1..=2 {
            fleet.add_vehicle(Vehicle::new(VehicleId(id), CompanyId(1), VehicleType::Aircraft).with_range(70));
        }
        fleet.install_list(
            VehicleId(1),
            vec![Order::station(StationId(1)), Order::station(StationId(2)), Order::station(StationId(3))],
        );
        // 1 -> 2 is 60 and 2 -> 3 is 30, but 3 -> 1 is 90.
        assert_eq!(clone(&mut fleet, 2, 1, CloneMode::Copy), Err(CommandError::AircraftOutOfRange));

        fleet.vehicle_mut(VehicleId(2)).unwrap().range = Some(90);
        assert!(clone(&mut fleet, 2, 1, CloneMode::Copy).is_ok());
    }
}
