//! Next-stopping-station prediction.
//!
//! Cargo routing wants to know where a vehicle will next load or unload,
//! per cargo type. The predictor walks the order list from a start index
//! and reports `(cargo mask, station)` pairs:
//!
//! - Go-via stations, waypoints, non-halting depots, slot, counter, dummy
//!   and label orders are passed over.
//! - A station order stops the cargo types it loads or unloads; the rest of
//!   the mask keeps walking.
//! - The station the vehicle last visited is passed over, except that cargo
//!   unloaded there in full has no next stop.
//! - A halting depot ends the walk with no stop.
//! - A conditional order whose dry-run answer is exact is followed. A
//!   predicted answer (percent, slot acquisition, schedule dispatch) forks
//!   into both branches and the results are merged.
//!
//! Each branch stops when it revisits an order. The whole walk is bounded
//! by `min(max_conditional_depth, order_count)` steps per branch and a
//! total work budget, so adversarial conditional graphs terminate.

use smallvec::SmallVec;

use crate::conditions::{self, EvalMode};
use crate::fleet::Fleet;
use crate::models::{
    CargoFilter, CargoMask, CargoType, DepotAction, OrderIndex, OrderKind, OrderList, StationId,
    StationOrder, Vehicle, VehicleId,
};
use crate::world::World;

/// Predicted next stops, one entry per station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextStops {
    entries: SmallVec<[(CargoMask, StationId); 4]>,
}

impl NextStops {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(cargo mask, station)` pairs in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (CargoMask, StationId)> + '_ {
        self.entries.iter().copied()
    }

    pub fn stations(&self) -> impl Iterator<Item = StationId> + '_ {
        self.entries.iter().map(|(_, s)| *s)
    }

    /// The only predicted station, if the branches agree.
    pub fn single(&self) -> Option<StationId> {
        match self.entries.as_slice() {
            [(_, station)] => Some(*station),
            _ => None,
        }
    }

    /// Stations `cargo` may stop at next.
    pub fn stations_for(&self, cargo: CargoType) -> impl Iterator<Item = StationId> + '_ {
        self.entries
            .iter()
            .filter(move |(mask, _)| mask.contains(cargo))
            .map(|(_, s)| *s)
    }

    /// Adds a stop, merging masks of the same station.
    pub fn push(&mut self, mask: CargoMask, station: StationId) {
        if mask.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(_, s)| *s == station) {
            Some((m, _)) => *m = m.union(mask),
            None => self.entries.push((mask, station)),
        }
    }
}

struct Predictor<'a> {
    vehicle: &'a Vehicle,
    list: &'a OrderList,
    world: &'a World,
    bound: usize,
    budget: usize,
}

impl Predictor<'_> {
    fn walk(
        &mut self,
        mut index: OrderIndex,
        mut mask: CargoMask,
        mut seen: Vec<bool>,
        mut hops: usize,
        out: &mut NextStops,
    ) {
        let list = self.list;
        loop {
            if mask.is_empty() || hops >= self.bound || self.budget == 0 {
                return;
            }
            let Some(order) = list.order(index) else {
                return;
            };
            if seen[index] {
                return;
            }
            seen[index] = true;
            hops += 1;
            self.budget -= 1;

            let next = list.next_index(index);
            match &order.kind {
                OrderKind::GoToStation(so) => {
                    if so.stops_here() {
                        mask = self.stop(so.station, Some(so), mask, out);
                    }
                }
                OrderKind::Implicit(station) => mask = self.stop(*station, None, mask, out),
                OrderKind::GoToDepot(d) if d.action == DepotAction::Halt => return,
                OrderKind::Conditional(cond) => {
                    let outcome = conditions::evaluate(
                        cond,
                        index,
                        self.vehicle,
                        list,
                        self.world,
                        &mut EvalMode::DryRun,
                    );
                    if outcome.exact {
                        index = if outcome.skip { cond.target } else { next };
                        continue;
                    }
                    self.walk(cond.target, mask, seen.clone(), hops, out);
                }
                _ => {}
            }
            index = next;
        }
    }

    /// Records the cargo that stops at `station` and returns what travels on.
    fn stop(
        &self,
        station: StationId,
        order: Option<&StationOrder>,
        mask: CargoMask,
        out: &mut NextStops,
    ) -> CargoMask {
        let policy = |c: CargoType| order.map(|so| so.policy_for(c)).unwrap_or_default();
        if self.vehicle.last_station_visited == Some(station) {
            let unloaded: CargoMask = mask
                .iter()
                .filter(|&c| policy(c).unload.unloads_everything())
                .collect();
            return mask.difference(unloaded);
        }
        let stops: CargoMask = match order {
            Some(_) => mask.iter().filter(|&c| policy(c).handles_cargo()).collect(),
            None => mask,
        };
        out.push(stops, station);
        mask.difference(stops)
    }
}

impl Fleet {
    /// Predicts where the vehicle next stops, starting after its implicit
    /// cursor.
    pub fn next_stopping_stations(
        &self,
        vehicle: VehicleId,
        world: &World,
        filter: CargoFilter,
    ) -> NextStops {
        let Some((v, list)) = self.vehicle_and_list(vehicle) else {
            return NextStops::new();
        };
        let from = list.next_index(v.cursor.implicit_order_index.min(list.len() - 1));
        self.predict(v, list, from, world, filter)
    }

    /// Predicts the next stop starting at order `from` itself.
    pub fn next_stopping_stations_from(
        &self,
        vehicle: VehicleId,
        from: OrderIndex,
        world: &World,
        filter: CargoFilter,
    ) -> NextStops {
        match self.vehicle_and_list(vehicle) {
            Some((v, list)) if from < list.len() => self.predict(v, list, from, world, filter),
            _ => NextStops::new(),
        }
    }

    fn vehicle_and_list(&self, vehicle: VehicleId) -> Option<(&Vehicle, &OrderList)> {
        let v = self.vehicles.get(&vehicle)?;
        let list = self.lists.get(&v.order_list?).filter(|l| !l.is_empty())?;
        Some((v, list))
    }

    fn predict(
        &self,
        vehicle: &Vehicle,
        list: &OrderList,
        from: OrderIndex,
        world: &World,
        filter: CargoFilter,
    ) -> NextStops {
        let bound = self.settings.depth_bound(list.len());
        let mut predictor = Predictor {
            vehicle,
            list,
            world,
            bound,
            budget: bound * list.len(),
        };
        let mut out = NextStops::new();
        predictor.walk(from, filter.initial_mask(), vec![false; list.len()], 0, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Comparator, CompanyId, ConditionVariable, DepotOrder, DepotTarget, LoadPolicy, NonStop,
        Order, UnloadPolicy, VehicleType,
    };
    use crate::world::{Location, Station};

    const A: StationId = StationId(1);
    const B: StationId = StationId(2);
    const C: StationId = StationId(3);

    fn world_with_waiting(amount: u32) -> World {
        World::new()
            .with_station(Station::new(A, Location::new(0, 0)).with_rail(1).with_waiting(0, amount))
            .with_station(Station::new(B, Location::new(5, 0)).with_rail(1))
            .with_station(Station::new(C, Location::new(9, 0)).with_rail(1))
    }

    fn fleet_with(orders: Vec<Order>) -> Fleet {
        let mut fleet = Fleet::default();
        fleet.add_vehicle(Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train));
        fleet.install_list(VehicleId(1), orders);
        fleet
    }

    fn entries(stops: &NextStops) -> Vec<(CargoMask, StationId)> {
        stops.iter().collect()
    }

    #[test]
    fn test_cargo_waiting_branch_scenario() {
        let orders = vec![
            Order::goto_station(StationOrder::new(A).with_non_stop(NonStop::NonStop)),
            Order::conditional(
                ConditionVariable::CargoWaitingAmount {
                    station: Some(A),
                    cargo: 0,
                    via: None,
                },
                Comparator::MoreThanOrEquals,
                50,
                0,
            ),
            Order::station(B),
        ];
        let fleet = fleet_with(orders);

        let busy = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(80), CargoFilter::Ignore);
        assert_eq!(busy.single(), Some(A));
        let quiet = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(10), CargoFilter::Ignore);
        assert_eq!(quiet.single(), Some(B));
    }

    #[test]
    fn test_skips_non_stopping_orders() {
        let fleet = fleet_with(vec![
            Order::station(A),
            Order::goto_station(StationOrder::new(B).with_non_stop(NonStop::GoVia)),
            Order::nearest_depot(),
            Order::label("x"),
            Order::station(C),
        ]);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        assert_eq!(entries(&stops), vec![(CargoMask::ALL, C)]);
    }

    #[test]
    fn test_halting_depot_has_no_next_stop() {
        let fleet = fleet_with(vec![
            Order::station(A),
            Order::goto_depot(DepotOrder::new(DepotTarget::Nearest).with_action(DepotAction::Halt)),
            Order::station(B),
        ]);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        assert!(stops.is_empty());
    }

    #[test]
    fn test_per_cargo_policies_split_the_mask() {
        let fleet = fleet_with(vec![
            Order::station(A),
            Order::goto_station(
                StationOrder::new(B)
                    .with_load(LoadPolicy::NoLoad)
                    .with_unload(UnloadPolicy::NoUnload)
                    .with_cargo_policy(1, LoadPolicy::LoadIfPossible, UnloadPolicy::UnloadIfAccepted),
            ),
            Order::station(C),
        ]);
        let mask: CargoMask = [1, 2].into_iter().collect();
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Mask(mask));

        assert_eq!(stops.stations_for(1).collect::<Vec<_>>(), vec![B]);
        assert_eq!(stops.stations_for(2).collect::<Vec<_>>(), vec![C]);
    }

    #[test]
    fn test_last_visited_station_is_passed() {
        let mut fleet = fleet_with(vec![Order::station(A), Order::station(B), Order::station(C)]);
        fleet.vehicle_mut(VehicleId(1)).unwrap().last_station_visited = Some(B);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        assert_eq!(stops.single(), Some(C));

        let mut fleet = fleet_with(vec![
            Order::station(A),
            Order::goto_station(StationOrder::new(B).with_unload(UnloadPolicy::Unload)),
            Order::station(C),
        ]);
        fleet.vehicle_mut(VehicleId(1)).unwrap().last_station_visited = Some(B);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        assert!(stops.is_empty());
    }

    #[test]
    fn test_predicted_condition_forks() {
        let fleet = fleet_with(vec![
            Order::station(A),
            Order::conditional(ConditionVariable::Percent, Comparator::Equals, 50, 3),
            Order::station(B),
            Order::station(C),
        ]);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        let mut stations: Vec<_> = stops.stations().collect();
        stations.sort();
        assert_eq!(stations, vec![B, C]);
        assert_eq!(stops.single(), None);
    }

    #[test]
    fn test_converging_branches_collapse() {
        let fleet = fleet_with(vec![
            Order::station(A),
            Order::conditional(ConditionVariable::Percent, Comparator::Equals, 50, 3),
            Order::dummy(),
            Order::station(B),
        ]);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        assert_eq!(entries(&stops), vec![(CargoMask::ALL, B)]);
    }

    #[test]
    fn test_conditional_cycles_terminate() {
        let jump = |t| Order::conditional(ConditionVariable::Percent, Comparator::Equals, 50, t);
        let orders: Vec<Order> = (0..40).map(|i| jump((i * 7 + 3) % 40)).collect();
        let fleet = fleet_with(orders);
        let stops = fleet.next_stopping_stations(VehicleId(1), &world_with_waiting(0), CargoFilter::Ignore);
        assert!(stops.is_empty());
    }

    #[test]
    fn test_from_is_inclusive() {
        let fleet = fleet_with(vec![Order::station(A), Order::station(B)]);
        let world = world_with_waiting(0);
        assert_eq!(
            fleet.next_stopping_stations_from(VehicleId(1), 0, &world, CargoFilter::Ignore).single(),
            Some(A)
        );
        assert!(fleet
            .next_stopping_stations_from(VehicleId(1), 5, &world, CargoFilter::Ignore)
            .is_empty());
    }
}
