//! `InsertOrder` and the per-kind placement checks shared with `ModifyOrder`.

use log::debug;

use super::{CommandCost, CommandError, CommandResult, ExecMode};
use crate::fleet::Fleet;
use crate::models::{
    ConditionVariable, ConditionalOrder, CounterId, DepotAction, DepotOrder, DepotTarget,
    LoadPolicy, NonStop, Order, OrderIndex, OrderKind, OrderList, SlotGroupId, SlotId, StationId,
    StationOrder, StopLocation, UnloadPolicy, Vehicle, VehicleId, VehicleType, WaypointOrder,
};
use crate::world::{Location, World};

impl Fleet {
    /// Inserts `order` at `index` (clamped to the list length).
    ///
    /// A vehicle without orders gets a fresh list. A conditional order's
    /// target is given in indices before the insertion.
    pub fn insert_order(
        &mut self,
        vehicle: VehicleId,
        index: OrderIndex,
        order: Order,
        mode: ExecMode,
        world: &World,
    ) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        if !order.is_list_order() {
            return Err(CommandError::InvalidOrderKind(order.kind_name()));
        }
        let list = v.order_list.and_then(|id| self.lists.get(&id));
        let len = list.map_or(0, OrderList::len);
        let index = index.min(len);
        if len >= self.settings.max_orders_per_list {
            return Err(CommandError::TooManyOrders(self.settings.max_orders_per_list));
        }
        if list.is_none() && !self.can_allocate_list() {
            return Err(CommandError::NoSpace);
        }
        check_new_order(v, list, index, &order, world)?;
        if !mode.is_execute() {
            return Ok(CommandCost::new());
        }

        let (owner, vehicle_type) = (v.owner, v.vehicle_type);
        let list_id = match list.map(OrderList::id) {
            Some(id) => id,
            None => {
                let id = self.allocate_list(owner, vehicle_type);
                self.attach(vehicle, id);
                id
            }
        };
        let order = normalized(order);
        let index = self.list_insert(list_id, index, order);
        debug!("{vehicle}: order inserted at {index} of {list_id}");
        Ok(CommandCost::new())
    }
}

/// Clears state a new order must not carry over.
fn normalized(mut order: Order) -> Order {
    match &mut order.kind {
        OrderKind::Conditional(c) => c.jump_counter = 0,
        OrderKind::GoToDepot(d) => d.resolved = None,
        _ => {}
    }
    order
}

fn check_new_order(
    v: &Vehicle,
    list: Option<&OrderList>,
    index: OrderIndex,
    order: &Order,
    world: &World,
) -> Result<(), CommandError> {
    match &order.kind {
        OrderKind::GoToStation(so) => {
            check_station_order(v, list, so, world)?;
            check_range_at(v, list, index, order, world)
        }
        OrderKind::GoToDepot(d) => {
            check_depot_order(v, list, d, None, world)?;
            check_range_at(v, list, index, order, world)
        }
        OrderKind::GoToWaypoint(w) => check_waypoint_order(v, w, world),
        OrderKind::Conditional(c) => {
            let len = list.map_or(0, OrderList::len);
            let target_ok = if len == 0 { c.target == 0 } else { c.target < len };
            if !target_ok {
                return Err(CommandError::InvalidJumpTarget(c.target));
            }
            if list.is_some_and(OrderList::has_unbunching_order) {
                return Err(CommandError::UnbunchingWithConditional);
            }
            check_condition(v, list, c, world)
        }
        OrderKind::ReleaseSlot(slot) | OrderKind::TryAcquireSlot(slot) => {
            check_slot(v, *slot, world)
        }
        OrderKind::ReleaseSlotGroup(group) => check_slot_group(v, *group, world),
        OrderKind::ChangeCounter(change) => check_counter(v, change.counter, world),
        OrderKind::Dummy | OrderKind::Label(_) => Ok(()),
        OrderKind::Implicit(_)
        | OrderKind::Loading(_)
        | OrderKind::LoadingAdvance(_)
        | OrderKind::LeaveStation(_)
        | OrderKind::Waiting => Err(CommandError::InvalidOrderKind(order.kind_name())),
    }
}

pub(super) fn check_non_stop(v: &Vehicle, non_stop: NonStop) -> Result<(), CommandError> {
    if non_stop != NonStop::StopEverywhere && !v.vehicle_type.is_ground() {
        return Err(CommandError::NonStopNotAllowed);
    }
    Ok(())
}

pub(super) fn check_station_order(
    v: &Vehicle,
    list: Option<&OrderList>,
    so: &StationOrder,
    world: &World,
) -> Result<(), CommandError> {
    let station = world
        .station(so.station)
        .ok_or(CommandError::UnknownStation(so.station))?;
    if !station.is_usable_by(v.owner) {
        return Err(CommandError::NotOwner);
    }
    if !world.can_vehicle_use_station(v, so.station) {
        return Err(CommandError::CannotUseStation(so.station));
    }
    check_non_stop(v, so.non_stop)?;
    if so.stop_location != StopLocation::FarEnd && v.vehicle_type != VehicleType::Train {
        return Err(CommandError::StopLocationNotAllowed);
    }
    if so.load == LoadPolicy::NoLoad && so.unload == UnloadPolicy::NoUnload {
        return Err(CommandError::InvalidPolicy);
    }
    if so.has_full_load() && list.is_some_and(OrderList::has_unbunching_order) {
        return Err(CommandError::UnbunchingFullLoad);
    }
    Ok(())
}

/// `replacing` is the index of the order being modified, which does not
/// count against the unbunching rules.
pub(super) fn check_depot_order(
    v: &Vehicle,
    list: Option<&OrderList>,
    d: &DepotOrder,
    replacing: Option<OrderIndex>,
    world: &World,
) -> Result<(), CommandError> {
    if let DepotTarget::Depot(id) = d.target {
        let depot = world.depot(id).ok_or(CommandError::UnknownDepot(id))?;
        if depot.owner != v.owner {
            return Err(CommandError::NotOwner);
        }
        if depot.vehicle_type != v.vehicle_type {
            return Err(CommandError::UnsuitableDepot(id));
        }
    }
    if d.action == DepotAction::Halt && d.service_only {
        return Err(CommandError::InvalidPolicy);
    }
    check_non_stop(v, d.non_stop)?;

    if d.action == DepotAction::Unbunch {
        let others = list
            .map(|l| {
                l.orders()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| Some(*i) != replacing)
                    .map(|(_, o)| o)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if others.iter().any(|o| o.is_unbunching()) {
            return Err(CommandError::UnbunchingOnlyOne);
        }
        if others.iter().any(|o| o.has_full_load()) {
            return Err(CommandError::UnbunchingFullLoad);
        }
        if others.iter().any(|o| o.is_conditional()) {
            return Err(CommandError::UnbunchingWithConditional);
        }
    }
    Ok(())
}

pub(super) fn check_waypoint_order(
    v: &Vehicle,
    w: &WaypointOrder,
    world: &World,
) -> Result<(), CommandError> {
    if !v.vehicle_type.is_ground() {
        return Err(CommandError::WaypointNotAllowed);
    }
    let waypoint = world
        .waypoint(w.waypoint)
        .ok_or(CommandError::UnknownWaypoint(w.waypoint))?;
    if waypoint.owner.is_some_and(|o| o != v.owner) {
        return Err(CommandError::NotOwner);
    }
    check_non_stop(v, w.non_stop)
}

/// Comparator, value range and referenced entities of a condition.
pub(super) fn check_condition(
    v: &Vehicle,
    list: Option<&OrderList>,
    c: &ConditionalOrder,
    world: &World,
) -> Result<(), CommandError> {
    if !c.variable.accepts(c.comparator) {
        return Err(CommandError::InvalidComparator {
            variable: c.variable.name(),
            comparator: c.comparator,
        });
    }
    let (min, max) = c.variable.value_range();
    if c.value < min || c.value > max {
        return Err(CommandError::InvalidConditionValue(c.value));
    }
    check_condition_references(v, list, &c.variable, world)
}

pub(super) fn check_condition_references(
    v: &Vehicle,
    list: Option<&OrderList>,
    variable: &ConditionVariable,
    world: &World,
) -> Result<(), CommandError> {
    let station = |id: Option<StationId>| match id {
        Some(id) if world.station(id).is_none() => Err(CommandError::UnknownStation(id)),
        _ => Ok(()),
    };
    match variable {
        ConditionVariable::CounterValue { counter: Some(c) } => check_counter(v, *c, world),
        ConditionVariable::SlotOccupancy { slot: Some(s) }
        | ConditionVariable::VehicleInSlot { slot: Some(s) } => check_slot(v, *s, world),
        ConditionVariable::VehicleInSlotGroup { group: Some(g) } => check_slot_group(v, *g, world),
        ConditionVariable::CargoWaiting { station: s, .. }
        | ConditionVariable::FreePlatforms { station: s } => station(*s),
        ConditionVariable::CargoWaitingAmount { station: s, via, .. }
        | ConditionVariable::CargoWaitingAmountPercentage { station: s, via, .. } => {
            station(*s)?;
            station(*via)
        }
        ConditionVariable::DispatchSlot { schedule, .. } => {
            let count = list.map_or(0, |l| l.dispatch_schedules().len());
            if *schedule >= count {
                return Err(CommandError::InvalidSchedule(*schedule));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

pub(super) fn check_slot(v: &Vehicle, slot: SlotId, world: &World) -> Result<(), CommandError> {
    let s = world.slot(slot).ok_or(CommandError::UnknownSlot(slot))?;
    if s.owner != v.owner {
        return Err(CommandError::NotOwner);
    }
    Ok(())
}

pub(super) fn check_slot_group(
    v: &Vehicle,
    group: SlotGroupId,
    world: &World,
) -> Result<(), CommandError> {
    let g = world
        .slot_group(group)
        .ok_or(CommandError::UnknownSlotGroup(group))?;
    if g.owner != v.owner {
        return Err(CommandError::NotOwner);
    }
    Ok(())
}

pub(super) fn check_counter(
    v: &Vehicle,
    counter: CounterId,
    world: &World,
) -> Result<(), CommandError> {
    let c = world
        .counter(counter)
        .ok_or(CommandError::UnknownCounter(counter))?;
    if c.owner != v.owner {
        return Err(CommandError::NotOwner);
    }
    Ok(())
}

/// Map position of a station or fixed depot order.
pub(super) fn leg_point(order: &Order, world: &World) -> Option<Location> {
    match &order.kind {
        OrderKind::GoToStation(so) => world.station(so.station).map(|s| s.location),
        OrderKind::GoToDepot(d) => match d.target {
            DepotTarget::Depot(id) => world.depot(id).map(|d| d.location),
            DepotTarget::Nearest => None,
        },
        _ => None,
    }
}

fn within_range(range: u32, a: Location, b: Location) -> bool {
    a.distance_squared(b) <= u64::from(range) * u64::from(range)
}

/// Legs to the neighbouring destinations of an order about to be inserted.
fn check_range_at(
    v: &Vehicle,
    list: Option<&OrderList>,
    index: OrderIndex,
    order: &Order,
    world: &World,
) -> Result<(), CommandError> {
    let (Some(range), Some(list), Some(point)) = (v.range, list, leg_point(order, world)) else {
        return Ok(());
    };
    if v.vehicle_type != VehicleType::Aircraft || list.is_empty() {
        return Ok(());
    }
    let len = list.len();
    let at = |offset: usize| list.order((index + offset) % len).and_then(|o| leg_point(o, world));
    let next = (0..len).find_map(at);
    let previous = (1..=len).find_map(|back| {
        list.order((index + len - back) % len)
            .and_then(|o| leg_point(o, world))
    });
    for neighbour in [previous, next].into_iter().flatten() {
        if !within_range(range, point, neighbour) {
            return Err(CommandError::AircraftOutOfRange);
        }
    }
    Ok(())
}

/// Every leg of a list, the wrap-around leg included.
pub(super) fn check_range_all(v: &Vehicle, list: &OrderList, world: &World) -> Result<(), CommandError> {
    let Some(range) = v.range.filter(|_| v.vehicle_type == VehicleType::Aircraft) else {
        return Ok(());
    };
    let points: Vec<Location> = list.orders().iter().filter_map(|o| leg_point(o, world)).collect();
    if points.len() < 2 {
        return Ok(());
    }
    let wrap = (points[points.len() - 1], points[0]);
    let legs = points.windows(2).map(|w| (w[0], w[1])).chain(std::iter::once(wrap));
    for (a, b) in legs {
        if !within_range(range, a, b) {
            return Err(CommandError::AircraftOutOfRange);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comparator, CompanyId, DepotId, DispatchSchedule, RoadStopKind, WaypointId};
    use crate::world::{Counter, Depot, Slot, Station, Waypoint};

    fn world() -> World {
        World::new()
            .with_station(Station::new(StationId(1), Location::new(0, 0)).with_rail(2).with_airport())
            .with_station(Station::new(StationId(2), Location::new(30, 40)).with_rail(2).with_airport())
            .with_station(Station::new(StationId(3), Location::new(300, 0)).with_airport())
            .with_station(
                Station::new(StationId(4), Location::new(5, 5))
                    .with_rail(1)
                    .with_owner(CompanyId(2)),
            )
            .with_station(Station::new(StationId(5), Location::new(8, 8)).with_bus_stop(1))
            .with_depot(Depot::new(DepotId(1), CompanyId(1), Location::new(1, 1), VehicleType::Train))
            .with_depot(Depot::new(DepotId(2), CompanyId(1), Location::new(2, 2), VehicleType::Road))
            .with_waypoint(Waypoint::new(WaypointId(1), Location::new(3, 3)))
            .with_slot(Slot::new(SlotId(1), CompanyId(2), 2))
            .with_counter(Counter::new(CounterId(1), CompanyId(1)))
    }

    fn fleet() -> Fleet {
        let mut fleet = Fleet::default();
        fleet.add_vehicle(Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train));
        fleet.add_vehicle(Vehicle::new(VehicleId(2), CompanyId(1), VehicleType::Road).with_road_stop(RoadStopKind::Bus, 1));
        fleet.add_vehicle(Vehicle::new(VehicleId(3), CompanyId(1), VehicleType::Aircraft).with_range(100));
        fleet
    }

    fn insert(fleet: &mut Fleet, vehicle: u32, index: OrderIndex, order: Order) -> CommandResult {
        fleet.insert_order(VehicleId(vehicle), index, order, ExecMode::Execute, &world())
    }

    #[test]
    fn test_insert_creates_list_and_clamps_index() {
        let mut fleet = fleet();
        insert(&mut fleet, 1, 7, Order::station(StationId(1))).unwrap();
        insert(&mut fleet, 1, 7, Order::station(StationId(2))).unwrap();

        let list = fleet.list_of(VehicleId(1)).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.order(1).and_then(Order::destination_station), Some(StationId(2)));
        assert!(list.is_shared_with(VehicleId(1)));
    }

    #[test]
    fn test_station_checks() {
        let mut fleet = fleet();
        assert_eq!(
            insert(&mut fleet, 1, 0, Order::station(StationId(9))),
            Err(CommandError::UnknownStation(StationId(9)))
        );
        assert_eq!(insert(&mut fleet, 1, 0, Order::station(StationId(4))), Err(CommandError::NotOwner));
        assert_eq!(
            insert(&mut fleet, 1, 0, Order::station(StationId(3))),
            Err(CommandError::CannotUseStation(StationId(3)))
        );
        assert!(insert(&mut fleet, 2, 0, Order::station(StationId(5))).is_ok());
        assert_eq!(
            insert(
                &mut fleet,
                2,
                0,
                Order::goto_station(StationOrder::new(StationId(5)).with_stop_location(StopLocation::Middle))
            ),
            Err(CommandError::StopLocationNotAllowed)
        );
        assert_eq!(
            insert(
                &mut fleet,
                3,
                0,
                Order::goto_station(StationOrder::new(StationId(1)).with_non_stop(NonStop::NonStop))
            ),
            Err(CommandError::NonStopNotAllowed)
        );
        assert_eq!(
            insert(
                &mut fleet,
                1,
                0,
                Order::goto_station(
                    StationOrder::new(StationId(1))
                        .with_load(LoadPolicy::NoLoad)
                        .with_unload(UnloadPolicy::NoUnload)
                )
            ),
            Err(CommandError::InvalidPolicy)
        );
    }

    #[test]
    fn test_rejects_state_kinds() {
        let mut fleet = fleet();
        assert_eq!(
            insert(&mut fleet, 1, 0, Order::implicit(StationId(1))),
            Err(CommandError::InvalidOrderKind("implicit"))
        );
        assert_eq!(
            insert(&mut fleet, 1, 0, Order::new(OrderKind::Waiting)),
            Err(CommandError::InvalidOrderKind("waiting"))
        );
    }

    #[test]
    fn test_depot_and_waypoint_checks() {
        let mut fleet = fleet();
        assert_eq!(
            insert(&mut fleet, 1, 0, Order::depot(DepotId(2))),
            Err(CommandError::UnsuitableDepot(DepotId(2)))
        );
        assert_eq!(
            insert(
                &mut fleet,
                1,
                0,
                Order::goto_depot(DepotOrder::new(DepotTarget::Depot(DepotId(1))).with_action(DepotAction::Halt).service_only())
            ),
            Err(CommandError::InvalidPolicy)
        );
        assert!(insert(&mut fleet, 1, 0, Order::waypoint(WaypointId(1))).is_ok());
        assert_eq!(
            insert(&mut fleet, 3, 0, Order::waypoint(WaypointId(1))),
            Err(CommandError::WaypointNotAllowed)
        );
    }

    #[test]
    fn test_unbunching_rules() {
        let mut fleet = fleet();
        let unbunch = || Order::goto_depot(DepotOrder::new(DepotTarget::Nearest).with_action(DepotAction::Unbunch));
        insert(&mut fleet, 1, 0, Order::station(StationId(1))).unwrap();
        insert(&mut fleet, 1, 1, unbunch()).unwrap();

        assert_eq!(insert(&mut fleet, 1, 2, unbunch()), Err(CommandError::UnbunchingOnlyOne));
        assert_eq!(
            insert(
                &mut fleet,
                1,
                2,
                Order::goto_station(StationOrder::new(StationId(2)).with_load(LoadPolicy::FullLoad))
            ),
            Err(CommandError::UnbunchingFullLoad)
        );
        assert_eq!(
            insert(
                &mut fleet,
                1,
                2,
                Order::conditional(ConditionVariable::Unconditionally, Comparator::Equals, 0, 0)
            ),
            Err(CommandError::UnbunchingWithConditional)
        );
    }

    #[test]
    fn test_conditional_checks() {
        let mut fleet = fleet();
        let cond = |variable, comparator, value, target| Order::conditional(variable, comparator, value, target);
        assert_eq!(
            insert(&mut fleet, 1, 0, cond(ConditionVariable::Unconditionally, Comparator::Equals, 0, 1)),
            Err(CommandError::InvalidJumpTarget(1))
        );
        insert(&mut fleet, 1, 0, Order::station(StationId(1))).unwrap();
        assert_eq!(
            insert(&mut fleet, 1, 1, cond(ConditionVariable::RequiresService, Comparator::LessThan, 0, 0)),
            Err(CommandError::InvalidComparator {
                variable: "requires-service",
                comparator: Comparator::LessThan
            })
        );
        assert_eq!(
            insert(&mut fleet, 1, 1, cond(ConditionVariable::LoadPercentage, Comparator::MoreThan, 101, 0)),
            Err(CommandError::InvalidConditionValue(101))
        );
        assert_eq!(
            insert(
                &mut fleet,
                1,
                1,
                cond(ConditionVariable::SlotOccupancy { slot: Some(SlotId(1)) }, Comparator::LessThan, 1, 0)
            ),
            Err(CommandError::NotOwner)
        );
        assert_eq!(
            insert(
                &mut fleet,
                1,
                1,
                cond(
                    ConditionVariable::DispatchSlot {
                        schedule: 0,
                        source: crate::models::DispatchSource::VehicleLast,
                        predicate: crate::models::DispatchPredicate::FirstSlot,
                    },
                    Comparator::IsTrue,
                    0,
                    0
                )
            ),
            Err(CommandError::InvalidSchedule(0))
        );
        fleet.add_dispatch_schedule(VehicleId(1), DispatchSchedule::new(0, 100).with_slot(10, 0));
        assert!(insert(
            &mut fleet,
            1,
            1,
            cond(
                ConditionVariable::DispatchSlot {
                    schedule: 0,
                    source: crate::models::DispatchSource::VehicleLast,
                    predicate: crate::models::DispatchPredicate::FirstSlot,
                },
                Comparator::IsTrue,
                0,
                0
            )
        )
        .is_ok());
        assert!(insert(
            &mut fleet,
            1,
            2,
            cond(ConditionVariable::CounterValue { counter: Some(CounterId(1)) }, Comparator::MoreThan, 3, 1)
        )
        .is_ok());
    }

    #[test]
    fn test_new_conditional_target_uses_pre_insert_indices() {
        let mut fleet = fleet();
        insert(&mut fleet, 1, 0, Order::station(StationId(1))).unwrap();
        insert(&mut fleet, 1, 1, Order::station(StationId(2))).unwrap();
        let mut order = Order::conditional(ConditionVariable::Unconditionally, Comparator::Equals, 0, 1);
        if let Some(c) = order.conditional_order_mut() {
            c.jump_counter = 17;
        }
        insert(&mut fleet, 1, 0, order).unwrap();

        let c = fleet.list_of(VehicleId(1)).unwrap().order(0).unwrap().conditional_order().unwrap().clone();
        assert_eq!(c.target, 2);
        assert_eq!(c.jump_counter, 0);
    }

    #[test]
    fn test_aircraft_range_on_neighbouring_legs() {
        let mut fleet = fleet();
        insert(&mut fleet, 3, 0, Order::station(StationId(1))).unwrap();
        // 30/40 from the origin is exactly 50 away.
        insert(&mut fleet, 3, 1, Order::station(StationId(2))).unwrap();
        assert_eq!(
            insert(&mut fleet, 3, 2, Order::station(StationId(3))),
            Err(CommandError::AircraftOutOfRange)
        );
    }

    #[test]
    fn test_list_limits() {
        let mut fleet = Fleet::new(crate::config::OrderSettings::new().with_max_orders_per_list(2).with_max_order_lists(1));
        fleet.add_vehicle(Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train));
        fleet.add_vehicle(Vehicle::new(VehicleId(2), CompanyId(1), VehicleType::Train));
        let world = world();
        let mut put = |v: u32| fleet.insert_order(VehicleId(v), 0, Order::station(StationId(1)), ExecMode::Execute, &world);

        assert!(put(1).is_ok());
        assert!(put(1).is_ok());
        assert_eq!(put(1), Err(CommandError::TooManyOrders(2)));
        assert_eq!(put(2), Err(CommandError::NoSpace));
    }
}
