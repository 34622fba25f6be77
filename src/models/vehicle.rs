//! Vehicle model and per-vehicle order cursor.
//!
//! The vehicle holds only what the order engine reads or writes: its
//! cursor into the shared order list, the order it is executing, its
//! destination, and the snapshot values conditional orders compare
//! against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cargo::CargoType;
use super::dispatch::DispatchRecord;
use super::ids::{CompanyId, DepotId, OrderIndex, OrderListId, StationId, VehicleId, WaypointId};
use super::order::{LoadPolicy, NonStop, Order, OrderKind};
use super::order_list::OrderList;
use crate::world::Location;

/// Days per year used by age conditions.
pub const DAYS_PER_YEAR: i64 = 365;

/// Transport mode of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Train,
    Road,
    Ship,
    Aircraft,
}

impl VehicleType {
    /// Trains and road vehicles follow paths and create implicit orders.
    pub fn is_ground(self) -> bool {
        matches!(self, VehicleType::Train | VehicleType::Road)
    }
}

/// Road stop kind a road vehicle needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoadStopKind {
    #[default]
    Bus,
    Truck,
}

/// Amount and capacity for one cargo type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CargoHold {
    pub amount: u32,
    pub capacity: u32,
}

/// Resolved travel target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Station { station: StationId, location: Location },
    Depot { depot: DepotId, location: Location },
    Waypoint { waypoint: WaypointId, location: Location },
}

impl Destination {
    pub fn location(&self) -> Location {
        match *self {
            Destination::Station { location, .. }
            | Destination::Depot { location, .. }
            | Destination::Waypoint { location, .. } => location,
        }
    }
}

/// Per-vehicle position inside its order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderCursor {
    /// Order being executed, never an implicit order while manual orders exist.
    pub real_order_index: OrderIndex,
    /// Position used when matching or inserting implicit orders.
    pub implicit_order_index: OrderIndex,
    /// Order whose timetable entry is being measured.
    pub timetable_order_index: Option<OrderIndex>,
}

impl OrderCursor {
    pub fn reset(&mut self) {
        *self = OrderCursor::default();
    }

    /// Moves `real_order_index` onto a valid non-implicit order.
    pub fn update_real_order_index(&mut self, list: &OrderList) {
        if self.real_order_index >= list.len() {
            self.real_order_index = 0;
        }
        if list.manual_order_count() == 0 {
            self.real_order_index = 0;
            return;
        }
        while list.order(self.real_order_index).is_some_and(Order::is_implicit) {
            self.real_order_index = list.next_index(self.real_order_index);
        }
    }

    /// Advances the implicit cursor, dragging the real cursor along when
    /// both point at the same order.
    pub fn increment_implicit_order_index(&mut self, list: &OrderList) {
        if list.is_empty() {
            self.reset();
            return;
        }
        if self.implicit_order_index == self.real_order_index {
            self.real_order_index += 1;
            self.update_real_order_index(list);
        }
        loop {
            self.implicit_order_index = list.next_index(self.implicit_order_index);
            if self.implicit_order_index == self.real_order_index
                || list.order(self.implicit_order_index).is_some_and(Order::is_implicit)
            {
                break;
            }
        }
    }

    /// Advances to the next real order.
    pub fn increment_real_order_index(&mut self, list: &OrderList) {
        if self.implicit_order_index == self.real_order_index {
            self.increment_implicit_order_index(list);
        } else {
            self.real_order_index += 1;
            self.update_real_order_index(list);
        }
    }

    /// Adjusts for an order inserted at `index`; `new_len` includes it.
    ///
    /// Returns true when the insertion landed exactly on the implicit
    /// cursor, in which case implicit order creation must be suppressed.
    pub(crate) fn shift_for_insert(&mut self, index: OrderIndex, new_len: usize) -> bool {
        if index <= self.real_order_index && self.real_order_index + 1 < new_len {
            self.real_order_index += 1;
        }
        let suppress = index == self.implicit_order_index;
        if index <= self.implicit_order_index && self.implicit_order_index + 1 < new_len {
            self.implicit_order_index += 1;
        }
        if let Some(t) = self.timetable_order_index.as_mut() {
            if index <= *t {
                *t += 1;
            }
        }
        suppress
    }

    /// Adjusts for the order at `index` having been removed from `list`.
    pub(crate) fn shift_for_delete(&mut self, index: OrderIndex, list: &OrderList) {
        if index < self.real_order_index {
            self.real_order_index -= 1;
        } else if index == self.real_order_index {
            self.update_real_order_index(list);
        }

        if index < self.implicit_order_index {
            self.implicit_order_index -= 1;
        } else if index == self.implicit_order_index {
            if self.implicit_order_index >= list.len() {
                self.implicit_order_index = 0;
            }
            while !list.is_empty()
                && self.implicit_order_index != self.real_order_index
                && !list.order(self.implicit_order_index).is_some_and(Order::is_implicit)
            {
                self.implicit_order_index = list.next_index(self.implicit_order_index);
            }
        }

        self.timetable_order_index = match self.timetable_order_index {
            Some(t) if t == index => None,
            Some(t) if t > index => Some(t - 1),
            other => other,
        };
    }

    /// Adjusts for the order at `from` having been moved to `to`.
    pub(crate) fn shift_for_move(&mut self, from: OrderIndex, to: OrderIndex) {
        self.real_order_index = remap_moved_index(self.real_order_index, from, to);
        self.implicit_order_index = remap_moved_index(self.implicit_order_index, from, to);
        self.timetable_order_index = self
            .timetable_order_index
            .map(|t| remap_moved_index(t, from, to));
    }
}

/// Where an index ends up after the order at `from` moves to `to`.
pub(crate) fn remap_moved_index(index: OrderIndex, from: OrderIndex, to: OrderIndex) -> OrderIndex {
    if index == from {
        to
    } else if from < to && index > from && index <= to {
        index - 1
    } else if from > to && index < from && index >= to {
        index + 1
    } else {
        index
    }
}

/// A vehicle as seen by the order engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub owner: CompanyId,
    pub vehicle_type: VehicleType,
    /// Road stop kind (road vehicles only).
    pub road_stop: RoadStopKind,
    /// Road type id (road vehicles only).
    pub road_type: u8,
    /// Maximum leg length for aircraft; `None` = unlimited.
    pub range: Option<u32>,
    /// Shared order list, if any.
    pub order_list: Option<OrderListId>,
    pub cursor: OrderCursor,
    /// Order being executed, or a transient state order.
    pub current_order: Option<Order>,
    pub destination: Option<Destination>,
    pub location: Location,
    /// Station the vehicle currently occupies.
    pub at_station: Option<StationId>,
    /// Waypoint the vehicle currently occupies.
    pub at_waypoint: Option<WaypointId>,
    pub last_station_visited: Option<StationId>,
    /// Being serviced inside a depot.
    pub in_depot_service: bool,
    /// Implicit order creation is off until the cursor is on track again.
    pub suppress_implicit_orders: bool,
    pub cargo: BTreeMap<CargoType, CargoHold>,
    /// Reliability, `0..=65535` maps to 0–100 %.
    pub reliability: u16,
    pub max_speed: u32,
    pub age_days: i64,
    pub max_age_days: i64,
    pub service_interval_days: i64,
    pub days_since_service: i64,
    /// Last dispatch per schedule index.
    pub dispatch_records: BTreeMap<usize, DispatchRecord>,
}

impl Vehicle {
    pub fn new(id: VehicleId, owner: CompanyId, vehicle_type: VehicleType) -> Self {
        Self {
            id,
            owner,
            vehicle_type,
            road_stop: RoadStopKind::Bus,
            road_type: 0,
            range: None,
            order_list: None,
            cursor: OrderCursor::default(),
            current_order: None,
            destination: None,
            location: Location::default(),
            at_station: None,
            at_waypoint: None,
            last_station_visited: None,
            in_depot_service: false,
            suppress_implicit_orders: false,
            cargo: BTreeMap::new(),
            reliability: u16::MAX,
            max_speed: 0,
            age_days: 0,
            max_age_days: 20 * DAYS_PER_YEAR,
            service_interval_days: 150,
            days_since_service: 0,
            dispatch_records: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_road_stop(mut self, kind: RoadStopKind, road_type: u8) -> Self {
        self.road_stop = kind;
        self.road_type = road_type;
        self
    }

    pub fn with_range(mut self, range: u32) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_cargo(mut self, cargo: CargoType, amount: u32, capacity: u32) -> Self {
        self.cargo.insert(cargo, CargoHold { amount, capacity });
        self
    }

    pub fn with_reliability(mut self, reliability: u16) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_max_speed(mut self, speed: u32) -> Self {
        self.max_speed = speed;
        self
    }

    pub fn with_age(mut self, age_days: i64, max_age_days: i64) -> Self {
        self.age_days = age_days;
        self.max_age_days = max_age_days;
        self
    }

    pub fn with_service(mut self, interval_days: i64, days_since_service: i64) -> Self {
        self.service_interval_days = interval_days;
        self.days_since_service = days_since_service;
        self
    }

    pub fn needs_servicing(&self) -> bool {
        self.days_since_service >= self.service_interval_days
    }

    /// Total cargo load as a percentage of total capacity.
    pub fn load_percentage(&self) -> i64 {
        let (amount, capacity) = self
            .cargo
            .values()
            .fold((0u64, 0u64), |(a, c), h| (a + u64::from(h.amount), c + u64::from(h.capacity)));
        if capacity == 0 {
            return 0;
        }
        (amount * 100 / capacity) as i64
    }

    pub fn capacity_for(&self, cargo: CargoType) -> u32 {
        self.cargo.get(&cargo).map_or(0, |h| h.capacity)
    }

    pub fn reliability_percent(&self) -> i64 {
        i64::from(self.reliability) * 100 >> 16
    }

    pub fn age_years(&self) -> i64 {
        self.age_days / DAYS_PER_YEAR
    }

    /// Whole years left, rounded up and clamped to zero.
    pub fn remaining_lifetime_years(&self) -> i64 {
        let remaining = self.max_age_days - self.age_days;
        ((remaining + DAYS_PER_YEAR - 1).div_euclid(DAYS_PER_YEAR)).max(0)
    }

    /// Loading, waiting, leaving or being serviced.
    pub fn is_busy(&self) -> bool {
        self.in_depot_service
            || matches!(
                self.current_order.as_ref().map(|o| &o.kind),
                Some(
                    OrderKind::Loading(_)
                        | OrderKind::LoadingAdvance(_)
                        | OrderKind::Waiting
                        | OrderKind::LeaveStation(_)
                )
            )
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.current_order.as_ref().map(|o| &o.kind),
            Some(OrderKind::Loading(_))
        )
    }

    /// Drops the current order and destination.
    pub fn clear_current_order(&mut self) {
        self.current_order = None;
        self.destination = None;
    }

    /// Turns an in-progress load into an unscheduled stop.
    ///
    /// Used when the order being loaded at disappears: the vehicle keeps
    /// loading but no longer waits for a full load.
    pub fn cancel_loading(&mut self) {
        if let Some(Order {
            kind: OrderKind::Loading(loading),
            ..
        }) = self.current_order.as_mut()
        {
            loading.at_destination = false;
            loading.order.non_stop = NonStop::StopEverywhere;
            if loading.order.load.is_full_load() {
                loading.order.load = LoadPolicy::LoadIfPossible;
            }
            for policy in loading.order.cargo_overrides.values_mut() {
                if policy.load.is_full_load() {
                    policy.load = LoadPolicy::LoadIfPossible;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderListId, StationId};

    fn list_with(orders: Vec<Order>) -> OrderList {
        OrderList::from_orders(OrderListId(1), VehicleType::Train, orders)
    }

    #[test]
    fn test_vehicle_snapshot_values() {
        let v = Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Road)
            .with_cargo(0, 30, 40)
            .with_cargo(1, 0, 60)
            .with_reliability(u16::MAX / 2)
            .with_age(800, 1000);

        assert_eq!(v.load_percentage(), 30);
        assert_eq!(v.reliability_percent(), 49);
        assert_eq!(v.age_years(), 2);
        assert_eq!(v.remaining_lifetime_years(), 1);
        assert_eq!(v.with_age(2000, 1000).remaining_lifetime_years(), 0);
    }

    #[test]
    fn test_needs_servicing() {
        let v = Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train).with_service(100, 99);
        assert!(!v.needs_servicing());
        assert!(v.with_service(100, 100).needs_servicing());
    }

    #[test]
    fn test_increment_skips_implicit() {
        let list = list_with(vec![
            Order::station(StationId(1)),
            Order::implicit(StationId(2)),
            Order::station(StationId(3)),
        ]);
        let mut cursor = OrderCursor::default();

        cursor.increment_real_order_index(&list);
        assert_eq!(cursor.real_order_index, 2);
        assert_eq!(cursor.implicit_order_index, 1);

        cursor.increment_implicit_order_index(&list);
        assert_eq!(cursor.implicit_order_index, 2);
        assert_eq!(cursor.real_order_index, 2);

        cursor.increment_real_order_index(&list);
        assert_eq!(cursor.real_order_index, 0);
        assert_eq!(cursor.implicit_order_index, 0);
    }

    #[test]
    fn test_update_real_without_manual_orders() {
        let list = list_with(vec![Order::implicit(StationId(1))]);
        let mut cursor = OrderCursor {
            real_order_index: 3,
            ..Default::default()
        };
        cursor.update_real_order_index(&list);
        assert_eq!(cursor.real_order_index, 0);
    }

    #[test]
    fn test_remap_moved_index() {
        // [a b c d e], move 1 -> 3 gives [a c d b e]
        assert_eq!(remap_moved_index(1, 1, 3), 3);
        assert_eq!(remap_moved_index(2, 1, 3), 1);
        assert_eq!(remap_moved_index(3, 1, 3), 2);
        assert_eq!(remap_moved_index(4, 1, 3), 4);
        // move 3 -> 1 gives [a d b c e]
        assert_eq!(remap_moved_index(1, 3, 1), 2);
        assert_eq!(remap_moved_index(3, 3, 1), 1);
        assert_eq!(remap_moved_index(0, 3, 1), 0);
    }

    #[test]
    fn test_cancel_loading() {
        let mut v = Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train);
        let so = crate::models::StationOrder::new(StationId(1)).with_load(LoadPolicy::FullLoadAny);
        v.current_order = Some(Order::new(OrderKind::Loading(crate::models::LoadingOrder {
            order: so,
            at_destination: true,
        })));

        v.cancel_loading();
        match &v.current_order.as_ref().unwrap().kind {
            OrderKind::Loading(l) => {
                assert!(!l.at_destination);
                assert_eq!(l.order.load, LoadPolicy::LoadIfPossible);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(v.is_busy());
    }
}
