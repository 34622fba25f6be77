//! Order advancement state machine.
//!
//! Once per tick the simulation asks the fleet to process a vehicle's
//! orders. Advancement resolves the order under the vehicle's cursor into
//! a destination, stepping over orders that are not destinations:
//!
//! | Order | Step |
//! |-------|------|
//! | Station / waypoint | destination, stop |
//! | Depot | destination; skipped when service-only and not due, or when no depot is found |
//! | Conditional | jump to the target on skip, else next order |
//! | Slot / slot group / counter | apply, next order |
//! | Dummy / label | next order |
//!
//! The walk is bounded by `min(max_conditional_depth, order_count)` steps;
//! running out of steps leaves the vehicle without a destination.
//!
//! Path reservation uses the same walk through [`Fleet::look_ahead`] with a
//! local cursor, side effects recorded in a [`DeferredContext`], and a
//! failed depot search reported instead of skipped.
//!
//! The station lifecycle (`begin_loading` → `leave_station` → `depart`)
//! lives here as well, since arriving somewhere unplanned feeds implicit
//! orders back into the list.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conditions::{self, ConditionEffect, ConditionOutcome, EvalMode};
use crate::config::OrderSettings;
use crate::deferred::DeferredContext;
use crate::fleet::Fleet;
use crate::models::{
    ConditionalOrder, DepotTarget, Destination, LoadingOrder, NonStop, Order, OrderCursor,
    OrderIndex, OrderKind, OrderList, OrderListId, StationId, StationOrder, Vehicle, VehicleId,
    VehicleType,
};
use crate::world::World;

/// Result of one `process_orders` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceOutcome {
    /// Vehicle is loading, waiting, leaving or in service; nothing done.
    Suppressed,
    /// No destination could be resolved; the vehicle idles.
    Idle,
    /// Current order and destination are still valid.
    Unchanged,
    /// A new destination was chosen.
    Destination(Destination),
}

/// Where a look-ahead walk stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookAheadStop {
    pub index: OrderIndex,
    pub order: Order,
    pub destination: Destination,
}

/// Why a look-ahead walk produced no destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookAheadError {
    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
    #[error("no destination order reachable")]
    NoDestination,
    #[error("no depot found for the depot order at {0}")]
    DepotNotFound(OrderIndex),
    #[error("order depth bound exceeded")]
    DepthExceeded,
}

/// Outcome of walking the list from a cursor.
enum Walk {
    Destination {
        index: OrderIndex,
        order: Order,
        destination: Destination,
    },
    NoOrders,
    DepotNotFound(OrderIndex),
    DepthExceeded,
}

/// Where side effects of a walk go.
enum Scope<'s> {
    Live {
        world: &'s mut World,
        list: &'s mut OrderList,
    },
    LookAhead {
        world: &'s World,
        list: &'s OrderList,
        ctx: &'s mut DeferredContext,
    },
}

impl Scope<'_> {
    fn list(&self) -> &OrderList {
        match self {
            Scope::Live { list, .. } => list,
            Scope::LookAhead { list, .. } => list,
        }
    }

    fn world(&self) -> &World {
        match self {
            Scope::Live { world, .. } => world,
            Scope::LookAhead { world, .. } => world,
        }
    }

    fn is_look_ahead(&self) -> bool {
        matches!(self, Scope::LookAhead { .. })
    }

    fn evaluate(&mut self, cond: &ConditionalOrder, index: OrderIndex, vehicle: &Vehicle) -> ConditionOutcome {
        match self {
            Scope::Live { world, list } => {
                let outcome = conditions::evaluate(cond, index, vehicle, list, world, &mut EvalMode::Commit);
                match outcome.effect {
                    Some(ConditionEffect::JumpCounter(value)) => {
                        if let Some(c) = list.order_mut(index).and_then(Order::conditional_order_mut) {
                            c.jump_counter = value;
                        }
                    }
                    Some(ConditionEffect::AcquireSlot(slot)) => {
                        if let Some(s) = world.slot_mut(slot) {
                            s.try_occupy(vehicle.id);
                        }
                    }
                    None => {}
                }
                outcome
            }
            Scope::LookAhead { world, list, ctx } => {
                conditions::evaluate(cond, index, vehicle, list, world, &mut EvalMode::Deferred(&mut **ctx))
            }
        }
    }

    /// Applies a slot, slot group or counter order.
    fn apply(&mut self, vehicle: VehicleId, kind: &OrderKind) {
        match self {
            Scope::Live { world, .. } => match kind {
                OrderKind::ReleaseSlot(slot) => {
                    if let Some(s) = world.slot_mut(*slot) {
                        s.vacate(vehicle);
                    }
                }
                OrderKind::TryAcquireSlot(slot) => {
                    if let Some(s) = world.slot_mut(*slot) {
                        s.try_occupy(vehicle);
                    }
                }
                OrderKind::ReleaseSlotGroup(group) => world.release_slot_group(vehicle, *group),
                OrderKind::ChangeCounter(change) => {
                    if let Some(c) = world.counter_mut(change.counter) {
                        c.value = change.op.apply(c.value, change.value);
                    }
                }
                _ => {}
            },
            Scope::LookAhead { world, ctx, .. } => match kind {
                OrderKind::ReleaseSlot(slot) => ctx.release_slot(world, vehicle, *slot),
                OrderKind::TryAcquireSlot(slot) => {
                    ctx.acquire_slot(world, vehicle, *slot);
                }
                OrderKind::ReleaseSlotGroup(group) => ctx.release_slot_group(world, vehicle, *group),
                OrderKind::ChangeCounter(change) => ctx.change_counter(world, vehicle, *change),
                _ => {}
            },
        }
    }
}

/// Walks from `cursor` to the next destination order.
fn walk(
    cursor: &mut OrderCursor,
    suppress_implicit: &mut bool,
    vehicle: &Vehicle,
    scope: &mut Scope<'_>,
    settings: &OrderSettings,
) -> Walk {
    if scope.list().manual_order_count() == 0 {
        return Walk::NoOrders;
    }
    let bound = settings.depth_bound(scope.list().len());

    for _ in 0..bound {
        cursor.update_real_order_index(scope.list());
        let index = cursor.real_order_index;
        let Some(order) = scope.list().order(index).cloned() else {
            return Walk::NoOrders;
        };

        let target = match &order.kind {
            OrderKind::GoToStation(so) => scope.world().station(so.station).map(|st| Destination::Station {
                station: so.station,
                location: st.location,
            }),
            OrderKind::GoToWaypoint(wo) => scope.world().waypoint(wo.waypoint).map(|wp| Destination::Waypoint {
                waypoint: wo.waypoint,
                location: wp.location,
            }),
            OrderKind::GoToDepot(d) => {
                if d.service_only && !vehicle.needs_servicing() {
                    cursor.increment_real_order_index(scope.list());
                    continue;
                }
                let depot = match d.target {
                    DepotTarget::Depot(id) => scope.world().depot(id),
                    DepotTarget::Nearest => scope.world().closest_depot(vehicle),
                };
                match depot {
                    Some(depot) => {
                        let destination = Destination::Depot {
                            depot: depot.id,
                            location: depot.location,
                        };
                        let mut order = order.clone();
                        if let OrderKind::GoToDepot(d) = &mut order.kind {
                            if d.is_nearest() {
                                d.resolved = Some(depot.id);
                            }
                        }
                        return Walk::Destination {
                            index,
                            order,
                            destination,
                        };
                    }
                    None if scope.is_look_ahead() => return Walk::DepotNotFound(index),
                    None => {
                        debug!("{}: no depot for order {index}, skipping", vehicle.id);
                        None
                    }
                }
            }
            OrderKind::Conditional(cond) => {
                let outcome = scope.evaluate(cond, index, vehicle);
                if outcome.skip {
                    cursor.real_order_index = cond.target;
                    cursor.implicit_order_index = cond.target;
                    cursor.update_real_order_index(scope.list());
                    if vehicle.vehicle_type.is_ground() {
                        *suppress_implicit = true;
                    }
                } else {
                    cursor.increment_real_order_index(scope.list());
                }
                continue;
            }
            OrderKind::ReleaseSlot(_)
            | OrderKind::TryAcquireSlot(_)
            | OrderKind::ReleaseSlotGroup(_)
            | OrderKind::ChangeCounter(_) => {
                scope.apply(vehicle.id, &order.kind);
                None
            }
            OrderKind::Dummy | OrderKind::Label(_) => None,
            OrderKind::Implicit(_)
            | OrderKind::Loading(_)
            | OrderKind::LoadingAdvance(_)
            | OrderKind::LeaveStation(_)
            | OrderKind::Waiting => return Walk::NoOrders,
        };

        match target {
            Some(destination) => {
                return Walk::Destination {
                    index,
                    order,
                    destination,
                }
            }
            None => cursor.increment_real_order_index(scope.list()),
        }
    }
    Walk::DepthExceeded
}

impl Fleet {
    /// Advances a vehicle's orders for this tick.
    pub fn process_orders(&mut self, vehicle: VehicleId, world: &mut World) -> AdvanceOutcome {
        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            warn!("process_orders for unknown {vehicle}");
            return AdvanceOutcome::Idle;
        };
        if v.is_busy() {
            return AdvanceOutcome::Suppressed;
        }
        let Some(list) = v
            .order_list
            .and_then(|id| self.lists.get_mut(&id))
            .filter(|l| !l.is_empty())
        else {
            v.clear_current_order();
            return AdvanceOutcome::Idle;
        };

        // Passing through a go-via station or a waypoint completes its order.
        let passed = match v.current_order.as_ref().map(|o| &o.kind) {
            Some(OrderKind::GoToStation(so))
                if !so.non_stop.stops_at_destination() && v.at_station == Some(so.station) =>
            {
                v.last_station_visited = Some(so.station);
                true
            }
            Some(OrderKind::GoToWaypoint(wo)) => v.at_waypoint == Some(wo.waypoint),
            _ => false,
        };
        if passed {
            debug!("{vehicle} passed its via point");
            v.cursor.increment_implicit_order_index(list);
            v.destination = None;
        }

        if v.vehicle_type == VehicleType::Aircraft && !list.has_real_destination() {
            v.clear_current_order();
            return AdvanceOutcome::Idle;
        }

        v.cursor.update_real_order_index(list);
        let unchanged = v.destination.is_some()
            && match (&v.current_order, list.order(v.cursor.real_order_index)) {
                (Some(current), Some(order)) => current.same_instruction(order),
                _ => false,
            };
        if unchanged {
            return AdvanceOutcome::Unchanged;
        }

        let mut cursor = v.cursor;
        let mut suppress = v.suppress_implicit_orders;
        let walked = walk(
            &mut cursor,
            &mut suppress,
            v,
            &mut Scope::Live { world, list },
            &self.settings,
        );
        v.cursor = cursor;
        v.suppress_implicit_orders = suppress;

        match walked {
            Walk::Destination {
                index,
                order,
                destination,
            } => {
                debug!("{vehicle} heads for {destination:?} (order {index})");
                v.current_order = Some(order);
                v.destination = Some(destination);
                v.cursor.timetable_order_index = Some(index);
                AdvanceOutcome::Destination(destination)
            }
            Walk::DepthExceeded => {
                debug!("{vehicle}: order depth bound exceeded, idling");
                v.clear_current_order();
                AdvanceOutcome::Idle
            }
            Walk::NoOrders | Walk::DepotNotFound(_) => {
                v.clear_current_order();
                AdvanceOutcome::Idle
            }
        }
    }

    /// Finds the destination after the vehicle's current order without
    /// committing any side effect.
    pub fn look_ahead(
        &self,
        vehicle: VehicleId,
        world: &World,
        ctx: &mut DeferredContext,
    ) -> Result<LookAheadStop, LookAheadError> {
        let v = self
            .vehicles
            .get(&vehicle)
            .ok_or(LookAheadError::UnknownVehicle(vehicle))?;
        let list = self.list_of(vehicle).ok_or(LookAheadError::NoDestination)?;
        let from = list.next_index(v.cursor.real_order_index);
        self.look_ahead_from(vehicle, from, world, ctx)
    }

    /// Finds the first destination at or after order `from`.
    ///
    /// Side effects of passed orders are recorded in `ctx`, so consecutive
    /// calls with the same context see each other's effects.
    pub fn look_ahead_from(
        &self,
        vehicle: VehicleId,
        from: OrderIndex,
        world: &World,
        ctx: &mut DeferredContext,
    ) -> Result<LookAheadStop, LookAheadError> {
        let v = self
            .vehicles
            .get(&vehicle)
            .ok_or(LookAheadError::UnknownVehicle(vehicle))?;
        let list = self
            .list_of(vehicle)
            .filter(|l| !l.is_empty())
            .ok_or(LookAheadError::NoDestination)?;
        ctx.bind(vehicle);

        let mut cursor = OrderCursor {
            real_order_index: from,
            implicit_order_index: from,
            timetable_order_index: None,
        };
        let mut suppress = false;
        let mut scope = Scope::LookAhead { world, list, ctx };
        match walk(&mut cursor, &mut suppress, v, &mut scope, &self.settings) {
            Walk::Destination {
                index,
                order,
                destination,
            } => Ok(LookAheadStop {
                index,
                order,
                destination,
            }),
            Walk::NoOrders => Err(LookAheadError::NoDestination),
            Walk::DepotNotFound(index) => Err(LookAheadError::DepotNotFound(index)),
            Walk::DepthExceeded => Err(LookAheadError::DepthExceeded),
        }
    }

    /// Applies or discards the effects recorded by look-aheads.
    pub fn commit_deferred(&mut self, ctx: &mut DeferredContext, apply: bool, world: &mut World) {
        ctx.commit(apply, world, &mut self.lists);
    }

    /// Dry-run evaluation of the conditional order at `index`, for display.
    pub fn preview_condition(
        &self,
        vehicle: VehicleId,
        index: OrderIndex,
        world: &World,
    ) -> Option<ConditionOutcome> {
        let v = self.vehicles.get(&vehicle)?;
        let list = self.list_of(vehicle)?;
        let cond = list.order(index)?.conditional_order()?;
        Some(conditions::evaluate(cond, index, v, list, world, &mut EvalMode::DryRun))
    }

    /// The vehicle has stopped at `station`.
    ///
    /// At its ordered destination the vehicle starts loading there. At any
    /// other station a ground vehicle records the stop as an implicit order
    /// at its implicit cursor, unless the list already has it there, the
    /// previous order is the same station, or creation is suppressed.
    pub fn begin_loading(&mut self, vehicle: VehicleId, station: StationId) {
        let Some(v) = self.vehicles.get(&vehicle) else {
            return;
        };
        let scheduled = match v.current_order.as_ref().map(|o| &o.kind) {
            Some(OrderKind::GoToStation(so)) if so.station == station => Some(so.clone()),
            _ => None,
        };
        let implicit_at = match scheduled {
            None => self.implicit_insertion_point(v, station),
            Some(_) => None,
        };

        if let Some((list, index)) = implicit_at {
            self.list_insert(list, index, Order::implicit(station));
            if let Some(v) = self.vehicles.get_mut(&vehicle) {
                if v.cursor.implicit_order_index > 0 {
                    v.cursor.implicit_order_index -= 1;
                }
            }
            debug!("{vehicle}: implicit stop at {station} recorded at {index}");
        }

        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            return;
        };
        let loading = match scheduled {
            Some(mut so) => {
                so.non_stop = NonStop::NonStop;
                LoadingOrder {
                    order: so,
                    at_destination: true,
                }
            }
            None => LoadingOrder {
                order: StationOrder::new(station),
                at_destination: false,
            },
        };
        v.current_order = Some(Order::new(OrderKind::Loading(loading)));
        v.at_station = Some(station);
        v.last_station_visited = Some(station);
        v.suppress_implicit_orders = false;
    }

    fn implicit_insertion_point(&self, v: &Vehicle, station: StationId) -> Option<(OrderListId, OrderIndex)> {
        if !v.vehicle_type.is_ground() || !self.settings.implicit_orders {
            return None;
        }
        let list = self.lists.get(&v.order_list?)?;
        let index = v.cursor.implicit_order_index;
        if list
            .order(index)
            .is_some_and(|o| matches!(o.kind, OrderKind::Implicit(s) if s == station))
        {
            return None;
        }
        let previous = if index > 0 {
            list.order(index - 1)
        } else if list.len() > 1 {
            list.orders().last()
        } else {
            None
        };
        if previous.is_some_and(|o| o.destination_station() == Some(station)) {
            return None;
        }
        if v.suppress_implicit_orders {
            debug!("{}: implicit order at {station} suppressed", v.id);
            return None;
        }
        if list.len() >= self.settings.max_orders_per_list {
            return None;
        }
        Some((list.id(), index))
    }

    /// The vehicle stops loading and starts pulling out.
    ///
    /// Returns true when the stop matched the order under the implicit
    /// cursor, which then moves on.
    pub fn leave_station(&mut self, vehicle: VehicleId) -> bool {
        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            return false;
        };
        let Some(station) = (match v.current_order.as_ref().map(|o| &o.kind) {
            Some(OrderKind::Loading(l)) => Some(l.order.station),
            _ => None,
        }) else {
            return false;
        };
        v.current_order = Some(Order::new(OrderKind::LeaveStation(station)));

        let Some(list) = v.order_list.and_then(|id| self.lists.get(&id)) else {
            return false;
        };
        let matched = list
            .order(v.cursor.implicit_order_index)
            .is_some_and(|o| o.destination_station() == Some(station));
        if matched {
            v.cursor.increment_implicit_order_index(list);
        }
        matched
    }

    /// The vehicle has cleared the station.
    pub fn depart(&mut self, vehicle: VehicleId) {
        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            return;
        };
        if matches!(
            v.current_order.as_ref().map(|o| &o.kind),
            Some(OrderKind::LeaveStation(_))
        ) {
            v.clear_current_order();
        }
        v.at_station = None;
    }
}
