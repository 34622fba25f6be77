//! `ModifyOrder`: edits one field of an order in place.
//!
//! The edit is applied to a copy of the order, checked against the order's
//! kind, then written back through the list so statistics and reference
//! counts stay in step. Load, unload and refit edits to the order a vehicle
//! is currently executing reach its live copy immediately.

use log::debug;
use serde::{Deserialize, Serialize};

use super::insert::{
    check_condition_references, check_counter, check_depot_order, check_non_stop, check_slot,
    check_slot_group,
};
use super::{CommandCost, CommandError, CommandResult, ExecMode};
use crate::fleet::Fleet;
use crate::models::{
    CargoPolicy, CargoType, Comparator, ConditionVariable, CounterId, CounterOp, DepotAction,
    LabelOrder, LoadPolicy, NonStop, Order, OrderIndex, OrderKind, OrderList, OrderListId,
    SlotGroupId, SlotId, StationOrder, StopLocation, UnloadPolicy, Vehicle, VehicleId,
    VehicleType, NUM_CARGO,
};
use crate::world::World;

/// One field edit of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderModification {
    NonStop(NonStop),
    StopLocation(StopLocation),
    Load(LoadPolicy),
    Unload(UnloadPolicy),
    /// `None` removes the override for the cargo.
    CargoPolicy {
        cargo: CargoType,
        policy: Option<CargoPolicy>,
    },
    Refit(Option<CargoType>),
    DepotAction(DepotAction),
    ServiceOnly(bool),
    WaypointReverse(bool),
    ConditionVariable(ConditionVariable),
    ConditionComparator(Comparator),
    ConditionValue(i32),
    ConditionTarget(OrderIndex),
    Slot(SlotId),
    SlotGroup(SlotGroupId),
    Counter(CounterId),
    CounterOp(CounterOp),
    CounterValue(u32),
    LabelText(String),
    WaitTime(u32),
    TravelTime(u32),
    WaitTimetabled(bool),
    TravelTimetabled(bool),
    WaitFixed(bool),
    TravelFixed(bool),
    MaxSpeed(Option<u16>),
}

impl OrderModification {
    pub fn name(&self) -> &'static str {
        match self {
            OrderModification::NonStop(_) => "non-stop",
            OrderModification::StopLocation(_) => "stop-location",
            OrderModification::Load(_) => "load",
            OrderModification::Unload(_) => "unload",
            OrderModification::CargoPolicy { .. } => "cargo-policy",
            OrderModification::Refit(_) => "refit",
            OrderModification::DepotAction(_) => "depot-action",
            OrderModification::ServiceOnly(_) => "service-only",
            OrderModification::WaypointReverse(_) => "waypoint-reverse",
            OrderModification::ConditionVariable(_) => "condition-variable",
            OrderModification::ConditionComparator(_) => "condition-comparator",
            OrderModification::ConditionValue(_) => "condition-value",
            OrderModification::ConditionTarget(_) => "condition-target",
            OrderModification::Slot(_) => "slot",
            OrderModification::SlotGroup(_) => "slot-group",
            OrderModification::Counter(_) => "counter",
            OrderModification::CounterOp(_) => "counter-op",
            OrderModification::CounterValue(_) => "counter-value",
            OrderModification::LabelText(_) => "label-text",
            OrderModification::WaitTime(_) => "wait-time",
            OrderModification::TravelTime(_) => "travel-time",
            OrderModification::WaitTimetabled(_) => "wait-timetabled",
            OrderModification::TravelTimetabled(_) => "travel-timetabled",
            OrderModification::WaitFixed(_) => "wait-fixed",
            OrderModification::TravelFixed(_) => "travel-fixed",
            OrderModification::MaxSpeed(_) => "max-speed",
        }
    }

    /// Edits that change what a loading vehicle does at the stop.
    fn touches_cargo_handling(&self) -> bool {
        matches!(
            self,
            OrderModification::Load(_)
                | OrderModification::Unload(_)
                | OrderModification::CargoPolicy { .. }
                | OrderModification::Refit(_)
        )
    }
}

impl Fleet {
    /// Changes one field of the order at `index`.
    pub fn modify_order(
        &mut self,
        vehicle: VehicleId,
        index: OrderIndex,
        modification: OrderModification,
        mode: ExecMode,
        world: &World,
    ) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        let list = v
            .order_list
            .and_then(|id| self.lists.get(&id))
            .ok_or(CommandError::NoOrders)?;
        let order = list.order(index).ok_or(CommandError::InvalidOrderIndex(index))?;
        let edited = Edit {
            vehicle: v,
            list,
            index,
            world,
        }
        .apply(order.clone(), &modification)?;
        if !mode.is_execute() {
            return Ok(CommandCost::new());
        }

        let list_id = list.id();
        let station = edited.station_order().cloned();
        self.list_replace(list_id, index, edited);
        if let Some(so) = station.filter(|_| modification.touches_cargo_handling()) {
            self.propagate_to_current(list_id, index, &so);
        }
        debug!("{vehicle}: order {index} {} changed", modification.name());
        Ok(CommandCost::new())
    }

    /// Copies cargo handling into the live order of every sharer executing
    /// the edited order.
    fn propagate_to_current(&mut self, list_id: OrderListId, index: OrderIndex, so: &StationOrder) {
        let Some(list) = self.lists.get(&list_id) else {
            return;
        };
        for id in list.shared_vehicles() {
            let Some(v) = self.vehicles.get_mut(&id) else {
                continue;
            };
            if v.cursor.real_order_index != index {
                continue;
            }
            let live = match v.current_order.as_mut().map(|o| &mut o.kind) {
                Some(OrderKind::GoToStation(live)) => live,
                Some(OrderKind::Loading(l)) if l.at_destination => &mut l.order,
                _ => continue,
            };
            if live.station != so.station {
                continue;
            }
            live.load = so.load;
            live.unload = so.unload;
            live.cargo_overrides = so.cargo_overrides.clone();
            live.refit = so.refit;
            debug!("{id}: live order at {} updated", so.station);
        }
    }
}

/// Context for checking one edit.
struct Edit<'a> {
    vehicle: &'a Vehicle,
    list: &'a OrderList,
    index: OrderIndex,
    world: &'a World,
}

impl Edit<'_> {
    fn apply(&self, mut order: Order, m: &OrderModification) -> Result<Order, CommandError> {
        let kind = order.kind_name();
        let not_applicable = || CommandError::NotApplicable {
            modification: m.name(),
            kind,
        };
        if order.is_implicit() {
            return Err(not_applicable());
        }

        match m {
            OrderModification::WaitTime(_)
            | OrderModification::TravelTime(_)
            | OrderModification::WaitTimetabled(_)
            | OrderModification::TravelTimetabled(_)
            | OrderModification::WaitFixed(_)
            | OrderModification::TravelFixed(_)
            | OrderModification::MaxSpeed(_) => {
                if order.is_conditional() && !matches!(m, OrderModification::TravelTime(_)) {
                    return Err(not_applicable());
                }
                apply_timetable(&mut order, m);
                return Ok(order);
            }
            _ => {}
        }

        match &mut order.kind {
            OrderKind::GoToStation(so) => self.apply_station(so, m)?,
            OrderKind::GoToDepot(d) => {
                match m {
                    OrderModification::NonStop(n) => {
                        check_non_stop(self.vehicle, *n)?;
                        d.non_stop = *n;
                    }
                    OrderModification::DepotAction(a) => d.action = *a,
                    OrderModification::ServiceOnly(s) => d.service_only = *s,
                    OrderModification::Refit(cargo) => {
                        check_cargo(*cargo)?;
                        d.refit = *cargo;
                    }
                    _ => return Err(not_applicable()),
                }
                check_depot_order(self.vehicle, Some(self.list), d, Some(self.index), self.world)?;
            }
            OrderKind::GoToWaypoint(w) => match m {
                OrderModification::NonStop(n) => {
                    check_non_stop(self.vehicle, *n)?;
                    w.non_stop = *n;
                }
                OrderModification::WaypointReverse(r) => w.reverse = *r,
                _ => return Err(not_applicable()),
            },
            OrderKind::Conditional(c) => match m {
                OrderModification::ConditionVariable(variable) => {
                    check_condition_references(self.vehicle, Some(self.list), variable, self.world)?;
                    c.variable = variable.clone();
                    if !c.variable.accepts(c.comparator) {
                        c.comparator = c.variable.default_comparator();
                    }
                    let (min, max) = c.variable.value_range();
                    c.value = c.value.clamp(min, max);
                    c.jump_counter = 0;
                }
                OrderModification::ConditionComparator(comparator) => {
                    if !c.variable.accepts(*comparator) {
                        return Err(CommandError::InvalidComparator {
                            variable: c.variable.name(),
                            comparator: *comparator,
                        });
                    }
                    c.comparator = *comparator;
                }
                OrderModification::ConditionValue(value) => {
                    let (min, max) = c.variable.value_range();
                    if *value < min || *value > max {
                        return Err(CommandError::InvalidConditionValue(*value));
                    }
                    c.value = *value;
                    if c.variable == ConditionVariable::Percent {
                        c.jump_counter = 0;
                    }
                }
                OrderModification::ConditionTarget(target) => {
                    if *target >= self.list.len() {
                        return Err(CommandError::InvalidJumpTarget(*target));
                    }
                    c.target = *target;
                }
                OrderModification::Slot(slot) => match &mut c.variable {
                    ConditionVariable::SlotOccupancy { slot: s } | ConditionVariable::VehicleInSlot { slot: s } => {
                        check_slot(self.vehicle, *slot, self.world)?;
                        *s = Some(*slot);
                    }
                    _ => return Err(not_applicable()),
                },
                OrderModification::SlotGroup(group) => match &mut c.variable {
                    ConditionVariable::VehicleInSlotGroup { group: g } => {
                        check_slot_group(self.vehicle, *group, self.world)?;
                        *g = Some(*group);
                    }
                    _ => return Err(not_applicable()),
                },
                OrderModification::Counter(counter) => match &mut c.variable {
                    ConditionVariable::CounterValue { counter: slot } => {
                        check_counter(self.vehicle, *counter, self.world)?;
                        *slot = Some(*counter);
                    }
                    _ => return Err(not_applicable()),
                },
                _ => return Err(not_applicable()),
            },
            OrderKind::ReleaseSlot(s) | OrderKind::TryAcquireSlot(s) => match m {
                OrderModification::Slot(slot) => {
                    check_slot(self.vehicle, *slot, self.world)?;
                    *s = *slot;
                }
                _ => return Err(not_applicable()),
            },
            OrderKind::ReleaseSlotGroup(g) => match m {
                OrderModification::SlotGroup(group) => {
                    check_slot_group(self.vehicle, *group, self.world)?;
                    *g = *group;
                }
                _ => return Err(not_applicable()),
            },
            OrderKind::ChangeCounter(change) => match m {
                OrderModification::Counter(counter) => {
                    check_counter(self.vehicle, *counter, self.world)?;
                    change.counter = *counter;
                }
                OrderModification::CounterOp(op) => change.op = *op,
                OrderModification::CounterValue(value) => change.value = *value,
                _ => return Err(not_applicable()),
            },
            OrderKind::Label(label) => match m {
                OrderModification::LabelText(text) => *label = LabelOrder::Text(text.clone()),
                _ => return Err(not_applicable()),
            },
            _ => return Err(not_applicable()),
        }
        Ok(order)
    }

    fn apply_station(&self, so: &mut StationOrder, m: &OrderModification) -> Result<(), CommandError> {
        match m {
            OrderModification::NonStop(n) => {
                check_non_stop(self.vehicle, *n)?;
                so.non_stop = *n;
            }
            OrderModification::StopLocation(location) => {
                if self.vehicle.vehicle_type != VehicleType::Train {
                    return Err(CommandError::StopLocationNotAllowed);
                }
                so.stop_location = *location;
            }
            OrderModification::Load(load) => so.load = *load,
            OrderModification::Unload(unload) => so.unload = *unload,
            OrderModification::CargoPolicy { cargo, policy } => {
                check_cargo(Some(*cargo))?;
                match policy {
                    Some(p) => so.cargo_overrides.insert(*cargo, *p),
                    None => so.cargo_overrides.remove(cargo),
                };
            }
            OrderModification::Refit(cargo) => {
                check_cargo(*cargo)?;
                so.refit = *cargo;
            }
            _ => {
                return Err(CommandError::NotApplicable {
                    modification: m.name(),
                    kind: "go-to-station",
                })
            }
        }
        self.check_cargo_handling(so)
    }

    fn check_cargo_handling(&self, so: &StationOrder) -> Result<(), CommandError> {
        if so.load == LoadPolicy::NoLoad && so.unload == UnloadPolicy::NoUnload {
            return Err(CommandError::InvalidPolicy);
        }
        if so.has_full_load() && self.list.has_unbunching_order() {
            return Err(CommandError::UnbunchingFullLoad);
        }
        Ok(())
    }
}

fn apply_timetable(order: &mut Order, m: &OrderModification) {
    let tt = &mut order.timetable;
    match m {
        OrderModification::WaitTime(t) => tt.wait_time = *t,
        OrderModification::TravelTime(t) => tt.travel_time = *t,
        OrderModification::WaitTimetabled(b) => tt.wait_timetabled = *b,
        OrderModification::TravelTimetabled(b) => tt.travel_timetabled = *b,
        OrderModification::WaitFixed(b) => tt.wait_fixed = *b,
        OrderModification::TravelFixed(b) => tt.travel_fixed = *b,
        OrderModification::MaxSpeed(s) => tt.max_speed = *s,
        _ => {}
    }
}

fn check_cargo(cargo: Option<CargoType>) -> Result<(), CommandError> {
    match cargo {
        Some(c) if c >= NUM_CARGO => Err(CommandError::InvalidCargo(c)),
        _ => Ok(()),
    }
}
