//! Fleet: vehicles, their shared order lists and the destination table.
//!
//! The fleet is the single owner of every [`OrderList`] and [`Vehicle`].
//! All structural list edits go through it so that, within one call, the
//! list, the cursors of every vehicle sharing it and the destination
//! reference counts change together.
//!
//! Command validation lives in [`crate::commands`], per-tick advancement
//! in [`crate::advance`] and next-stop prediction in [`crate::next_stop`];
//! each adds its own `impl Fleet` block.

mod destinations;

pub use destinations::{DestinationKey, DestinationKind, DestinationRefCounts};

use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::commands::CommandError;
use crate::config::OrderSettings;
use crate::models::{
    CompanyId, DispatchRecord, DispatchSchedule, Order, OrderIndex, OrderList, OrderListId,
    Vehicle, VehicleId, VehicleType,
};
use crate::validation::{validate_fleet, ValidationResult};

/// Owner of vehicles and order lists.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    pub(crate) settings: OrderSettings,
    pub(crate) vehicles: BTreeMap<VehicleId, Vehicle>,
    pub(crate) lists: BTreeMap<OrderListId, OrderList>,
    pub(crate) destinations: DestinationRefCounts,
    next_list_id: u32,
}

impl Fleet {
    pub fn new(settings: OrderSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &OrderSettings {
        &self.settings
    }

    /// Adds a vehicle without orders.
    ///
    /// # Panics
    /// If a vehicle with the same id exists.
    pub fn add_vehicle(&mut self, mut vehicle: Vehicle) {
        assert!(
            !self.vehicles.contains_key(&vehicle.id),
            "{} added twice",
            vehicle.id
        );
        vehicle.order_list = None;
        vehicle.cursor.reset();
        self.vehicles.insert(vehicle.id, vehicle);
    }

    /// Removes a vehicle, releasing its share of its order list.
    pub fn remove_vehicle(&mut self, vehicle: VehicleId) -> Option<Vehicle> {
        self.detach(vehicle);
        self.vehicles.remove(&vehicle)
    }

    pub fn vehicle(&self, vehicle: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&vehicle)
    }

    /// Mutable access for the simulation (position, cargo, service state).
    ///
    /// The order list link and cursor must only be changed through fleet
    /// operations.
    pub fn vehicle_mut(&mut self, vehicle: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&vehicle)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn order_list(&self, id: OrderListId) -> Option<&OrderList> {
        self.lists.get(&id)
    }

    pub fn order_lists(&self) -> impl Iterator<Item = &OrderList> {
        self.lists.values()
    }

    /// The list a vehicle follows.
    pub fn list_of(&self, vehicle: VehicleId) -> Option<&OrderList> {
        let id = self.vehicles.get(&vehicle)?.order_list?;
        self.lists.get(&id)
    }

    pub fn destinations(&self) -> &DestinationRefCounts {
        &self.destinations
    }

    /// Attaches a dispatch schedule to a vehicle's list; returns its index.
    pub fn add_dispatch_schedule(
        &mut self,
        vehicle: VehicleId,
        schedule: DispatchSchedule,
    ) -> Option<usize> {
        let id = self.vehicles.get(&vehicle)?.order_list?;
        Some(self.lists.get_mut(&id)?.add_dispatch_schedule(schedule))
    }

    /// Stamps a dispatch of `vehicle` at absolute `tick` from schedule
    /// `schedule`. Fails if no slot of the schedule sits at that tick.
    pub fn record_dispatch(&mut self, vehicle: VehicleId, schedule: usize, tick: i64) -> bool {
        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            return false;
        };
        let Some(s) = v
            .order_list
            .and_then(|id| self.lists.get_mut(&id))
            .and_then(|l| l.dispatch_schedule_mut(schedule))
        else {
            return false;
        };
        let relative = tick - s.start_tick;
        let Some(position) = s.slot_at_tick(relative) else {
            return false;
        };
        s.last_dispatch = Some(relative);
        v.dispatch_records.insert(
            schedule,
            DispatchRecord {
                dispatched_at: tick,
                slot_offset: s.slots()[position].offset,
            },
        );
        debug!("{vehicle} dispatched at {tick} from schedule {schedule}");
        true
    }

    /// Audits the fleet; drift is logged and returned.
    pub fn check_invariants(&self) -> ValidationResult {
        let result = validate_fleet(self);
        if let Err(errors) = &result {
            for e in errors {
                warn!("order audit: {:?}: {}", e.kind, e.message);
            }
        }
        result
    }

    // ---- internal list plumbing ----------------------------------------

    pub(crate) fn can_allocate_list(&self) -> bool {
        self.lists.len() < self.settings.max_order_lists
    }

    pub(crate) fn allocate_list(&mut self, owner: CompanyId, vehicle_type: VehicleType) -> OrderListId {
        let id = self.fresh_list_id();
        self.lists.insert(id, OrderList::new(id, owner, vehicle_type));
        id
    }

    fn fresh_list_id(&mut self) -> OrderListId {
        while self.lists.contains_key(&OrderListId(self.next_list_id)) {
            self.next_list_id = self.next_list_id.wrapping_add(1);
        }
        let id = OrderListId(self.next_list_id);
        self.next_list_id = self.next_list_id.wrapping_add(1);
        id
    }

    /// Stores a copy of `source` under a fresh id, registering its references.
    pub(crate) fn duplicate_list(&mut self, source: OrderListId) -> Option<OrderListId> {
        let id = self.fresh_list_id();
        let copy = self.lists.get(&source)?.duplicate(id);
        copy.register_all(&mut self.destinations);
        self.lists.insert(id, copy);
        Some(id)
    }

    /// Links a vehicle to a list with a fresh cursor.
    pub(crate) fn attach(&mut self, vehicle: VehicleId, list: OrderListId) {
        let (Some(v), Some(l)) = (self.vehicles.get_mut(&vehicle), self.lists.get_mut(&list)) else {
            return;
        };
        l.add_shared(vehicle);
        v.order_list = Some(list);
        v.cursor.reset();
    }

    /// Unlinks a vehicle from its list, freeing the list with its last
    /// member. A loading vehicle keeps loading as an unscheduled stop.
    pub(crate) fn detach(&mut self, vehicle: VehicleId) {
        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            return;
        };
        let Some(list_id) = v.order_list.take() else {
            return;
        };
        v.cursor.reset();
        v.suppress_implicit_orders = false;
        if v.is_loading() {
            v.cancel_loading();
        } else if !v.is_busy() {
            v.clear_current_order();
        }

        let Some(list) = self.lists.get_mut(&list_id) else {
            return;
        };
        list.remove_shared(vehicle);
        if list.shared_count() == 0 {
            if let Some(list) = self.lists.remove(&list_id) {
                list.release_all(&mut self.destinations);
                info!("{list_id} freed with its last vehicle");
            }
        }
    }

    /// Moves a vehicle onto its own copy of a shared list, keeping its
    /// position.
    pub(crate) fn unshare(&mut self, vehicle: VehicleId) -> Result<(), CommandError> {
        let Some(old) = self.vehicles.get(&vehicle).and_then(|v| v.order_list) else {
            return Ok(());
        };
        if !self.lists.get(&old).is_some_and(OrderList::is_shared) {
            return Ok(());
        }
        let new = self.duplicate_list(old).ok_or(CommandError::NoSpace)?;
        if let Some(l) = self.lists.get_mut(&old) {
            l.remove_shared(vehicle);
        }
        if let (Some(v), Some(l)) = (self.vehicles.get_mut(&vehicle), self.lists.get_mut(&new)) {
            l.add_shared(vehicle);
            v.order_list = Some(new);
        }
        info!("{vehicle} unshared from {old} onto {new}");
        Ok(())
    }

    /// Inserts an order and shifts every sharing vehicle's cursor.
    pub(crate) fn list_insert(&mut self, list_id: OrderListId, index: OrderIndex, order: Order) -> OrderIndex {
        let Some(list) = self.lists.get_mut(&list_id) else {
            return index;
        };
        let index = list.insert_order_at(index, order, &mut self.destinations);
        let len = list.len();
        for id in list.shared_vehicles() {
            if let Some(v) = self.vehicles.get_mut(&id) {
                let suppress = v.cursor.shift_for_insert(index, len);
                if suppress && v.vehicle_type.is_ground() {
                    v.suppress_implicit_orders = true;
                }
            }
        }
        index
    }

    /// Deletes an order and shifts every sharing vehicle's cursor.
    pub(crate) fn list_delete(&mut self, list_id: OrderListId, index: OrderIndex) -> Option<Order> {
        let list = self.lists.get_mut(&list_id)?;
        let members: Vec<VehicleId> = list.shared_vehicles().collect();
        for id in &members {
            if let Some(v) = self.vehicles.get_mut(id) {
                if v.cursor.real_order_index == index && v.is_loading() {
                    v.cancel_loading();
                }
            }
        }
        let removed = list.delete_order_at(index, &mut self.destinations);
        for id in &members {
            if let Some(v) = self.vehicles.get_mut(id) {
                v.cursor.shift_for_delete(index, list);
            }
        }
        Some(removed)
    }

    /// Moves an order and remaps every sharing vehicle's cursor.
    pub(crate) fn list_move(&mut self, list_id: OrderListId, from: OrderIndex, to: OrderIndex) {
        let Some(list) = self.lists.get_mut(&list_id) else {
            return;
        };
        list.move_order(from, to);
        for id in list.shared_vehicles() {
            if let Some(v) = self.vehicles.get_mut(&id) {
                v.cursor.shift_for_move(from, to);
            }
        }
    }

    /// Replaces an order in place.
    pub(crate) fn list_replace(&mut self, list_id: OrderListId, index: OrderIndex, order: Order) -> Option<Order> {
        let list = self.lists.get_mut(&list_id)?;
        Some(list.replace_order(index, order, &mut self.destinations))
    }

    /// Gives `vehicle` a fresh list holding `orders` as-is (test helper).
    #[cfg(test)]
    pub(crate) fn install_list(&mut self, vehicle: VehicleId, orders: Vec<Order>) -> OrderListId {
        self.detach(vehicle);
        let id = self.fresh_list_id();
        let vehicle_type = self.vehicles[&vehicle].vehicle_type;
        let list = OrderList::from_orders(id, vehicle_type, orders);
        list.register_all(&mut self.destinations);
        self.lists.insert(id, list);
        self.attach(vehicle, id);
        id
    }
}
