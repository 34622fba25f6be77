//! Order list model.
//!
//! An order list is the ordered, shared sequence of orders used by one or
//! more vehicles. The list keeps its aggregate statistics (manual order
//! count, timetable and total duration) up to date incrementally and
//! rewrites conditional jump targets whenever orders shift position.
//!
//! Cursor adjustment of the sharing vehicles is done by the fleet, which
//! owns the vehicles; the list only knows their ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::dispatch::DispatchSchedule;
use super::ids::{CompanyId, OrderIndex, OrderListId, StationId, VehicleId};
use super::order::{Order, OrderKind};
use super::vehicle::{remap_moved_index, VehicleType};
use crate::fleet::DestinationRefCounts;

/// An ordered sequence of orders shared by a set of vehicles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderList {
    id: OrderListId,
    owner: CompanyId,
    vehicle_type: VehicleType,
    orders: Vec<Order>,
    shared: BTreeSet<VehicleId>,
    manual_order_count: usize,
    timetable_duration: i64,
    total_duration: i64,
    dispatch_schedules: Vec<DispatchSchedule>,
    #[serde(default)]
    revision: u64,
}

impl OrderList {
    /// Creates an empty list.
    pub fn new(id: OrderListId, owner: CompanyId, vehicle_type: VehicleType) -> Self {
        Self {
            id,
            owner,
            vehicle_type,
            orders: Vec::new(),
            shared: BTreeSet::new(),
            manual_order_count: 0,
            timetable_duration: 0,
            total_duration: 0,
            dispatch_schedules: Vec::new(),
            revision: 0,
        }
    }

    pub fn id(&self) -> OrderListId {
        self.id
    }

    pub fn owner(&self) -> CompanyId {
        self.owner
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.vehicle_type
    }

    /// Edit counter, bumped whenever orders are added, removed, moved or
    /// replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn order(&self, index: OrderIndex) -> Option<&Order> {
        self.orders.get(index)
    }

    pub(crate) fn order_mut(&mut self, index: OrderIndex) -> Option<&mut Order> {
        self.orders.get_mut(index)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Number of non-implicit orders.
    pub fn manual_order_count(&self) -> usize {
        self.manual_order_count
    }

    /// Sum of timetabled wait + travel over non-conditional orders.
    pub fn timetable_duration(&self) -> i64 {
        self.timetable_duration
    }

    /// Sum of actual wait + travel over non-conditional orders.
    pub fn total_duration(&self) -> i64 {
        self.total_duration
    }

    /// Index following `index`, wrapping to the start.
    pub fn next_index(&self, index: OrderIndex) -> OrderIndex {
        if self.orders.is_empty() {
            0
        } else {
            (index + 1) % self.orders.len()
        }
    }

    pub fn shared_vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.shared.iter().copied()
    }

    pub fn shared_count(&self) -> usize {
        self.shared.len()
    }

    /// Whether more than one vehicle uses this list.
    pub fn is_shared(&self) -> bool {
        self.shared.len() > 1
    }

    pub fn is_shared_with(&self, vehicle: VehicleId) -> bool {
        self.shared.contains(&vehicle)
    }

    pub(crate) fn add_shared(&mut self, vehicle: VehicleId) {
        self.shared.insert(vehicle);
    }

    pub(crate) fn remove_shared(&mut self, vehicle: VehicleId) -> bool {
        self.shared.remove(&vehicle)
    }

    pub fn dispatch_schedules(&self) -> &[DispatchSchedule] {
        &self.dispatch_schedules
    }

    pub fn dispatch_schedule(&self, index: usize) -> Option<&DispatchSchedule> {
        self.dispatch_schedules.get(index)
    }

    pub fn dispatch_schedule_mut(&mut self, index: usize) -> Option<&mut DispatchSchedule> {
        self.dispatch_schedules.get_mut(index)
    }

    /// Attaches a schedule and returns its index.
    pub fn add_dispatch_schedule(&mut self, schedule: DispatchSchedule) -> usize {
        self.dispatch_schedules.push(schedule);
        self.dispatch_schedules.len() - 1
    }

    pub fn has_conditional_order(&self) -> bool {
        self.orders.iter().any(Order::is_conditional)
    }

    pub fn has_full_load_order(&self) -> bool {
        self.orders.iter().any(Order::has_full_load)
    }

    pub fn has_unbunching_order(&self) -> bool {
        self.orders.iter().any(Order::is_unbunching)
    }

    /// Whether any order sends the vehicle somewhere.
    pub fn has_real_destination(&self) -> bool {
        self.orders.iter().any(Order::is_real_destination)
    }

    /// Closest go-to-station order strictly before `index`, wrapping.
    pub fn previous_station(&self, index: OrderIndex) -> Option<StationId> {
        let len = self.orders.len();
        (1..=len)
            .map(|back| (index + len * 2 - back) % len)
            .find_map(|i| self.orders[i].station_order().map(|so| so.station))
    }

    /// Recomputes `(timetable_duration, total_duration)` from scratch.
    pub fn compute_durations(&self) -> (i64, i64) {
        self.orders
            .iter()
            .filter(|o| !o.is_conditional())
            .fold((0, 0), |(tt, total), o| {
                (tt + o.timetable.timetabled_duration(), total + o.timetable.actual_duration())
            })
    }

    /// Recomputes the manual order count from scratch.
    pub fn compute_manual_count(&self) -> usize {
        self.orders.iter().filter(|o| !o.is_implicit()).count()
    }

    /// Copy of the orders and schedules under a new id, with no members.
    pub(crate) fn duplicate(&self, id: OrderListId) -> OrderList {
        OrderList {
            id,
            shared: BTreeSet::new(),
            ..self.clone()
        }
    }

    fn account(&mut self, order: &Order, sign: i64) {
        if !order.is_implicit() {
            if sign > 0 {
                self.manual_order_count += 1;
            } else {
                self.manual_order_count -= 1;
            }
        }
        if !order.is_conditional() {
            self.timetable_duration += sign * order.timetable.timetabled_duration();
            self.total_duration += sign * order.timetable.actual_duration();
        }
    }

    /// Inserts `order` at `index` (clamped to `0..=len`) and returns the
    /// index used.
    ///
    /// A conditional order's target, including the new order's own, is
    /// read in pre-insertion indexing and follows the order it points at.
    pub(crate) fn insert_order_at(
        &mut self,
        index: OrderIndex,
        order: Order,
        refs: &mut DestinationRefCounts,
    ) -> OrderIndex {
        let index = index.min(self.orders.len());
        self.account(&order, 1);
        refs.register(&order, self.owner, self.vehicle_type);
        self.orders.insert(index, order);
        self.revision += 1;

        for c in self.orders.iter_mut().filter_map(Order::conditional_order_mut) {
            if c.target >= index {
                c.target += 1;
            }
        }
        // An empty list gains a conditional that can only point at itself.
        if self.orders.len() == 1 {
            if let Some(c) = self.orders[0].conditional_order_mut() {
                c.target = 0;
            }
        }
        self.assert_targets_in_range();
        index
    }

    /// Removes the order at `index`.
    ///
    /// Jump targets at or after the removed order move back by one
    /// (clamped at zero). A conditional that only now points at itself is
    /// redirected to the order after it; existing self-loops are kept.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub(crate) fn delete_order_at(&mut self, index: OrderIndex, refs: &mut DestinationRefCounts) -> Order {
        assert!(index < self.orders.len(), "delete of order {index} out of range");
        let removed = self.orders.remove(index);
        self.revision += 1;
        self.account(&removed, -1);
        refs.unregister(&removed, self.owner, self.vehicle_type);

        let len = self.orders.len();
        for (pos, order) in self.orders.iter_mut().enumerate() {
            let Some(c) = order.conditional_order_mut() else {
                continue;
            };
            let old_pos = if pos >= index { pos + 1 } else { pos };
            let was_self = c.target == old_pos;
            let mut target = c.target;
            if target >= index {
                target = target.saturating_sub(1);
            }
            if target == pos && !was_self {
                target = (target + 1) % len;
            }
            c.target = target;
        }
        self.assert_targets_in_range();
        removed
    }

    /// Moves the order at `from` so it ends up at `to`.
    ///
    /// # Panics
    /// If either index is out of range.
    pub(crate) fn move_order(&mut self, from: OrderIndex, to: OrderIndex) {
        assert!(
            from < self.orders.len() && to < self.orders.len(),
            "move {from} -> {to} out of range"
        );
        let order = self.orders.remove(from);
        self.orders.insert(to, order);
        self.revision += 1;
        for c in self.orders.iter_mut().filter_map(Order::conditional_order_mut) {
            c.target = remap_moved_index(c.target, from, to);
        }
        self.assert_targets_in_range();
    }

    /// Replaces the order at `index`, keeping statistics and reference
    /// counts in step. Returns the previous order.
    pub(crate) fn replace_order(
        &mut self,
        index: OrderIndex,
        order: Order,
        refs: &mut DestinationRefCounts,
    ) -> Order {
        let old = std::mem::replace(&mut self.orders[index], order);
        self.revision += 1;
        self.account(&old, -1);
        refs.unregister(&old, self.owner, self.vehicle_type);
        let new = self.orders[index].clone();
        self.account(&new, 1);
        refs.register(&new, self.owner, self.vehicle_type);
        self.assert_targets_in_range();
        old
    }

    /// Releases every order's reference count (list is being freed).
    pub(crate) fn release_all(&self, refs: &mut DestinationRefCounts) {
        for order in &self.orders {
            refs.unregister(order, self.owner, self.vehicle_type);
        }
    }

    /// Registers every order's reference count (list was just created).
    pub(crate) fn register_all(&self, refs: &mut DestinationRefCounts) {
        for order in &self.orders {
            refs.register(order, self.owner, self.vehicle_type);
        }
    }

    fn assert_targets_in_range(&self) {
        let len = self.orders.len();
        for (pos, order) in self.orders.iter().enumerate() {
            if let OrderKind::Conditional(c) = &order.kind {
                assert!(
                    c.target < len,
                    "conditional order {pos} in {} jumps to {} of {len}",
                    self.id,
                    c.target
                );
            }
        }
    }

    /// Builds a list from orders in sequence (test helper).
    #[cfg(test)]
    pub(crate) fn from_orders(
        id: OrderListId,
        vehicle_type: VehicleType,
        orders: Vec<Order>,
    ) -> OrderList {
        let mut list = OrderList::new(id, CompanyId(1), vehicle_type);
        let mut refs = DestinationRefCounts::default();
        list.orders = orders;
        list.manual_order_count = list.compute_manual_count();
        (list.timetable_duration, list.total_duration) = list.compute_durations();
        list.register_all(&mut refs);
        list.assert_targets_in_range();
        list
    }
}
