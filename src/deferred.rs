//! Deferred execution context.
//!
//! Path reservation needs to know where a vehicle would go after its
//! current destination, which can mean evaluating conditional orders and
//! stepping over slot and counter orders whose effects must not be real
//! yet. A [`DeferredContext`] is the scratch overlay those effects land in.
//!
//! Reads made while looking ahead (slot membership, counter values,
//! percent jump counters) see the live state patched by the overlay, so a
//! counter incremented early in the look-ahead is observed by a later
//! counter condition. [`DeferredContext::commit`] then either replays the
//! recorded effects onto the live state in the order they were recorded,
//! or drops them. Either way the context is empty afterwards.
//!
//! Jump counters are stamped with the list's edit revision. If the list
//! was edited before the commit, the position no longer names the order
//! that was evaluated and the counter is dropped.
//!
//! One context serves one vehicle between two commits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::models::{
    CounterId, CounterOrder, OrderIndex, OrderList, OrderListId, SlotGroupId, SlotId, VehicleId,
};
use crate::world::World;

/// A side effect recorded during look-ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredEffect {
    AcquireSlot(SlotId),
    ReleaseSlot(SlotId),
    ReleaseSlotGroup(SlotGroupId),
    ChangeCounter(CounterOrder),
    /// New value of a percent order's jump counter, valid for one list
    /// revision.
    JumpCounter {
        list: OrderListId,
        revision: u64,
        index: OrderIndex,
        value: i32,
    },
}

/// Scratch overlay for look-ahead side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredContext {
    vehicle: Option<VehicleId>,
    slot_membership: BTreeMap<SlotId, bool>,
    counters: BTreeMap<CounterId, u32>,
    jump_counters: BTreeMap<(OrderListId, OrderIndex), i32>,
    effects: Vec<DeferredEffect>,
}

impl DeferredContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ties the context to a vehicle.
    ///
    /// # Panics
    /// If the context already holds effects of another vehicle.
    pub fn bind(&mut self, vehicle: VehicleId) {
        match self.vehicle {
            Some(bound) if bound != vehicle => {
                panic!("deferred context of {bound} reused for {vehicle} without commit")
            }
            _ => self.vehicle = Some(vehicle),
        }
    }

    pub fn vehicle(&self) -> Option<VehicleId> {
        self.vehicle
    }

    pub fn effects(&self) -> &[DeferredEffect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Membership of the bound vehicle in `slot`, overlay first.
    pub fn is_in_slot(&self, world: &World, vehicle: VehicleId, slot: SlotId) -> bool {
        match self.slot_membership.get(&slot) {
            Some(&member) => member,
            None => world.slot(slot).is_some_and(|s| s.contains(vehicle)),
        }
    }

    /// Occupancy of `slot` with the bound vehicle's overlay applied.
    pub fn slot_occupancy(&self, world: &World, vehicle: VehicleId, slot: SlotId) -> Option<u32> {
        let live = world.slot(slot)?;
        let mut occupancy = live.occupancy();
        match (live.contains(vehicle), self.slot_membership.get(&slot)) {
            (true, Some(false)) => occupancy -= 1,
            (false, Some(true)) => occupancy += 1,
            _ => {}
        }
        Some(occupancy)
    }

    /// Whether acquiring `slot` would succeed for the bound vehicle.
    pub fn can_acquire(&self, world: &World, vehicle: VehicleId, slot: SlotId) -> bool {
        let Some(max) = world.slot(slot).map(|s| s.max_occupancy) else {
            return false;
        };
        self.is_in_slot(world, vehicle, slot)
            || self
                .slot_occupancy(world, vehicle, slot)
                .is_some_and(|n| n < max)
    }

    /// Records an acquisition attempt; returns whether it succeeds.
    pub fn acquire_slot(&mut self, world: &World, vehicle: VehicleId, slot: SlotId) -> bool {
        self.bind(vehicle);
        if !self.can_acquire(world, vehicle, slot) {
            trace!("deferred acquire of {slot} by {vehicle} fails");
            return false;
        }
        self.slot_membership.insert(slot, true);
        self.effects.push(DeferredEffect::AcquireSlot(slot));
        true
    }

    pub fn release_slot(&mut self, world: &World, vehicle: VehicleId, slot: SlotId) {
        self.bind(vehicle);
        if world.slot(slot).is_none() {
            return;
        }
        self.slot_membership.insert(slot, false);
        self.effects.push(DeferredEffect::ReleaseSlot(slot));
    }

    pub fn release_slot_group(&mut self, world: &World, vehicle: VehicleId, group: SlotGroupId) {
        self.bind(vehicle);
        let Some(g) = world.slot_group(group) else {
            return;
        };
        for slot in &g.slots {
            if world.slot(*slot).is_some() {
                self.slot_membership.insert(*slot, false);
            }
        }
        self.effects.push(DeferredEffect::ReleaseSlotGroup(group));
    }

    pub fn is_in_slot_group(&self, world: &World, vehicle: VehicleId, group: SlotGroupId) -> bool {
        world
            .slot_group(group)
            .is_some_and(|g| g.slots.iter().any(|s| self.is_in_slot(world, vehicle, *s)))
    }

    /// Counter value with deferred changes applied.
    pub fn counter_value(&self, world: &World, counter: CounterId) -> Option<u32> {
        self.counters
            .get(&counter)
            .copied()
            .or_else(|| world.counter(counter).map(|c| c.value))
    }

    pub fn change_counter(&mut self, world: &World, vehicle: VehicleId, change: CounterOrder) {
        self.bind(vehicle);
        let Some(current) = self.counter_value(world, change.counter) else {
            return;
        };
        self.counters
            .insert(change.counter, change.op.apply(current, change.value));
        self.effects.push(DeferredEffect::ChangeCounter(change));
    }

    /// Jump counter of a percent order, overlay first.
    pub fn jump_counter(&self, list: OrderListId, index: OrderIndex, live: i32) -> i32 {
        self.jump_counters.get(&(list, index)).copied().unwrap_or(live)
    }

    pub fn set_jump_counter(&mut self, list: &OrderList, index: OrderIndex, value: i32) {
        self.jump_counters.insert((list.id(), index), value);
        self.effects.push(DeferredEffect::JumpCounter {
            list: list.id(),
            revision: list.revision(),
            index,
            value,
        });
    }

    /// Applies (`apply = true`) or discards the recorded effects, then
    /// clears the context.
    pub(crate) fn commit(
        &mut self,
        apply: bool,
        world: &mut World,
        lists: &mut BTreeMap<OrderListId, OrderList>,
    ) {
        let effects = std::mem::take(&mut self.effects);
        let vehicle = self.vehicle;
        self.discard();

        let Some(vehicle) = vehicle.filter(|_| apply) else {
            if !effects.is_empty() {
                debug!("discarding {} deferred effects", effects.len());
            }
            return;
        };
        debug!("committing {} deferred effects for {vehicle}", effects.len());
        for effect in effects {
            match effect {
                DeferredEffect::AcquireSlot(slot) => {
                    if let Some(s) = world.slot_mut(slot) {
                        if !s.try_occupy(vehicle) {
                            warn!("{vehicle} could not take {slot} reserved during look-ahead: slot is full");
                        }
                    }
                }
                DeferredEffect::ReleaseSlot(slot) => {
                    if let Some(s) = world.slot_mut(slot) {
                        s.vacate(vehicle);
                    }
                }
                DeferredEffect::ReleaseSlotGroup(group) => world.release_slot_group(vehicle, group),
                DeferredEffect::ChangeCounter(change) => {
                    if let Some(c) = world.counter_mut(change.counter) {
                        c.value = change.op.apply(c.value, change.value);
                    }
                }
                DeferredEffect::JumpCounter {
                    list,
                    revision,
                    index,
                    value,
                } => {
                    let order = lists
                        .get_mut(&list)
                        .filter(|l| {
                            let current = l.revision() == revision;
                            if !current {
                                debug!("{list} edited since look-ahead, dropping jump counter of {index}");
                            }
                            current
                        })
                        .and_then(|l| l.order_mut(index))
                        .and_then(|o| o.conditional_order_mut());
                    match order {
                        Some(c) => c.jump_counter = value,
                        None => debug!("jump counter target {list}:{index} is gone"),
                    }
                }
            }
        }
    }

    /// Drops every recorded effect and unbinds the vehicle.
    pub fn discard(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::DestinationRefCounts;
    use crate::models::{
        Comparator, CompanyId, ConditionVariable, CounterOp, Order, StationId, VehicleType,
    };
    use crate::world::{Counter, Slot, SlotGroup};

    fn world() -> World {
        World::new()
            .with_slot(Slot::new(SlotId(1), CompanyId(1), 1))
            .with_slot(Slot::new(SlotId(2), CompanyId(1), 2))
            .with_slot_group(SlotGroup::new(SlotGroupId(1), CompanyId(1), vec![SlotId(1), SlotId(2)]))
            .with_counter(Counter::new(CounterId(1), CompanyId(1)))
    }

    #[test]
    fn test_overlay_reads() {
        let world = world();
        let v = VehicleId(1);
        let mut ctx = DeferredContext::new();

        assert!(ctx.acquire_slot(&world, v, SlotId(1)));
        assert!(ctx.is_in_slot(&world, v, SlotId(1)));
        assert_eq!(ctx.slot_occupancy(&world, v, SlotId(1)), Some(1));
        assert!(!world.slot(SlotId(1)).unwrap().contains(v));

        ctx.change_counter(
            &world,
            v,
            CounterOrder {
                counter: CounterId(1),
                op: CounterOp::Increase,
                value: 3,
            },
        );
        assert_eq!(ctx.counter_value(&world, CounterId(1)), Some(3));
        assert_eq!(world.counter(CounterId(1)).unwrap().value, 0);

        ctx.release_slot_group(&world, v, SlotGroupId(1));
        assert!(!ctx.is_in_slot_group(&world, v, SlotGroupId(1)));
        assert_eq!(ctx.effects().len(), 3);
    }

    #[test]
    fn test_full_slot_acquire_fails() {
        let mut world = world();
        world.slot_mut(SlotId(1)).unwrap().try_occupy(VehicleId(9));
        let mut ctx = DeferredContext::new();

        assert!(!ctx.acquire_slot(&world, VehicleId(1), SlotId(1)));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_commit_and_discard() {
        let mut world = world();
        let mut lists = BTreeMap::new();
        let v = VehicleId(1);
        let mut ctx = DeferredContext::new();

        ctx.acquire_slot(&world, v, SlotId(2));
        ctx.commit(false, &mut world, &mut lists);
        assert!(ctx.is_empty());
        assert_eq!(ctx.vehicle(), None);
        assert!(!world.slot(SlotId(2)).unwrap().contains(v));

        ctx.acquire_slot(&world, v, SlotId(2));
        ctx.commit(true, &mut world, &mut lists);
        assert!(world.slot(SlotId(2)).unwrap().contains(v));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_commit_into_full_slot_leaves_it_full() {
        let mut world = world();
        let mut lists = BTreeMap::new();
        let mut ctx = DeferredContext::new();

        assert!(ctx.acquire_slot(&world, VehicleId(1), SlotId(1)));
        world.slot_mut(SlotId(1)).unwrap().try_occupy(VehicleId(9));
        ctx.commit(true, &mut world, &mut lists);

        let slot = world.slot(SlotId(1)).unwrap();
        assert!(!slot.contains(VehicleId(1)));
        assert_eq!(slot.occupancy(), 1);
    }

    #[test]
    fn test_jump_counter_follows_list_revision() {
        let mut world = world();
        let percent = || Order::conditional(ConditionVariable::Percent, Comparator::Equals, 50, 0);
        let list = OrderList::from_orders(
            OrderListId(1),
            VehicleType::Train,
            vec![Order::station(StationId(1)), percent(), Order::station(StationId(2))],
        );
        let mut lists = BTreeMap::from([(list.id(), list)]);
        let counter = |lists: &BTreeMap<OrderListId, OrderList>, index| {
            lists[&OrderListId(1)]
                .order(index)
                .and_then(Order::conditional_order)
                .map(|c| c.jump_counter)
        };
        let mut ctx = DeferredContext::new();
        ctx.bind(VehicleId(1));

        ctx.set_jump_counter(&lists[&OrderListId(1)], 1, -50);
        assert_eq!(ctx.jump_counter(OrderListId(1), 1, 0), -50);
        ctx.commit(true, &mut world, &mut lists);
        assert_eq!(counter(&lists, 1), Some(-50));

        // Moving the conditional invalidates a counter recorded before the move.
        ctx.bind(VehicleId(1));
        ctx.set_jump_counter(&lists[&OrderListId(1)], 1, 0);
        if let Some(l) = lists.get_mut(&OrderListId(1)) {
            l.move_order(1, 2);
        }
        ctx.commit(true, &mut world, &mut lists);
        assert_eq!(counter(&lists, 2), Some(-50));

        let mut refs = DestinationRefCounts::default();
        if let Some(l) = lists.get_mut(&OrderListId(1)) {
            let before = l.revision();
            l.insert_order_at(0, Order::station(StationId(3)), &mut refs);
            assert_eq!(l.revision(), before + 1);
        }
    }

    #[test]
    #[should_panic(expected = "without commit")]
    fn test_context_bound_to_one_vehicle() {
        let world = world();
        let mut ctx = DeferredContext::new();
        ctx.acquire_slot(&world, VehicleId(1), SlotId(2));
        ctx.acquire_slot(&world, VehicleId(2), SlotId(2));
    }
}
