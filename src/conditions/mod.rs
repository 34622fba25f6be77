//! Condition evaluator.
//!
//! Maps a conditional order plus a vehicle and world snapshot to a branch
//! decision: `skip = true` means "jump to the order's target".
//!
//! # Evaluation shapes
//!
//! | Shape | Variables | Notes |
//! |-------|-----------|-------|
//! | Numeric | load %, reliability, speed, age, lifetime, counter, time/date, cargo amounts | compared with [`Comparator::test`] |
//! | Capacity | slot occupancy, vehicle in slot / slot group, free platforms | missing reference never skips |
//! | Probabilistic | percent | biased accumulator on the order |
//! | Dispatch | dispatch slot | exact for the vehicle's own record, predicted otherwise |
//!
//! # Modes
//!
//! - [`EvalMode::Commit`]: live evaluation. Side effects are *returned*
//!   in [`ConditionOutcome::effect`] for the caller to apply.
//! - [`EvalMode::DryRun`]: reads only, nothing is recorded anywhere.
//! - [`EvalMode::Deferred`]: reads through and writes into a
//!   [`DeferredContext`] overlay.

mod comparator;
mod dispatch;

use log::trace;

use crate::deferred::DeferredContext;
use crate::models::{
    Comparator, ConditionVariable, ConditionalOrder, OrderIndex, OrderList, SlotId, StationId,
    Vehicle,
};
use crate::world::World;

use dispatch::dispatch_predicate;

/// How side effects of an evaluation are handled.
#[derive(Debug)]
pub enum EvalMode<'a> {
    Commit,
    DryRun,
    Deferred(&'a mut DeferredContext),
}

impl EvalMode<'_> {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, EvalMode::DryRun)
    }
}

/// Side effect of a `Commit` evaluation the caller must apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionEffect {
    /// Store this value as the order's new jump counter.
    JumpCounter(i32),
    /// Occupy the slot.
    AcquireSlot(SlotId),
}

/// Result of evaluating one conditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionOutcome {
    /// Jump to the order's target.
    pub skip: bool,
    /// False when the answer may differ by the time the vehicle gets there.
    pub exact: bool,
    pub effect: Option<ConditionEffect>,
}

impl ConditionOutcome {
    fn exact(skip: bool) -> Self {
        Self {
            skip,
            exact: true,
            effect: None,
        }
    }

    fn predicted(skip: bool) -> Self {
        Self {
            skip,
            exact: false,
            effect: None,
        }
    }

    fn with_effect(mut self, effect: Option<ConditionEffect>) -> Self {
        self.effect = effect;
        self
    }
}

/// Evaluates the conditional order at `index` of `list` for `vehicle`.
pub fn evaluate(
    cond: &ConditionalOrder,
    index: OrderIndex,
    vehicle: &Vehicle,
    list: &OrderList,
    world: &World,
    mode: &mut EvalMode<'_>,
) -> ConditionOutcome {
    let cmp = cond.comparator;
    let value = i64::from(cond.value);
    let numeric = |variable: i64| ConditionOutcome::exact(cmp.test(variable, value));
    let station_of =
        |station: Option<StationId>| station.or_else(|| list.previous_station(index));

    let outcome = match &cond.variable {
        ConditionVariable::LoadPercentage => numeric(vehicle.load_percentage()),
        ConditionVariable::Reliability => numeric(vehicle.reliability_percent()),
        ConditionVariable::MaxSpeed => numeric(i64::from(vehicle.max_speed)),
        ConditionVariable::Age => numeric(vehicle.age_years()),
        ConditionVariable::RemainingLifetime => numeric(vehicle.remaining_lifetime_years()),
        ConditionVariable::RequiresService => {
            ConditionOutcome::exact(cmp.test_bool(vehicle.needs_servicing()))
        }
        ConditionVariable::Unconditionally => ConditionOutcome::exact(true),
        ConditionVariable::CounterValue { counter } => {
            let current = counter.and_then(|c| match mode {
                EvalMode::Deferred(ctx) => ctx.counter_value(world, c),
                _ => world.counter(c).map(|c| c.value),
            });
            match current {
                Some(v) => numeric(i64::from(v)),
                None => ConditionOutcome::exact(false),
            }
        }
        ConditionVariable::TimeDate { field } => numeric(world.date.field(*field)),
        ConditionVariable::CargoWaiting { station, cargo } => {
            match station_of(*station).and_then(|s| world.station(s)) {
                Some(st) => ConditionOutcome::exact(cmp.test_bool(st.has_waiting(*cargo))),
                None => ConditionOutcome::exact(false),
            }
        }
        ConditionVariable::CargoWaitingAmount {
            station,
            cargo,
            via,
        } => match station_of(*station).and_then(|s| world.station(s)) {
            Some(st) => numeric(i64::from(st.waiting_amount(*cargo, *via))),
            None => ConditionOutcome::exact(false),
        },
        ConditionVariable::CargoWaitingAmountPercentage {
            station,
            cargo,
            via,
        } => match station_of(*station).and_then(|s| world.station(s)) {
            Some(st) => {
                let waiting = i64::from(st.waiting_amount(*cargo, *via));
                let threshold = i64::from(vehicle.capacity_for(*cargo)) * value / 100;
                ConditionOutcome::exact(cmp.test(waiting, threshold))
            }
            None => ConditionOutcome::exact(false),
        },
        ConditionVariable::SlotOccupancy { slot } => {
            let found = slot.and_then(|s| {
                let max = world.slot(s)?.max_occupancy;
                let occupancy = match mode {
                    EvalMode::Deferred(ctx) => ctx.slot_occupancy(world, vehicle.id, s)?,
                    _ => world.slot(s)?.occupancy(),
                };
                Some((occupancy, max))
            });
            match found {
                None => ConditionOutcome::exact(false),
                Some((occupancy, max)) => match cmp {
                    Comparator::Equals => ConditionOutcome::exact(occupancy >= max),
                    Comparator::NotEquals => ConditionOutcome::exact(occupancy < max),
                    _ => numeric(i64::from(occupancy)),
                },
            }
        }
        ConditionVariable::VehicleInSlot { slot } => match slot.filter(|s| world.slot(*s).is_some()) {
            None => ConditionOutcome::exact(false),
            Some(s) if matches!(cmp, Comparator::Equals | Comparator::NotEquals) => {
                let (acquired, effect) = match mode {
                    EvalMode::DryRun => (world.slot(s).is_some_and(|x| x.can_occupy(vehicle.id)), None),
                    EvalMode::Commit => {
                        let ok = world.slot(s).is_some_and(|x| x.can_occupy(vehicle.id));
                        (ok, ok.then_some(ConditionEffect::AcquireSlot(s)))
                    }
                    EvalMode::Deferred(ctx) => (ctx.acquire_slot(world, vehicle.id, s), None),
                };
                let skip = if cmp == Comparator::Equals { acquired } else { !acquired };
                ConditionOutcome::predicted(skip).with_effect(effect)
            }
            Some(s) => {
                let member = match mode {
                    EvalMode::Deferred(ctx) => ctx.is_in_slot(world, vehicle.id, s),
                    _ => world.slot(s).is_some_and(|x| x.contains(vehicle.id)),
                };
                ConditionOutcome::exact(cmp.test_bool(member))
            }
        },
        ConditionVariable::VehicleInSlotGroup { group } => {
            match group.filter(|g| world.slot_group(*g).is_some()) {
                None => ConditionOutcome::exact(false),
                Some(g) => {
                    let member = match mode {
                        EvalMode::Deferred(ctx) => ctx.is_in_slot_group(world, vehicle.id, g),
                        _ => world.is_in_slot_group(vehicle.id, g),
                    };
                    ConditionOutcome::exact(cmp.test_bool(member))
                }
            }
        }
        ConditionVariable::FreePlatforms { station } => {
            match station_of(*station).and_then(|s| world.station(s)) {
                Some(st) => numeric(i64::from(st.free_platforms)),
                None => ConditionOutcome::exact(false),
            }
        }
        ConditionVariable::Percent => evaluate_percent(cond, index, list, mode),
        ConditionVariable::DispatchSlot {
            schedule,
            source,
            predicate,
        } => {
            let answer = list.dispatch_schedule(*schedule).and_then(|s| {
                dispatch_predicate(
                    s,
                    vehicle.dispatch_records.get(schedule),
                    *source,
                    *predicate,
                    world.date.tick,
                )
            });
            let skip = answer.is_some_and(|a| cmp.test_bool(a));
            if source.is_prediction() {
                ConditionOutcome::predicted(skip)
            } else {
                ConditionOutcome::exact(skip)
            }
        }
    };

    trace!(
        "{} at {}:{index} for {}: skip={} exact={}",
        cond.variable.name(),
        list.id(),
        vehicle.id,
        outcome.skip,
        outcome.exact
    );
    outcome
}

/// Biased accumulator: a non-negative counter skips and pays `100 - percent`,
/// a negative one falls through and earns `percent`.
fn evaluate_percent(
    cond: &ConditionalOrder,
    index: OrderIndex,
    list: &OrderList,
    mode: &mut EvalMode<'_>,
) -> ConditionOutcome {
    let percent = cond.value.clamp(0, 100);
    let counter = match mode {
        EvalMode::Deferred(ctx) => ctx.jump_counter(list.id(), index, cond.jump_counter),
        _ => cond.jump_counter,
    };
    let skip = counter >= 0;
    let next = if skip {
        counter.saturating_add(percent - 100)
    } else {
        counter.saturating_add(percent)
    };
    match mode {
        EvalMode::DryRun => ConditionOutcome::predicted(skip),
        EvalMode::Commit => {
            ConditionOutcome::predicted(skip).with_effect(Some(ConditionEffect::JumpCounter(next)))
        }
        EvalMode::Deferred(ctx) => {
            ctx.set_jump_counter(list, index, next);
            ConditionOutcome::predicted(skip)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CompanyId, CounterId, DispatchPredicate, DispatchRecord, DispatchSchedule, DispatchSource,
        Order, OrderListId, TimeDateField, VehicleId, VehicleType,
    };
    use crate::world::{Counter, Location, Slot, Station};

    fn vehicle() -> Vehicle {
        Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train)
    }

    fn list_with(cond: ConditionalOrder) -> OrderList {
        OrderList::from_orders(
            OrderListId(1),
            VehicleType::Train,
            vec![
                Order::station(StationId(1)),
                Order::new(crate::models::OrderKind::Conditional(cond)),
                Order::station(StationId(2)),
            ],
        )
    }

    fn eval(cond: ConditionalOrder, vehicle: &Vehicle, world: &World, mode: &mut EvalMode<'_>) -> ConditionOutcome {
        let list = list_with(cond.clone());
        evaluate(&cond, 1, vehicle, &list, world, mode)
    }

    #[test]
    fn test_numeric_conditions() {
        let v = vehicle().with_max_speed(120).with_age(3 * 365, 10 * 365);
        let world = World::new();
        let speed = ConditionalOrder::new(ConditionVariable::MaxSpeed, Comparator::MoreThan, 100, 0);
        let age = ConditionalOrder::new(ConditionVariable::Age, Comparator::LessThan, 3, 0);

        assert!(eval(speed, &v, &world, &mut EvalMode::DryRun).skip);
        let out = eval(age, &v, &world, &mut EvalMode::DryRun);
        assert!(!out.skip);
        assert!(out.exact);
    }

    #[test]
    fn test_cargo_condition_uses_previous_station() {
        let world = World::new()
            .with_station(Station::new(StationId(1), Location::new(0, 0)).with_waiting(0, 80));
        let cond = ConditionalOrder::new(
            ConditionVariable::CargoWaitingAmount {
                station: None,
                cargo: 0,
                via: None,
            },
            Comparator::MoreThanOrEquals,
            50,
            0,
        );
        assert!(eval(cond, &vehicle(), &world, &mut EvalMode::DryRun).skip);
    }

    #[test]
    fn test_missing_references_never_skip() {
        let world = World::new();
        let v = vehicle();
        for variable in [
            ConditionVariable::SlotOccupancy { slot: Some(SlotId(4)) },
            ConditionVariable::CounterValue { counter: Some(CounterId(4)) },
            ConditionVariable::CargoWaiting {
                station: Some(StationId(9)),
                cargo: 0,
            },
        ] {
            let cmp = variable.default_comparator();
            let cond = ConditionalOrder::new(variable, cmp, 0, 0);
            assert!(!eval(cond, &v, &world, &mut EvalMode::DryRun).skip);
        }
    }

    #[test]
    fn test_slot_occupancy_equals_means_full() {
        let mut world = World::new().with_slot(Slot::new(SlotId(1), CompanyId(1), 1));
        let cond = ConditionalOrder::new(
            ConditionVariable::SlotOccupancy { slot: Some(SlotId(1)) },
            Comparator::Equals,
            0,
            0,
        );
        assert!(!eval(cond.clone(), &vehicle(), &world, &mut EvalMode::DryRun).skip);
        world.slot_mut(SlotId(1)).unwrap().try_occupy(VehicleId(5));
        assert!(eval(cond, &vehicle(), &world, &mut EvalMode::DryRun).skip);
    }

    #[test]
    fn test_vehicle_in_slot_acquire_modes() {
        let world = World::new().with_slot(Slot::new(SlotId(1), CompanyId(1), 1));
        let cond = ConditionalOrder::new(
            ConditionVariable::VehicleInSlot { slot: Some(SlotId(1)) },
            Comparator::Equals,
            0,
            0,
        );
        let v = vehicle();

        let dry = eval(cond.clone(), &v, &world, &mut EvalMode::DryRun);
        assert!(dry.skip);
        assert!(!dry.exact);
        assert_eq!(dry.effect, None);

        let live = eval(cond.clone(), &v, &world, &mut EvalMode::Commit);
        assert_eq!(live.effect, Some(ConditionEffect::AcquireSlot(SlotId(1))));

        let mut ctx = DeferredContext::new();
        assert!(eval(cond, &v, &world, &mut EvalMode::Deferred(&mut ctx)).skip);
        assert!(ctx.is_in_slot(&world, v.id, SlotId(1)));
        assert!(!world.slot(SlotId(1)).unwrap().contains(v.id));
    }

    #[test]
    fn test_percent_accumulator() {
        let world = World::new();
        let v = vehicle();
        let mut cond = ConditionalOrder::new(ConditionVariable::Percent, Comparator::Equals, 25, 0);
        let mut skips = 0;
        for _ in 0..100 {
            let out = eval(cond.clone(), &v, &world, &mut EvalMode::Commit);
            if out.skip {
                skips += 1;
            }
            if let Some(ConditionEffect::JumpCounter(next)) = out.effect {
                cond.jump_counter = next;
            }
        }
        assert_eq!(skips, 25);
    }

    #[test]
    fn test_percent_dry_run_reads_sign_only() {
        let world = World::new();
        let mut cond = ConditionalOrder::new(ConditionVariable::Percent, Comparator::Equals, 50, 0);
        cond.jump_counter = -1;
        let out = eval(cond, &vehicle(), &world, &mut EvalMode::DryRun);
        assert!(!out.skip);
        assert_eq!(out.effect, None);
    }

    #[test]
    fn test_percent_deferred_uses_overlay() {
        let world = World::new();
        let v = vehicle();
        let cond = ConditionalOrder::new(ConditionVariable::Percent, Comparator::Equals, 50, 0);
        let list = list_with(cond.clone());
        let mut ctx = DeferredContext::new();
        ctx.bind(v.id);

        let first = evaluate(&cond, 1, &v, &list, &world, &mut EvalMode::Deferred(&mut ctx));
        let second = evaluate(&cond, 1, &v, &list, &world, &mut EvalMode::Deferred(&mut ctx));
        assert!(first.skip);
        assert!(!second.skip);
        assert_eq!(ctx.jump_counter(list.id(), 1, 0), 0);
    }

    #[test]
    fn test_counter_condition_sees_deferred_value() {
        let world = World::new().with_counter(Counter::new(CounterId(1), CompanyId(1)));
        let v = vehicle();
        let cond = ConditionalOrder::new(
            ConditionVariable::CounterValue { counter: Some(CounterId(1)) },
            Comparator::MoreThanOrEquals,
            2,
            0,
        );
        let mut ctx = DeferredContext::new();
        ctx.change_counter(
            &world,
            v.id,
            crate::models::CounterOrder {
                counter: CounterId(1),
                op: crate::models::CounterOp::Set,
                value: 2,
            },
        );
        assert!(!eval(cond.clone(), &v, &world, &mut EvalMode::DryRun).skip);
        assert!(eval(cond, &v, &world, &mut EvalMode::Deferred(&mut ctx)).skip);
    }

    #[test]
    fn test_time_date_condition() {
        let mut world = World::new();
        world.date.hour = 14;
        let cond = ConditionalOrder::new(
            ConditionVariable::TimeDate {
                field: TimeDateField::Hour,
            },
            Comparator::MoreThanOrEquals,
            12,
            0,
        );
        assert!(eval(cond, &vehicle(), &world, &mut EvalMode::DryRun).skip);
    }

    #[test]
    fn test_dispatch_slot_exactness() {
        let world = World::new();
        let mut v = vehicle();
        v.dispatch_records.insert(
            0,
            DispatchRecord {
                dispatched_at: 0,
                slot_offset: 0,
            },
        );
        let mut list = list_with(ConditionalOrder::new(ConditionVariable::Unconditionally, Comparator::Equals, 0, 0));
        list.add_dispatch_schedule(DispatchSchedule::new(0, 100).with_slot(0, 0).with_slot(50, 0));

        let own = ConditionalOrder::new(
            ConditionVariable::DispatchSlot {
                schedule: 0,
                source: DispatchSource::VehicleLast,
                predicate: DispatchPredicate::FirstSlot,
            },
            Comparator::IsTrue,
            0,
            0,
        );
        let out = evaluate(&own, 1, &v, &list, &world, &mut EvalMode::DryRun);
        assert!(out.skip && out.exact);

        let next = ConditionalOrder::new(
            ConditionVariable::DispatchSlot {
                schedule: 0,
                source: DispatchSource::ScheduleNext,
                predicate: DispatchPredicate::FirstSlot,
            },
            Comparator::IsTrue,
            0,
            0,
        );
        assert!(!evaluate(&next, 1, &v, &list, &world, &mut EvalMode::DryRun).exact);

        let missing = ConditionalOrder::new(
            ConditionVariable::DispatchSlot {
                schedule: 3,
                source: DispatchSource::VehicleLast,
                predicate: DispatchPredicate::FirstSlot,
            },
            Comparator::IsFalse,
            0,
            0,
        );
        assert!(!evaluate(&missing, 1, &v, &list, &world, &mut EvalMode::DryRun).skip);
    }
}
