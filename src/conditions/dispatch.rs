//! Dispatch-slot condition predicate.

use crate::models::{DispatchPredicate, DispatchRecord, DispatchSchedule, DispatchSource};

/// Resolves the slot a dispatch condition talks about and tests the predicate.
///
/// Returns `None` when there is no slot to test (no record yet, empty
/// schedule, or the recorded slot has since been removed).
pub(crate) fn dispatch_predicate(
    schedule: &DispatchSchedule,
    record: Option<&DispatchRecord>,
    source: DispatchSource,
    predicate: DispatchPredicate,
    now_tick: i64,
) -> Option<bool> {
    let position = match source {
        DispatchSource::VehicleLast => schedule.slot_position(record?.slot_offset)?,
        DispatchSource::ScheduleLast => schedule.slot_at_tick(schedule.last_dispatch?)?,
        DispatchSource::ScheduleNext => {
            let now = now_tick - schedule.start_tick;
            let after = schedule.last_dispatch.map_or(now - 1, |last| last.max(now - 1));
            schedule.next_dispatch_after(after)?.1
        }
    };
    Some(match predicate {
        DispatchPredicate::FirstSlot => schedule.is_first_slot(position),
        DispatchPredicate::LastSlot => schedule.is_last_slot(position),
        DispatchPredicate::Tag(tag) => schedule.slots()[position].has_tag(tag),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> DispatchSchedule {
        DispatchSchedule::new(100, 60)
            .with_slot(0, 0)
            .with_slot(20, 0b100)
            .with_slot(40, 0)
    }

    #[test]
    fn test_vehicle_last() {
        let s = schedule();
        let record = DispatchRecord {
            dispatched_at: 120,
            slot_offset: 20,
        };
        let answer = |p| dispatch_predicate(&s, Some(&record), DispatchSource::VehicleLast, p, 0);

        assert_eq!(answer(DispatchPredicate::FirstSlot), Some(false));
        assert_eq!(answer(DispatchPredicate::Tag(2)), Some(true));
        assert_eq!(
            dispatch_predicate(&s, None, DispatchSource::VehicleLast, DispatchPredicate::FirstSlot, 0),
            None
        );
    }

    #[test]
    fn test_schedule_last_and_next() {
        let mut s = schedule();
        assert_eq!(
            dispatch_predicate(&s, None, DispatchSource::ScheduleLast, DispatchPredicate::LastSlot, 0),
            None
        );
        s.last_dispatch = Some(100);
        assert_eq!(
            dispatch_predicate(&s, None, DispatchSource::ScheduleLast, DispatchPredicate::LastSlot, 0),
            Some(true)
        );
        // Now is tick 150 (relative 50); the next slot after the last
        // dispatch at relative 100 is offset 0 of the period after it.
        assert_eq!(
            dispatch_predicate(&s, None, DispatchSource::ScheduleNext, DispatchPredicate::LastSlot, 150),
            Some(false)
        );
        s.last_dispatch = None;
        // Relative 50: the next slot is offset 0 of the second period.
        assert_eq!(
            dispatch_predicate(&s, None, DispatchSource::ScheduleNext, DispatchPredicate::FirstSlot, 150),
            Some(true)
        );
    }
}
