//! Consistency audit of a fleet's order state.
//!
//! Everything the engine maintains incrementally is recomputed from
//! scratch and compared:
//! - Manual order counts and timetable duration sums per list
//! - Conditional jump targets within their list
//! - Vehicle cursors within their list
//! - Vehicle ↔ list shared membership, in both directions
//! - The destination reference-count table

use std::collections::BTreeSet;

use crate::fleet::{DestinationRefCounts, Fleet};
use crate::models::Order;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Cached manual order count differs from a recount.
    ManualCountMismatch,
    /// Cached duration sums differ from a recount.
    DurationDrift,
    /// A conditional order jumps outside its list.
    JumpTargetOutOfRange,
    /// A vehicle cursor points outside its list.
    CursorOutOfRange,
    /// The reference-count table differs from a recount.
    RefCountMismatch,
    /// A vehicle and its list disagree about sharing.
    MembershipMismatch,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Audits every list and vehicle of the fleet.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_fleet(fleet: &Fleet) -> ValidationResult {
    let mut errors = Vec::new();

    for list in fleet.lists.values() {
        let id = list.id();
        let manual = list.compute_manual_count();
        if manual != list.manual_order_count() {
            errors.push(ValidationError::new(
                ValidationErrorKind::ManualCountMismatch,
                format!("{id}: {} manual orders cached, {manual} counted", list.manual_order_count()),
            ));
        }

        let (timetabled, total) = list.compute_durations();
        if timetabled != list.timetable_duration() || total != list.total_duration() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DurationDrift,
                format!(
                    "{id}: durations {}/{} cached, {timetabled}/{total} computed",
                    list.timetable_duration(),
                    list.total_duration()
                ),
            ));
        }

        for (index, c) in list
            .orders()
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.conditional_order().map(|c| (i, c)))
        {
            if c.target >= list.len() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::JumpTargetOutOfRange,
                    format!("{id}: order {index} jumps to {} of {}", c.target, list.len()),
                ));
            }
        }

        for vehicle in list.shared_vehicles() {
            let linked = fleet.vehicles.get(&vehicle).and_then(|v| v.order_list);
            if linked != Some(id) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MembershipMismatch,
                    format!("{id} lists {vehicle}, which is linked to {linked:?}"),
                ));
            }
        }
    }

    for v in fleet.vehicles.values() {
        let Some(list_id) = v.order_list else {
            continue;
        };
        let Some(list) = fleet.lists.get(&list_id) else {
            errors.push(ValidationError::new(
                ValidationErrorKind::MembershipMismatch,
                format!("{} is linked to missing {list_id}", v.id),
            ));
            continue;
        };
        if !list.is_shared_with(v.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::MembershipMismatch,
                format!("{} is linked to {list_id}, which does not list it", v.id),
            ));
        }
        let in_range = |index: usize| index < list.len() || (list.is_empty() && index == 0);
        let cursor = v.cursor;
        if !in_range(cursor.real_order_index) || !in_range(cursor.implicit_order_index) {
            errors.push(ValidationError::new(
                ValidationErrorKind::CursorOutOfRange,
                format!(
                    "{}: cursor {}/{} in a list of {}",
                    v.id,
                    cursor.real_order_index,
                    cursor.implicit_order_index,
                    list.len()
                ),
            ));
        }
        if list.manual_order_count() > 0
            && list.order(cursor.real_order_index).is_some_and(Order::is_implicit)
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::CursorOutOfRange,
                format!("{}: real cursor {} on an implicit order", v.id, cursor.real_order_index),
            ));
        }
    }

    let recount = DestinationRefCounts::from_lists(fleet.lists.values());
    if recount != fleet.destinations {
        let cached: BTreeSet<_> = fleet.destinations.iter().collect();
        let fresh: BTreeSet<_> = recount.iter().collect();
        let drift = cached.symmetric_difference(&fresh).count();
        errors.push(ValidationError::new(
            ValidationErrorKind::RefCountMismatch,
            format!("{drift} reference counts differ from a recount"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
