//! The comparator primitive every condition funnels through.

use crate::models::Comparator;

impl Comparator {
    /// Applies the comparator to `variable` and the order's `value`.
    ///
    /// `IsTrue`/`IsFalse` ignore `value` and test `variable` against zero.
    pub fn test(self, variable: i64, value: i64) -> bool {
        match self {
            Comparator::Equals => variable == value,
            Comparator::NotEquals => variable != value,
            Comparator::LessThan => variable < value,
            Comparator::LessThanOrEquals => variable <= value,
            Comparator::MoreThan => variable > value,
            Comparator::MoreThanOrEquals => variable >= value,
            Comparator::IsTrue => variable != 0,
            Comparator::IsFalse => variable == 0,
        }
    }

    /// Applies the comparator to a yes/no answer.
    pub fn test_bool(self, answer: bool) -> bool {
        self.test(i64::from(answer), 1)
    }
}
