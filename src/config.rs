//! Engine settings.

use serde::{Deserialize, Serialize};

/// Limits and switches of the order engine.
///
/// Deserializes with defaults for missing fields, so a partial settings
/// document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    /// Maximum orders in one list, implicit orders included.
    pub max_orders_per_list: usize,
    /// Maximum number of live order lists.
    pub max_order_lists: usize,
    /// Bound on consecutive non-destination orders resolved in one step.
    pub max_conditional_depth: usize,
    /// Whether ground vehicles record unscheduled stops as implicit orders.
    pub implicit_orders: bool,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            max_orders_per_list: 5000,
            max_order_lists: 64000,
            max_conditional_depth: 64,
            implicit_orders: true,
        }
    }
}

impl OrderSettings {
    /// Creates settings with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of orders in one list.
    pub fn with_max_orders_per_list(mut self, max: usize) -> Self {
        self.max_orders_per_list = max;
        self
    }

    /// Sets the maximum number of live order lists.
    pub fn with_max_order_lists(mut self, max: usize) -> Self {
        self.max_order_lists = max;
        self
    }

    /// Sets the conditional depth bound.
    pub fn with_max_conditional_depth(mut self, depth: usize) -> Self {
        self.max_conditional_depth = depth;
        self
    }

    /// Enables or disables implicit order insertion.
    pub fn with_implicit_orders(mut self, enabled: bool) -> Self {
        self.implicit_orders = enabled;
        self
    }

    /// Depth bound for a list of `len` orders.
    pub fn depth_bound(&self, len: usize) -> usize {
        self.max_conditional_depth.min(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let s: OrderSettings = serde_json::from_str(r#"{"max_orders_per_list": 10}"#).unwrap();
        assert_eq!(s.max_orders_per_list, 10);
        assert_eq!(s.max_conditional_depth, 64);
        assert!(s.implicit_orders);
    }

    #[test]
    fn test_depth_bound() {
        let s = OrderSettings::new().with_max_conditional_depth(8);
        assert_eq!(s.depth_bound(3), 3);
        assert_eq!(s.depth_bound(100), 8);
    }
}
