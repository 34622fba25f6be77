//! `DeleteOrder` and `DeleteAllOrders`.

use log::{debug, info};

use super::{CommandCost, CommandError, CommandResult, ExecMode};
use crate::fleet::Fleet;
use crate::models::{OrderIndex, VehicleId};

impl Fleet {
    /// Removes one order from the vehicle's list.
    ///
    /// Every vehicle sharing the list has its cursor shifted; conditional
    /// targets follow the orders they point at.
    pub fn delete_order(&mut self, vehicle: VehicleId, index: OrderIndex, mode: ExecMode) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        let list = v
            .order_list
            .and_then(|id| self.lists.get(&id))
            .filter(|l| !l.is_empty())
            .ok_or(CommandError::NoOrders)?;
        if index >= list.len() {
            return Err(CommandError::InvalidOrderIndex(index));
        }
        if !mode.is_execute() {
            return Ok(CommandCost::new());
        }

        let list_id = list.id();
        if let Some(order) = self.list_delete(list_id, index) {
            debug!("{vehicle}: deleted {} order {index} of {list_id}", order.kind_name());
        }
        Ok(CommandCost::new())
    }

    /// Detaches the vehicle from its list, freeing it if nobody else shares it.
    pub fn delete_all_orders(&mut self, vehicle: VehicleId, mode: ExecMode) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        if v.order_list.is_none() {
            return Err(CommandError::NoOrders);
        }
        if mode.is_execute() {
            self.detach(vehicle);
            info!("{vehicle}: orders cleared");
        }
        Ok(CommandCost::new())
    }
}
