//! `MoveOrder` and `SkipToOrder`.

use log::debug;

use super::{CommandCost, CommandError, CommandResult, ExecMode};
use crate::fleet::Fleet;
use crate::models::{OrderIndex, VehicleId};

impl Fleet {
    /// Moves the order at `from` so it ends up at `to`.
    pub fn move_order(&mut self, vehicle: VehicleId, from: OrderIndex, to: OrderIndex, mode: ExecMode) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        let list = v
            .order_list
            .and_then(|id| self.lists.get(&id))
            .ok_or(CommandError::NoOrders)?;
        for index in [from, to] {
            if index >= list.len() {
                return Err(CommandError::InvalidOrderIndex(index));
            }
        }
        if from == to {
            return Err(CommandError::SameOrder);
        }
        if !mode.is_execute() {
            return Ok(CommandCost::new());
        }

        let list_id = list.id();
        self.list_move(list_id, from, to);
        debug!("{vehicle}: moved order {from} to {to} in {list_id}");
        Ok(CommandCost::new())
    }

    /// Points the vehicle at a manual order, abandoning the current one.
    pub fn skip_to_order(&mut self, vehicle: VehicleId, index: OrderIndex, mode: ExecMode) -> CommandResult {
        let v = self.command_vehicle(vehicle)?;
        let list = v
            .order_list
            .and_then(|id| self.lists.get(&id))
            .ok_or(CommandError::NoOrders)?;
        if list.len() < 2 || !list.order(index).is_some_and(|o| !o.is_implicit()) {
            return Err(CommandError::InvalidOrderIndex(index));
        }
        if index == v.cursor.implicit_order_index {
            return Err(CommandError::SameOrder);
        }
        if !mode.is_execute() {
            return Ok(CommandCost::new());
        }

        if v.is_loading() {
            self.leave_station(vehicle);
        }
        let Some(v) = self.vehicles.get_mut(&vehicle) else {
            return Ok(CommandCost::new());
        };
        let Some(list) = v.order_list.and_then(|id| self.lists.get(&id)) else {
            return Ok(CommandCost::new());
        };
        v.cursor.real_order_index = index;
        v.cursor.implicit_order_index = index;
        v.cursor.update_real_order_index(list);
        v.cursor.timetable_order_index = None;
        v.destination = None;
        if !v.is_busy() {
            v.clear_current_order();
        }
        debug!("{vehicle}: skipped to order {index}");
        Ok(CommandCost::new())
    }
}
