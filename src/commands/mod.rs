//! Order list mutation API as deterministic commands.
//!
//! Every edit to an order list is a command: plain data that can be
//! validated locally ([`ExecMode::Test`]) and replayed identically on every
//! peer ([`ExecMode::Execute`]). Validation runs completely before any state
//! changes, so a failed command never leaves a partial edit behind.
//!
//! | Command | Module |
//! |---------|--------|
//! | `InsertOrder` | `insert` |
//! | `DeleteOrder`, `DeleteAllOrders` | `delete` |
//! | `MoveOrder`, `SkipToOrder` | `reorder` |
//! | `CloneOrders` | `clone` |
//! | `ModifyOrder` | `modify` |

mod clone;
mod delete;
mod insert;
mod modify;
mod reorder;

pub use modify::OrderModification;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fleet::Fleet;
use crate::models::{
    CargoType, Comparator, CounterId, DepotId, Order, OrderIndex, SlotGroupId, SlotId, StationId,
    Vehicle, VehicleId, WaypointId,
};
use crate::world::World;

/// Whether a command only validates or also applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecMode {
    Test,
    Execute,
}

impl ExecMode {
    pub fn is_execute(self) -> bool {
        self == ExecMode::Execute
    }
}

/// Cost of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCost {
    pub cost: i64,
    pub message: Option<String>,
}

impl CommandCost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Result of a command.
pub type CommandResult = Result<CommandCost, CommandError>;

/// Why a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown vehicle {0}")]
    UnknownVehicle(VehicleId),
    #[error("unknown station {0}")]
    UnknownStation(StationId),
    #[error("unknown depot {0}")]
    UnknownDepot(DepotId),
    #[error("unknown waypoint {0}")]
    UnknownWaypoint(WaypointId),
    #[error("unknown slot {0}")]
    UnknownSlot(SlotId),
    #[error("unknown slot group {0}")]
    UnknownSlotGroup(SlotGroupId),
    #[error("unknown counter {0}")]
    UnknownCounter(CounterId),
    #[error("vehicle has no orders")]
    NoOrders,
    #[error("no order at index {0}")]
    InvalidOrderIndex(OrderIndex),
    #[error("order list would exceed {0} orders")]
    TooManyOrders(usize),
    #[error("no space for another order list")]
    NoSpace,
    #[error("{0} orders cannot be placed in an order list")]
    InvalidOrderKind(&'static str),
    #[error("destination belongs to another company")]
    NotOwner,
    #[error("vehicle cannot use {0}")]
    CannotUseStation(StationId),
    #[error("{0} does not suit this vehicle")]
    UnsuitableDepot(DepotId),
    #[error("only trains and road vehicles can use waypoints")]
    WaypointNotAllowed,
    #[error("non-stop flags need a train or road vehicle")]
    NonStopNotAllowed,
    #[error("stop location needs a train")]
    StopLocationNotAllowed,
    #[error("destination is out of the aircraft's range")]
    AircraftOutOfRange,
    #[error("full load cannot be combined with an unbunching order")]
    UnbunchingFullLoad,
    #[error("only one unbunching order is allowed")]
    UnbunchingOnlyOne,
    #[error("unbunching cannot be combined with conditional orders")]
    UnbunchingWithConditional,
    #[error("comparator {comparator:?} is not valid for {variable}")]
    InvalidComparator {
        variable: &'static str,
        comparator: Comparator,
    },
    #[error("condition value {0} out of range")]
    InvalidConditionValue(i32),
    #[error("jump target {0} out of range")]
    InvalidJumpTarget(OrderIndex),
    #[error("no dispatch schedule {0}")]
    InvalidSchedule(usize),
    #[error("invalid cargo type {0}")]
    InvalidCargo(CargoType),
    #[error("{modification} does not apply to {kind} orders")]
    NotApplicable {
        modification: &'static str,
        kind: &'static str,
    },
    #[error("conflicting load, unload or depot flags")]
    InvalidPolicy,
    #[error("already at that order")]
    SameOrder,
    #[error("vehicles are of different types")]
    VehicleTypeMismatch,
    #[error("vehicles already share orders")]
    AlreadyShared,
    #[error("a vehicle cannot clone its own orders")]
    CannotCloneSelf,
    #[error("no source vehicle given")]
    MissingSource,
}

/// How `CloneOrders` relates the two vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloneMode {
    /// Join the source's order list.
    Share,
    /// Take a private copy of the source's orders.
    Copy,
    /// Leave a shared list, keeping a private copy.
    Unshare,
}

/// An order list mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    InsertOrder {
        vehicle: VehicleId,
        index: OrderIndex,
        order: Order,
    },
    DeleteOrder {
        vehicle: VehicleId,
        index: OrderIndex,
    },
    MoveOrder {
        vehicle: VehicleId,
        from: OrderIndex,
        to: OrderIndex,
    },
    ModifyOrder {
        vehicle: VehicleId,
        index: OrderIndex,
        modification: OrderModification,
    },
    SkipToOrder {
        vehicle: VehicleId,
        index: OrderIndex,
    },
    CloneOrders {
        vehicle: VehicleId,
        source: Option<VehicleId>,
        mode: CloneMode,
    },
    DeleteAllOrders {
        vehicle: VehicleId,
    },
}

impl Fleet {
    /// Validates and, in [`ExecMode::Execute`], applies a command.
    pub fn execute(&mut self, command: &OrderCommand, mode: ExecMode, world: &World) -> CommandResult {
        debug!("{mode:?} {command:?}");
        let result = match command {
            OrderCommand::InsertOrder {
                vehicle,
                index,
                order,
            } => self.insert_order(*vehicle, *index, order.clone(), mode, world),
            OrderCommand::DeleteOrder { vehicle, index } => self.delete_order(*vehicle, *index, mode),
            OrderCommand::MoveOrder { vehicle, from, to } => self.move_order(*vehicle, *from, *to, mode),
            OrderCommand::ModifyOrder {
                vehicle,
                index,
                modification,
            } => self.modify_order(*vehicle, *index, modification.clone(), mode, world),
            OrderCommand::SkipToOrder { vehicle, index } => self.skip_to_order(*vehicle, *index, mode),
            OrderCommand::CloneOrders {
                vehicle,
                source,
                mode: clone,
            } => self.clone_orders(*vehicle, *source, *clone, mode, world),
            OrderCommand::DeleteAllOrders { vehicle } => self.delete_all_orders(*vehicle, mode),
        };
        if let Err(e) = &result {
            debug!("rejected: {e}");
        }
        result
    }

    pub(crate) fn command_vehicle(&self, vehicle: VehicleId) -> Result<&Vehicle, CommandError> {
        self.vehicles
            .get(&vehicle)
            .ok_or(CommandError::UnknownVehicle(vehicle))
    }
}
