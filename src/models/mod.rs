//! Order engine domain models.
//!
//! Provides the data types the engine operates on: orders and their
//! per-kind payloads, shared order lists, dispatch schedules and the
//! vehicle-side cursor.
//!
//! # Domain Mappings
//!
//! | u-orders | Rail | Road | Air |
//! |----------|------|------|-----|
//! | Order | Timetable stop | Route stop | Flight leg |
//! | OrderList | Service pattern | Route | Rotation |
//! | OrderCursor | Train position in pattern | Bus position on route | Next leg |
//! | DispatchSchedule | Clock-face timetable | Headway plan | Slot plan |

mod cargo;
mod dispatch;
mod ids;
mod order;
mod order_list;
mod vehicle;

pub use cargo::{CargoFilter, CargoMask, CargoType, NUM_CARGO};
pub use dispatch::{DispatchRecord, DispatchSchedule, DispatchSlot};
pub use ids::{
    CompanyId, CounterId, DepotId, OrderIndex, OrderListId, SlotGroupId, SlotId, StationId,
    VehicleId, WaypointId,
};
pub use order::{
    CargoPolicy, Comparator, ConditionVariable, ConditionalOrder, CounterOp, CounterOrder,
    DepotAction, DepotOrder, DepotTarget, DispatchPredicate, DispatchSource, LabelOrder,
    LoadPolicy, LoadingOrder, NonStop, Order, OrderKind, OrderTimetable, StationOrder,
    StopLocation, TimeDateField, UnloadPolicy, WaypointOrder,
};
pub use order_list::OrderList;
pub use vehicle::{
    CargoHold, Destination, OrderCursor, RoadStopKind, Vehicle, VehicleType, DAYS_PER_YEAR,
};
