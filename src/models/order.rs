//! Order model.
//!
//! An order is one instruction in a vehicle's itinerary. Each order kind
//! carries exactly the payload it needs, so flags that only make sense for
//! station orders cannot be set on a waypoint order and a jump target
//! cannot exist outside a conditional order.
//!
//! # Kinds
//!
//! | Kind | Destination namespace | Advancement |
//! |------|----------------------|-------------|
//! | `GoToStation` | station | destination |
//! | `GoToDepot` | depot (or nearest) | destination |
//! | `GoToWaypoint` | waypoint | destination |
//! | `Conditional` | order index | branch |
//! | `ReleaseSlot` / `TryAcquireSlot` / `ReleaseSlotGroup` | slot / group | fire and continue |
//! | `ChangeCounter` | counter | fire and continue |
//! | `Dummy` / `Label` | none | continue |
//! | `Implicit` | station | generated by arrivals |
//! | `Loading` / `LoadingAdvance` / `LeaveStation` / `Waiting` | station | vehicle state only |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cargo::CargoType;
use super::ids::{CounterId, DepotId, OrderIndex, SlotGroupId, SlotId, StationId, WaypointId};

/// One instruction in an order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// What the order does, with its kind-specific payload.
    pub kind: OrderKind,
    /// Timetable hints.
    pub timetable: OrderTimetable,
}

/// Order kinds and their payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    GoToStation(StationOrder),
    GoToDepot(DepotOrder),
    GoToWaypoint(WaypointOrder),
    /// Vehicle is loading/unloading at a station.
    Loading(LoadingOrder),
    /// Vehicle is moving further into a platform while loading.
    LoadingAdvance(StationId),
    /// Vehicle is pulling out of a station.
    LeaveStation(StationId),
    /// Placeholder with no effect.
    Dummy,
    Conditional(ConditionalOrder),
    /// A stop the vehicle made that was not in its orders.
    Implicit(StationId),
    /// Vehicle is waiting outside a station for its timetabled slot.
    Waiting,
    ReleaseSlot(SlotId),
    TryAcquireSlot(SlotId),
    ReleaseSlotGroup(SlotGroupId),
    ChangeCounter(CounterOrder),
    Label(LabelOrder),
}

/// Intermediate/destination stopping behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NonStop {
    /// Stop at every station passed and at the destination.
    #[default]
    StopEverywhere,
    /// Skip intermediate stations, stop at the destination.
    NonStop,
    /// Stop at intermediate stations, pass through the destination.
    GoVia,
    /// Pass through everything including the destination.
    NonStopVia,
}

impl NonStop {
    /// Whether the vehicle halts at the ordered station.
    pub fn stops_at_destination(self) -> bool {
        matches!(self, NonStop::StopEverywhere | NonStop::NonStop)
    }

    /// Whether the vehicle halts at stations between orders.
    pub fn stops_at_intermediate(self) -> bool {
        matches!(self, NonStop::StopEverywhere | NonStop::GoVia)
    }
}

/// Where a train stops along the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopLocation {
    NearEnd,
    Middle,
    #[default]
    FarEnd,
}

/// Loading behaviour at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadPolicy {
    #[default]
    LoadIfPossible,
    /// Wait until every cargo type is full.
    FullLoad,
    /// Wait until any cargo type is full.
    FullLoadAny,
    NoLoad,
}

impl LoadPolicy {
    pub fn is_full_load(self) -> bool {
        matches!(self, LoadPolicy::FullLoad | LoadPolicy::FullLoadAny)
    }
}

/// Unloading behaviour at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnloadPolicy {
    /// Unload cargo the station accepts.
    #[default]
    UnloadIfAccepted,
    /// Unload everything.
    Unload,
    /// Unload everything for transfer.
    Transfer,
    NoUnload,
}

impl UnloadPolicy {
    /// Whether all cargo leaves the vehicle at this stop.
    pub fn unloads_everything(self) -> bool {
        matches!(self, UnloadPolicy::Unload | UnloadPolicy::Transfer)
    }
}

/// Load and unload policy for one cargo type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CargoPolicy {
    pub load: LoadPolicy,
    pub unload: UnloadPolicy,
}

impl CargoPolicy {
    /// Whether the vehicle does anything with this cargo at the stop.
    pub fn handles_cargo(self) -> bool {
        self.load != LoadPolicy::NoLoad || self.unload != UnloadPolicy::NoUnload
    }
}

/// Payload of a go-to-station order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationOrder {
    pub station: StationId,
    pub non_stop: NonStop,
    pub stop_location: StopLocation,
    pub load: LoadPolicy,
    pub unload: UnloadPolicy,
    /// Per-cargo policies overriding `load`/`unload`.
    pub cargo_overrides: BTreeMap<CargoType, CargoPolicy>,
    /// Cargo to refit to at this stop.
    pub refit: Option<CargoType>,
}

impl StationOrder {
    pub fn new(station: StationId) -> Self {
        Self {
            station,
            non_stop: NonStop::StopEverywhere,
            stop_location: StopLocation::FarEnd,
            load: LoadPolicy::LoadIfPossible,
            unload: UnloadPolicy::UnloadIfAccepted,
            cargo_overrides: BTreeMap::new(),
            refit: None,
        }
    }

    pub fn with_non_stop(mut self, non_stop: NonStop) -> Self {
        self.non_stop = non_stop;
        self
    }

    pub fn with_stop_location(mut self, location: StopLocation) -> Self {
        self.stop_location = location;
        self
    }

    pub fn with_load(mut self, load: LoadPolicy) -> Self {
        self.load = load;
        self
    }

    pub fn with_unload(mut self, unload: UnloadPolicy) -> Self {
        self.unload = unload;
        self
    }

    /// Overrides load/unload behaviour for one cargo type.
    pub fn with_cargo_policy(mut self, cargo: CargoType, load: LoadPolicy, unload: UnloadPolicy) -> Self {
        self.cargo_overrides.insert(cargo, CargoPolicy { load, unload });
        self
    }

    pub fn with_refit(mut self, cargo: CargoType) -> Self {
        self.refit = Some(cargo);
        self
    }

    /// Effective policy for a cargo type.
    pub fn policy_for(&self, cargo: CargoType) -> CargoPolicy {
        self.cargo_overrides.get(&cargo).copied().unwrap_or(CargoPolicy {
            load: self.load,
            unload: self.unload,
        })
    }

    /// Whether any cargo type is full-loaded here.
    pub fn has_full_load(&self) -> bool {
        self.load.is_full_load() || self.cargo_overrides.values().any(|p| p.load.is_full_load())
    }

    /// Whether the vehicle halts at this station at all.
    pub fn stops_here(&self) -> bool {
        self.non_stop.stops_at_destination()
    }
}

/// A station order as executed by a loading vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingOrder {
    pub order: StationOrder,
    /// True when the stop is the ordered destination, false for an
    /// unscheduled (implicit) stop or a cancelled order.
    pub at_destination: bool,
}

/// Which depot a depot order heads for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepotTarget {
    Depot(DepotId),
    /// Resolved by a nearest-depot search each time the order starts.
    Nearest,
}

/// What happens once the depot is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepotAction {
    /// Service and continue.
    #[default]
    Service,
    /// Stop inside the depot.
    Halt,
    /// Wait in the depot to even out spacing with shared vehicles.
    Unbunch,
}

/// Payload of a go-to-depot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotOrder {
    pub target: DepotTarget,
    /// Depot chosen by the last nearest-depot search.
    pub resolved: Option<DepotId>,
    pub action: DepotAction,
    /// Only visit when the vehicle needs servicing.
    pub service_only: bool,
    pub non_stop: NonStop,
    pub refit: Option<CargoType>,
}

impl DepotOrder {
    pub fn new(target: DepotTarget) -> Self {
        Self {
            target,
            resolved: None,
            action: DepotAction::Service,
            service_only: false,
            non_stop: NonStop::StopEverywhere,
            refit: None,
        }
    }

    pub fn with_action(mut self, action: DepotAction) -> Self {
        self.action = action;
        self
    }

    pub fn service_only(mut self) -> Self {
        self.service_only = true;
        self
    }

    pub fn with_non_stop(mut self, non_stop: NonStop) -> Self {
        self.non_stop = non_stop;
        self
    }

    pub fn with_refit(mut self, cargo: CargoType) -> Self {
        self.refit = Some(cargo);
        self
    }

    pub fn is_nearest(&self) -> bool {
        self.target == DepotTarget::Nearest
    }

    /// Concrete depot, if known.
    pub fn depot(&self) -> Option<DepotId> {
        match self.target {
            DepotTarget::Depot(id) => Some(id),
            DepotTarget::Nearest => self.resolved,
        }
    }
}

/// Payload of a go-to-waypoint order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointOrder {
    pub waypoint: WaypointId,
    pub non_stop: NonStop,
    /// Reverse direction at the waypoint.
    pub reverse: bool,
}

impl WaypointOrder {
    pub fn new(waypoint: WaypointId) -> Self {
        Self {
            waypoint,
            non_stop: NonStop::StopEverywhere,
            reverse: false,
        }
    }
}

/// Relational operator of a conditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    MoreThan,
    MoreThanOrEquals,
    IsTrue,
    IsFalse,
}

impl Comparator {
    pub fn is_boolean(self) -> bool {
        matches!(self, Comparator::IsTrue | Comparator::IsFalse)
    }
}

/// Calendar/clock field a time condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeDateField {
    Minute,
    Hour,
    /// `hour * 100 + minute`.
    HourMinute,
    Day,
    Month,
    Year,
}

/// Where a dispatch-slot condition takes its slot from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchSource {
    /// The slot this vehicle was last dispatched at.
    VehicleLast,
    /// The slot the schedule last dispatched any vehicle at.
    ScheduleLast,
    /// The schedule's next upcoming slot.
    ScheduleNext,
}

impl DispatchSource {
    /// Whether the answer can change before the vehicle gets there.
    pub fn is_prediction(self) -> bool {
        !matches!(self, DispatchSource::VehicleLast)
    }
}

/// What a dispatch-slot condition tests on the resolved slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPredicate {
    FirstSlot,
    LastSlot,
    /// Slot carries tag `0..16`.
    Tag(u8),
}

/// The quantity a conditional order tests.
///
/// `station: None` on cargo/platform conditions means "the closest
/// go-to-station order before the conditional".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionVariable {
    LoadPercentage,
    Reliability,
    MaxSpeed,
    /// Age in years.
    Age,
    /// Remaining lifetime in years, never negative.
    RemainingLifetime,
    RequiresService,
    Unconditionally,
    CounterValue {
        counter: Option<CounterId>,
    },
    TimeDate {
        field: TimeDateField,
    },
    CargoWaiting {
        station: Option<StationId>,
        cargo: CargoType,
    },
    CargoWaitingAmount {
        station: Option<StationId>,
        cargo: CargoType,
        via: Option<StationId>,
    },
    /// Waiting amount as a percentage of the vehicle's capacity for the cargo.
    CargoWaitingAmountPercentage {
        station: Option<StationId>,
        cargo: CargoType,
        via: Option<StationId>,
    },
    SlotOccupancy {
        slot: Option<SlotId>,
    },
    VehicleInSlot {
        slot: Option<SlotId>,
    },
    VehicleInSlotGroup {
        group: Option<SlotGroupId>,
    },
    FreePlatforms {
        station: Option<StationId>,
    },
    /// Skip a given percentage of the times the order is reached.
    Percent,
    DispatchSlot {
        schedule: usize,
        source: DispatchSource,
        predicate: DispatchPredicate,
    },
}

impl ConditionVariable {
    pub fn name(&self) -> &'static str {
        match self {
            ConditionVariable::LoadPercentage => "load-percentage",
            ConditionVariable::Reliability => "reliability",
            ConditionVariable::MaxSpeed => "max-speed",
            ConditionVariable::Age => "age",
            ConditionVariable::RemainingLifetime => "remaining-lifetime",
            ConditionVariable::RequiresService => "requires-service",
            ConditionVariable::Unconditionally => "unconditionally",
            ConditionVariable::CounterValue { .. } => "counter-value",
            ConditionVariable::TimeDate { .. } => "time-date",
            ConditionVariable::CargoWaiting { .. } => "cargo-waiting",
            ConditionVariable::CargoWaitingAmount { .. } => "cargo-waiting-amount",
            ConditionVariable::CargoWaitingAmountPercentage { .. } => {
                "cargo-waiting-amount-percentage"
            }
            ConditionVariable::SlotOccupancy { .. } => "slot-occupancy",
            ConditionVariable::VehicleInSlot { .. } => "vehicle-in-slot",
            ConditionVariable::VehicleInSlotGroup { .. } => "vehicle-in-slot-group",
            ConditionVariable::FreePlatforms { .. } => "free-platforms",
            ConditionVariable::Percent => "percent",
            ConditionVariable::DispatchSlot { .. } => "dispatch-slot",
        }
    }

    /// Variables that only answer yes or no.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            ConditionVariable::RequiresService
                | ConditionVariable::CargoWaiting { .. }
                | ConditionVariable::VehicleInSlot { .. }
                | ConditionVariable::VehicleInSlotGroup { .. }
                | ConditionVariable::DispatchSlot { .. }
        )
    }

    /// Variables whose comparator is fixed and ignored.
    pub fn ignores_comparator(&self) -> bool {
        matches!(self, ConditionVariable::Unconditionally | ConditionVariable::Percent)
    }

    /// Whether `comparator` is meaningful for this variable.
    pub fn accepts(&self, comparator: Comparator) -> bool {
        match self {
            v if v.ignores_comparator() => comparator == Comparator::Equals,
            // Equals/NotEquals request "acquire, then test membership".
            ConditionVariable::VehicleInSlot { .. } => matches!(
                comparator,
                Comparator::IsTrue | Comparator::IsFalse | Comparator::Equals | Comparator::NotEquals
            ),
            v if v.is_boolean() => comparator.is_boolean(),
            _ => !comparator.is_boolean(),
        }
    }

    /// Comparator used after switching to this variable.
    pub fn default_comparator(&self) -> Comparator {
        if self.is_boolean() {
            Comparator::IsTrue
        } else {
            Comparator::Equals
        }
    }

    /// Inclusive range of the stored comparison value.
    pub fn value_range(&self) -> (i32, i32) {
        match self {
            ConditionVariable::LoadPercentage
            | ConditionVariable::Reliability
            | ConditionVariable::Percent => (0, 100),
            ConditionVariable::CargoWaitingAmountPercentage { .. } => (0, 0xFFFF),
            v if v.is_boolean() || v.ignores_comparator() => (0, 0),
            _ => (0, i32::MAX),
        }
    }
}

/// Payload of a conditional order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalOrder {
    pub variable: ConditionVariable,
    pub comparator: Comparator,
    pub value: i32,
    /// Order index jumped to when the condition holds.
    pub target: OrderIndex,
    /// Accumulator of the `Percent` variable.
    pub jump_counter: i32,
}

impl ConditionalOrder {
    pub fn new(variable: ConditionVariable, comparator: Comparator, value: i32, target: OrderIndex) -> Self {
        Self {
            variable,
            comparator,
            value,
            target,
            jump_counter: 0,
        }
    }
}

/// Counter mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterOp {
    Increase,
    /// Saturates at zero.
    Decrease,
    Set,
}

impl CounterOp {
    pub fn apply(self, current: u32, value: u32) -> u32 {
        match self {
            CounterOp::Increase => current.saturating_add(value),
            CounterOp::Decrease => current.saturating_sub(value),
            CounterOp::Set => value,
        }
    }
}

/// Payload of a change-counter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOrder {
    pub counter: CounterId,
    pub op: CounterOp,
    pub value: u32,
}

/// Payload of a label order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelOrder {
    Text(String),
    /// Departure boards list the station as a via.
    DeparturesVia(StationId),
    /// Departure boards stop listing the station as a via.
    DeparturesRemoveVia(StationId),
}

/// Timetable hints attached to an order.
///
/// Durations are simulation ticks. `wait_time`/`travel_time` hold the
/// current value; the `*_timetabled` flags say whether the value was
/// entered by the player rather than learned automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTimetable {
    pub wait_time: u32,
    pub travel_time: u32,
    pub wait_timetabled: bool,
    pub travel_timetabled: bool,
    pub wait_fixed: bool,
    pub travel_fixed: bool,
    pub max_speed: Option<u16>,
}

impl OrderTimetable {
    /// Timetabled portion of wait + travel.
    pub fn timetabled_duration(&self) -> i64 {
        let wait = if self.wait_timetabled { self.wait_time } else { 0 };
        let travel = if self.travel_timetabled { self.travel_time } else { 0 };
        i64::from(wait) + i64::from(travel)
    }

    /// Actual wait + travel.
    pub fn actual_duration(&self) -> i64 {
        i64::from(self.wait_time) + i64::from(self.travel_time)
    }
}

impl Order {
    pub fn new(kind: OrderKind) -> Self {
        Self {
            kind,
            timetable: OrderTimetable::default(),
        }
    }

    /// Go to a station with default flags.
    pub fn station(station: StationId) -> Self {
        Self::new(OrderKind::GoToStation(StationOrder::new(station)))
    }

    pub fn goto_station(order: StationOrder) -> Self {
        Self::new(OrderKind::GoToStation(order))
    }

    /// Go to a specific depot for servicing.
    pub fn depot(depot: DepotId) -> Self {
        Self::new(OrderKind::GoToDepot(DepotOrder::new(DepotTarget::Depot(depot))))
    }

    pub fn goto_depot(order: DepotOrder) -> Self {
        Self::new(OrderKind::GoToDepot(order))
    }

    pub fn nearest_depot() -> Self {
        Self::new(OrderKind::GoToDepot(DepotOrder::new(DepotTarget::Nearest)))
    }

    pub fn waypoint(waypoint: WaypointId) -> Self {
        Self::new(OrderKind::GoToWaypoint(WaypointOrder::new(waypoint)))
    }

    pub fn conditional(
        variable: ConditionVariable,
        comparator: Comparator,
        value: i32,
        target: OrderIndex,
    ) -> Self {
        Self::new(OrderKind::Conditional(ConditionalOrder::new(
            variable, comparator, value, target,
        )))
    }

    pub fn implicit(station: StationId) -> Self {
        Self::new(OrderKind::Implicit(station))
    }

    pub fn dummy() -> Self {
        Self::new(OrderKind::Dummy)
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(OrderKind::Label(LabelOrder::Text(text.into())))
    }

    pub fn release_slot(slot: SlotId) -> Self {
        Self::new(OrderKind::ReleaseSlot(slot))
    }

    pub fn try_acquire_slot(slot: SlotId) -> Self {
        Self::new(OrderKind::TryAcquireSlot(slot))
    }

    pub fn release_slot_group(group: SlotGroupId) -> Self {
        Self::new(OrderKind::ReleaseSlotGroup(group))
    }

    pub fn change_counter(counter: CounterId, op: CounterOp, value: u32) -> Self {
        Self::new(OrderKind::ChangeCounter(CounterOrder { counter, op, value }))
    }

    /// Sets the wait time and marks it timetabled.
    pub fn with_wait_time(mut self, ticks: u32) -> Self {
        self.timetable.wait_time = ticks;
        self.timetable.wait_timetabled = true;
        self
    }

    /// Sets the travel time and marks it timetabled.
    pub fn with_travel_time(mut self, ticks: u32) -> Self {
        self.timetable.travel_time = ticks;
        self.timetable.travel_timetabled = true;
        self
    }

    pub fn with_max_speed(mut self, speed: u16) -> Self {
        self.timetable.max_speed = Some(speed);
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            OrderKind::GoToStation(_) => "go-to-station",
            OrderKind::GoToDepot(_) => "go-to-depot",
            OrderKind::GoToWaypoint(_) => "go-to-waypoint",
            OrderKind::Loading(_) => "loading",
            OrderKind::LoadingAdvance(_) => "loading-advance",
            OrderKind::LeaveStation(_) => "leave-station",
            OrderKind::Dummy => "dummy",
            OrderKind::Conditional(_) => "conditional",
            OrderKind::Implicit(_) => "implicit",
            OrderKind::Waiting => "waiting",
            OrderKind::ReleaseSlot(_) => "release-slot",
            OrderKind::TryAcquireSlot(_) => "try-acquire-slot",
            OrderKind::ReleaseSlotGroup(_) => "release-slot-group",
            OrderKind::ChangeCounter(_) => "change-counter",
            OrderKind::Label(_) => "label",
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self.kind, OrderKind::Implicit(_))
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, OrderKind::Conditional(_))
    }

    /// Kinds that can be placed in an order list by the player.
    pub fn is_list_order(&self) -> bool {
        !matches!(
            self.kind,
            OrderKind::Loading(_)
                | OrderKind::LoadingAdvance(_)
                | OrderKind::LeaveStation(_)
                | OrderKind::Waiting
                | OrderKind::Implicit(_)
        )
    }

    /// Station, depot and waypoint orders.
    pub fn is_real_destination(&self) -> bool {
        matches!(
            self.kind,
            OrderKind::GoToStation(_) | OrderKind::GoToDepot(_) | OrderKind::GoToWaypoint(_)
        )
    }

    pub fn station_order(&self) -> Option<&StationOrder> {
        match &self.kind {
            OrderKind::GoToStation(so) => Some(so),
            _ => None,
        }
    }

    pub fn conditional_order(&self) -> Option<&ConditionalOrder> {
        match &self.kind {
            OrderKind::Conditional(c) => Some(c),
            _ => None,
        }
    }

    pub fn conditional_order_mut(&mut self) -> Option<&mut ConditionalOrder> {
        match &mut self.kind {
            OrderKind::Conditional(c) => Some(c),
            _ => None,
        }
    }

    /// Station of a go-to-station or implicit order.
    pub fn destination_station(&self) -> Option<StationId> {
        match &self.kind {
            OrderKind::GoToStation(so) => Some(so.station),
            OrderKind::Implicit(st) => Some(*st),
            _ => None,
        }
    }

    pub fn has_full_load(&self) -> bool {
        self.station_order().is_some_and(StationOrder::has_full_load)
    }

    pub fn is_unbunching(&self) -> bool {
        matches!(&self.kind, OrderKind::GoToDepot(d) if d.action == DepotAction::Unbunch)
    }

    /// Instruction equality used to detect an unchanged current order.
    ///
    /// Timetable data and jump counters are ignored. Nearest-depot orders
    /// compare equal regardless of which depot the last search picked.
    pub fn same_instruction(&self, other: &Order) -> bool {
        match (&self.kind, &other.kind) {
            (OrderKind::GoToDepot(a), OrderKind::GoToDepot(b)) if a.is_nearest() || b.is_nearest() => {
                a.is_nearest() == b.is_nearest()
                    && a.action == b.action
                    && a.service_only == b.service_only
                    && a.non_stop == b.non_stop
                    && a.refit == b.refit
            }
            (OrderKind::Conditional(a), OrderKind::Conditional(b)) => {
                a.variable == b.variable
                    && a.comparator == b.comparator
                    && a.value == b.value
                    && a.target == b.target
            }
            (a, b) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_order_builder() {
        let so = StationOrder::new(StationId(3))
            .with_non_stop(NonStop::NonStop)
            .with_load(LoadPolicy::FullLoad)
            .with_cargo_policy(2, LoadPolicy::NoLoad, UnloadPolicy::Transfer);

        assert!(so.stops_here());
        assert!(so.has_full_load());
        assert_eq!(so.policy_for(2).unload, UnloadPolicy::Transfer);
        assert_eq!(so.policy_for(1).load, LoadPolicy::FullLoad);
    }

    #[test]
    fn test_non_stop_semantics() {
        assert!(NonStop::GoVia.stops_at_intermediate());
        assert!(!NonStop::GoVia.stops_at_destination());
        assert!(!NonStop::NonStopVia.stops_at_intermediate());
        assert!(NonStop::NonStop.stops_at_destination());
    }

    #[test]
    fn test_timetable_durations() {
        let mut order = Order::station(StationId(1)).with_wait_time(100);
        order.timetable.travel_time = 40;

        assert_eq!(order.timetable.timetabled_duration(), 100);
        assert_eq!(order.timetable.actual_duration(), 140);
    }

    #[test]
    fn test_comparator_acceptance() {
        let occupancy = ConditionVariable::SlotOccupancy { slot: None };
        assert!(occupancy.accepts(Comparator::Equals));
        assert!(occupancy.accepts(Comparator::LessThan));
        assert!(!occupancy.accepts(Comparator::IsTrue));

        assert!(ConditionVariable::RequiresService.accepts(Comparator::IsFalse));
        assert!(!ConditionVariable::RequiresService.accepts(Comparator::MoreThan));

        let in_slot = ConditionVariable::VehicleInSlot { slot: None };
        assert!(in_slot.accepts(Comparator::Equals));
        assert!(!in_slot.accepts(Comparator::LessThan));

        assert!(ConditionVariable::Percent.accepts(Comparator::Equals));
        assert!(!ConditionVariable::Percent.accepts(Comparator::MoreThan));
    }

    #[test]
    fn test_same_instruction_nearest_depot() {
        let mut resolved = DepotOrder::new(DepotTarget::Nearest);
        resolved.resolved = Some(DepotId(9));
        let a = Order::goto_depot(resolved);
        let b = Order::nearest_depot();
        assert!(a.same_instruction(&b));
        assert!(!Order::depot(DepotId(9)).same_instruction(&b));
    }

    #[test]
    fn test_same_instruction_ignores_timetable() {
        let a = Order::station(StationId(1)).with_wait_time(10);
        let b = Order::station(StationId(1));
        assert!(a.same_instruction(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_counter_op() {
        assert_eq!(CounterOp::Increase.apply(u32::MAX, 1), u32::MAX);
        assert_eq!(CounterOp::Decrease.apply(3, 5), 0);
        assert_eq!(CounterOp::Set.apply(3, 5), 5);
    }

    #[test]
    fn test_list_order_kinds() {
        assert!(Order::dummy().is_list_order());
        assert!(!Order::implicit(StationId(1)).is_list_order());
        assert!(!Order::new(OrderKind::Waiting).is_list_order());
    }
}
