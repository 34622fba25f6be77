//! Vehicle order engine for a transport simulation.
//!
//! Each vehicle follows a cyclic list of orders: go to a station, depot or
//! waypoint, or control-flow steps such as conditional jumps, slot and
//! counter operations. Lists can be shared by many vehicles. The engine
//! edits lists, advances vehicles through them every tick, and predicts
//! where a vehicle will stop next for cargo routing.
//!
//! # Modules
//!
//! - **`models`**: Orders, order lists, dispatch schedules, vehicles and cursors
//! - **`world`**: Stations, depots, waypoints, slots and counters the orders refer to
//! - **`fleet`**: Owner of vehicles, lists and the destination reference counts
//! - **`commands`**: Validated mutations (insert, delete, move, modify, skip, clone)
//! - **`conditions`**: Conditional order evaluation, live or dry-run
//! - **`deferred`**: Side-effect overlay for path-finder look-ahead
//! - **`advance`**: Per-tick order advancement and the station lifecycle
//! - **`next_stop`**: Next-stopping-station prediction per cargo
//! - **`validation`**: Consistency audit of incrementally maintained state
//! - **`config`**: Engine limits and switches
//!
//! # Determinism
//!
//! Every peer of a networked game runs the same commands against the same
//! state. All registries are ordered maps and no evaluation draws
//! randomness, so replaying a command stream reproduces the state exactly.
//!
//! # Example
//!
//! ```
//! use u_orders::commands::ExecMode;
//! use u_orders::fleet::Fleet;
//! use u_orders::models::{CompanyId, Order, StationId, Vehicle, VehicleId, VehicleType};
//! use u_orders::world::{Location, Station, World};
//!
//! let mut world = World::new()
//!     .with_station(Station::new(StationId(1), Location::new(0, 0)).with_rail(2))
//!     .with_station(Station::new(StationId(2), Location::new(40, 0)).with_rail(2));
//! let mut fleet = Fleet::default();
//! fleet.add_vehicle(Vehicle::new(VehicleId(1), CompanyId(1), VehicleType::Train));
//!
//! for (index, station) in [StationId(1), StationId(2)].into_iter().enumerate() {
//!     fleet
//!         .insert_order(VehicleId(1), index, Order::station(station), ExecMode::Execute, &world)
//!         .unwrap();
//! }
//! let outcome = fleet.process_orders(VehicleId(1), &mut world);
//! assert!(matches!(outcome, u_orders::advance::AdvanceOutcome::Destination(_)));
//! ```

pub mod advance;
pub mod commands;
pub mod conditions;
pub mod config;
pub mod deferred;
pub mod fleet;
pub mod models;
pub mod next_stop;
pub mod validation;
pub mod world;
