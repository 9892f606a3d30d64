//! EV charger capacity planning for multi-family buildings.
//!
//! [`analysis::analyze`] sizes a charger request against the existing service
//! under three scenarios, [`generator::generate_entities`] turns a chosen
//! scenario into panels, circuits and meters, and
//! [`population::PopulationOrchestrator`] persists that graph in dependency
//! order.

pub mod analysis;
pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod generator;
pub mod nec;
pub mod population;
pub mod telemetry;
