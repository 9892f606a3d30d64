//! Demand factor library: NEC tables and VA/amp arithmetic shared by the
//! analyzer and the entity generator.

pub mod demand;
pub mod tables;

pub use demand::*;
pub use tables::{citations, conductor_for_breaker};
