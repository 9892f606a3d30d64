pub mod building;
pub mod ev_charger;
pub mod types;

pub use building::*;
pub use ev_charger::*;
pub use types::*;
