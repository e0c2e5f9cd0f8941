//! Forecast building blocks: decomposition, growth, staffing

pub mod decomposition;
pub mod growth;
pub mod staffing;
mod deadline;

pub use deadline::Deadline;
pub use decomposition::{Decomposition, SeasonalDecomposer};
pub use growth::{historical_growth_rate_pct, GrowthProjector};
pub use staffing::{required_supervisors, service_level, workload_agents, ErlangC, StaffingRequirement};
