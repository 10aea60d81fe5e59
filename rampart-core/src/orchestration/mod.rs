//! Scan orchestration: policy gate, jobs, registry and the façade that ties
//! them together.
//!
//! Jobs are driven by a [`ScanEngine`]; everything observable about them flows
//! out through the [`ScanEventBus`].

pub mod engine;
pub mod events;
pub mod exclude;
mod frontier;
pub mod job;
pub mod orchestrator;
pub mod policy;
pub mod registry;
pub mod results;
pub mod runtime;
mod worker;

pub use engine::*;
pub use events::*;
pub use exclude::*;
pub use job::ScanJob;
pub use orchestrator::*;
pub use policy::*;
pub use registry::*;
pub use results::*;
pub use runtime::*;
