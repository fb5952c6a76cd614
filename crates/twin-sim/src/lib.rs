//! Run orchestration for twin graphs.
//!
//! Provides:
//! - `SimOptions`: serde-loadable run configuration with traces
//! - `run_sim` / `run_sim_with_progress`: fixed-step driving of `Graph::update`
//! - `SimRecord`: decimated samples of the traced state fields

pub mod error;
pub mod sim;

pub use error::{SimError, SimResult};
pub use sim::{
    Trace, TraceTarget, SimOptions, SimProgress, SimRecord, run_sim, run_sim_with_progress,
};
