//! twin-components: reference component models for the twin kernel.
//!
//! Provides physics-free models that exercise every part of the kernel:
//! - [`Store`]: passive inventory node
//! - [`ConstantSource`]: node with a prescribed production rate
//! - [`LinearConductance`]: edge moving `g * (source - target)` per key
//! - [`BangBangController`] and [`PiController`]: single-loop controllers
//!
//! [`register_all`] makes each model loadable from a graph document,
//! custom configurations included.

pub mod bang_bang;
pub mod conductance;
pub mod pi;
pub mod source;
pub mod store;

pub use bang_bang::{ACTUATOR, BangBangController, MEASURED};
pub use conductance::{CONDUCTANCE, LinearConductance};
pub use pi::PiController;
pub use source::{ConstantSource, RATE};
pub use store::{INVENTORY, Store};

use twin_core::KernelResult;
use twin_graph::TypeRegistry;

/// Register every model in this crate.
///
/// Custom configurations (store layouts, transported keys, watched fields)
/// are restored from the params of each document entry.
pub fn register_all(registry: &mut TypeRegistry) -> KernelResult<()> {
    registry
        .register_node(Store::new)?
        .register_node(ConstantSource::new)?
        .register_edge(LinearConductance::new)?
        .register_controller(BangBangController::new)?
        .register_controller(PiController::new)?;
    Ok(())
}
