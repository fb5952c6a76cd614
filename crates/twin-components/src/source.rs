//! Node with a prescribed production rate.

use std::sync::Arc;

use twin_core::{KernelResult, Schema, State, StateValue};
use twin_graph::NodeModel;

use crate::store::INVENTORY;

/// Production rate field of a [`ConstantSource`], quantity per second.
pub const RATE: &str = "rate";

/// Store whose inventory also grows by `rate * dt` every tick.
///
/// `rate` is ordinary state, so a controller may retarget it.
#[derive(Debug, Clone)]
pub struct ConstantSource {
    schema: Arc<Schema>,
}

impl ConstantSource {
    pub fn new() -> KernelResult<Self> {
        let schema = Schema::builder()
            .float(INVENTORY, 0.0)
            .float(RATE, 0.0)
            .build()?;
        Ok(Self {
            schema: Arc::new(schema),
        })
    }
}

impl NodeModel for ConstantSource {
    fn type_name(&self) -> &'static str {
        "ConstantSource"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn update_from_state(&mut self, dt: f64, state: &mut State) -> KernelResult<()> {
        let rate = state.f64(RATE)?;
        state.accumulate(INVENTORY, &StateValue::Float(rate), dt)?;
        state
            .get(INVENTORY)
            .map_or(Ok(()), |v| v.ensure_finite("ConstantSource.inventory"))
    }
}
