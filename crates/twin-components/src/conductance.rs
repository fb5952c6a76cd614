//! Linear conductance edge.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use twin_core::{FlowMap, KernelResult, Schema, StateValue};
use twin_graph::{EdgeModel, FlowContext, ModelParams, decode_params};

use crate::store::INVENTORY;

/// Conductance field of a [`LinearConductance`].
pub const CONDUCTANCE: &str = "g";

/// Moves `g * (source - target)` per second of every transported key.
///
/// Keys are edge-local; attach the edge with aliases to transport between
/// fields of different names, e.g. `inventory` -> `fuel.U`. The keys are
/// persisted as the edge's params.
#[derive(Debug, Clone)]
pub struct LinearConductance {
    keys: Vec<String>,
    schema: Arc<Schema>,
}

#[derive(Serialize, Deserialize)]
struct Transported {
    keys: Vec<String>,
}

impl LinearConductance {
    /// Conductance transporting [`INVENTORY`].
    pub fn new() -> KernelResult<Self> {
        Self::transporting([INVENTORY])
    }

    pub fn transporting<I, S>(keys: I) -> KernelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Schema::builder().float(CONDUCTANCE, 0.0).build()?;
        Ok(Self {
            keys: keys.into_iter().map(Into::into).collect(),
            schema: Arc::new(schema),
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl EdgeModel for LinearConductance {
    fn type_name(&self) -> &'static str {
        "LinearConductance"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn params(&self) -> ModelParams {
        serde_json::json!(Transported {
            keys: self.keys.clone(),
        })
    }

    fn configure(&mut self, params: &ModelParams) -> KernelResult<()> {
        if let Some(Transported { keys }) = decode_params(params)? {
            self.keys = keys;
        }
        Ok(())
    }

    fn calculate_flows(&self, _dt: f64, ctx: &FlowContext<'_>) -> KernelResult<FlowMap> {
        let g = ctx.state.f64(CONDUCTANCE)?;
        let mut flows = FlowMap::new();
        for key in &self.keys {
            let rate = g * (ctx.source.f64(key)? - ctx.target.f64(key)?);
            flows.insert(key.clone(), StateValue::Float(rate));
        }
        Ok(flows)
    }
}
