//! Small models shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use twin_core::{FlowMap, KernelResult, Schema, StateMap, StateValue, state_map};
use twin_graph::{ControllerIo, ControllerModel, EdgeModel, FlowContext, NodeModel, TypeRegistry};

/// Single scalar inventory `a`.
#[derive(Debug, Default)]
pub struct Tank;

impl NodeModel for Tank {
    fn type_name(&self) -> &'static str {
        "Tank"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::builder().float("a", 0.0).build().unwrap())
    }
}

/// Tank that also tracks a temperature; a wider schema than [`Tank`].
#[derive(Debug, Default)]
pub struct HeatedTank;

impl NodeModel for HeatedTank {
    fn type_name(&self) -> &'static str {
        "HeatedTank"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .float("a", 0.0)
                .float("T", 300.0)
                .build()
                .unwrap(),
        )
    }
}

/// Node holding two material records.
#[derive(Debug, Default)]
pub struct Exchanger;

pub fn material() -> Schema {
    Schema::builder().float("m", 0.0).float("U", 0.0).build().unwrap()
}

impl NodeModel for Exchanger {
    fn type_name(&self) -> &'static str {
        "Exchanger"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .record("fuel", material())
                .record("coolant", material())
                .build()
                .unwrap(),
        )
    }
}

/// `g * (source.a - target.a)` on key `a`.
#[derive(Debug, Default)]
pub struct Conductance;

impl EdgeModel for Conductance {
    fn type_name(&self) -> &'static str {
        "Conductance"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::builder().float("g", 0.0).build().unwrap())
    }

    fn calculate_flows(&self, _dt: f64, ctx: &FlowContext<'_>) -> KernelResult<FlowMap> {
        let g = ctx.state.f64("g")?;
        Ok(state_map([("a", g * (ctx.source.f64("a")? - ctx.target.f64("a")?))]))
    }
}

/// Conductance with twice the default; used as a swap target.
#[derive(Debug, Default)]
pub struct FastConductance;

impl EdgeModel for FastConductance {
    fn type_name(&self) -> &'static str {
        "FastConductance"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::builder().float("g", 0.0).float("gain", 2.0).build().unwrap())
    }

    fn calculate_flows(&self, _dt: f64, ctx: &FlowContext<'_>) -> KernelResult<FlowMap> {
        let g = ctx.state.f64("g")? * ctx.state.f64("gain")?;
        Ok(state_map([("a", g * (ctx.source.f64("a")? - ctx.target.f64("a")?))]))
    }
}

/// Moves internal energy of a `material` record between aliased fields.
#[derive(Debug, Default)]
pub struct HeatLink;

impl EdgeModel for HeatLink {
    fn type_name(&self) -> &'static str {
        "HeatLink"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::builder().float("k", 0.5).build().unwrap())
    }

    fn calculate_flows(&self, _dt: f64, ctx: &FlowContext<'_>) -> KernelResult<FlowMap> {
        let k = ctx.state.f64("k")?;
        let du = ctx.source.f64("material.U")? - ctx.target.f64("material.U")?;
        let rate = StateValue::Record(state_map([("U", k * du)]));
        Ok(FlowMap::from([("material".to_string(), rate)]))
    }
}

/// Opens `valve` once `n1` and `n2` differ.
#[derive(Debug, Default)]
pub struct Opener;

impl ControllerModel for Opener {
    fn type_name(&self) -> &'static str {
        "Opener"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::empty())
    }

    fn required_read(&self) -> &'static [&'static str] {
        &["n1", "n2"]
    }

    fn required_write(&self) -> &'static [&'static str] {
        &["valve"]
    }

    fn update(&mut self, _dt: f64, io: &mut ControllerIo<'_>) -> KernelResult<()> {
        let diff = io.read_f64("n1", "a")? - io.read_f64("n2", "a")?;
        if diff.abs() > 0.0 {
            io.write("valve", state_map([("g", 1.0)]))?;
        }
        Ok(())
    }
}

/// Writes whatever payload it is given, every tick.
#[derive(Debug, Default)]
pub struct Commander {
    pub payload: StateMap,
}

impl ControllerModel for Commander {
    fn type_name(&self) -> &'static str {
        "Commander"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::empty())
    }

    fn required_write(&self) -> &'static [&'static str] {
        &["target"]
    }

    fn update(&mut self, _dt: f64, io: &mut ControllerIo<'_>) -> KernelResult<()> {
        io.write("target", self.payload.clone())
    }
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_node(|| Ok(Tank)).unwrap();
    registry.register_node(|| Ok(HeatedTank)).unwrap();
    registry.register_node(|| Ok(Exchanger)).unwrap();
    registry.register_edge(|| Ok(Conductance)).unwrap();
    registry.register_edge(|| Ok(FastConductance)).unwrap();
    registry.register_edge(|| Ok(HeatLink)).unwrap();
    registry.register_controller(|| Ok(Opener)).unwrap();
    registry
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
