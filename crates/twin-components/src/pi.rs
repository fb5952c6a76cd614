//! Proportional-integral controller.
//!
//! Gains, limits, setpoint and the integral accumulator all live in the
//! controller state, so a saved graph resumes with the same integral and an
//! operator can retune it through signals.

use std::sync::Arc;

use twin_core::{KernelError, KernelResult, Schema, StateValue, state_map};
use twin_graph::{ControllerIo, ControllerModel, ModelParams};

use crate::bang_bang::{ACTUATOR, LoopFields, MEASURED};
use crate::conductance::CONDUCTANCE;
use crate::store::INVENTORY;

/// Sampled PI law with output clamping and anti-windup.
///
/// `u = kp * e + (kp / ti) * ∫e dt` with `e = setpoint - measured`. While the
/// output is saturated the integral is frozen. `integral_limit <= 0` leaves
/// the integral unclamped.
#[derive(Debug, Clone)]
pub struct PiController {
    fields: LoopFields,
    schema: Arc<Schema>,
}

impl PiController {
    /// Hold the inventory of the measured component by driving the
    /// conductance of the actuator.
    pub fn new() -> KernelResult<Self> {
        Self::watching(INVENTORY, CONDUCTANCE)
    }

    pub fn watching(
        measured_field: impl Into<String>,
        actuated_field: impl Into<String>,
    ) -> KernelResult<Self> {
        let schema = Schema::builder()
            .float("kp", 1.0)
            .float("ti", 1.0)
            .float("out_min", 0.0)
            .float("out_max", 1.0)
            .float("integral_limit", 0.0)
            .float("setpoint", 0.0)
            .float("integral", 0.0)
            .build()?;
        Ok(Self {
            fields: LoopFields::new(measured_field, actuated_field),
            schema: Arc::new(schema),
        })
    }
}

/// Tuning read from state each tick.
struct Tuning {
    kp: f64,
    ti: f64,
    out_min: f64,
    out_max: f64,
    integral_limit: Option<f64>,
}

impl Tuning {
    fn from_io(io: &ControllerIo<'_>) -> KernelResult<Self> {
        let state = io.state();
        let tuning = Self {
            kp: state.f64("kp")?,
            ti: state.f64("ti")?,
            out_min: state.f64("out_min")?,
            out_max: state.f64("out_max")?,
            integral_limit: Some(state.f64("integral_limit")?).filter(|l| *l > 0.0),
        };
        if tuning.ti <= 0.0 {
            return Err(KernelError::InvalidArg {
                what: "ti must be positive",
            });
        }
        if tuning.out_min >= tuning.out_max {
            return Err(KernelError::InvalidArg {
                what: "out_min must be less than out_max",
            });
        }
        Ok(tuning)
    }

    /// One sample: returns the new integral and the clamped output.
    fn step(&self, integral: f64, error: f64, dt: f64) -> (f64, f64) {
        let next = integral + error * dt;
        let next = match self.integral_limit {
            Some(limit) => next.clamp(-limit, limit),
            None => next,
        };
        let raw = self.kp * error + self.kp / self.ti * next;
        let output = raw.clamp(self.out_min, self.out_max);
        let integral = if output == raw { next } else { integral };
        (integral, output)
    }
}

impl ControllerModel for PiController {
    fn type_name(&self) -> &'static str {
        "PiController"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn params(&self) -> ModelParams {
        self.fields.params()
    }

    fn configure(&mut self, params: &ModelParams) -> KernelResult<()> {
        self.fields.configure(params)
    }

    fn required_read(&self) -> &'static [&'static str] {
        &[MEASURED]
    }

    fn required_write(&self) -> &'static [&'static str] {
        &[ACTUATOR]
    }

    fn update(&mut self, dt: f64, io: &mut ControllerIo<'_>) -> KernelResult<()> {
        let tuning = Tuning::from_io(io)?;
        let measured = io.read_f64(MEASURED, &self.fields.measured_field)?;
        let error = io.state().f64("setpoint")? - measured;
        let integral = io.state().f64("integral")?;

        let (integral, output) = tuning.step(integral, error, dt);
        io.state_mut().set("integral", StateValue::Float(integral))?;
        io.write(ACTUATOR, state_map([(self.fields.actuated_field.as_str(), output)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::StateMap;
    use twin_graph::Graph;

    use crate::conductance::LinearConductance;
    use crate::store::Store;

    fn tuning(kp: f64, ti: f64) -> Tuning {
        Tuning {
            kp,
            ti,
            out_min: -10.0,
            out_max: 10.0,
            integral_limit: None,
        }
    }

    #[test]
    fn proportional_and_integral_terms() {
        let (integral, output) = tuning(2.0, 1.0).step(0.0, 1.0, 0.5);
        assert_eq!(integral, 0.5);
        assert_eq!(output, 2.0 * 1.0 + 2.0 * 0.5);
    }

    #[test]
    fn saturation_freezes_integral() {
        let pi = Tuning {
            out_max: 1.0,
            ..tuning(5.0, 1.0)
        };
        let (integral, output) = pi.step(0.2, 1.0, 1.0);
        assert_eq!(output, 1.0);
        assert_eq!(integral, 0.2);
    }

    #[test]
    fn integral_limit_clamps() {
        let pi = Tuning {
            integral_limit: Some(0.1),
            ..tuning(1.0, 1.0)
        };
        let (integral, _) = pi.step(0.0, 1.0, 1.0);
        assert_eq!(integral, 0.1);
    }

    #[test]
    fn integral_persists_in_state() {
        let mut g = Graph::new();
        let tank = g.add_node(Store::new().unwrap(), None, StateMap::new()).unwrap();
        let feed = g.add_node(Store::new().unwrap(), None, StateMap::new()).unwrap();
        let valve = g
            .add_edge(LinearConductance::new().unwrap(), feed, tank, None, StateMap::new())
            .unwrap();
        let c = g
            .add_controller(
                PiController::new().unwrap(),
                None,
                state_map([("setpoint", 1.0), ("kp", 0.1), ("ti", 1.0)]),
                [(MEASURED, tank), (ACTUATOR, valve)],
            )
            .unwrap();

        g.update(0.5, 1).unwrap();
        let ctrl = g.controller(c).unwrap();
        assert_eq!(ctrl.state().f64("integral").unwrap(), 0.5);
        let staged = ctrl.connections_write()[ACTUATOR].read();
        assert_eq!(staged[CONDUCTANCE].as_f64(), Some(0.1 + 0.1 * 0.5));
    }

    #[test]
    fn invalid_tuning_is_rejected() {
        let mut g = Graph::new();
        let tank = g.add_node(Store::new().unwrap(), None, StateMap::new()).unwrap();
        let feed = g.add_node(Store::new().unwrap(), None, StateMap::new()).unwrap();
        let valve = g
            .add_edge(LinearConductance::new().unwrap(), feed, tank, None, StateMap::new())
            .unwrap();
        g.add_controller(
            PiController::new().unwrap(),
            None,
            state_map([("ti", 0.0)]),
            [(MEASURED, tank), (ACTUATOR, valve)],
        )
        .unwrap();
        let err = g.update(0.1, 1).unwrap_err();
        assert!(matches!(err, KernelError::InvalidArg { what } if what.contains("ti")));
    }
}
