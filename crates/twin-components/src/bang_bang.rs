//! Two-position controller with hysteresis.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use twin_core::{KernelError, KernelResult, Schema, StateValue, state_map};
use twin_graph::{ControllerIo, ControllerModel, ModelParams, decode_params};

use crate::conductance::CONDUCTANCE;
use crate::store::INVENTORY;

/// Read connection observed by the single-loop controllers.
pub const MEASURED: &str = "measured";
/// Write connection driven by the single-loop controllers.
pub const ACTUATOR: &str = "actuator";

/// Fields a single-loop controller watches and drives, persisted as its params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LoopFields {
    pub(crate) measured_field: String,
    pub(crate) actuated_field: String,
}

impl LoopFields {
    pub(crate) fn new(measured: impl Into<String>, actuated: impl Into<String>) -> Self {
        Self {
            measured_field: measured.into(),
            actuated_field: actuated.into(),
        }
    }

    pub(crate) fn params(&self) -> ModelParams {
        serde_json::json!(self)
    }

    pub(crate) fn configure(&mut self, params: &ModelParams) -> KernelResult<()> {
        if let Some(fields) = decode_params(params)? {
            *self = fields;
        }
        Ok(())
    }
}

/// Switches its actuator on below `low` and off above `high`.
///
/// Between the two thresholds the last position is held.
#[derive(Debug, Clone)]
pub struct BangBangController {
    fields: LoopFields,
    schema: Arc<Schema>,
}

impl BangBangController {
    /// Watch the inventory of the measured component and drive the
    /// conductance of the actuator.
    pub fn new() -> KernelResult<Self> {
        Self::watching(INVENTORY, CONDUCTANCE)
    }

    /// Watch `measured_field` of the measured component and drive
    /// `actuated_field` of the actuator.
    pub fn watching(
        measured_field: impl Into<String>,
        actuated_field: impl Into<String>,
    ) -> KernelResult<Self> {
        let schema = Schema::builder()
            .float("low", 0.0)
            .float("high", 1.0)
            .float("on_value", 1.0)
            .float("off_value", 0.0)
            .bool("on", false)
            .build()?;
        Ok(Self {
            fields: LoopFields::new(measured_field, actuated_field),
            schema: Arc::new(schema),
        })
    }
}

impl ControllerModel for BangBangController {
    fn type_name(&self) -> &'static str {
        "BangBangController"
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

    fn update(&mut self, _dt: f64, io: &mut ControllerIo<'_>) -> KernelResult<()> {
        let (low, high) = (io.state().f64("low")?, io.state().f64("high")?);
        if low > high {
            return Err(KernelError::InvalidArg {
                what: "low threshold must not exceed high threshold",
            });
        }
        let measured = io.read_f64(MEASURED, &self.fields.measured_field)?;
        let was_on = io.state().bool("on")?;
        let on = if measured < low {
            true
        } else if measured > high {
            false
        } else {
            was_on
        };
        if on != was_on {
            debug!(measured, on, "bang-bang switched");
            io.state_mut().set("on", StateValue::Bool(on))?;
        }

        let output = io.state().f64(if on { "on_value" } else { "off_value" })?;
        io.write(ACTUATOR, state_map([(self.fields.actuated_field.as_str(), output)]))
    }
}
