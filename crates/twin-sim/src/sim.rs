//! Simulation runner and result recording.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use twin_core::{ComponentId, KernelError, StateValue};
use twin_graph::{ComponentKey, Graph};

use crate::error::{SimError, SimResult};

/// Component a trace samples, by id or by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceTarget {
    Id(ComponentId),
    Name(String),
}

impl From<&TraceTarget> for ComponentKey {
    fn from(target: &TraceTarget) -> Self {
        match target {
            TraceTarget::Id(id) => ComponentKey::Id(*id),
            TraceTarget::Name(name) => ComponentKey::Name(name.clone()),
        }
    }
}

/// One state field sampled at every recorded step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub component: TraceTarget,
    /// Dotted state path, e.g. `"inventory"` or `"fuel.U"`.
    pub field: String,
}

impl Trace {
    pub fn new(component: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            component: TraceTarget::Name(component.into()),
            field: field.into(),
        }
    }

    pub fn by_id(id: ComponentId, field: impl Into<String>) -> Self {
        Self {
            component: TraceTarget::Id(id),
            field: field.into(),
        }
    }

    /// Key of this trace in a [`SimRecord`] sample.
    pub fn label(&self) -> String {
        match &self.component {
            TraceTarget::Id(id) => format!("{id}.{}", self.field),
            TraceTarget::Name(name) => format!("{name}.{}", self.field),
        }
    }

    fn sample(&self, graph: &Graph) -> SimResult<StateValue> {
        let component = graph.get_component(&self.component)?;
        component
            .get(&self.field)
            .cloned()
            .ok_or_else(|| KernelError::unknown_field(self.field.clone(), component.label()).into())
    }
}

/// Options for simulation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// Number of ticks to run
    pub steps: usize,
    /// Record every N-th step (decimation)
    pub record_every: usize,
    /// Fields sampled into the record
    pub traces: Vec<Trace>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 0.1,
            steps: 100,
            record_every: 1,
            traces: Vec::new(),
        }
    }
}

impl SimOptions {
    /// Parse and validate options from JSON. Missing keys take the defaults.
    pub fn from_json(text: &str) -> SimResult<Self> {
        let opts: Self = serde_json::from_str(text)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> SimResult<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "dt must be positive and finite",
            });
        }
        if self.steps == 0 {
            return Err(SimError::InvalidArg {
                what: "steps must be positive",
            });
        }
        if self.record_every == 0 {
            return Err(SimError::InvalidArg {
                what: "record_every must be positive",
            });
        }
        Ok(())
    }
}

/// Traced samples of a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimRecord {
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// One sample per time point, keyed by [`Trace::label`]
    pub x: Vec<BTreeMap<String, StateValue>>,
}

impl SimRecord {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Numeric history of one trace; `None` if the label is unknown or a
    /// sample is not numeric.
    pub fn series(&self, label: &str) -> Option<Vec<f64>> {
        self.x
            .iter()
            .map(|sample| sample.get(label).and_then(StateValue::as_f64))
            .collect()
    }

    fn push(&mut self, graph: &Graph, traces: &[Trace]) -> SimResult<()> {
        let sample = traces
            .iter()
            .map(|p| Ok((p.label(), p.sample(graph)?)))
            .collect::<SimResult<_>>()?;
        self.t.push(graph.time());
        self.x.push(sample);
        Ok(())
    }
}

/// Progress reported after every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimProgress {
    pub step: usize,
    pub steps: usize,
    pub time: f64,
}

/// Run `opts.steps` ticks of `graph`, sampling the traces.
///
/// The state before the first tick is always recorded, then every
/// `record_every`-th step and finally the last step.
pub fn run_sim(graph: &mut Graph, opts: &SimOptions) -> SimResult<SimRecord> {
    run_sim_with_progress(graph, opts, |_| {})
}

/// [`run_sim`] with a callback after every tick.
pub fn run_sim_with_progress<F>(
    graph: &mut Graph,
    opts: &SimOptions,
    mut on_step: F,
) -> SimResult<SimRecord>
where
    F: FnMut(SimProgress),
{
    opts.validate()?;
    info!(
        graph = %graph.label(),
        dt = opts.dt,
        steps = opts.steps,
        traces = opts.traces.len(),
        "starting run"
    );

    let mut record = SimRecord::default();
    record.push(graph, &opts.traces)?;

    for step in 1..=opts.steps {
        let time = graph.time();
        graph
            .update(opts.dt, 1)
            .map_err(|source| SimError::Tick { time, source })?;
        on_step(SimProgress {
            step,
            steps: opts.steps,
            time: graph.time(),
        });
        if step % opts.record_every == 0 || step == opts.steps {
            record.push(graph, &opts.traces)?;
            debug!(step, time = graph.time(), "recorded sample");
        }
    }

    info!(time = graph.time(), samples = record.len(), "run finished");
    Ok(record)
}
