//! Nodes: state holders that integrate the flows of their incident edges.

use std::fmt;
use std::sync::Arc;

use twin_core::{
    ComponentId, FieldKind, FlowMap, KernelError, KernelResult, Schema, State, StateMap, StateValue,
};

use crate::component::{ModelParams, apply_payloads, label, no_params};
use crate::edge::{Edge, resolve_alias};
use crate::signal::{FLOWS_KEY, Payload, SignalRef};

/// Behaviour of a concrete node type.
///
/// The kernel owns identity, wiring and state; a model only declares its
/// schema and reacts to the phases of a tick.
pub trait NodeModel: fmt::Debug + Send {
    /// Registry name, persisted as `class`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Arc<Schema>;

    /// Configuration held outside the state, persisted as `params`.
    fn params(&self) -> ModelParams {
        ModelParams::Null
    }

    /// Restore a configuration written by [`params`](Self::params) on a
    /// default-constructed model.
    fn configure(&mut self, params: &ModelParams) -> KernelResult<()> {
        no_params(self.type_name(), params)
    }

    /// Signal phase. Defaults to writing every payload entry into state.
    fn update_from_signals(
        &mut self,
        _dt: f64,
        state: &mut State,
        payloads: &[&Payload],
    ) -> KernelResult<()> {
        apply_payloads(state, payloads)
    }

    /// Autonomous dynamics after flow integration.
    fn update_from_state(&mut self, _dt: f64, _state: &mut State) -> KernelResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct Node {
    id: ComponentId,
    name: Option<String>,
    state: State,
    model: Box<dyn NodeModel>,
    pub(crate) edges_incoming: Vec<ComponentId>,
    pub(crate) edges_outgoing: Vec<ComponentId>,
    pub(crate) signals_incoming: Vec<SignalRef>,
    pub(crate) signals_outgoing: Vec<SignalRef>,
    flows: FlowMap,
}

impl Node {
    pub(crate) fn new(
        id: ComponentId,
        name: Option<String>,
        model: Box<dyn NodeModel>,
        values: StateMap,
    ) -> KernelResult<Self> {
        let state = State::new(model.schema(), values)
            .map_err(|e| e.within(label(model.type_name(), id, name.as_deref())))?;
        Ok(Self {
            id,
            name,
            state,
            model,
            edges_incoming: Vec::new(),
            edges_outgoing: Vec::new(),
            signals_incoming: Vec::new(),
            signals_outgoing: Vec::new(),
            flows: FlowMap::new(),
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        self.model.type_name()
    }

    pub fn label(&self) -> String {
        label(self.type_name(), self.id, self.name())
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Direct state access for initial conditions and scenario setup.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn model(&self) -> &dyn NodeModel {
        self.model.as_ref()
    }

    /// Edges whose target is this node, in id order.
    pub fn edges_incoming(&self) -> &[ComponentId] {
        &self.edges_incoming
    }

    /// Edges whose source is this node, in id order.
    pub fn edges_outgoing(&self) -> &[ComponentId] {
        &self.edges_outgoing
    }

    /// Controller writes targeting this node.
    pub fn signals_incoming(&self) -> &[SignalRef] {
        &self.signals_incoming
    }

    /// Controller reads of this node.
    pub fn signals_outgoing(&self) -> &[SignalRef] {
        &self.signals_outgoing
    }

    /// Net flow integrated on the last tick, keyed by field path.
    pub fn flows(&self) -> &FlowMap {
        &self.flows
    }

    pub(crate) fn is_referenced(&self) -> bool {
        !(self.edges_incoming.is_empty()
            && self.edges_outgoing.is_empty()
            && self.signals_incoming.is_empty()
            && self.signals_outgoing.is_empty())
    }

    /// State snapshot plus the last net flows, as delivered to controllers.
    pub(crate) fn observe(&self) -> Payload {
        let mut payload = self.state.snapshot();
        payload.insert(FLOWS_KEY.to_string(), StateValue::Record(self.flows.clone()));
        payload
    }

    pub(crate) fn replace_model(&mut self, model: Box<dyn NodeModel>, state: State) {
        self.model = model;
        self.state = state;
    }

    pub(crate) fn update(
        &mut self,
        dt: f64,
        payloads: &[&Payload],
        incoming: &[&Edge],
        outgoing: &[&Edge],
    ) -> KernelResult<()> {
        let label = self.label();
        self.model
            .update_from_signals(dt, &mut self.state, payloads)
            .map_err(|e| e.within(&label))?;
        self.update_from_graph(dt, incoming, outgoing)
            .map_err(|e| e.within(&label))?;
        self.model
            .update_from_state(dt, &mut self.state)
            .map_err(|e| e.within(&label))
    }

    /// Integrate `dt` times the net flow of every incident edge.
    ///
    /// Incoming flows add, outgoing flows subtract. Edge flow keys go through
    /// the edge's alias map for this end. Nothing is written unless every
    /// flow resolves and the result stays finite.
    fn update_from_graph(
        &mut self,
        dt: f64,
        incoming: &[&Edge],
        outgoing: &[&Edge],
    ) -> KernelResult<()> {
        let mut net = FlowMap::new();
        for spec in self.state.schema().fields() {
            if matches!(spec.kind, FieldKind::Float) {
                net.insert(spec.name.clone(), StateValue::Float(0.0));
            }
        }

        let incident = incoming
            .iter()
            .map(|edge| (*edge, 1.0, edge.alias_target()))
            .chain(outgoing.iter().map(|edge| (*edge, -1.0, edge.alias_source())));
        for (edge, sign, aliases) in incident {
            let flows = edge.flows().ok_or_else(|| {
                KernelError::integration(format!(
                    "flows of {} were not calculated before integrating {}",
                    edge.label(),
                    self.label()
                ))
            })?;
            for (key, rate) in flows {
                let field = resolve_alias(aliases, key);
                if !self.state.has(&field) {
                    return Err(KernelError::unknown_field(field.as_ref(), self.label()));
                }
                match net.get_mut(field.as_ref()) {
                    Some(total) => total.accumulate(rate, sign, &field)?,
                    None => {
                        let scaled = rate.scaled(sign, &field)?;
                        net.insert(field.into_owned(), scaled);
                    }
                }
            }
        }

        let mut next = self.state.clone();
        for (field, rate) in &net {
            next.accumulate(field, rate, dt)?;
            if let Some(value) = next.get(field) {
                value.ensure_finite(&format!("{}.{field}", self.label()))?;
            }
        }
        self.state = next;
        self.flows = net;
        Ok(())
    }
}
