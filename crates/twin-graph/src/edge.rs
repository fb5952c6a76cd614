//! Edges: flow laws between two nodes.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use twin_core::{
    ComponentId, FlowMap, KernelError, KernelResult, Schema, State, StateMap, StateValue,
};

use crate::component::{ModelParams, apply_payloads, label, no_params};
use crate::node::Node;
use crate::signal::{FLOWS_KEY, Payload, SignalRef};

/// Edge-local key -> endpoint field path.
pub type AliasMap = BTreeMap<String, String>;

/// Alias maps for both ends of an edge.
///
/// An edge written against a key `material` can then be attached to a node
/// storing it as `fuel` on one side and `coolant` on the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeAliases {
    pub source: AliasMap,
    pub target: AliasMap,
}

impl EdgeAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.source.insert(key.into(), field.into());
        self
    }

    pub fn target(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.target.insert(key.into(), field.into());
        self
    }
}

/// Translate an edge-local key into a node field path.
///
/// A whole-key alias wins; otherwise the first segment of a dotted key is
/// aliased (`material.U` -> `fuel.U`).
pub(crate) fn resolve_alias<'k>(aliases: &'k AliasMap, key: &'k str) -> Cow<'k, str> {
    if let Some(field) = aliases.get(key) {
        return Cow::Borrowed(field.as_str());
    }
    if let Some((head, rest)) = key.split_once('.') {
        if let Some(field) = aliases.get(head) {
            return Cow::Owned(format!("{field}.{rest}"));
        }
    }
    Cow::Borrowed(key)
}

/// Behaviour of a concrete edge type.
pub trait EdgeModel: fmt::Debug + Send {
    /// Registry name, persisted as `class`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Arc<Schema>;

    /// See [`NodeModel::params`](crate::NodeModel::params).
    fn params(&self) -> ModelParams {
        ModelParams::Null
    }

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

    /// Instantaneous rates (quantity per second) from source to target.
    ///
    /// Keys are edge-local; the integrating nodes translate them through the
    /// alias maps. A positive rate moves quantity from source to target.
    fn calculate_flows(&self, dt: f64, ctx: &FlowContext<'_>) -> KernelResult<FlowMap>;

    fn update_from_state(&mut self, _dt: f64, _state: &mut State) -> KernelResult<()> {
        Ok(())
    }
}

/// Read-only inputs of [`EdgeModel::calculate_flows`].
#[derive(Debug, Clone, Copy)]
pub struct FlowContext<'a> {
    pub state: &'a State,
    pub source: EndpointView<'a>,
    pub target: EndpointView<'a>,
}

/// A node seen through one end's alias map.
#[derive(Debug, Clone, Copy)]
pub struct EndpointView<'a> {
    node: &'a Node,
    aliases: &'a AliasMap,
}

impl<'a> EndpointView<'a> {
    pub(crate) fn new(node: &'a Node, aliases: &'a AliasMap) -> Self {
        Self { node, aliases }
    }

    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn id(&self) -> ComponentId {
        self.node.id()
    }

    /// Field path `key` refers to on this node.
    pub fn resolve<'k>(&self, key: &'k str) -> Cow<'k, str>
    where
        'a: 'k,
    {
        resolve_alias(self.aliases, key)
    }

    pub fn get(&self, key: &str) -> KernelResult<&'a StateValue> {
        let path = self.resolve(key);
        self.node
            .state()
            .get(&path)
            .ok_or_else(|| KernelError::unknown_field(path.as_ref(), self.node.label()))
    }

    pub fn f64(&self, key: &str) -> KernelResult<f64> {
        let path = self.resolve(key);
        self.node.state().f64(&path).map_err(|e| e.within(self.node.label()))
    }
}

#[derive(Debug)]
pub struct Edge {
    id: ComponentId,
    name: Option<String>,
    state: State,
    model: Box<dyn EdgeModel>,
    source: ComponentId,
    target: ComponentId,
    aliases: EdgeAliases,
    pub(crate) signals_incoming: Vec<SignalRef>,
    pub(crate) signals_outgoing: Vec<SignalRef>,
    flows: Option<FlowMap>,
}

impl Edge {
    pub(crate) fn new(
        id: ComponentId,
        name: Option<String>,
        model: Box<dyn EdgeModel>,
        source: ComponentId,
        target: ComponentId,
        aliases: EdgeAliases,
        values: StateMap,
    ) -> KernelResult<Self> {
        let state = State::new(model.schema(), values)
            .map_err(|e| e.within(label(model.type_name(), id, name.as_deref())))?;
        Ok(Self {
            id,
            name,
            state,
            model,
            source,
            target,
            aliases,
            signals_incoming: Vec::new(),
            signals_outgoing: Vec::new(),
            flows: None,
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

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn model(&self) -> &dyn EdgeModel {
        self.model.as_ref()
    }

    pub fn source(&self) -> ComponentId {
        self.source
    }

    pub fn target(&self) -> ComponentId {
        self.target
    }

    pub fn alias_source(&self) -> &AliasMap {
        &self.aliases.source
    }

    pub fn alias_target(&self) -> &AliasMap {
        &self.aliases.target
    }

    pub fn aliases(&self) -> &EdgeAliases {
        &self.aliases
    }

    pub fn signals_incoming(&self) -> &[SignalRef] {
        &self.signals_incoming
    }

    pub fn signals_outgoing(&self) -> &[SignalRef] {
        &self.signals_outgoing
    }

    /// Rates computed on the last tick; `None` until the first update.
    pub fn flows(&self) -> Option<&FlowMap> {
        self.flows.as_ref()
    }

    pub(crate) fn is_referenced(&self) -> bool {
        !(self.signals_incoming.is_empty() && self.signals_outgoing.is_empty())
    }

    pub(crate) fn observe(&self) -> Payload {
        let mut payload = self.state.snapshot();
        if let Some(flows) = &self.flows {
            payload.insert(FLOWS_KEY.to_string(), StateValue::Record(flows.clone()));
        }
        payload
    }

    pub(crate) fn replace_model(&mut self, model: Box<dyn EdgeModel>, state: State) {
        self.model = model;
        self.state = state;
    }

    pub(crate) fn update(
        &mut self,
        dt: f64,
        payloads: &[&Payload],
        source: &Node,
        target: &Node,
    ) -> KernelResult<()> {
        let label = self.label();
        self.model
            .update_from_signals(dt, &mut self.state, payloads)
            .map_err(|e| e.within(&label))?;

        let flows = {
            let ctx = FlowContext {
                state: &self.state,
                source: EndpointView::new(source, &self.aliases.source),
                target: EndpointView::new(target, &self.aliases.target),
            };
            self.model
                .calculate_flows(dt, &ctx)
                .map_err(|e| e.within(&label))?
        };
        self.flows = Some(flows);

        self.model
            .update_from_state(dt, &mut self.state)
            .map_err(|e| e.within(&label))
    }
}
