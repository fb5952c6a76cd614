//! Behaviour shared by every kind of graph component.

use serde::de::DeserializeOwned;
use twin_core::{ComponentId, KernelError, KernelResult, State, StateValue};

use crate::controller::Controller;
use crate::edge::Edge;
use crate::graph::Graph;
use crate::node::Node;
use crate::signal::{ComponentKind, Payload};

/// Default signal phase: write every payload entry into `state`.
///
/// Payloads are applied in order so later entries win. The whole batch is
/// checked first; an unknown or mistyped key leaves `state` untouched.
pub fn apply_payloads(state: &mut State, payloads: &[&Payload]) -> KernelResult<()> {
    let writes = payloads
        .iter()
        .flat_map(|payload| payload.iter())
        .map(|(key, value)| (key.as_str(), value.clone()));
    state.set_many(writes)
}

/// Model configuration that is not state, persisted as `params`.
///
/// `Null` means the model runs with its default configuration.
pub type ModelParams = serde_json::Value;

/// Decode the configuration a model wrote as its params; `None` for `Null`.
pub fn decode_params<T: DeserializeOwned>(params: &ModelParams) -> KernelResult<Option<T>> {
    if params.is_null() {
        return Ok(None);
    }
    Ok(Some(T::deserialize(params)?))
}

/// Default `configure`: a model without configuration only accepts `Null`.
pub(crate) fn no_params(type_name: &str, params: &ModelParams) -> KernelResult<()> {
    if params.is_null() {
        Ok(())
    } else {
        Err(KernelError::configuration(format!(
            "{type_name} takes no params, got {params}"
        )))
    }
}

/// `Type(name)` or `Type(id)` for logs and errors.
pub(crate) fn label(type_name: &str, id: ComponentId, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{type_name}({name})"),
        None => format!("{type_name}({id})"),
    }
}

/// Borrowed view of any component in a graph tree.
#[derive(Debug, Clone, Copy)]
pub enum ComponentRef<'a> {
    Node(&'a Node),
    Edge(&'a Edge),
    Controller(&'a Controller),
    Graph(&'a Graph),
}

impl<'a> ComponentRef<'a> {
    pub fn id(&self) -> ComponentId {
        match self {
            Self::Node(n) => n.id(),
            Self::Edge(e) => e.id(),
            Self::Controller(c) => c.id(),
            Self::Graph(g) => g.id(),
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        match *self {
            Self::Node(n) => n.name(),
            Self::Edge(e) => e.name(),
            Self::Controller(c) => c.name(),
            Self::Graph(g) => g.name(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Node(_) => ComponentKind::Node,
            Self::Edge(_) => ComponentKind::Edge,
            Self::Controller(_) => ComponentKind::Controller,
            Self::Graph(_) => ComponentKind::Graph,
        }
    }

    /// Component state; graphs carry no schema-checked state.
    pub fn state(&self) -> Option<&'a State> {
        match *self {
            Self::Node(n) => Some(n.state()),
            Self::Edge(e) => Some(e.state()),
            Self::Controller(c) => Some(c.state()),
            Self::Graph(_) => None,
        }
    }

    pub fn get(&self, path: &str) -> Option<&'a StateValue> {
        self.state().and_then(|s| s.get(path))
    }

    pub fn label(&self) -> String {
        match self {
            Self::Node(n) => n.label(),
            Self::Edge(e) => e.label(),
            Self::Controller(c) => c.label(),
            Self::Graph(g) => g.label(),
        }
    }

    pub fn as_node(&self) -> Option<&'a Node> {
        match *self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&'a Edge> {
        match *self {
            Self::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_controller(&self) -> Option<&'a Controller> {
        match *self {
            Self::Controller(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_graph(&self) -> Option<&'a Graph> {
        match *self {
            Self::Graph(g) => Some(g),
            _ => None,
        }
    }
}

/// Lookup key for [`Graph::get_component`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKey {
    Id(ComponentId),
    Name(String),
}

impl From<ComponentId> for ComponentKey {
    fn from(id: ComponentId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ComponentKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ComponentKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}
