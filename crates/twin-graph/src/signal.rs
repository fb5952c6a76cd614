//! Signals: the only channel between controllers and the physical graph.

use serde::{Deserialize, Serialize};
use twin_core::{ComponentId, KernelError, KernelResult, StateMap};

/// Named values carried by a signal.
pub type Payload = StateMap;

/// Key under which a read signal carries the source's last computed flows.
pub const FLOWS_KEY: &str = "flows";

/// Kind of a graph component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Node,
    Edge,
    Controller,
    Graph,
}

/// One end of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub id: ComponentId,
    pub kind: ComponentKind,
}

impl Endpoint {
    pub fn new(id: ComponentId, kind: ComponentKind) -> Self {
        Self { id, kind }
    }
}

/// Direction of a signal as seen from its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalRole {
    /// Component -> controller.
    Read,
    /// Controller -> component.
    Write,
}

/// Role of a named controller connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Read,
    Write,
    Both,
}

impl ConnectionRole {
    pub fn includes(self, role: SignalRole) -> bool {
        matches!(
            (self, role),
            (Self::Both, _) | (Self::Read, SignalRole::Read) | (Self::Write, SignalRole::Write)
        )
    }
}

/// Handle to a signal stored in a controller's connection maps.
///
/// Nodes and edges keep these instead of the signal itself; the owning graph
/// resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalRef {
    pub controller: ComponentId,
    pub name: String,
    pub role: SignalRole,
}

/// A channel between a controller and exactly one node or edge.
///
/// Writes are staged: the payload is only applied by the target's signal
/// phase on the next tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    source: Endpoint,
    target: Endpoint,
    payload: Payload,
}

impl Signal {
    /// Create a signal. Exactly one endpoint must be a controller and the other
    /// a node or edge.
    pub fn new(source: Endpoint, target: Endpoint) -> KernelResult<Self> {
        let source_is_controller = source.kind == ComponentKind::Controller;
        let target_is_controller = target.kind == ComponentKind::Controller;
        if source_is_controller == target_is_controller {
            return Err(KernelError::configuration(format!(
                "signal must connect a controller to a node or edge (got {:?} {} -> {:?} {})",
                source.kind, source.id, target.kind, target.id
            )));
        }
        if source.kind == ComponentKind::Graph || target.kind == ComponentKind::Graph {
            return Err(KernelError::configuration(
                "signal endpoints cannot be graphs",
            ));
        }
        Ok(Self {
            source,
            target,
            payload: Payload::new(),
        })
    }

    pub fn source(&self) -> Endpoint {
        self.source
    }

    pub fn target(&self) -> Endpoint {
        self.target
    }

    /// Role from the controller's point of view.
    pub fn role(&self) -> SignalRole {
        if self.source.kind == ComponentKind::Controller {
            SignalRole::Write
        } else {
            SignalRole::Read
        }
    }

    /// The controller end.
    pub fn controller(&self) -> ComponentId {
        match self.role() {
            SignalRole::Write => self.source.id,
            SignalRole::Read => self.target.id,
        }
    }

    /// The node or edge end.
    pub fn peer(&self) -> Endpoint {
        match self.role() {
            SignalRole::Write => self.target,
            SignalRole::Read => self.source,
        }
    }

    /// Current payload: the last capture for read signals, the last staged
    /// write for write signals.
    pub fn read(&self) -> &Payload {
        &self.payload
    }

    /// Stage a payload for the target. Only valid when a controller is the source.
    pub fn write(&mut self, payload: Payload) -> KernelResult<()> {
        if self.role() != SignalRole::Write {
            return Err(KernelError::configuration(format!(
                "signal from {:?} {} is read-only",
                self.source.kind, self.source.id
            )));
        }
        self.payload = payload;
        Ok(())
    }

    pub(crate) fn capture(&mut self, payload: Payload) {
        self.payload = payload;
    }
}
