//! Hot-swap: replace the model of a live component in place.
//!
//! The component keeps its id, name, wiring and cached flows. Only the model
//! and the state shape change, so every edge, signal and lookup that refers
//! to the id keeps working.

use tracing::info;
use twin_core::{ComponentId, KernelError, KernelResult, State, StateMap};

use crate::controller::ControllerModel;
use crate::edge::EdgeModel;
use crate::graph::Graph;
use crate::node::NodeModel;
use crate::signal::SignalRef;

impl Graph {
    /// Replace the model of node `id`, anywhere in this subtree.
    ///
    /// State is rebuilt for the new schema from `overrides`, then shared old
    /// values, then defaults. Fails without changing anything if the new
    /// schema cannot hold the fields the node's edges alias or the payloads
    /// its controllers have staged.
    pub fn swap_node<M: NodeModel + 'static>(
        &mut self,
        id: ComponentId,
        model: M,
        overrides: StateMap,
    ) -> KernelResult<()> {
        self.swap_node_boxed(id, Box::new(model), overrides)
    }

    pub fn swap_node_boxed(
        &mut self,
        id: ComponentId,
        model: Box<dyn NodeModel>,
        overrides: StateMap,
    ) -> KernelResult<()> {
        let node = self.node(id)?;
        let old_label = node.label();
        let state = node
            .state()
            .reshaped(model.schema(), overrides)
            .map_err(|e| e.within(&old_label))?;

        for edge_id in node.edges_incoming() {
            let edge = self.edge(*edge_id)?;
            check_aliases(&state, edge.alias_target().values(), &edge.label())?;
        }
        for edge_id in node.edges_outgoing() {
            let edge = self.edge(*edge_id)?;
            check_aliases(&state, edge.alias_source().values(), &edge.label())?;
        }
        self.check_staged(&state, node.signals_incoming())?;

        let node = self.node_mut(id)?;
        node.replace_model(model, state);
        info!(from = %old_label, to = %node.label(), "swapped node model");
        Ok(())
    }

    /// Replace the model of edge `id`, anywhere in this subtree.
    pub fn swap_edge<M: EdgeModel + 'static>(
        &mut self,
        id: ComponentId,
        model: M,
        overrides: StateMap,
    ) -> KernelResult<()> {
        self.swap_edge_boxed(id, Box::new(model), overrides)
    }

    pub fn swap_edge_boxed(
        &mut self,
        id: ComponentId,
        model: Box<dyn EdgeModel>,
        overrides: StateMap,
    ) -> KernelResult<()> {
        let edge = self.edge(id)?;
        let old_label = edge.label();
        let state = edge
            .state()
            .reshaped(model.schema(), overrides)
            .map_err(|e| e.within(&old_label))?;
        self.check_staged(&state, edge.signals_incoming())?;

        let edge = self.edge_mut(id)?;
        edge.replace_model(model, state);
        info!(from = %old_label, to = %edge.label(), "swapped edge model");
        Ok(())
    }

    /// Controllers cannot be swapped: their connection contract may change.
    pub fn swap_controller<M: ControllerModel + 'static>(
        &mut self,
        id: ComponentId,
        _model: M,
    ) -> KernelResult<()> {
        self.controller(id)?;
        Err(KernelError::Unsupported {
            what: "controller hot-swap",
        })
    }

    /// Sub-graphs cannot be swapped.
    pub fn swap_graph(&mut self, id: ComponentId, _graph: Graph) -> KernelResult<()> {
        self.graph(id)?;
        Err(KernelError::Unsupported {
            what: "graph hot-swap",
        })
    }

    fn check_staged(&self, state: &State, signals: &[SignalRef]) -> KernelResult<()> {
        for signal in signals {
            let controller = self.controller(signal.controller)?;
            let Some(staged) = controller.connections_write().get(&signal.name) else {
                continue;
            };
            if let Some(key) = staged.read().keys().find(|k| !state.has(k)) {
                return Err(KernelError::unknown_field(
                    key.clone(),
                    format!("replacement model (staged by {})", controller.label()),
                ));
            }
        }
        Ok(())
    }
}

fn check_aliases<'a>(
    state: &State,
    fields: impl Iterator<Item = &'a String>,
    edge: &str,
) -> KernelResult<()> {
    for field in fields {
        if !state.has(field) {
            return Err(KernelError::configuration(format!(
                "replacement model drops field '{field}' aliased by {edge}"
            )));
        }
    }
    Ok(())
}
