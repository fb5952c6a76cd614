//! The graph: owner of every component and of the shared id allocator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;
use twin_core::{ComponentId, IdAllocator, KernelError, KernelResult, StateMap};

use crate::component::{ComponentKey, ComponentRef, label};
use crate::controller::{Controller, ControllerModel};
use crate::edge::{Edge, EdgeAliases, EdgeModel};
use crate::node::{Node, NodeModel};
use crate::signal::{ComponentKind, Endpoint, SignalRef, SignalRole};

/// Class name of plain graphs in documents.
pub const GRAPH_CLASS: &str = "Graph";

/// A tree of components.
///
/// Nodes, edges, controllers and sub-graphs are stored by id. Every cross
/// reference (edge endpoints, signal peers) is an id resolved through the
/// tree, and every graph of a tree shares one [`IdAllocator`].
#[derive(Debug)]
pub struct Graph {
    id: ComponentId,
    name: Option<String>,
    class: String,
    ids: Arc<IdAllocator>,
    pub(crate) nodes: BTreeMap<ComponentId, Node>,
    pub(crate) edges: BTreeMap<ComponentId, Edge>,
    pub(crate) controllers: BTreeMap<ComponentId, Controller>,
    pub(crate) subgraphs: BTreeMap<ComponentId, Graph>,
    pub(crate) time: f64,
    data: StateMap,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Unnamed root graph with a fresh allocator.
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(IdAllocator::new()), None)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_allocator(Arc::new(IdAllocator::new()), Some(name.into()))
    }

    /// Graph drawing ids from an existing allocator, so it can later be
    /// attached with [`insert_graph`](Self::insert_graph).
    pub fn with_allocator(ids: Arc<IdAllocator>, name: Option<String>) -> Self {
        let id = ids.next();
        Self::from_parts(id, name, GRAPH_CLASS.to_string(), ids)
    }

    pub(crate) fn from_parts(
        id: ComponentId,
        name: Option<String>,
        class: String,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            id,
            name,
            class,
            ids,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            controllers: BTreeMap::new(),
            subgraphs: BTreeMap::new(),
            time: 0.0,
            data: StateMap::new(),
        }
    }

    /// Tag this graph with an embedder-defined class name (e.g. `"PrimaryLoop"`).
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn label(&self) -> String {
        label(&self.class, self.id, self.name())
    }

    pub fn allocator(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Free-form data persisted with the graph document.
    pub fn data(&self) -> &StateMap {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut StateMap {
        &mut self.data
    }

    pub fn nodes(&self) -> &BTreeMap<ComponentId, Node> {
        &self.nodes
    }

    pub fn edges(&self) -> &BTreeMap<ComponentId, Edge> {
        &self.edges
    }

    pub fn controllers(&self) -> &BTreeMap<ComponentId, Controller> {
        &self.controllers
    }

    pub fn subgraphs(&self) -> &BTreeMap<ComponentId, Graph> {
        &self.subgraphs
    }

    pub(crate) fn advance_time(&mut self, dt: f64) {
        self.time += dt;
        for sub in self.subgraphs.values_mut() {
            sub.advance_time(dt);
        }
    }

    fn prefixed(&self, name: Option<&str>) -> Option<String> {
        match (self.name.as_deref(), name) {
            (Some(graph), Some(name)) => Some(format!("{graph}.{name}")),
            (None, Some(name)) => Some(name.to_string()),
            (_, None) => None,
        }
    }

    // ---------------------------------------------------------------------
    // Tree traversal
    // ---------------------------------------------------------------------

    pub(crate) fn find_graph(&self, pred: &dyn Fn(&Graph) -> bool) -> Option<&Graph> {
        if pred(self) {
            return Some(self);
        }
        self.subgraphs.values().find_map(|g| g.find_graph(pred))
    }

    pub(crate) fn find_graph_mut(&mut self, pred: &dyn Fn(&Graph) -> bool) -> Option<&mut Graph> {
        if pred(self) {
            return Some(self);
        }
        self.subgraphs.values_mut().find_map(|g| g.find_graph_mut(pred))
    }

    fn holds(&self, id: ComponentId) -> bool {
        self.id == id
            || self.nodes.contains_key(&id)
            || self.edges.contains_key(&id)
            || self.controllers.contains_key(&id)
            || self.subgraphs.contains_key(&id)
    }

    /// True when `id` is this graph or any component of its subtree.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.find_graph(&|g| g.holds(id)).is_some()
    }

    fn kind_of(&self, id: ComponentId) -> Option<ComponentKind> {
        self.component_by_id(id)
            .map(|c| c.kind())
            .or_else(|| (self.id == id).then_some(ComponentKind::Graph))
    }

    /// Drop the claim on `id` when inserting its component failed.
    fn released_on_error<T>(&self, id: ComponentId, result: KernelResult<T>) -> KernelResult<T> {
        if result.is_err() {
            self.ids.release(id);
        }
        result
    }

    // ---------------------------------------------------------------------
    // Typed lookup (recursive)
    // ---------------------------------------------------------------------

    pub fn node(&self, id: ComponentId) -> KernelResult<&Node> {
        self.find_graph(&|g| g.nodes.contains_key(&id))
            .and_then(|g| g.nodes.get(&id))
            .ok_or_else(|| self.missing("node", id))
    }

    pub fn node_mut(&mut self, id: ComponentId) -> KernelResult<&mut Node> {
        let missing = self.missing("node", id);
        self.find_graph_mut(&|g| g.nodes.contains_key(&id))
            .and_then(|g| g.nodes.get_mut(&id))
            .ok_or(missing)
    }

    pub fn edge(&self, id: ComponentId) -> KernelResult<&Edge> {
        self.find_graph(&|g| g.edges.contains_key(&id))
            .and_then(|g| g.edges.get(&id))
            .ok_or_else(|| self.missing("edge", id))
    }

    pub fn edge_mut(&mut self, id: ComponentId) -> KernelResult<&mut Edge> {
        let missing = self.missing("edge", id);
        self.find_graph_mut(&|g| g.edges.contains_key(&id))
            .and_then(|g| g.edges.get_mut(&id))
            .ok_or(missing)
    }

    pub fn controller(&self, id: ComponentId) -> KernelResult<&Controller> {
        self.find_graph(&|g| g.controllers.contains_key(&id))
            .and_then(|g| g.controllers.get(&id))
            .ok_or_else(|| self.missing("controller", id))
    }

    pub fn controller_mut(&mut self, id: ComponentId) -> KernelResult<&mut Controller> {
        let missing = self.missing("controller", id);
        self.find_graph_mut(&|g| g.controllers.contains_key(&id))
            .and_then(|g| g.controllers.get_mut(&id))
            .ok_or(missing)
    }

    /// This graph or one of its descendants.
    pub fn graph(&self, id: ComponentId) -> KernelResult<&Graph> {
        self.find_graph(&|g| g.id == id)
            .ok_or_else(|| self.missing("graph", id))
    }

    pub fn graph_mut(&mut self, id: ComponentId) -> KernelResult<&mut Graph> {
        let missing = self.missing("graph", id);
        self.find_graph_mut(&|g| g.id == id).ok_or(missing)
    }

    fn missing(&self, kind: &str, id: ComponentId) -> KernelError {
        KernelError::not_found(format!("{kind} {id} in {}", self.label()))
    }

    // ---------------------------------------------------------------------
    // Generic lookup
    // ---------------------------------------------------------------------

    fn component_by_id(&self, id: ComponentId) -> Option<ComponentRef<'_>> {
        // Ids without a claim on the shared allocator are nowhere in the tree.
        if !self.ids.is_claimed(id) {
            return None;
        }
        self.locate(id)
    }

    fn locate(&self, id: ComponentId) -> Option<ComponentRef<'_>> {
        if let Some(node) = self.nodes.get(&id) {
            return Some(ComponentRef::Node(node));
        }
        if let Some(edge) = self.edges.get(&id) {
            return Some(ComponentRef::Edge(edge));
        }
        if let Some(controller) = self.controllers.get(&id) {
            return Some(ComponentRef::Controller(controller));
        }
        if let Some(sub) = self.subgraphs.get(&id) {
            return Some(ComponentRef::Graph(sub));
        }
        self.subgraphs.values().find_map(|g| g.locate(id))
    }

    /// Look a component up by id or by name anywhere below this graph.
    ///
    /// Names are not unique; a name lookup returns the match with the lowest id.
    pub fn get_component(&self, key: impl Into<ComponentKey>) -> KernelResult<ComponentRef<'_>> {
        match key.into() {
            ComponentKey::Id(id) => self
                .component_by_id(id)
                .ok_or_else(|| self.missing("component", id)),
            ComponentKey::Name(name) => {
                self.find_by_name(&name).into_iter().next().ok_or_else(|| {
                    KernelError::not_found(format!("component '{name}' in {}", self.label()))
                })
            }
        }
    }

    /// Every component named `name`, in id order.
    pub fn find_by_name(&self, name: &str) -> Vec<ComponentRef<'_>> {
        let mut found = Vec::new();
        self.collect(&mut |c| {
            if c.name() == Some(name) {
                found.push(c);
            }
        });
        found.sort_by_key(|c| c.id());
        found
    }

    fn collect<'a>(&'a self, visit: &mut dyn FnMut(ComponentRef<'a>)) {
        self.nodes.values().for_each(|n| visit(ComponentRef::Node(n)));
        self.edges.values().for_each(|e| visit(ComponentRef::Edge(e)));
        self.controllers
            .values()
            .for_each(|c| visit(ComponentRef::Controller(c)));
        for sub in self.subgraphs.values() {
            visit(ComponentRef::Graph(sub));
            sub.collect(visit);
        }
    }

    /// Every component below this graph (sub-graphs included) by id.
    pub fn get_all_components(&self) -> KernelResult<BTreeMap<ComponentId, ComponentRef<'_>>> {
        let mut all = BTreeMap::new();
        let mut duplicate = None;
        self.collect(&mut |c| {
            if c.id() == self.id || all.insert(c.id(), c).is_some() {
                duplicate.get_or_insert(c.id());
            }
        });
        match duplicate {
            Some(id) => Err(KernelError::DuplicateId { id }),
            None => Ok(all),
        }
    }

    pub fn get_all_nodes(&self) -> KernelResult<BTreeMap<ComponentId, &Node>> {
        Ok(self
            .get_all_components()?
            .into_iter()
            .filter_map(|(id, c)| c.as_node().map(|n| (id, n)))
            .collect())
    }

    pub fn get_all_edges(&self) -> KernelResult<BTreeMap<ComponentId, &Edge>> {
        Ok(self
            .get_all_components()?
            .into_iter()
            .filter_map(|(id, c)| c.as_edge().map(|e| (id, e)))
            .collect())
    }

    pub fn get_all_controllers(&self) -> KernelResult<BTreeMap<ComponentId, &Controller>> {
        Ok(self
            .get_all_components()?
            .into_iter()
            .filter_map(|(id, c)| c.as_controller().map(|k| (id, k)))
            .collect())
    }

    // ---------------------------------------------------------------------
    // Factories
    // ---------------------------------------------------------------------

    /// Create a node in this graph and return its id.
    ///
    /// `name` is prefixed with this graph's name. Missing state keys take the
    /// schema defaults.
    pub fn add_node<M: NodeModel + 'static>(
        &mut self,
        model: M,
        name: Option<&str>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        let id = self.ids.next();
        let name = self.prefixed(name);
        let result = self.insert_node(id, Box::new(model), name, state);
        self.released_on_error(id, result)
    }

    /// Create a node with an explicit id. The name is stored as given.
    ///
    /// The id must be free in the whole tree, not only below this graph.
    pub fn add_node_with_id(
        &mut self,
        id: ComponentId,
        model: Box<dyn NodeModel>,
        name: Option<String>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        self.ids.claim(id)?;
        let result = self.insert_node(id, model, name, state);
        self.released_on_error(id, result)
    }

    fn insert_node(
        &mut self,
        id: ComponentId,
        model: Box<dyn NodeModel>,
        name: Option<String>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        let node = Node::new(id, name, model, state)?;
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Create an edge from `source` to `target`. Both must be nodes of this
    /// graph's subtree.
    pub fn add_edge<M: EdgeModel + 'static>(
        &mut self,
        model: M,
        source: ComponentId,
        target: ComponentId,
        name: Option<&str>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        self.add_edge_aliased(model, source, target, EdgeAliases::default(), name, state)
    }

    /// Like [`add_edge`](Self::add_edge) with alias maps for either end.
    pub fn add_edge_aliased<M: EdgeModel + 'static>(
        &mut self,
        model: M,
        source: ComponentId,
        target: ComponentId,
        aliases: EdgeAliases,
        name: Option<&str>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        let id = self.ids.next();
        let name = self.prefixed(name);
        let result = self.insert_edge(id, Box::new(model), source, target, aliases, name, state);
        self.released_on_error(id, result)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_edge_with_id(
        &mut self,
        id: ComponentId,
        model: Box<dyn EdgeModel>,
        source: ComponentId,
        target: ComponentId,
        aliases: EdgeAliases,
        name: Option<String>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        self.ids.claim(id)?;
        let result = self.insert_edge(id, model, source, target, aliases, name, state);
        self.released_on_error(id, result)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_edge(
        &mut self,
        id: ComponentId,
        model: Box<dyn EdgeModel>,
        source: ComponentId,
        target: ComponentId,
        aliases: EdgeAliases,
        name: Option<String>,
        state: StateMap,
    ) -> KernelResult<ComponentId> {
        for (end, node_id, map) in [
            ("source", source, &aliases.source),
            ("target", target, &aliases.target),
        ] {
            let node = self.node(node_id).map_err(|_| {
                KernelError::configuration(format!(
                    "edge {end} {node_id} is not a node of {}",
                    self.label()
                ))
            })?;
            if let Some((key, field)) = map.iter().find(|(_, field)| !node.state().has(field)) {
                return Err(KernelError::configuration(format!(
                    "alias '{key}' -> '{field}' does not resolve on {}",
                    node.label()
                )));
            }
        }

        let edge = Edge::new(id, name, model, source, target, aliases, state)?;
        self.edges.insert(id, edge);
        insert_sorted(&mut self.node_mut(source)?.edges_outgoing, id);
        insert_sorted(&mut self.node_mut(target)?.edges_incoming, id);
        Ok(id)
    }

    /// Create a controller wired to nodes and edges of this subtree.
    ///
    /// Every name of the controller's contract must be connected.
    pub fn add_controller<M, I, K>(
        &mut self,
        model: M,
        name: Option<&str>,
        state: StateMap,
        connections: I,
    ) -> KernelResult<ComponentId>
    where
        M: ControllerModel + 'static,
        I: IntoIterator<Item = (K, ComponentId)>,
        K: Into<String>,
    {
        let id = self.ids.next();
        let name = self.prefixed(name);
        let connections = connections.into_iter().map(|(k, c)| (k.into(), c)).collect();
        let result = self.insert_controller(id, Box::new(model), name, state, connections);
        self.released_on_error(id, result)
    }

    pub fn add_controller_with_id(
        &mut self,
        id: ComponentId,
        model: Box<dyn ControllerModel>,
        name: Option<String>,
        state: StateMap,
        connections: Vec<(String, ComponentId)>,
    ) -> KernelResult<ComponentId> {
        self.ids.claim(id)?;
        let result = self.insert_controller(id, model, name, state, connections);
        self.released_on_error(id, result)
    }

    fn insert_controller(
        &mut self,
        id: ComponentId,
        model: Box<dyn ControllerModel>,
        name: Option<String>,
        state: StateMap,
        connections: Vec<(String, ComponentId)>,
    ) -> KernelResult<ComponentId> {
        let mut controller = Controller::new(id, name, model, state)?;
        let mut registrations = Vec::new();
        for (conn, peer) in &connections {
            let endpoint = self.endpoint(*peer)?;
            for signal in controller.attach(conn, endpoint)? {
                registrations.push((*peer, signal));
            }
        }
        let missing = controller.missing_connections();
        if !missing.is_empty() {
            return Err(KernelError::configuration(format!(
                "{} is missing connection(s) {missing:?}",
                controller.label()
            )));
        }

        self.controllers.insert(id, controller);
        for (peer, signal) in registrations {
            self.register_signal(peer, signal)?;
        }
        Ok(id)
    }

    /// Attach further connections to an existing controller.
    ///
    /// Either every connection is attached or none is.
    pub fn add_connections<I, K>(&mut self, controller: ComponentId, connections: I) -> KernelResult<()>
    where
        I: IntoIterator<Item = (K, ComponentId)>,
        K: Into<String>,
    {
        let endpoints = connections
            .into_iter()
            .map(|(name, peer)| Ok((name.into(), self.endpoint(peer)?)))
            .collect::<KernelResult<Vec<(String, Endpoint)>>>()?;

        let ctrl = self.controller_mut(controller)?;
        let mut attached: Vec<(String, ComponentId, Vec<SignalRef>)> = Vec::new();
        for (name, endpoint) in endpoints {
            match ctrl.attach(&name, endpoint) {
                Ok(signals) => attached.push((name, endpoint.id, signals)),
                Err(err) => {
                    for (name, _, _) in &attached {
                        ctrl.detach(name);
                    }
                    return Err(err);
                }
            }
        }
        for (_, peer, signals) in attached {
            for signal in signals {
                self.register_signal(peer, signal)?;
            }
        }
        Ok(())
    }

    fn endpoint(&self, id: ComponentId) -> KernelResult<Endpoint> {
        let kind = self.kind_of(id).ok_or_else(|| {
            KernelError::configuration(format!(
                "signal endpoint {id} is not a component of {}",
                self.label()
            ))
        })?;
        Ok(Endpoint::new(id, kind))
    }

    fn signal_lists(
        &mut self,
        peer: ComponentId,
    ) -> Option<(&mut Vec<SignalRef>, &mut Vec<SignalRef>)> {
        let g = self.find_graph_mut(&|g| g.holds(peer))?;
        match (g.nodes.get_mut(&peer), g.edges.get_mut(&peer)) {
            (Some(n), _) => Some((&mut n.signals_incoming, &mut n.signals_outgoing)),
            (None, Some(e)) => Some((&mut e.signals_incoming, &mut e.signals_outgoing)),
            (None, None) => None,
        }
    }

    fn register_signal(&mut self, peer: ComponentId, signal: SignalRef) -> KernelResult<()> {
        let (incoming, outgoing) = self
            .signal_lists(peer)
            .ok_or_else(|| KernelError::not_found(format!("signal peer {peer}")))?;
        match signal.role {
            SignalRole::Write => insert_sorted(incoming, signal),
            SignalRole::Read => insert_sorted(outgoing, signal),
        }
        Ok(())
    }

    fn unregister_signal(&mut self, peer: ComponentId, signal: &SignalRef) {
        if let Some((incoming, outgoing)) = self.signal_lists(peer) {
            incoming.retain(|s| s != signal);
            outgoing.retain(|s| s != signal);
        }
    }

    /// Create an empty sub-graph sharing this graph's allocator.
    pub fn add_graph(&mut self, name: Option<&str>) -> KernelResult<ComponentId> {
        let id = self.ids.next();
        let name = self.prefixed(name);
        let mut sub = Graph::from_parts(id, name, GRAPH_CLASS.to_string(), Arc::clone(&self.ids));
        sub.time = self.time;
        self.subgraphs.insert(id, sub);
        Ok(id)
    }

    /// Attach a graph built separately from this tree's allocator.
    ///
    /// Its ids were claimed on the shared allocator while it was built.
    pub fn insert_graph(&mut self, graph: Graph) -> KernelResult<ComponentId> {
        if !Arc::ptr_eq(&self.ids, &graph.ids) {
            return Err(KernelError::configuration(format!(
                "{} does not share the id allocator of {}",
                graph.label(),
                self.label()
            )));
        }
        let incoming: Vec<ComponentId> = graph.get_all_components()?.into_keys().collect();
        if let Some(id) = incoming.into_iter().chain([graph.id]).find(|id| self.contains(*id)) {
            return Err(KernelError::DuplicateId { id });
        }
        let id = graph.id;
        self.subgraphs.insert(id, graph);
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    /// Remove a node that no edge or signal refers to.
    pub fn remove_node(&mut self, id: ComponentId) -> KernelResult<Node> {
        let node = self.node(id)?;
        if node.is_referenced() {
            return Err(KernelError::configuration(format!(
                "{} still has edges or signals attached",
                node.label()
            )));
        }
        let missing = self.missing("node", id);
        let node = self
            .find_graph_mut(&|g| g.nodes.contains_key(&id))
            .and_then(|g| g.nodes.remove(&id))
            .ok_or(missing)?;
        self.ids.release(id);
        info!(component = %node.label(), "removed node");
        Ok(node)
    }

    /// Remove an edge that no signal refers to and detach it from its nodes.
    pub fn remove_edge(&mut self, id: ComponentId) -> KernelResult<Edge> {
        let edge = self.edge(id)?;
        if edge.is_referenced() {
            return Err(KernelError::configuration(format!(
                "{} still has signals attached",
                edge.label()
            )));
        }
        let missing = self.missing("edge", id);
        let edge = self
            .find_graph_mut(&|g| g.edges.contains_key(&id))
            .and_then(|g| g.edges.remove(&id))
            .ok_or(missing)?;
        if let Ok(source) = self.node_mut(edge.source()) {
            source.edges_outgoing.retain(|e| *e != id);
        }
        if let Ok(target) = self.node_mut(edge.target()) {
            target.edges_incoming.retain(|e| *e != id);
        }
        self.ids.release(id);
        info!(component = %edge.label(), "removed edge");
        Ok(edge)
    }

    /// Remove a controller together with all of its signals.
    pub fn remove_controller(&mut self, id: ComponentId) -> KernelResult<Controller> {
        let missing = self.missing("controller", id);
        let controller = self
            .find_graph_mut(&|g| g.controllers.contains_key(&id))
            .and_then(|g| g.controllers.remove(&id))
            .ok_or(missing)?;
        for (peer, signal) in controller.signal_refs() {
            self.unregister_signal(peer, &signal);
        }
        self.ids.release(id);
        info!(component = %controller.label(), "removed controller");
        Ok(controller)
    }

    /// Remove a sub-graph no outside edge or controller refers to.
    ///
    /// The detached graph keeps its id claims so it can be inserted again.
    pub fn remove_graph(&mut self, id: ComponentId) -> KernelResult<Graph> {
        if id == self.id {
            return Err(KernelError::InvalidArg {
                what: "a graph cannot remove itself",
            });
        }
        let sub = self.graph(id)?;
        let inner: BTreeSet<ComponentId> = sub
            .get_all_components()?
            .into_keys()
            .chain([id])
            .collect();

        for (cid, component) in self.get_all_components()? {
            if inner.contains(&cid) {
                continue;
            }
            let crosses = match component {
                ComponentRef::Edge(e) => inner.contains(&e.source()) || inner.contains(&e.target()),
                ComponentRef::Controller(c) => {
                    c.signal_refs().iter().any(|(peer, _)| inner.contains(peer))
                }
                _ => false,
            };
            if crosses {
                return Err(KernelError::configuration(format!(
                    "{} refers into sub-graph {id}",
                    component.label()
                )));
            }
        }

        let missing = self.missing("graph", id);
        let graph = self
            .find_graph_mut(&|g| g.subgraphs.contains_key(&id))
            .and_then(|g| g.subgraphs.remove(&id))
            .ok_or(missing)?;
        info!(component = %graph.label(), "removed graph");
        Ok(graph)
    }
}

/// Insert into an id-ordered list, so incident order never depends on the
/// order components were built in.
fn insert_sorted<T: Ord>(list: &mut Vec<T>, item: T) {
    if let Err(at) = list.binary_search(&item) {
        list.insert(at, item);
    }
}
