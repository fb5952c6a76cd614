//! The per-tick update protocol.
//!
//! One tick runs three passes over the whole tree in id order:
//!
//! 1. every edge applies its pending writes and recomputes its flows,
//! 2. every node applies its pending writes and integrates those flows,
//! 3. every controller captures its read signals and stages new writes.
//!
//! A write staged in pass 3 of tick N is applied in pass 1 or 2 of tick N+1.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};
use twin_core::{ComponentId, KernelError, KernelResult};

use crate::controller::Controller;
use crate::edge::Edge;
use crate::graph::Graph;
use crate::node::Node;
use crate::signal::{Payload, SignalRef};

/// Mutable borrows of every component of a tree, keyed by id.
struct Flattened<'a> {
    nodes: BTreeMap<ComponentId, &'a mut Node>,
    edges: BTreeMap<ComponentId, &'a mut Edge>,
    controllers: BTreeMap<ComponentId, &'a mut Controller>,
}

impl<'a> Flattened<'a> {
    fn new(graph: &'a mut Graph) -> KernelResult<Self> {
        let mut flat = Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            controllers: BTreeMap::new(),
        };
        let mut seen = BTreeSet::new();
        flat.split(graph, &mut seen)?;
        Ok(flat)
    }

    fn split(&mut self, graph: &'a mut Graph, seen: &mut BTreeSet<ComponentId>) -> KernelResult<()> {
        claim(seen, graph.id())?;
        let Graph {
            nodes,
            edges,
            controllers,
            subgraphs,
            ..
        } = graph;
        for (id, node) in nodes.iter_mut() {
            claim(seen, *id)?;
            self.nodes.insert(*id, node);
        }
        for (id, edge) in edges.iter_mut() {
            claim(seen, *id)?;
            self.edges.insert(*id, edge);
        }
        for (id, controller) in controllers.iter_mut() {
            claim(seen, *id)?;
            self.controllers.insert(*id, controller);
        }
        for sub in subgraphs.values_mut() {
            self.split(sub, seen)?;
        }
        Ok(())
    }
}

fn claim(seen: &mut BTreeSet<ComponentId>, id: ComponentId) -> KernelResult<()> {
    if seen.insert(id) {
        Ok(())
    } else {
        Err(KernelError::DuplicateId { id })
    }
}

/// Staged payloads addressed to a component, in reference order.
fn pending<'c>(
    controllers: &'c BTreeMap<ComponentId, &mut Controller>,
    signals: &[SignalRef],
) -> KernelResult<Vec<&'c Payload>> {
    signals
        .iter()
        .map(|signal| {
            controllers
                .get(&signal.controller)
                .and_then(|c| c.connections_write().get(&signal.name))
                .map(|s| s.read())
                .ok_or_else(|| {
                    KernelError::not_found(format!(
                        "signal '{}' of controller {}",
                        signal.name, signal.controller
                    ))
                })
        })
        .collect()
}

impl Graph {
    /// Advance the whole tree by `steps` ticks of `dt` seconds.
    ///
    /// Stops at the first error; the tick that failed may have updated some
    /// components already.
    pub fn update(&mut self, dt: f64, steps: usize) -> KernelResult<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(KernelError::InvalidArg {
                what: "dt must be positive and finite",
            });
        }
        for _ in 0..steps {
            self.tick(dt)?;
        }
        Ok(())
    }

    fn tick(&mut self, dt: f64) -> KernelResult<()> {
        let time = self.time;
        let label = self.label();
        {
            let Flattened {
                mut nodes,
                mut edges,
                mut controllers,
            } = Flattened::new(self)?;
            debug!(
                graph = %label,
                time,
                dt,
                nodes = nodes.len(),
                edges = edges.len(),
                controllers = controllers.len(),
                "tick"
            );

            trace!("edges: signals, flows, state");
            for edge in edges.values_mut() {
                let payloads = pending(&controllers, edge.signals_incoming())?;
                let source = nodes.get(&edge.source()).ok_or_else(|| {
                    KernelError::not_found(format!("source node of {}", edge.label()))
                })?;
                let target = nodes.get(&edge.target()).ok_or_else(|| {
                    KernelError::not_found(format!("target node of {}", edge.label()))
                })?;
                edge.update(dt, &payloads, source, target)?;
            }

            trace!("nodes: signals, integration, state");
            for node in nodes.values_mut() {
                let payloads = pending(&controllers, node.signals_incoming())?;
                let incoming = incident(&edges, node.edges_incoming())?;
                let outgoing = incident(&edges, node.edges_outgoing())?;
                node.update(dt, &payloads, &incoming, &outgoing)?;
            }

            trace!("controllers: capture, control law");
            for controller in controllers.values_mut() {
                let mut captures = BTreeMap::new();
                for (name, signal) in controller.connections_read() {
                    let peer = signal.peer().id;
                    let observed = match (nodes.get(&peer), edges.get(&peer)) {
                        (Some(node), _) => node.observe(),
                        (None, Some(edge)) => edge.observe(),
                        (None, None) => {
                            return Err(KernelError::not_found(format!(
                                "read peer {peer} of {}",
                                controller.label()
                            )));
                        }
                    };
                    captures.insert(name.clone(), observed);
                }
                controller.update(dt, captures)?;
            }
        }
        self.advance_time(dt);
        Ok(())
    }
}

fn incident<'e>(
    edges: &'e BTreeMap<ComponentId, &mut Edge>,
    ids: &[ComponentId],
) -> KernelResult<Vec<&'e Edge>> {
    ids.iter()
        .map(|id| {
            edges
                .get(id)
                .map(|edge| &**edge)
                .ok_or_else(|| KernelError::not_found(format!("edge {id}")))
        })
        .collect()
}
