//! Graph documents: the persisted form of a graph tree.
//!
//! A document stores every component's type name, id, name, model params and
//! state, the edge endpoints and aliases, controller connections with their staged
//! writes, the graph time and the allocator counter. Loading resolves type
//! names through a [`TypeRegistry`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use twin_core::{ComponentId, IdAllocator, KernelError, KernelResult, StateMap, StateValue};

use crate::component::ModelParams;
use crate::edge::{AliasMap, EdgeAliases};
use crate::graph::Graph;
use crate::registry::TypeRegistry;
use crate::signal::{ConnectionRole, Payload};

/// Key of the graph time inside `data`.
pub const TIME_KEY: &str = "time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub class: String,
    pub id: ComponentId,
    #[serde(default)]
    pub name: Option<String>,
    pub id_counter: u64,
    #[serde(default)]
    pub data: StateMap,
    #[serde(default)]
    pub subgraphs: BTreeMap<ComponentId, GraphDocument>,
    #[serde(default)]
    pub nodes: BTreeMap<ComponentId, NodeDocument>,
    #[serde(default)]
    pub edges: BTreeMap<ComponentId, EdgeDocument>,
    #[serde(default)]
    pub controllers: BTreeMap<ComponentId, ControllerDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub class: String,
    pub id: ComponentId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "ModelParams::is_null")]
    pub params: ModelParams,
    #[serde(default)]
    pub state: StateMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub class: String,
    pub id: ComponentId,
    #[serde(default)]
    pub name: Option<String>,
    pub node_source_id: ComponentId,
    pub node_target_id: ComponentId,
    #[serde(default)]
    pub alias_source: AliasMap,
    #[serde(default)]
    pub alias_target: AliasMap,
    #[serde(default, skip_serializing_if = "ModelParams::is_null")]
    pub params: ModelParams,
    #[serde(default)]
    pub state: StateMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerDocument {
    pub class: String,
    pub id: ComponentId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionDocument>,
    #[serde(default, skip_serializing_if = "ModelParams::is_null")]
    pub params: ModelParams,
    #[serde(default)]
    pub state: StateMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDocument {
    #[serde(rename = "type")]
    pub role: ConnectionRole,
    pub component_id: ComponentId,
    /// Write staged when the document was taken.
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub payload: Payload,
}

impl GraphDocument {
    pub fn to_json(&self) -> KernelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> KernelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> KernelResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> KernelResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

impl Graph {
    /// Snapshot this graph and its subtree.
    pub fn to_document(&self) -> GraphDocument {
        let mut data = self.data().clone();
        data.insert(TIME_KEY.to_string(), StateValue::Float(self.time()));

        let nodes = self
            .nodes()
            .iter()
            .map(|(id, node)| {
                let doc = NodeDocument {
                    class: node.type_name().to_string(),
                    id: *id,
                    name: node.name().map(str::to_string),
                    params: node.model().params(),
                    state: node.state().snapshot(),
                };
                (*id, doc)
            })
            .collect();

        let edges = self
            .edges()
            .iter()
            .map(|(id, edge)| {
                let doc = EdgeDocument {
                    class: edge.type_name().to_string(),
                    id: *id,
                    name: edge.name().map(str::to_string),
                    node_source_id: edge.source(),
                    node_target_id: edge.target(),
                    alias_source: edge.alias_source().clone(),
                    alias_target: edge.alias_target().clone(),
                    params: edge.model().params(),
                    state: edge.state().snapshot(),
                };
                (*id, doc)
            })
            .collect();

        let controllers = self
            .controllers()
            .iter()
            .map(|(id, controller)| {
                let connections = controller
                    .connections()
                    .into_iter()
                    .map(|(name, (role, peer))| {
                        let payload = controller
                            .connections_write()
                            .get(name)
                            .map(|s| s.read().clone())
                            .unwrap_or_default();
                        let doc = ConnectionDocument {
                            role,
                            component_id: peer,
                            payload,
                        };
                        (name.to_string(), doc)
                    })
                    .collect();
                let doc = ControllerDocument {
                    class: controller.type_name().to_string(),
                    id: *id,
                    name: controller.name().map(str::to_string),
                    connections,
                    params: controller.model().params(),
                    state: controller.state().snapshot(),
                };
                (*id, doc)
            })
            .collect();

        GraphDocument {
            class: self.class().to_string(),
            id: self.id(),
            name: self.name().map(str::to_string),
            id_counter: self.allocator().current(),
            data,
            subgraphs: self
                .subgraphs()
                .iter()
                .map(|(id, sub)| (*id, sub.to_document()))
                .collect(),
            nodes,
            edges,
            controllers,
        }
    }

    /// Rebuild a graph tree from a document.
    ///
    /// The allocator resumes past both the persisted counter and every
    /// persisted id.
    pub fn from_document(doc: &GraphDocument, registry: &TypeRegistry) -> KernelResult<Graph> {
        let ids = Arc::new(IdAllocator::starting_at(doc.id_counter));
        let graph = Self::build(doc, registry, &ids)?;
        let total = graph.get_all_components()?.len();
        if ids.current() > doc.id_counter {
            warn!(
                persisted = doc.id_counter,
                resumed = ids.current(),
                "document id counter lags behind its ids"
            );
        }
        info!(graph = %graph.label(), components = total, "loaded graph document");
        Ok(graph)
    }

    fn build(doc: &GraphDocument, registry: &TypeRegistry, ids: &Arc<IdAllocator>) -> KernelResult<Graph> {
        ids.claim(doc.id)?;
        let mut graph = Graph::from_parts(doc.id, doc.name.clone(), doc.class.clone(), Arc::clone(ids));
        let mut data = doc.data.clone();
        if let Some(time) = data.remove(TIME_KEY) {
            graph.time = time.as_f64().ok_or_else(|| KernelError::TypeMismatch {
                field: TIME_KEY.to_string(),
                expected: "float",
                actual: time.kind_name(),
            })?;
        }
        *graph.data_mut() = data;

        for sub in doc.subgraphs.values() {
            let sub = Self::build(sub, registry, ids)?;
            graph.insert_graph(sub)?;
        }
        for node in doc.nodes.values() {
            let mut model = registry.create_node(&node.class)?;
            model.configure(&node.params)?;
            graph.add_node_with_id(node.id, model, node.name.clone(), node.state.clone())?;
        }
        for edge in doc.edges.values() {
            let mut model = registry.create_edge(&edge.class)?;
            model.configure(&edge.params)?;
            let aliases = EdgeAliases {
                source: edge.alias_source.clone(),
                target: edge.alias_target.clone(),
            };
            graph.add_edge_with_id(
                edge.id,
                model,
                edge.node_source_id,
                edge.node_target_id,
                aliases,
                edge.name.clone(),
                edge.state.clone(),
            )?;
        }
        for controller in doc.controllers.values() {
            let mut model = registry.create_controller(&controller.class)?;
            model.configure(&controller.params)?;
            let connections = controller
                .connections
                .iter()
                .map(|(name, conn)| (name.clone(), conn.component_id))
                .collect();
            let id = graph.add_controller_with_id(
                controller.id,
                model,
                controller.name.clone(),
                controller.state.clone(),
                connections,
            )?;

            let loaded = graph.controller_mut(id)?;
            for (name, conn) in &controller.connections {
                if loaded.contract_role(name) != Some(conn.role) {
                    return Err(KernelError::configuration(format!(
                        "connection '{name}' of {} is stored as {:?} but declared as {:?}",
                        loaded.label(),
                        conn.role,
                        loaded.contract_role(name)
                    )));
                }
                if !conn.payload.is_empty() {
                    loaded.stage(name, conn.payload.clone())?;
                }
            }
        }
        Ok(graph)
    }
}
