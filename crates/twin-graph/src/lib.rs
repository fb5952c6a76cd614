//! twin-graph: the component graph and its tick protocol.
//!
//! Provides:
//! - Nodes, edges and controllers whose behaviour is supplied by model traits
//! - Signals carrying controller reads and staged writes
//! - The [`Graph`] tree: factories, lookup, removal, per-tick update and hot-swap
//! - Graph documents and the type registry used to load them
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use twin_core::{FlowMap, KernelResult, Schema, StateMap, state_map};
//! use twin_graph::{EdgeModel, FlowContext, Graph, NodeModel};
//!
//! #[derive(Debug)]
//! struct Tank;
//!
//! impl NodeModel for Tank {
//!     fn type_name(&self) -> &'static str { "Tank" }
//!     fn schema(&self) -> Arc<Schema> {
//!         Arc::new(Schema::builder().float("a", 0.0).build().unwrap())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Pipe;
//!
//! impl EdgeModel for Pipe {
//!     fn type_name(&self) -> &'static str { "Pipe" }
//!     fn schema(&self) -> Arc<Schema> { Arc::new(Schema::empty()) }
//!     fn calculate_flows(&self, _dt: f64, ctx: &FlowContext<'_>) -> KernelResult<FlowMap> {
//!         Ok(state_map([("a", ctx.source.f64("a")? - ctx.target.f64("a")?)]))
//!     }
//! }
//!
//! let mut graph = Graph::new();
//! let hot = graph.add_node(Tank, Some("hot"), state_map([("a", 2.0)])).unwrap();
//! let cold = graph.add_node(Tank, Some("cold"), StateMap::new()).unwrap();
//! graph.add_edge(Pipe, hot, cold, None, StateMap::new()).unwrap();
//!
//! graph.update(0.25, 1).unwrap();
//! assert_eq!(graph.node(cold).unwrap().state().f64("a").unwrap(), 0.5);
//! ```

pub mod component;
pub mod controller;
pub mod document;
pub mod edge;
pub mod graph;
pub mod node;
pub mod registry;
pub mod signal;
mod swap;
mod update;

pub use component::{ComponentKey, ComponentRef, ModelParams, apply_payloads, decode_params};
pub use controller::{Controller, ControllerIo, ControllerModel};
pub use document::{
    ConnectionDocument, ControllerDocument, EdgeDocument, GraphDocument, NodeDocument, TIME_KEY,
};
pub use edge::{AliasMap, Edge, EdgeAliases, EdgeModel, EndpointView, FlowContext};
pub use graph::{GRAPH_CLASS, Graph};
pub use node::{Node, NodeModel};
pub use registry::TypeRegistry;
pub use signal::{
    ComponentKind, ConnectionRole, Endpoint, FLOWS_KEY, Payload, Signal, SignalRef, SignalRole,
};
