//! twin-core: foundation types for the digital-twin simulation kernel.
//!
//! Contains:
//! - ids (component ids and the shared, thread-safe id allocator)
//! - value (dynamic state values, state/flow maps)
//! - schema (declarative per-type state field declarations)
//! - state (schema-checked state storage with dotted-path access)
//! - numeric (comparison tolerances and finiteness checks)
//! - error (the kernel error taxonomy)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod schema;
pub mod state;
pub mod value;

pub use error::{KernelError, KernelResult};
pub use ids::{ComponentId, IdAllocator};
pub use numeric::*;
pub use schema::{FieldKind, FieldSpec, RESERVED_FIELDS, Schema, SchemaBuilder};
pub use state::State;
pub use value::{FlowMap, StateMap, StateValue, state_map};
