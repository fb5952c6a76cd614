//! Passive inventory node.

use std::sync::Arc;

use twin_core::{KernelResult, Schema};
use twin_graph::{ModelParams, NodeModel, decode_params};

/// Field a [`Store`] holds when no other layout is given.
pub const INVENTORY: &str = "inventory";

/// Node holding one or more float inventories that only change through the
/// flows of its edges and through controller writes.
///
/// The layout is persisted as the node's params, so a custom store reloads
/// with the same fields.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Arc<Schema>,
}

impl Store {
    /// Store holding a single [`INVENTORY`] field.
    pub fn new() -> KernelResult<Self> {
        Self::with_fields([INVENTORY])
    }

    /// Store with the given float fields, each defaulting to zero.
    pub fn with_fields<I, S>(fields: I) -> KernelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = fields
            .into_iter()
            .fold(Schema::builder(), |b, field| b.float(field, 0.0))
            .build()?;
        Ok(Self::with_schema(schema))
    }

    /// Store with an explicit schema, e.g. one holding nested records.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }
}

impl NodeModel for Store {
    fn type_name(&self) -> &'static str {
        "Store"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn params(&self) -> ModelParams {
        serde_json::json!(self.schema.as_ref())
    }

    fn configure(&mut self, params: &ModelParams) -> KernelResult<()> {
        if let Some(schema) = decode_params::<Schema>(params)? {
            self.schema = Arc::new(schema);
        }
        Ok(())
    }
}
