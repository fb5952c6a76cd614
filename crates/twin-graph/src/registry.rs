//! Name -> factory table used to rebuild models from documents.

use std::collections::BTreeMap;
use std::fmt;

use twin_core::{KernelError, KernelResult};

use crate::controller::ControllerModel;
use crate::edge::EdgeModel;
use crate::node::NodeModel;

type Factory<T> = Box<dyn Fn() -> KernelResult<Box<T>> + Send + Sync>;

/// Factories for every model type a document may name.
///
/// Registered names must equal the model's `type_name()` so a saved graph can
/// be loaded again. Factories build the default configuration; loading then
/// applies the persisted params through `configure`.
#[derive(Default)]
pub struct TypeRegistry {
    nodes: BTreeMap<String, Factory<dyn NodeModel>>,
    edges: BTreeMap<String, Factory<dyn EdgeModel>>,
    controllers: BTreeMap<String, Factory<dyn ControllerModel>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges.keys().collect::<Vec<_>>())
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node factory under the `type_name()` of the model it builds.
    ///
    /// The factory runs once here, so a model that cannot be built fails
    /// registration instead of a later load.
    pub fn register_node<F, M>(&mut self, factory: F) -> KernelResult<&mut Self>
    where
        F: Fn() -> KernelResult<M> + Send + Sync + 'static,
        M: NodeModel + 'static,
    {
        let name = factory()?.type_name();
        insert(
            &mut self.nodes,
            name,
            Box::new(move || Ok(Box::new(factory()?) as Box<dyn NodeModel>)),
        )?;
        Ok(self)
    }

    pub fn register_edge<F, M>(&mut self, factory: F) -> KernelResult<&mut Self>
    where
        F: Fn() -> KernelResult<M> + Send + Sync + 'static,
        M: EdgeModel + 'static,
    {
        let name = factory()?.type_name();
        insert(
            &mut self.edges,
            name,
            Box::new(move || Ok(Box::new(factory()?) as Box<dyn EdgeModel>)),
        )?;
        Ok(self)
    }

    pub fn register_controller<F, M>(&mut self, factory: F) -> KernelResult<&mut Self>
    where
        F: Fn() -> KernelResult<M> + Send + Sync + 'static,
        M: ControllerModel + 'static,
    {
        let name = factory()?.type_name();
        insert(
            &mut self.controllers,
            name,
            Box::new(move || Ok(Box::new(factory()?) as Box<dyn ControllerModel>)),
        )?;
        Ok(self)
    }

    pub fn create_node(&self, name: &str) -> KernelResult<Box<dyn NodeModel>> {
        create(&self.nodes, name)
    }

    pub fn create_edge(&self, name: &str) -> KernelResult<Box<dyn EdgeModel>> {
        create(&self.edges, name)
    }

    pub fn create_controller(&self, name: &str) -> KernelResult<Box<dyn ControllerModel>> {
        create(&self.controllers, name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
            || self.edges.contains_key(name)
            || self.controllers.contains_key(name)
    }
}

fn insert<T: ?Sized>(
    table: &mut BTreeMap<String, Factory<T>>,
    name: &str,
    factory: Factory<T>,
) -> KernelResult<()> {
    if table.contains_key(name) {
        return Err(KernelError::configuration(format!(
            "type '{name}' is already registered"
        )));
    }
    table.insert(name.to_string(), factory);
    Ok(())
}

fn create<T: ?Sized>(table: &BTreeMap<String, Factory<T>>, name: &str) -> KernelResult<Box<T>> {
    let factory = table.get(name).ok_or_else(|| KernelError::UnknownType {
        name: name.to_string(),
    })?;
    factory()
}
