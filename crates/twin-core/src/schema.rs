//! Declarative state schemas.
//!
//! Every component type declares its state fields once through
//! [`SchemaBuilder`]. The schema is the single source of truth for which names
//! a signal may set, which flow keys a node may integrate and which values are
//! serialized.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::{StateMap, StateValue};
use crate::{KernelError, KernelResult};

/// Bookkeeping names that can never be declared as state fields.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "name",
    "flows",
    "signals_incoming",
    "signals_outgoing",
    "edges_incoming",
    "edges_outgoing",
    "node_source",
    "node_target",
    "connections_read",
    "connections_write",
];

/// Declared kind of a state field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Float,
    Int,
    Bool,
    Array,
    /// Nested state object with its own schema.
    Record(Box<Schema>),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Array => "array",
            Self::Record(_) => "record",
        }
    }

    /// Validate `value` against this kind, returning the stored form.
    ///
    /// Ints are widened into float fields; records are filled with nested
    /// defaults and checked key by key.
    pub fn check(&self, field: &str, value: StateValue) -> KernelResult<StateValue> {
        match (self, value) {
            (Self::Float, StateValue::Float(v)) => Ok(StateValue::Float(v)),
            (Self::Float, StateValue::Int(v)) => Ok(StateValue::Float(v as f64)),
            (Self::Int, StateValue::Int(v)) => Ok(StateValue::Int(v)),
            (Self::Bool, StateValue::Bool(v)) => Ok(StateValue::Bool(v)),
            (Self::Array, StateValue::Array(v)) => Ok(StateValue::Array(v)),
            (Self::Record(schema), StateValue::Record(map)) => {
                Ok(StateValue::Record(schema.instantiate_at(field, map)?))
            }
            (kind, value) => Err(KernelError::TypeMismatch {
                field: field.to_string(),
                expected: kind.name(),
                actual: value.kind_name(),
            }),
        }
    }
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<StateValue>,
}

/// The full set of state fields of a component type, sorted by name.
///
/// Serializes as the list of its field declarations; deserializing runs the
/// same checks as [`SchemaBuilder::build`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
}

impl TryFrom<Vec<FieldSpec>> for Schema {
    type Error = KernelError;

    fn try_from(specs: Vec<FieldSpec>) -> KernelResult<Self> {
        let mut builder = Schema::builder();
        for spec in specs {
            let default = spec
                .default
                .map(|d| spec.kind.check(&spec.name, d))
                .transpose()?;
            builder = builder.declare(spec.name, spec.kind, default);
        }
        builder.build()
    }
}

impl From<Schema> for Vec<FieldSpec> {
    fn from(schema: Schema) -> Self {
        schema.fields.into_values().collect()
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Schema with no state fields.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Declared field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Resolve a dotted path (`"coolant.U"`) to its field declaration.
    pub fn resolve(&self, path: &str) -> Option<&FieldSpec> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let spec = self.fields.get(head)?;
        match (rest, &spec.kind) {
            (None, _) => Some(spec),
            (Some(rest), FieldKind::Record(nested)) => nested.resolve(rest),
            (Some(_), _) => None,
        }
    }

    /// Default values of every field that declares one.
    pub fn defaults(&self) -> StateMap {
        self.fields
            .values()
            .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
            .collect()
    }

    /// Fill defaults into `values` and check that the key set matches exactly.
    pub fn instantiate(&self, values: StateMap) -> KernelResult<StateMap> {
        self.instantiate_at("", values)
    }

    fn instantiate_at(&self, prefix: &str, mut values: StateMap) -> KernelResult<StateMap> {
        for spec in self.fields.values() {
            if let Some(default) = &spec.default {
                values
                    .entry(spec.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        let missing: Vec<&str> = self
            .fields
            .keys()
            .filter(|k| !values.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(KernelError::configuration(format!(
                "state field(s) {missing:?} missing{}",
                at(prefix)
            )));
        }
        let extra: Vec<&str> = values
            .keys()
            .filter(|k| !self.fields.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            return Err(KernelError::configuration(format!(
                "unknown state field(s) {extra:?}{}",
                at(prefix)
            )));
        }

        let mut out = StateMap::new();
        for (name, value) in values {
            let path = crate::value::join_path(prefix, &name);
            let spec = &self.fields[&name];
            out.insert(name, spec.kind.check(&path, value)?);
        }
        Ok(out)
    }
}

fn at(prefix: &str) -> String {
    if prefix.is_empty() {
        String::new()
    } else {
        format!(" in '{prefix}'")
    }
}

/// Incremental schema declaration.
///
/// ```
/// use twin_core::{FieldKind, Schema};
///
/// let material = Schema::builder()
///     .float("m", 0.0)
///     .float("U", 0.0)
///     .build()
///     .unwrap();
/// let schema = Schema::builder()
///     .float("level", 1.0)
///     .required("count", FieldKind::Int)
///     .record("coolant", material)
///     .build()
///     .unwrap();
///
/// assert!(schema.resolve("coolant.U").is_some());
/// assert_eq!(schema.field_names().collect::<Vec<_>>(), ["coolant", "count", "level"]);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: BTreeMap<String, FieldSpec>,
    inherited: BTreeSet<String>,
    duplicates: Vec<String>,
}

impl SchemaBuilder {
    /// Union every field of `parent` into this schema.
    ///
    /// Fields declared afterwards with the same name override the inherited one.
    pub fn extend(mut self, parent: &Schema) -> Self {
        for spec in parent.fields() {
            self.inherited.insert(spec.name.clone());
            self.fields.insert(spec.name.clone(), spec.clone());
        }
        self
    }

    /// Declare a field without default; construction must supply it.
    pub fn required(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.declare(name.into(), kind, None)
    }

    pub fn float(self, name: impl Into<String>, default: f64) -> Self {
        self.declare(name.into(), FieldKind::Float, Some(StateValue::Float(default)))
    }

    pub fn int(self, name: impl Into<String>, default: i64) -> Self {
        self.declare(name.into(), FieldKind::Int, Some(StateValue::Int(default)))
    }

    pub fn bool(self, name: impl Into<String>, default: bool) -> Self {
        self.declare(name.into(), FieldKind::Bool, Some(StateValue::Bool(default)))
    }

    pub fn array(self, name: impl Into<String>, default: Vec<f64>) -> Self {
        self.declare(name.into(), FieldKind::Array, Some(StateValue::Array(default)))
    }

    /// Declare a nested state object. Its default exists when every nested
    /// field has one.
    pub fn record(self, name: impl Into<String>, schema: Schema) -> Self {
        let default = (schema.fields().all(|f| f.default.is_some()))
            .then(|| StateValue::Record(schema.defaults()));
        self.declare(name.into(), FieldKind::Record(Box::new(schema)), default)
    }

    fn declare(mut self, name: String, kind: FieldKind, default: Option<StateValue>) -> Self {
        let overrides_parent = self.inherited.remove(&name);
        if self.fields.contains_key(&name) && !overrides_parent {
            self.duplicates.push(name.clone());
        }
        self.fields.insert(
            name.clone(),
            FieldSpec {
                name,
                kind,
                default,
            },
        );
        self
    }

    pub fn build(self) -> KernelResult<Schema> {
        if !self.duplicates.is_empty() {
            return Err(KernelError::configuration(format!(
                "state field(s) {:?} declared more than once",
                self.duplicates
            )));
        }
        let reserved: Vec<&str> = self
            .fields
            .keys()
            .map(String::as_str)
            .filter(|k| RESERVED_FIELDS.contains(k))
            .collect();
        if !reserved.is_empty() {
            return Err(KernelError::configuration(format!(
                "reserved name(s) {reserved:?} cannot be state fields"
            )));
        }
        let dotted: Vec<&str> = self
            .fields
            .keys()
            .map(String::as_str)
            .filter(|k| k.contains('.') || k.is_empty())
            .collect();
        if !dotted.is_empty() {
            return Err(KernelError::configuration(format!(
                "invalid field name(s) {dotted:?}"
            )));
        }
        Ok(Schema {
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::state_map;

    fn material() -> Schema {
        Schema::builder()
            .float("m", 0.0)
            .float("U", 0.0)
            .build()
            .unwrap()
    }

    #[test]
    fn ancestry_union_with_override() {
        let base = Schema::builder().float("a", 1.0).float("g", 0.0).build().unwrap();
        let child = Schema::builder()
            .extend(&base)
            .float("g", 2.0)
            .int("count", 0)
            .build()
            .unwrap();

        assert_eq!(child.field_names().collect::<Vec<_>>(), ["a", "count", "g"]);
        assert_eq!(child.field("g").unwrap().default, Some(StateValue::Float(2.0)));
    }

    #[test]
    fn duplicate_declaration_fails() {
        let err = Schema::builder().float("a", 0.0).float("a", 1.0).build();
        assert!(matches!(err, Err(KernelError::Configuration { .. })));
    }

    #[test]
    fn reserved_names_rejected() {
        let err = Schema::builder().float("flows", 0.0).build();
        assert!(matches!(err, Err(KernelError::Configuration { .. })));
    }

    #[test]
    fn instantiate_fills_defaults_and_widens_ints() {
        let schema = Schema::builder()
            .required("a", FieldKind::Float)
            .float("g", 0.5)
            .build()
            .unwrap();
        let values = schema.instantiate(state_map([("a", 3)])).unwrap();
        assert_eq!(values["a"], StateValue::Float(3.0));
        assert_eq!(values["g"], StateValue::Float(0.5));
    }

    #[test]
    fn instantiate_rejects_missing_and_extra() {
        let schema = Schema::builder()
            .required("a", FieldKind::Float)
            .build()
            .unwrap();
        assert!(schema.instantiate(StateMap::new()).is_err());
        assert!(schema.instantiate(state_map([("a", 1.0), ("b", 2.0)])).is_err());
    }

    #[test]
    fn nested_record_defaults() {
        let schema = Schema::builder().record("coolant", material()).build().unwrap();
        let values = schema.instantiate(StateMap::new()).unwrap();
        let coolant = values["coolant"].as_record().unwrap();
        assert_eq!(coolant["m"], StateValue::Float(0.0));
        assert!(schema.resolve("coolant.m").is_some());
        assert!(schema.resolve("coolant.V").is_none());
        assert!(schema.resolve("coolant.m.x").is_none());
    }

    #[test]
    fn serialized_schema_reloads_with_checks() {
        let schema = Schema::builder()
            .required("count", FieldKind::Int)
            .float("level", 1.0)
            .record("coolant", material())
            .build()
            .unwrap();
        let text = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);

        let reserved = r#"[{"name": "flows", "kind": "float"}]"#;
        assert!(serde_json::from_str::<Schema>(reserved).is_err());
        let mistyped = r#"[{"name": "a", "kind": "bool", "default": 1.5}]"#;
        assert!(serde_json::from_str::<Schema>(mistyped).is_err());
    }
}
