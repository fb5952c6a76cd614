//! Schema-checked state storage with dotted-path access.

use std::sync::Arc;

use crate::schema::Schema;
use crate::value::{StateMap, StateValue};
use crate::{KernelError, KernelResult};

/// The state fields of one component.
///
/// The key set is fixed at construction and always equals the schema's
/// declared field set.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    schema: Arc<Schema>,
    values: StateMap,
}

impl State {
    /// Build state from explicit values, filling declared defaults.
    ///
    /// Fails on missing or unexpected keys and on kind mismatches.
    pub fn new(schema: Arc<Schema>, values: StateMap) -> KernelResult<Self> {
        let values = schema.instantiate(values)?;
        Ok(Self { schema, values })
    }

    /// State made only of declared defaults.
    pub fn with_defaults(schema: Arc<Schema>) -> KernelResult<Self> {
        Self::new(schema, StateMap::new())
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn values(&self) -> &StateMap {
        &self.values
    }

    /// Sorted copy of every declared field.
    pub fn snapshot(&self) -> StateMap {
        self.values.clone()
    }

    /// True when `path` names a declared field.
    pub fn has(&self, path: &str) -> bool {
        self.schema.resolve(path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&StateValue> {
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_record()?.get(segment)?;
        }
        Some(current)
    }

    /// Numeric field value; ints are widened.
    pub fn f64(&self, path: &str) -> KernelResult<f64> {
        let value = self.require(path)?;
        value.as_f64().ok_or_else(|| KernelError::TypeMismatch {
            field: path.to_string(),
            expected: "float",
            actual: value.kind_name(),
        })
    }

    pub fn i64(&self, path: &str) -> KernelResult<i64> {
        let value = self.require(path)?;
        value.as_i64().ok_or_else(|| KernelError::TypeMismatch {
            field: path.to_string(),
            expected: "int",
            actual: value.kind_name(),
        })
    }

    pub fn bool(&self, path: &str) -> KernelResult<bool> {
        let value = self.require(path)?;
        value.as_bool().ok_or_else(|| KernelError::TypeMismatch {
            field: path.to_string(),
            expected: "bool",
            actual: value.kind_name(),
        })
    }

    fn require(&self, path: &str) -> KernelResult<&StateValue> {
        self.get(path)
            .ok_or_else(|| KernelError::unknown_field(path, String::new()))
    }

    /// Check that `value` could be written to `path` without writing it.
    ///
    /// Returns the value in its stored form.
    pub fn check(&self, path: &str, value: StateValue) -> KernelResult<StateValue> {
        let spec = self
            .schema
            .resolve(path)
            .ok_or_else(|| KernelError::unknown_field(path, String::new()))?;
        spec.kind.check(path, value)
    }

    pub fn set(&mut self, path: &str, value: StateValue) -> KernelResult<()> {
        let value = self.check(path, value)?;
        let slot = self
            .get_mut(path)
            .ok_or_else(|| KernelError::unknown_field(path, String::new()))?;
        *slot = value;
        Ok(())
    }

    /// Apply several writes atomically: either all succeed or state is untouched.
    pub fn set_many<'a, I>(&mut self, writes: I) -> KernelResult<()>
    where
        I: IntoIterator<Item = (&'a str, StateValue)>,
    {
        let checked = writes
            .into_iter()
            .map(|(path, value)| Ok((path, self.check(path, value)?)))
            .collect::<KernelResult<Vec<_>>>()?;
        for (path, value) in checked {
            if let Some(slot) = self.get_mut(path) {
                *slot = value;
            }
        }
        Ok(())
    }

    /// Add `rate * factor` to the field at `path`. The field keeps its kind.
    pub fn accumulate(&mut self, path: &str, rate: &StateValue, factor: f64) -> KernelResult<()> {
        let slot = self
            .get_mut(path)
            .ok_or_else(|| KernelError::unknown_field(path, String::new()))?;
        slot.accumulate(rate, factor, path)
    }

    pub(crate) fn get_mut(&mut self, path: &str) -> Option<&mut StateValue> {
        let mut segments = path.split('.');
        let mut current = self.values.get_mut(segments.next()?)?;
        for segment in segments {
            current = current.as_record_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    /// Replace every top-level value at once. Used after integrating a full
    /// set of flows so partial updates are never observable.
    pub fn replace_values(&mut self, values: StateMap) -> KernelResult<()> {
        self.values = self.schema.instantiate(values)?;
        Ok(())
    }

    /// Re-shape this state for a different schema.
    ///
    /// Each new field takes its value from `overrides`, then from this state
    /// when both schemas declare it with a compatible kind, then from the new
    /// schema's default.
    pub fn reshaped(&self, schema: Arc<Schema>, mut overrides: StateMap) -> KernelResult<State> {
        if let Some(unknown) = overrides.keys().find(|k| schema.field(k).is_none()) {
            return Err(KernelError::unknown_field(unknown.clone(), String::new()));
        }
        let mut values = StateMap::new();
        for spec in schema.fields() {
            if let Some(value) = overrides.remove(&spec.name) {
                values.insert(spec.name.clone(), value);
            } else if let Some(old) = self.values.get(&spec.name) {
                values.insert(spec.name.clone(), spec.kind.check(&spec.name, old.clone())?);
            }
        }
        State::new(schema, values)
    }
}
