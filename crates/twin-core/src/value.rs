//! Dynamic state values.
//!
//! Components expose their state as a closed set of value variants so that
//! signal payloads, edge flows and serialized documents can address fields by
//! name without reflection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::numeric::ensure_finite;
use crate::{KernelError, KernelResult};

/// Name-keyed, sorted map of state values. Also used for nested records.
pub type StateMap = BTreeMap<String, StateValue>;

/// Per-field rates computed by an edge (quantity per second).
pub type FlowMap = BTreeMap<String, StateValue>;

/// A single state value.
///
/// Serialized untagged so documents read as plain JSON. Variant order matters
/// for deserialization: `5` is an `Int`, `5.0` is a `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Array(Vec<f64>),
    Record(StateMap),
}

impl StateValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
        }
    }

    /// Numeric view: floats as-is, ints widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&StateMap> {
        match self {
            Self::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut StateMap> {
        match self {
            Self::Record(v) => Some(v),
            _ => None,
        }
    }

    /// Multiply a rate by `factor`, producing a float-valued copy.
    ///
    /// `field` only feeds error messages.
    pub fn scaled(&self, factor: f64, field: &str) -> KernelResult<StateValue> {
        match self {
            Self::Float(v) => Ok(Self::Float(v * factor)),
            Self::Int(v) => Ok(Self::Float(*v as f64 * factor)),
            Self::Array(v) => Ok(Self::Array(v.iter().map(|x| x * factor).collect())),
            Self::Record(map) => {
                let mut out = StateMap::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.scaled(factor, &join_path(field, key))?);
                }
                Ok(Self::Record(out))
            }
            Self::Bool(_) => Err(KernelError::TypeMismatch {
                field: field.to_string(),
                expected: "numeric rate",
                actual: "bool",
            }),
        }
    }

    /// Add `rate * factor` to this value in place.
    ///
    /// Records accumulate key-wise and every rate key must already exist in the
    /// target record. Arrays must have equal length. Ints and bools are not
    /// integrable.
    pub fn accumulate(&mut self, rate: &StateValue, factor: f64, field: &str) -> KernelResult<()> {
        match (self, rate) {
            (Self::Float(v), rate) => match rate.as_f64() {
                Some(r) => {
                    *v += r * factor;
                    Ok(())
                }
                None => Err(KernelError::TypeMismatch {
                    field: field.to_string(),
                    expected: "float",
                    actual: rate.kind_name(),
                }),
            },
            (Self::Array(v), Self::Array(r)) => {
                if v.len() != r.len() {
                    return Err(KernelError::integration(format!(
                        "rate for '{field}' has length {} but the field has length {}",
                        r.len(),
                        v.len()
                    )));
                }
                for (x, dx) in v.iter_mut().zip(r) {
                    *x += dx * factor;
                }
                Ok(())
            }
            (Self::Record(map), Self::Record(rates)) => {
                for (key, r) in rates {
                    let path = join_path(field, key);
                    let target = map
                        .get_mut(key)
                        .ok_or_else(|| KernelError::unknown_field(path.clone(), field))?;
                    target.accumulate(r, factor, &path)?;
                }
                Ok(())
            }
            (target, rate) => Err(KernelError::TypeMismatch {
                field: field.to_string(),
                expected: target.kind_name(),
                actual: rate.kind_name(),
            }),
        }
    }
}

impl StateValue {
    /// Fail with [`KernelError::NonFinite`] if any contained float is NaN or infinite.
    pub fn ensure_finite(&self, what: &str) -> KernelResult<()> {
        match self {
            Self::Float(v) => ensure_finite(*v, what).map(|_| ()),
            Self::Array(values) => values
                .iter()
                .try_for_each(|v| ensure_finite(*v, what).map(|_| ())),
            Self::Record(map) => map
                .iter()
                .try_for_each(|(key, value)| value.ensure_finite(&join_path(what, key))),
            Self::Bool(_) | Self::Int(_) => Ok(()),
        }
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for StateValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<f64>> for StateValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Array(v)
    }
}

impl From<StateMap> for StateValue {
    fn from(v: StateMap) -> Self {
        Self::Record(v)
    }
}

/// Build a [`StateMap`] from name/value pairs.
///
/// ```
/// use twin_core::{state_map, StateValue};
///
/// let state = state_map([("a", 10.0), ("g", 0.5)]);
/// assert_eq!(state["a"], StateValue::Float(10.0));
/// ```
pub fn state_map<I, K, V>(pairs: I) -> StateMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<StateValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_int_and_float_apart() {
        let map = state_map([
            ("count", StateValue::Int(3)),
            ("level", StateValue::Float(3.0)),
            ("open", StateValue::Bool(true)),
        ]);
        let text = serde_json::to_string(&map).unwrap();
        let back: StateMap = serde_json::from_str(&text).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn accumulate_float_and_record() {
        let mut v = StateValue::Float(10.0);
        v.accumulate(&StateValue::Float(-10.0), 0.1, "a").unwrap();
        assert!((v.as_f64().unwrap() - 9.0).abs() < 1e-12);

        let mut rec = StateValue::Record(state_map([("m", 1.0), ("U", 2.0)]));
        let rate = StateValue::Record(state_map([("U", 10.0)]));
        rec.accumulate(&rate, 0.5, "coolant").unwrap();
        assert_eq!(rec.as_record().unwrap()["U"], StateValue::Float(7.0));
        assert_eq!(rec.as_record().unwrap()["m"], StateValue::Float(1.0));
    }

    #[test]
    fn accumulate_rejects_unknown_record_key() {
        let mut rec = StateValue::Record(state_map([("m", 1.0)]));
        let rate = StateValue::Record(state_map([("V", 1.0)]));
        let err = rec.accumulate(&rate, 1.0, "coolant").unwrap_err();
        assert!(matches!(err, KernelError::UnknownField { ref field, .. } if field == "coolant.V"));
    }

    #[test]
    fn int_fields_are_not_integrable() {
        let mut v = StateValue::Int(1);
        assert!(v.accumulate(&StateValue::Float(1.0), 1.0, "count").is_err());
    }

    #[test]
    fn nested_nan_is_reported_with_path() {
        let rec = StateValue::Record(state_map([("U", f64::NAN)]));
        let err = rec.ensure_finite("Store(2).coolant").unwrap_err();
        assert!(matches!(err, KernelError::NonFinite { ref what, .. } if what == "Store(2).coolant.U"));
        assert!(StateValue::Int(3).ensure_finite("n").is_ok());
    }

    #[test]
    fn scaled_array() {
        let v = StateValue::Array(vec![1.0, -2.0]);
        assert_eq!(v.scaled(-1.0, "x").unwrap(), StateValue::Array(vec![-1.0, 2.0]));
    }
}
