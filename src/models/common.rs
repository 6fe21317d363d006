use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// The value inSuite treats as "no value" for any field type.
pub const UNSET_SENTINEL: Value = Value::Bool(false);

/// A record field that can be missing, explicitly empty, or set.
///
/// `Absent` keys are left out of the serialized record entirely. `Unset`
/// always goes on the wire as `false`, which the gateway reads as an empty
/// value regardless of the field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Absent,
    Unset,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Set(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Field::Set(value) => value.serialize(serializer),
            Field::Absent | Field::Unset => UNSET_SENTINEL.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Go through Value so every "no value" spelling is recognised first
        let value = Value::deserialize(deserializer)?;
        if is_no_value(&value) {
            return Ok(Field::Unset);
        }
        T::deserialize(value)
            .map(Field::Set)
            .map_err(de::Error::custom)
    }
}

/// `null`, `false` and `""` all mean "no value" for a known field.
pub fn is_no_value(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// A many2one style reference: either a numeric record id or a lookup name
/// the gateway resolves on its side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Id(i64),
    Name(String),
}

impl From<i64> for Reference {
    fn from(id: i64) -> Self {
        Reference::Id(id)
    }
}

impl From<&str> for Reference {
    fn from(name: &str) -> Self {
        Reference::Name(name.to_string())
    }
}

/// Rewrites `null` to the unset sentinel, leaving every other value alone.
///
/// Only nulls are touched: for fields outside the known set the remote type is
/// unknown, so an empty string may be a legitimate value.
pub fn normalize_unset(map: &mut Map<String, Value>) {
    for value in map.values_mut() {
        if value.is_null() {
            *value = UNSET_SENTINEL;
        }
    }
}
