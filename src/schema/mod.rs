//! Space catalog types for spacegate.
//!
//! A catalog entry arrives as a positional tuple. `SPACE_TUPLE_FIELDS` is the
//! one index-to-field mapping used to decode it into a `SpaceDescriptor` and to
//! encode a descriptor back into a tuple.

pub mod introspector;

pub use introspector::{decode_catalog, SchemaIntrospector};

use crate::error::{GatewayError, Result};
use rmpv::Value;
use serde::{Deserialize, Serialize};

/// Field names of a catalog tuple, by position.
pub const SPACE_TUPLE_FIELDS: [&str; 7] = [
    "id",
    "owner",
    "name",
    "engine",
    "field_count",
    "flags",
    "format",
];

/// Catalog tuples shorter than this are incomplete.
pub const MIN_SPACE_TUPLE_LEN: usize = SPACE_TUPLE_FIELDS.len();

/// Position of the space name inside a catalog tuple.
pub const NAME_POSITION: usize = 2;

/// Names with this prefix belong to the engine's own bookkeeping.
pub const SYSTEM_SPACE_PREFIX: &str = "_";

/// One space as described by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceDescriptor {
    pub id: u32,
    pub owner: u32,
    pub name: String,
    pub engine: String,
    pub field_count: u32,
    pub flags: Value,
    pub format: Vec<FieldFormat>,
}

/// One entry of a space's format list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFormat {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_nullable: Option<bool>,
}

/// Type reported for a format entry that names none.
pub const UNTYPED_FIELD: &str = "any";

impl FieldFormat {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type.into()),
            is_nullable: Some(is_nullable),
        }
    }
}

impl SpaceDescriptor {
    /// Decodes a positional catalog tuple.
    ///
    /// The tuple is keyed through `SPACE_TUPLE_FIELDS`, re-encoded as
    /// MessagePack and deserialized, so the nested format list decodes through
    /// serde rather than by hand. Fields past the schema are ignored.
    pub fn from_tuple(tuple: &[Value]) -> Result<Self> {
        if tuple.len() < MIN_SPACE_TUPLE_LEN {
            return Err(GatewayError::format(format!(
                "space tuple has {} fields, expected at least {MIN_SPACE_TUPLE_LEN}",
                tuple.len()
            )));
        }

        let keyed = Value::Map(
            SPACE_TUPLE_FIELDS
                .iter()
                .zip(tuple)
                .map(|(field, value)| (Value::from(*field), value.clone()))
                .collect(),
        );

        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &keyed)
            .map_err(|e| GatewayError::format(format!("cannot re-encode space tuple: {e}")))?;

        rmp_serde::from_slice(&buf)
            .map_err(|e| GatewayError::format(format!("cannot decode space tuple: {e}")))
    }

    /// Encodes the descriptor back into a positional tuple.
    pub fn to_tuple(&self) -> Result<Vec<Value>> {
        let buf = rmp_serde::to_vec_named(self)
            .map_err(|e| GatewayError::format(format!("cannot encode space: {e}")))?;
        let keyed = rmpv::decode::read_value(&mut buf.as_slice())
            .map_err(|e| GatewayError::format(format!("cannot re-read space: {e}")))?;
        let entries = keyed
            .as_map()
            .ok_or_else(|| GatewayError::format("space did not encode as a map"))?;

        SPACE_TUPLE_FIELDS
            .iter()
            .map(|field| {
                entries
                    .iter()
                    .find(|(key, _)| key.as_str() == Some(field))
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| GatewayError::format(format!("space has no '{field}' field")))
            })
            .collect()
    }

    pub fn is_system(&self) -> bool {
        self.name.starts_with(SYSTEM_SPACE_PREFIX)
    }
}

/// Outward view of a space: its name and format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpaceSummary {
    pub name: String,
    pub format: Vec<FieldSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub is_nullable: bool,
}

impl From<&SpaceDescriptor> for SpaceSummary {
    fn from(space: &SpaceDescriptor) -> Self {
        Self {
            name: space.name.clone(),
            format: space
                .format
                .iter()
                .map(|field| FieldSummary {
                    name: field.name.clone(),
                    field_type: field
                        .field_type
                        .clone()
                        .unwrap_or_else(|| UNTYPED_FIELD.to_string()),
                    is_nullable: field.is_nullable.unwrap_or(false),
                })
                .collect(),
        }
    }
}
