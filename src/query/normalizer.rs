//! Conversion of raw shim replies into JSON-safe tabular results.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rmpv::Value;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

use super::executor::NULL_TOKEN;
use crate::error::{GatewayError, Result};

/// Name and engine type of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// A normalized statement result.
///
/// Every row map's keys are a subset of the column names, in column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub data: Vec<Map<String, JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

impl QueryResult {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Normalizes a reply of the evaluation shim.
///
/// The reply is either a map or a one-element list wrapping a map. An `error`
/// field wins over everything else and becomes an engine error.
pub fn normalize(raw: &Value) -> Result<QueryResult> {
    let top = unwrap_envelope(raw)?;

    if let Some(error) = lookup(top, "error") {
        if !error.is_nil() {
            let detail = match error.as_str() {
                Some(text) => text.to_string(),
                None => to_json(error).to_string(),
            };
            return Err(GatewayError::engine(detail));
        }
    }

    let metadata = lookup(top, "metadata")
        .ok_or_else(|| GatewayError::format("result has no metadata"))?;
    let columns = as_list(metadata, "metadata")?
        .iter()
        .map(column_meta)
        .collect::<Result<Vec<_>>>()?;

    let rows = lookup(top, "rows").ok_or_else(|| GatewayError::format("result has no rows"))?;
    let data = as_list(rows, "rows")?
        .iter()
        .map(|row| build_row(&columns, row))
        .collect::<Result<Vec<_>>>()?;

    let row_count = lookup(top, "row_count").and_then(Value::as_u64);

    Ok(QueryResult {
        columns,
        data,
        row_count,
    })
}

/// Converts any MessagePack value into JSON without loss of structure.
///
/// Binary becomes base64 text, extensions become `ext:<type>:<base64>`,
/// non-finite floats become their text and map keys are stringified.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Nil => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => {
            if let Some(n) = i.as_u64() {
                JsonValue::from(n)
            } else if let Some(n) = i.as_i64() {
                JsonValue::from(n)
            } else {
                JsonValue::String(i.to_string())
            }
        }
        Value::F32(f) => float_to_json(f64::from(*f)),
        Value::F64(f) => float_to_json(*f),
        Value::String(s) => JsonValue::String(match s.as_str() {
            Some(text) => text.to_string(),
            None => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        }),
        Value::Binary(bytes) => JsonValue::String(STANDARD.encode(bytes)),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (key_to_string(k), to_json(v)))
                .collect(),
        ),
        Value::Ext(kind, bytes) => {
            JsonValue::String(format!("ext:{kind}:{}", STANDARD.encode(bytes)))
        }
    }
}

fn float_to_json(f: f64) -> JsonValue {
    match Number::from_f64(f) {
        Some(n) => JsonValue::Number(n),
        None => JsonValue::String(f.to_string()),
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => match s.as_str() {
            Some(text) => text.to_string(),
            None => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        },
        Value::Integer(i) => i.to_string(),
        Value::F32(f) => f.to_string(),
        Value::F64(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Nil => "null".to_string(),
        other => to_json(other).to_string(),
    }
}

fn unwrap_envelope(raw: &Value) -> Result<&Value> {
    match raw {
        Value::Map(_) => Ok(raw),
        Value::Array(items) if items.len() == 1 && items[0].is_map() => Ok(&items[0]),
        Value::Array(items) => Err(GatewayError::format(format!(
            "expected a single result map, got a list of {}",
            items.len()
        ))),
        other => Err(GatewayError::format(format!(
            "expected a result map, got {other}"
        ))),
    }
}

fn lookup<'v>(map: &'v Value, key: &str) -> Option<&'v Value> {
    map.as_map()?
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

/// An empty map stands in for an empty list.
fn as_list<'v>(value: &'v Value, what: &str) -> Result<&'v [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Map(entries) if entries.is_empty() => Ok(&[]),
        other => Err(GatewayError::format(format!(
            "{what} is not a list: {other}"
        ))),
    }
}

fn column_meta(entry: &Value) -> Result<ColumnMeta> {
    if !entry.is_map() {
        return Err(GatewayError::format(format!(
            "metadata entry is not a map: {entry}"
        )));
    }

    let name = lookup(entry, "name")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::format(format!("metadata entry has no name: {entry}")))?;
    let column_type = lookup(entry, "type").and_then(Value::as_str).unwrap_or("");

    Ok(ColumnMeta {
        name: name.to_string(),
        column_type: column_type.to_string(),
    })
}

fn build_row(columns: &[ColumnMeta], row: &Value) -> Result<Map<String, JsonValue>> {
    let cells = as_list(row, "row")?;

    // zip stops at the shorter side: short rows omit keys, long rows are cut.
    Ok(columns
        .iter()
        .zip(cells)
        .map(|(column, cell)| {
            let value = match cell {
                Value::Nil => JsonValue::String(NULL_TOKEN.to_string()),
                other => to_json(other),
            };
            (column.name.clone(), value)
        })
        .collect())
}
