//! Conversion between `Document` and `TantivyDocument`
//!
//! Values are coerced to the schema's field type on the way in, so a caller
//! may hand a numeric id to a text field. Date fields take `I64` epoch
//! seconds in both directions.

use quarry_core::{Document, FieldValue, IndexError, IndexResult};
use tantivy::schema::{FieldType, Schema, Value};
use tantivy::{DateTime, TantivyDocument};

/// Build a native document from `doc` against `schema`
///
/// # Errors
///
/// `IndexError::UnknownField` if `doc` names a field the schema does not
/// declare, `IndexError::Transform` if a value cannot be coerced.
pub fn to_tantivy_document(schema: &Schema, doc: &Document) -> IndexResult<TantivyDocument> {
    let mut native = TantivyDocument::new();
    for (name, value) in doc.iter() {
        let field = schema
            .get_field(name)
            .map_err(|_| IndexError::UnknownField(name.to_string()))?;
        match schema.get_field_entry(field).field_type() {
            FieldType::Str(_) => native.add_text(field, value.to_string()),
            FieldType::I64(_) => native.add_i64(field, coerce_i64(name, value)?),
            FieldType::U64(_) => native.add_u64(field, coerce_u64(name, value)?),
            FieldType::F64(_) => native.add_f64(field, coerce_f64(name, value)?),
            FieldType::Date(_) => native.add_date(
                field,
                DateTime::from_timestamp_secs(coerce_i64(name, value)?),
            ),
            other => {
                return Err(IndexError::Transform(quarry_core::TransformError::new(
                    format!("field '{}' has unsupported type {:?}", name, other.value_type()),
                )))
            }
        }
    }
    Ok(native)
}

/// Read the stored fields of `native` back into a `Document`
///
/// Fields are visited in schema order; values within a field keep their
/// stored order. Values of types `FieldValue` cannot express are skipped.
pub fn from_tantivy_document(schema: &Schema, native: &TantivyDocument) -> Document {
    let mut doc = Document::new();
    for (field, entry) in schema.fields() {
        if !entry.is_stored() {
            continue;
        }
        for value in native.get_all(field) {
            let converted = if let Some(s) = value.as_str() {
                Some(FieldValue::Str(s.to_string()))
            } else if let Some(v) = value.as_i64() {
                Some(FieldValue::I64(v))
            } else if let Some(v) = value.as_u64() {
                Some(FieldValue::U64(v))
            } else if let Some(v) = value.as_f64() {
                Some(FieldValue::F64(v))
            } else {
                value
                    .as_datetime()
                    .map(|dt| FieldValue::I64(dt.into_timestamp_secs()))
            };
            if let Some(converted) = converted {
                doc.add(entry.name(), converted);
            }
        }
    }
    doc
}

fn coerce_i64(name: &str, value: &FieldValue) -> IndexResult<i64> {
    match value {
        FieldValue::I64(v) => Ok(*v),
        FieldValue::U64(v) => i64::try_from(*v).map_err(|_| coerce_error(name, value)),
        FieldValue::Str(s) => s.parse().map_err(|_| coerce_error(name, value)),
        FieldValue::F64(_) => Err(coerce_error(name, value)),
    }
}

fn coerce_u64(name: &str, value: &FieldValue) -> IndexResult<u64> {
    match value {
        FieldValue::U64(v) => Ok(*v),
        FieldValue::I64(v) => u64::try_from(*v).map_err(|_| coerce_error(name, value)),
        FieldValue::Str(s) => s.parse().map_err(|_| coerce_error(name, value)),
        FieldValue::F64(_) => Err(coerce_error(name, value)),
    }
}

fn coerce_f64(name: &str, value: &FieldValue) -> IndexResult<f64> {
    match value {
        FieldValue::F64(v) => Ok(*v),
        FieldValue::I64(v) => Ok(*v as f64),
        FieldValue::U64(v) => Ok(*v as f64),
        FieldValue::Str(s) => s.parse().map_err(|_| coerce_error(name, value)),
    }
}

fn coerce_error(name: &str, value: &FieldValue) -> IndexError {
    IndexError::Transform(quarry_core::TransformError::new(format!(
        "value '{}' does not fit field '{}'",
        value, name
    )))
}
