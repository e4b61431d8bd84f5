//! FieldNormalizer: decodes the encoded list/object columns into names

pub mod literal;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::constants::STAGE_NORMALIZE;
use crate::domain::{Collection, ListColumn, ListField, MovieRecord, RecordSet};
use crate::error::{Result, SchemaError};
use crate::pipeline::{PipelineStage, StageOutcome};

pub use literal::{parse_literal, LiteralError};

/// Result of decoding one encoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// No value in the source cell, or a value of the wrong shape
    Absent,
    /// A list of tagged objects, reduced to their `name` attributes
    List(Vec<String>),
    /// A single tagged object's `name`
    ScalarName(String),
    /// Text that is not a valid literal
    Malformed(String),
}

/// Decode an encoded cell into the tagged result.
///
/// List elements without a string `name` are skipped.
pub fn decode(text: Option<&str>) -> Decoded {
    let Some(text) = text else {
        return Decoded::Absent;
    };

    let value = match parse_literal(text) {
        Ok(value) => value,
        Err(e) => return Decoded::Malformed(e.to_string()),
    };

    match value {
        Value::Array(items) => Decoded::List(
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
        ),
        Value::Object(obj) => match obj.get("name").and_then(Value::as_str) {
            Some(name) => Decoded::ScalarName(name.to_string()),
            None => Decoded::Absent,
        },
        _ => Decoded::Absent,
    }
}

/// Decodes the configured list columns and `belongs_to_collection`
pub struct FieldNormalizer {
    fields: Vec<ListColumn>,
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self {
            fields: ListColumn::ALL.to_vec(),
        }
    }
}

impl FieldNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize only the given list columns
    pub fn with_fields(fields: Vec<ListColumn>) -> Self {
        Self { fields }
    }

    fn normalize_list(field: ListColumn, id: i64, value: &ListField) -> Result<ListField> {
        let text = match value {
            ListField::Encoded(text) => text,
            // already decoded or absent
            other => return Ok(other.clone()),
        };

        match decode(Some(text)) {
            Decoded::List(names) => Ok(ListField::Names(names)),
            Decoded::Absent | Decoded::ScalarName(_) => Ok(ListField::Absent),
            Decoded::Malformed(reason) => Err(SchemaError::MalformedField {
                field: field.column_name().to_string(),
                id,
                reason,
            }
            .into()),
        }
    }

    fn normalize_collection(value: &Collection) -> Collection {
        match value {
            Collection::Encoded(text) => match decode(Some(text)) {
                Decoded::ScalarName(name) => Collection::Named(name),
                _ => Collection::NoCollection,
            },
            other => other.clone(),
        }
    }

    /// Normalize a single record; fails on the first malformed list field.
    pub fn normalize_record(&self, mut record: MovieRecord) -> Result<MovieRecord> {
        for field in &self.fields {
            let id = record.id;
            let slot = record.list_field_mut(*field);
            *slot = Self::normalize_list(*field, id, slot)?;
        }
        record.belongs_to_collection = Self::normalize_collection(&record.belongs_to_collection);
        Ok(record)
    }
}

#[async_trait]
impl PipelineStage for FieldNormalizer {
    fn name(&self) -> &'static str {
        STAGE_NORMALIZE
    }

    async fn apply(&self, records: RecordSet) -> Result<StageOutcome> {
        info!("🔧 Decoding {} encoded columns for {} records", self.fields.len() + 1, records.len());

        let (records, genre_columns) = records.into_parts();
        let mut normalized = Vec::with_capacity(records.len());
        for record in records {
            let record = self.normalize_record(record)?;
            debug!(id = record.id, "Normalized record");
            normalized.push(record);
        }

        Ok(StageOutcome::unchanged(RecordSet::from_parts(normalized, genre_columns)))
    }
}
