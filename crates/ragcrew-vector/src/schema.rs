//! Arrow schema for a vector collection.
//!
//! Collection properties that Arrow has no native slot for live in metadata:
//! the text byte bound on the text field, dynamic-field and shard settings on
//! the schema itself.
use arrow_schema::{DataType, Field, Schema};
use std::collections::HashMap;
use std::sync::Arc;

use ragcrew_core::error::{Error, Result};

use crate::backend::CollectionSchema;

pub const MAX_LENGTH_KEY: &str = "max_length";
pub const DYNAMIC_FIELD_KEY: &str = "ragcrew.dynamic_field";
pub const SHARDS_KEY: &str = "ragcrew.shards";

pub fn build_arrow_schema(schema: &CollectionSchema) -> Result<Arc<Schema>> {
    if schema.dim == 0 {
        return Err(Error::Config("collection dimension must be positive".to_string()));
    }
    let dim = i32::try_from(schema.dim)
        .map_err(|_| Error::Config(format!("collection dimension {} is too large", schema.dim)))?;

    let text_meta = HashMap::from([(MAX_LENGTH_KEY.to_string(), schema.text_max_len.to_string())]);
    let schema_meta = HashMap::from([
        (DYNAMIC_FIELD_KEY.to_string(), schema.dynamic_fields.to_string()),
        (SHARDS_KEY.to_string(), schema.shards.to_string()),
    ]);
    Ok(Arc::new(Schema::new_with_metadata(
        vec![
            Field::new(&schema.id_field, DataType::Int64, false),
            Field::new(&schema.vector_field, vector_type(dim), true),
            Field::new(&schema.text_field, DataType::Utf8, false).with_metadata(text_meta),
        ],
        schema_meta,
    )))
}

pub fn vector_type(dim: i32) -> DataType {
    DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim)
}

/// Element count of a fixed-size-list vector field, if `field` is one.
pub fn vector_dim(schema: &Schema, field: &str) -> Option<usize> {
    match schema.field_with_name(field).ok()?.data_type() {
        DataType::FixedSizeList(_, dim) => usize::try_from(*dim).ok(),
        _ => None,
    }
}

/// Byte bound recorded on the text field, if any.
pub fn text_max_len(schema: &Schema, field: &str) -> Option<usize> {
    schema.field_with_name(field).ok()?.metadata().get(MAX_LENGTH_KEY)?.parse().ok()
}
