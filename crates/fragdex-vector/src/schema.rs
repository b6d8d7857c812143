use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// `id` plus a fixed-size `vector` column of width `dim`.
pub fn build_vector_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
