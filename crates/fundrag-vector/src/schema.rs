use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_TEXT: &str = "text";
pub const COL_SOURCE: &str = "source_tag";
pub const COL_METADATA: &str = "metadata";
pub const COL_VECTOR: &str = "vector";
pub const COL_DISTANCE: &str = "_distance";

/// `metadata` holds the document's scalar map as a JSON object.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(COL_ID, DataType::Utf8, false),
		Field::new(COL_TEXT, DataType::Utf8, false),
		Field::new(COL_SOURCE, DataType::Utf8, false),
		Field::new(COL_METADATA, DataType::Utf8, false),
		Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
