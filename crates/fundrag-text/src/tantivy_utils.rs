use tantivy::schema::{Schema, TextFieldIndexing, TextOptions, IndexRecordOption, FAST, STORED, STRING};
use tantivy::tokenizer::{TextAnalyzer, SimpleTokenizer, LowerCaser};
use tantivy::Index;

pub const ANALYZER: &str = "alnum_lower";

pub const FIELD_ORD: &str = "ord";
pub const FIELD_ID: &str = "id";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_SOURCE: &str = "source_tag";

/// `ord` is the document's position in the indexed batch; it breaks score ties
/// and maps hits back to the in-memory document list.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_u64_field(FIELD_ORD, FAST | STORED);
	schema_builder.add_text_field(FIELD_ID, STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	schema_builder.add_text_field(FIELD_TEXT, text_options);
	schema_builder.add_text_field(FIELD_SOURCE, STRING | STORED);
	schema_builder.build()
}

/// Splits on anything that is not alphanumeric and lower-cases. No stop words:
/// fund names are often made of them.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(ANALYZER, build_analyzer());
}

pub fn tokenize(text: &str) -> Vec<String> {
	let mut analyzer = build_analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() {
		tokens.push(stream.token().text.clone());
	}
	tokens
}
