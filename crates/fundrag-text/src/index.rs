use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use fundrag_core::error::{Error, Result};
use fundrag_core::traits::TextIndexer;
use fundrag_core::types::{Document, RankedResult, SourceTag};

use crate::tantivy_utils::{build_schema, register_tokenizer, tokenize, FIELD_ID, FIELD_ORD, FIELD_SOURCE, FIELD_TEXT};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn index_err(e: impl std::fmt::Display) -> Error {
	Error::Index(e.to_string())
}

struct Snapshot {
	reader: IndexReader,
	ord_field: Field,
	text_field: Field,
	documents: Vec<Document>,
}

impl Snapshot {
	fn build(documents: &[Document]) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let ord_field = schema.get_field(FIELD_ORD).map_err(index_err)?;
		let id_field = schema.get_field(FIELD_ID).map_err(index_err)?;
		let text_field = schema.get_field(FIELD_TEXT).map_err(index_err)?;
		let source_field = schema.get_field(FIELD_SOURCE).map_err(index_err)?;

		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(index_err)?;
		for (ord, d) in documents.iter().enumerate() {
			index_writer.add_document(doc!(
				ord_field => ord as u64,
				id_field => d.id.clone(),
				text_field => d.text.clone(),
				source_field => d.source_tag.as_str(),
			)).map_err(index_err)?;
		}
		index_writer.commit().map_err(index_err)?;

		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(index_err)?;
		Ok(Self { reader, ord_field, text_field, documents: documents.to_vec() })
	}

	fn query_for(&self, tokens: &[String]) -> BooleanQuery {
		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.text_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		BooleanQuery::new(clauses)
	}
}

/// BM25 keyword index over an in-RAM Tantivy index.
///
/// `index` replaces the whole corpus. Queries keep the snapshot they started
/// with, so a concurrent rebuild is never observed half-done.
#[derive(Default)]
pub struct LexicalIndex {
	snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl LexicalIndex {
	pub fn new() -> Self { Self::default() }

	pub fn is_ready(&self) -> bool { self.snapshot.read().is_some() }
}

impl TextIndexer for LexicalIndex {
	fn index(&self, documents: &[Document]) -> Result<()> {
		let mut seen = HashSet::with_capacity(documents.len());
		if let Some(dup) = documents.iter().find(|d| !seen.insert(d.id.as_str())) {
			return Err(Error::Validation(format!("duplicate document id '{}'", dup.id)));
		}
		if documents.is_empty() {
			tracing::warn!("indexing an empty corpus; keyword search will return nothing");
		}
		let snapshot = Snapshot::build(documents)?;
		*self.snapshot.write() = Some(Arc::new(snapshot));
		tracing::info!(documents = documents.len(), "lexical index built");
		Ok(())
	}

	fn search(&self, query: &str, top_k: usize, source_filter: Option<SourceTag>) -> Result<Vec<RankedResult>> {
		let Some(snap) = self.snapshot.read().clone() else {
			tracing::debug!("lexical search before index was built");
			return Ok(vec![]);
		};
		let tokens = tokenize(query);
		if top_k == 0 || tokens.is_empty() || snap.documents.is_empty() {
			return Ok(vec![]);
		}

		let searcher = snap.reader.searcher();
		let top_docs = searcher.search(&snap.query_for(&tokens), &TopDocs::with_limit(snap.documents.len())).map_err(index_err)?;

		let mut scored: Vec<(f32, usize)> = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let stored: TantivyDocument = searcher.doc(addr).map_err(index_err)?;
			let Some(ord) = stored.get_first(snap.ord_field).and_then(|v| v.as_u64()) else { continue; };
			let ord = ord as usize;
			match snap.documents.get(ord) {
				Some(d) if source_filter.map_or(true, |f| f == d.source_tag) => scored.push((score, ord)),
				_ => {}
			}
		}
		// ties fall back to corpus order
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

		let results = scored
			.into_iter()
			.take(top_k)
			.filter_map(|(score, ord)| snap.documents.get(ord).map(|d| (score, d)))
			.enumerate()
			.map(|(i, (score, d))| RankedResult {
				id: d.id.clone(),
				text: d.text.clone(),
				score,
				rank: i + 1,
				source_tag: d.source_tag,
				metadata: d.metadata.clone(),
			})
			.collect();
		Ok(results)
	}

	fn clear(&self) -> Result<()> {
		*self.snapshot.write() = None;
		Ok(())
	}

	fn count(&self) -> usize {
		self.snapshot.read().as_ref().map_or(0, |s| s.documents.len())
	}
}
