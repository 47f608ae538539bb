use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tantivy::collector::TopDocs;
use tantivy::query::BooleanQuery;
use tantivy::schema::{Field, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use triad_core::data_processor::DataProcessor;
use triad_core::{BackendKind, Document, SearchResult};

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// In-memory BM25 index over a fixed corpus snapshot.
///
/// Built once and never mutated; a rebuilt index replaces it wholesale (see
/// [`crate::KeywordAdapter::swap_index`]).
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	id_field: Field,
	text_field: Field,
	docs: HashMap<String, Document>,
}

impl LexicalIndex {
	pub fn build(documents: impl IntoIterator<Item = Document>) -> Result<Self> {
		let start = Instant::now();
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index)?;
		let id_field = schema.get_field("id")?;
		let text_field = schema.get_field("text")?;

		let mut index_writer: IndexWriter = index.writer(50_000_000)?;
		let mut docs = HashMap::new();
		for d in documents {
			if docs.contains_key(&d.id) { warn!(id = %d.id, "duplicate document id skipped"); continue; }
			index_writer.add_document(doc!(id_field => d.id.clone(), text_field => d.content.clone()))?;
			docs.insert(d.id.clone(), d);
		}
		index_writer.commit()?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		info!(documents = docs.len(), elapsed_ms = start.elapsed().as_millis() as u64, "lexical index built");
		Ok(Self { index, reader, id_field, text_field, docs })
	}

	/// Loads `.txt` / `.jsonl` files under `data_dir` and indexes them.
	pub fn from_directory(data_dir: &Path, limit: Option<usize>) -> Result<Self> {
		let processor = DataProcessor::new();
		let documents = match limit {
			Some(limit) => processor.process_directory_limited(data_dir, limit)?,
			None => processor.process_directory(data_dir)?,
		};
		Self::build(documents)
	}

	pub fn len(&self) -> usize { self.docs.len() }

	pub fn is_empty(&self) -> bool { self.docs.is_empty() }

	pub fn get(&self, id: &str) -> Option<&Document> { self.docs.get(id) }

	pub fn documents(&self) -> impl Iterator<Item = &Document> { self.docs.values() }

	/// Runs `text` through the index analyzer; duplicates are removed, order kept.
	pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
		let mut stream = analyzer.token_stream(text);
		let mut terms: Vec<String> = Vec::new();
		while stream.advance() {
			let t = &stream.token().text;
			if !terms.contains(t) { terms.push(t.clone()); }
		}
		Ok(terms)
	}

	/// BM25-ranked documents for `query_text`, scores divided by the best hit.
	pub fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
		if top_k == 0 { return Ok(vec![]); }
		let terms: Vec<Term> = self.analyze(query_text)?.iter().map(|t| Term::from_field_text(self.text_field, t)).collect();
		if terms.is_empty() { debug!("query analyzed to no terms"); return Ok(vec![]); }
		let query = BooleanQuery::new_multiterms_query(terms);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(top_k))?;
		let max_score = top_docs.first().map(|(s, _)| *s).unwrap_or(0.0);
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else { continue };
			let Some(d) = self.docs.get(id) else { continue };
			let normalized = if max_score > 0.0 { (score / max_score).clamp(0.0, 1.0) } else { 0.0 };
			hits.push(SearchResult::from_document(d, normalized, BackendKind::Keyword));
		}
		Ok(hits)
	}
}
