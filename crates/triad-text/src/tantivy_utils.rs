use tantivy::schema::{Schema, TextFieldIndexing, TextOptions, IndexRecordOption, STRING, STORED};
use tantivy::tokenizer::{TextAnalyzer, RegexTokenizer, LowerCaser, StopWordFilter};
use tantivy::Index;

pub const ANALYZER_NAME: &str = "legal_text";

/// Section signs are tokens of their own so citations like `§ 58` or `§§ 3-5`
/// keep every part; everything else splits on Unicode letters and digits.
const TOKEN_PATTERN: &str = r"§+|[\p{L}\p{N}]+";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _id_field = schema_builder.add_text_field("id", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) -> tantivy::Result<()> {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
		"der","das","und","oder","ist","ein","eine","einer","zu","den","von","mit","im","auf","für","nicht","des","dem","sich","wird","werden",
	];
	let tokenizer = TextAnalyzer::builder(RegexTokenizer::new(TOKEN_PATTERN)?)
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(ANALYZER_NAME, tokenizer);
	Ok(())
}
