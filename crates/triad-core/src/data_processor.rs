//! Loads a corpus snapshot from disk into [`Document`]s.
//!
//! `.txt` files are split into paragraph chunks (long paragraphs are split
//! with overlap), `.jsonl` files carry one serialized `Document` per line.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::Document;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_chunking(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Document>> {
        self.process_files(data_dir, self.list_corpus_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Document>> {
        let mut files = self.list_corpus_files(data_dir);
        if files.len() > limit { files.truncate(limit); debug!(limit, "corpus limited to first files"); }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<Document>> {
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt or .jsonl files found");
            return Ok(vec![]);
        }
        let mut documents = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            if file_path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                documents.extend(self.read_jsonl(file_path)?);
                continue;
            }
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(file_path);
            let category = self.get_facet_from_path(file_path, data_dir);
            documents.extend(self.chunk_content(&content, &doc_id, file_path, &category));
        }
        info!(files = files.len(), documents = documents.len(), "corpus loaded");
        Ok(documents)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn read_jsonl(&self, file_path: &Path) -> Result<Vec<Document>> {
        let content = self.read_file_content(file_path)?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| serde_json::from_str(line).with_context(|| format!("{}:{}: invalid document", file_path.display(), n + 1)))
            .collect()
    }

    fn extract_doc_id(&self, file_path: &Path) -> String {
        file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| file_path.to_string_lossy().to_string())
    }

    fn get_facet_from_path(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        match relative_path.parent().and_then(|p| p.to_str()) {
            Some(parent) if !parent.is_empty() => format!("/{}", parent.replace('\\', "/")),
            _ => "/misc".to_string(),
        }
    }

    fn chunk_content(&self, content: &str, doc_id: &str, file_path: &Path, category: &str) -> Vec<Document> {
        let mut pieces = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim(); if paragraph.is_empty() { continue; }
            if self.count_tokens(paragraph) <= self.chunking_config.max_tokens { pieces.push(paragraph.to_string()); }
            else { pieces.extend(self.split_paragraph_with_overlap(paragraph)); }
        }
        let total_chunks = pieces.len();
        let title = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or(doc_id).to_string();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| {
                Document::new(format!("{}:{}", doc_id, chunk_index), text)
                    .with_meta("doc_id", doc_id)
                    .with_meta("doc_path", file_path.to_string_lossy().to_string())
                    .with_meta("category", category)
                    .with_meta("title", title.clone())
                    .with_meta("chunk_index", chunk_index)
                    .with_meta("total_chunks", total_chunks)
            })
            .collect()
    }

    fn count_tokens(&self, text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = (self.chunking_config.max_tokens as f32 * 0.75).max(1.0) as usize;
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_corpus_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if matches!(path.extension().and_then(|s| s.to_str()), Some("txt" | "jsonl")) { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}
