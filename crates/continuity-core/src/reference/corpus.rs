//! Reference corpus
//!
//! A small, fixed knowledge base keyed by document id. Document order is the
//! order of the source JSON object, and it matters: the comparator only looks
//! at the first few relevant documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::CorpusError;
use crate::types::truncate_chars;

/// Default snippet length served by [`ReferenceCorpus::search`]
pub const DEFAULT_SNIPPET_MAX: usize = 240;

/// One corpus document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub id: String,
    pub content: String,
    pub source: String,
}

/// Ordered, read-only collection of reference documents
#[derive(Debug, Clone, Default)]
pub struct ReferenceCorpus {
    documents: Vec<ReferenceDocument>,
}

/// A search hit: a short snippet plus a digest of the full content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub source: String,
    pub snippet: String,
    pub digest: String,
}

/// Document counts, overall and per source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_documents: usize,
    pub sources: BTreeMap<String, usize>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    content: String,
    #[serde(default)]
    source: String,
}

impl ReferenceCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document, keeping insertion order
    pub fn with_document(
        mut self,
        id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.documents.push(ReferenceDocument {
            id: id.into(),
            content: content.into(),
            source: source.into(),
        });
        self
    }

    /// Parse `{ "<id>": { "content": "...", "source": "..." }, ... }`.
    ///
    /// Extra fields per document are ignored.
    pub fn from_json(json: &str) -> Result<Self, CorpusError> {
        // serde_json::Map sorts keys without `preserve_order`
        let entries: OrderedEntries = serde_json::from_str(json)?;

        let mut corpus = Self::new();
        for (id, value) in entries.0 {
            let raw: RawDocument = serde_json::from_value(value)?;
            corpus = corpus.with_document(id, raw.content, raw.source);
        }
        Ok(corpus)
    }

    /// Read and parse a corpus file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn documents(&self) -> &[ReferenceDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Case-insensitive substring search returning at most `limit` hits
    pub fn search(&self, query: &str, limit: usize, snippet_max: usize) -> Vec<SearchHit> {
        let needle = query.to_lowercase();

        self.documents
            .iter()
            .filter(|doc| doc.content.to_lowercase().contains(&needle))
            .take(limit)
            .map(|doc| SearchHit {
                id: doc.id.clone(),
                source: doc.source.clone(),
                snippet: truncate_chars(&doc.content, snippet_max),
                digest: blake3::hash(doc.content.as_bytes()).to_hex().to_string(),
            })
            .collect()
    }

    pub fn stats(&self) -> CorpusStats {
        let mut sources = BTreeMap::new();
        for doc in &self.documents {
            *sources.entry(doc.source.clone()).or_insert(0) += 1;
        }
        CorpusStats {
            total_documents: self.documents.len(),
            sources,
        }
    }
}

/// JSON object entries in document order
struct OrderedEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> serde::de::Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a JSON object keyed by document id")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
