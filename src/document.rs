use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One row of a query/document ranking task: a crawled page with its
/// tokenized text fields and the query it was retrieved for.
///
/// Tokenization happens upstream; this crate only consumes token
/// sequences. Pages are immutable inputs and are never mutated by the
/// pipeline. `headers` is a tag-to-sequences multimap in document
/// order, since a page can carry several h2 blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedPage {
    pub url: String,
    pub query: Vec<String>,
    pub body: Vec<String>,
    pub title: Vec<String>,
    pub headers: IndexMap<String, Vec<Vec<String>>>,
}

impl RankedPage {
    pub fn new(url: impl Into<String>) -> Self {
        RankedPage {
            url: url.into(),
            ..RankedPage::default()
        }
    }

    pub fn with_query<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.query = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_body<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.body = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.title = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Append one header block under `tag` (e.g. "h2").
    pub fn add_header<I, T>(mut self, tag: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.headers
            .entry(tag.into())
            .or_default()
            .push(tokens.into_iter().map(Into::into).collect());
        self
    }

    /// Tokens of every header block with the given tag, concatenated
    /// in document order. A missing tag is an empty sequence, not an
    /// error.
    pub fn header_tokens(&self, tag: &str) -> Vec<String> {
        self.headers
            .get(tag)
            .map(|blocks| blocks.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Tokens of every header block regardless of tag, concatenated in
    /// insertion order.
    pub fn all_header_tokens(&self) -> Vec<String> {
        self.headers
            .values()
            .flat_map(|blocks| blocks.iter().flatten().cloned())
            .collect()
    }
}
