use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sparse::{SparseMatrix, SparseVec};

/// Term weighting options for a vectorizer, set before fitting.
///
/// Immutable once built; `fit` consumes nothing and can be reused to
/// fit any number of independent models from the same configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    min_document_frequency: usize,
    idf: bool,
    l2_normalization: bool,
    sublinear_tf: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        VectorizerConfig {
            min_document_frequency: 1,
            idf: true,
            l2_normalization: true,
            sublinear_tf: false,
        }
    }
}

impl VectorizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude terms appearing in fewer than `min_df` documents.
    pub fn with_min_document_frequency(mut self, min_df: usize) -> Self {
        self.min_document_frequency = min_df;
        self
    }

    /// Weight counts by smoothed inverse document frequency.
    pub fn with_idf_weighting(mut self, enabled: bool) -> Self {
        self.idf = enabled;
        self
    }

    /// Scale every produced row to unit Euclidean norm.
    pub fn with_l2_normalization(mut self, enabled: bool) -> Self {
        self.l2_normalization = enabled;
        self
    }

    /// Replace raw counts c with `1 + ln(c)`.
    pub fn with_sublinear_tf(mut self, enabled: bool) -> Self {
        self.sublinear_tf = enabled;
        self
    }

    /// Build the vocabulary and per-term weights from a tokenized
    /// corpus.
    ///
    /// The vocabulary keeps terms whose document frequency reaches
    /// `min_document_frequency`, indexed in first-seen order, which
    /// makes fitted state reproducible bit-for-bit across runs. With
    /// IDF enabled the weight for a term seen in `df` of `n` documents
    /// is `ln((1 + n) / (1 + df)) + 1`; the smoothing keeps weights
    /// finite and nonzero even for terms present in every document.
    ///
    /// # Errors
    /// `Error::Configuration` when the corpus is empty, when
    /// `min_document_frequency` exceeds the corpus size, or when no
    /// term survives the frequency threshold.
    pub fn fit<D>(&self, corpus: &[D]) -> Result<FittedVectorizer>
    where
        D: AsRef<[String]>,
    {
        if corpus.is_empty() {
            return Err(Error::Configuration(
                "cannot fit a vectorizer on an empty corpus".to_string(),
            ));
        }
        if self.min_document_frequency > corpus.len() {
            return Err(Error::Configuration(format!(
                "minimum document frequency {} exceeds corpus size {}",
                self.min_document_frequency,
                corpus.len()
            )));
        }

        let mut document_frequency: IndexMap<String, usize> = IndexMap::new();
        for doc in corpus {
            let mut seen: IndexSet<&str> = IndexSet::new();
            for term in doc.as_ref() {
                seen.insert(term.as_str());
            }
            for term in seen {
                *document_frequency.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let n = corpus.len() as f64;
        let mut vocabulary: IndexSet<String> = IndexSet::new();
        let mut weights = Vec::new();
        for (term, df) in document_frequency {
            if df >= self.min_document_frequency {
                if self.idf {
                    weights.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
                }
                vocabulary.insert(term);
            }
        }
        if vocabulary.is_empty() {
            return Err(Error::Configuration(format!(
                "no term reaches the minimum document frequency {}",
                self.min_document_frequency
            )));
        }

        debug!(
            documents = corpus.len(),
            vocabulary = vocabulary.len(),
            "fitted vectorizer"
        );
        Ok(FittedVectorizer {
            config: self.clone(),
            vocabulary,
            idf: self.idf.then_some(weights),
        })
    }
}

/// Frozen vocabulary and term weights produced by
/// [`VectorizerConfig::fit`].
///
/// `transform` only reads this state, so a fitted vectorizer can be
/// shared across threads and called concurrently without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedVectorizer {
    config: VectorizerConfig,
    vocabulary: IndexSet<String>,
    idf: Option<Vec<f64>>,
}

impl FittedVectorizer {
    /// Number of vocabulary terms; the column count of every matrix
    /// this vectorizer produces.
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Column index assigned to `term` at fit time.
    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get_index_of(term)
    }

    /// IDF weight vector, present when IDF weighting was enabled.
    pub fn idf_weights(&self) -> Option<&[f64]> {
        self.idf.as_deref()
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Turn a tokenized document batch into weighted sparse rows.
    ///
    /// Output dimensionality always equals the fitted vocabulary size;
    /// terms outside the vocabulary are dropped silently, so a batch
    /// sharing no vocabulary with the fit corpus comes out as zero
    /// rows, not as an error. Rows whose weights are all zero are left
    /// zero by the guarded L2 normalization.
    ///
    /// Documents are vectorized in parallel; fitted state is read-only
    /// throughout, so repeated calls on the same input are
    /// bit-identical.
    ///
    /// # Errors
    /// `Error::NotFitted` when the vocabulary is empty, which a fit
    /// never produces but a deserialized payload can.
    pub fn transform<D>(&self, docs: &[D]) -> Result<SparseMatrix>
    where
        D: AsRef<[String]> + Sync,
    {
        if self.vocabulary.is_empty() {
            return Err(Error::NotFitted("vectorizer"));
        }
        let rows: Vec<SparseVec> = docs
            .par_iter()
            .map(|doc| self.vectorize(doc.as_ref()))
            .collect();
        Ok(SparseMatrix::from_rows(self.vocabulary.len(), rows))
    }

    fn vectorize(&self, tokens: &[String]) -> SparseVec {
        let mut counts: BTreeMap<u32, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(index) = self.vocabulary.get_index_of(token.as_str()) {
                *counts.entry(index as u32).or_insert(0.0) += 1.0;
            }
        }
        let mut pairs = Vec::with_capacity(counts.len());
        for (index, mut value) in counts {
            if self.config.sublinear_tf {
                value = 1.0 + value.ln();
            }
            if let Some(idf) = &self.idf {
                value *= idf[index as usize];
            }
            pairs.push((index, value));
        }
        let mut row = SparseVec::from_sorted_pairs(self.vocabulary.len(), pairs);
        if self.config.l2_normalization {
            let norm = row.l2_norm();
            if norm > 0.0 {
                row.scale(1.0 / norm);
            }
        }
        row
    }
}
