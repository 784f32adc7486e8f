/// This crate turns tokenized query/document pairs into numeric
/// similarity features for a downstream ranking model.
///
/// The pipeline is: tokenized fields -> sparse TF-IDF vectors (per
/// field group) -> raw cosine similarities, plus a truncated-SVD
/// latent embedding of the body and title groups -> latent-space
/// similarities. Everything lands in one feature table aligned to the
/// input row order.
pub mod document;
pub mod error;
pub mod extractor;
pub mod features;
pub mod similarity;
pub mod sparse;
pub mod svd;
pub mod utils;
pub mod vectorizer;

/// Crate error type and `Result` alias.
/// All failures are deterministic (bad configuration, shape mismatch,
/// unfitted state, serialization); nothing here is transient or worth
/// retrying.
pub use error::{Error, Result};

/// One input row: url, query tokens, body tokens, title tokens, and a
/// header-tag multimap. Tokenization is an upstream concern; pages are
/// immutable inputs.
pub use document::RankedPage;

/// Term-weighting vectorizer, split into an immutable config and the
/// fitted model it produces.
/// `VectorizerConfig` selects minimum document frequency, smoothed-IDF
/// weighting, L2 normalization, and sublinear TF; `fit` freezes a
/// first-seen-ordered vocabulary plus per-term weights, and
/// `FittedVectorizer::transform` maps any tokenized batch into sparse
/// rows of exactly vocabulary-size width.
pub use vectorizer::{FittedVectorizer, VectorizerConfig};

/// Truncated SVD latent embedder, same config/fitted split.
/// `SvdConfig::fit` decomposes a sparse document-term matrix into the
/// top-k singular triples (optionally centered) by deterministic
/// randomized subspace iteration; `FittedSvd::transform` projects new
/// sparse rows into the k-dimensional latent space.
pub use svd::{FittedSvd, SvdConfig};

/// Row-aligned similarity kernels.
/// Plain dot products over row pairs, sparse (O(nnz) index merge) and
/// dense. Cosine semantics come from the vectorizer's L2
/// normalization, not from these functions.
pub use similarity::{row_wise_dense_dot, row_wise_sparse_dot};

/// Sparse row vector and row-major sparse matrix used throughout the
/// pipeline. Indices are sorted ascending per row; row order is
/// positional alignment with the originating document batch.
pub use sparse::{SparseMatrix, SparseVec};

/// Output table: feature-named numeric columns over a fixed row count,
/// appended in computation order, never reordered.
pub use features::FeatureTable;

/// The feature pipeline itself.
/// `FeatureConfig::fit` trains one vectorizer per field group
/// (body+title union, titles, headers) and two centered latent
/// embedders, producing a frozen `TextFeatureExtractor`;
/// `transform` emits the query/body/title/header similarity columns
/// for a batch, in a stable order. Fitted state serializes with serde
/// (CBOR helpers included) for reuse across process restarts.
pub use extractor::{FeatureConfig, TextFeatureExtractor};
