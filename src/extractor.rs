use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::RankedPage;
use crate::error::Result;
use crate::features::FeatureTable;
use crate::similarity::{row_wise_dense_dot, row_wise_sparse_dot};
use crate::svd::{FittedSvd, SvdConfig};
use crate::vectorizer::{FittedVectorizer, VectorizerConfig};

/// Knobs for the feature pipeline, one field group each for the
/// body+title union ("all"), titles, and headers.
///
/// Defaults are the reference configuration: document frequency
/// thresholds 5/3/3, IDF and L2 normalization everywhere, sublinear TF
/// only for the union group, latent dimensions 150/50 (headers get no
/// latent pass), header tags h1-h3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    all_vectorizer: VectorizerConfig,
    title_vectorizer: VectorizerConfig,
    header_vectorizer: VectorizerConfig,
    all_latent_dimensions: usize,
    title_latent_dimensions: usize,
    header_tags: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            all_vectorizer: VectorizerConfig::new()
                .with_min_document_frequency(5)
                .with_sublinear_tf(true),
            title_vectorizer: VectorizerConfig::new().with_min_document_frequency(3),
            header_vectorizer: VectorizerConfig::new().with_min_document_frequency(3),
            all_latent_dimensions: 150,
            title_latent_dimensions: 50,
            header_tags: vec!["h1".to_string(), "h2".to_string(), "h3".to_string()],
        }
    }
}

impl FeatureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the weighting options for the body+title union group.
    pub fn with_all_vectorizer(mut self, config: VectorizerConfig) -> Self {
        self.all_vectorizer = config;
        self
    }

    /// Replace the weighting options for the title group.
    pub fn with_title_vectorizer(mut self, config: VectorizerConfig) -> Self {
        self.title_vectorizer = config;
        self
    }

    /// Replace the weighting options for the header group.
    pub fn with_header_vectorizer(mut self, config: VectorizerConfig) -> Self {
        self.header_vectorizer = config;
        self
    }

    pub fn with_all_latent_dimensions(mut self, dimensions: usize) -> Self {
        self.all_latent_dimensions = dimensions;
        self
    }

    pub fn with_title_latent_dimensions(mut self, dimensions: usize) -> Self {
        self.title_latent_dimensions = dimensions;
        self
    }

    /// Header tags that each get their own similarity column, in
    /// column order.
    pub fn with_header_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.header_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Fit the full pipeline over a training collection: three
    /// vectorizers (body+title union, titles, headers) and two
    /// centered latent embedders (union and titles).
    ///
    /// Queries are not consulted at fit time. Fitting is one-shot and
    /// all-or-nothing: on error nothing is kept, and fitting again
    /// builds a wholly new extractor rather than updating this one.
    ///
    /// # Errors
    /// `Error::Configuration` when the collection is empty, a
    /// frequency threshold empties a vocabulary, or a latent dimension
    /// exceeds what the training matrix supports.
    pub fn fit(&self, pages: &[RankedPage]) -> Result<TextFeatureExtractor> {
        let started = Instant::now();
        let bodies: Vec<Vec<String>> = pages.par_iter().map(|p| p.body.clone()).collect();
        let titles: Vec<Vec<String>> = pages.par_iter().map(|p| p.title.clone()).collect();
        let headers: Vec<Vec<String>> = pages.par_iter().map(|p| p.all_header_tokens()).collect();
        debug!(elapsed = ?started.elapsed(), pages = pages.len(), "collected field tokens");

        // bodies first, titles appended after: the union corpus shares
        // one vocabulary between both fields
        let mut all = bodies;
        all.extend(titles.iter().cloned());

        let stage = Instant::now();
        debug!("vectorizing all texts");
        let all_vectorizer = self.all_vectorizer.fit(&all)?;
        debug!(elapsed = ?stage.elapsed(), "vectorized all texts");

        let stage = Instant::now();
        debug!("reducing all texts to the latent space");
        let all_svd = SvdConfig::new(self.all_latent_dimensions)
            .with_centering(true)
            .fit(&all_vectorizer.transform(&all)?)?;
        debug!(elapsed = ?stage.elapsed(), "reduced all texts");

        let stage = Instant::now();
        debug!("vectorizing titles");
        let title_vectorizer = self.title_vectorizer.fit(&titles)?;
        debug!(elapsed = ?stage.elapsed(), "vectorized titles");

        let stage = Instant::now();
        debug!("reducing titles to the latent space");
        let title_svd = SvdConfig::new(self.title_latent_dimensions)
            .with_centering(true)
            .fit(&title_vectorizer.transform(&titles)?)?;
        debug!(elapsed = ?stage.elapsed(), "reduced titles");

        let stage = Instant::now();
        debug!("vectorizing headers");
        let header_vectorizer = self.header_vectorizer.fit(&headers)?;
        debug!(elapsed = ?stage.elapsed(), "vectorized headers");

        debug!(elapsed = ?started.elapsed(), "fitted text feature extractor");
        Ok(TextFeatureExtractor {
            header_tags: self.header_tags.clone(),
            all_vectorizer,
            title_vectorizer,
            header_vectorizer,
            all_svd,
            title_svd,
        })
    }
}

/// Fitted feature pipeline: per-field-group vectorizers and latent
/// embedders, produced by [`FeatureConfig::fit`] and frozen.
///
/// `transform` only reads fitted state, so one extractor can serve
/// concurrent batches. The whole struct serializes with serde; see
/// [`TextFeatureExtractor::to_cbor`] for the persistence format used
/// across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFeatureExtractor {
    header_tags: Vec<String>,
    all_vectorizer: FittedVectorizer,
    title_vectorizer: FittedVectorizer,
    header_vectorizer: FittedVectorizer,
    all_svd: FittedSvd,
    title_svd: FittedSvd,
}

impl TextFeatureExtractor {
    /// Compute the feature table for a query/document batch.
    ///
    /// Emits, in column order: `queryBodySimilarity`, `queryBodyLsi`,
    /// `queryTitleSimilarity`, `queryTitleLsi`,
    /// `queryHeaderSimilarity`, then one `queryHeaderSimilarity_<tag>`
    /// per configured tag. Query vectors are recomputed per field
    /// group, since each group carries its own vocabulary and weights.
    ///
    /// Row order equals input order. Missing fields vectorize to zero
    /// rows and score exactly 0.0. The call either fills every column
    /// or fails without returning a table.
    pub fn transform(&self, pages: &[RankedPage]) -> Result<FeatureTable> {
        let started = Instant::now();
        let mut table = FeatureTable::new(pages.len());

        let queries: Vec<Vec<String>> = pages.par_iter().map(|p| p.query.clone()).collect();
        let bodies: Vec<Vec<String>> = pages.par_iter().map(|p| p.body.clone()).collect();

        let stage = Instant::now();
        debug!("computing similarity between query and raw body vectors");
        let query_vectors = self.all_vectorizer.transform(&queries)?;
        let body_vectors = self.all_vectorizer.transform(&bodies)?;
        table.add_column(
            "queryBodySimilarity",
            row_wise_sparse_dot(&query_vectors, &body_vectors)?,
        )?;
        debug!(elapsed = ?stage.elapsed(), "computed body similarity");

        let stage = Instant::now();
        debug!("computing similarity between query and body in the latent space");
        let query_latent = self.all_svd.transform(&query_vectors)?;
        let body_latent = self.all_svd.transform(&body_vectors)?;
        table.add_column(
            "queryBodyLsi",
            row_wise_dense_dot(&query_latent, &body_latent)?,
        )?;
        debug!(elapsed = ?stage.elapsed(), "computed body latent similarity");

        let stage = Instant::now();
        debug!("computing similarity between query and raw title vectors");
        let titles: Vec<Vec<String>> = pages.par_iter().map(|p| p.title.clone()).collect();
        let title_vectors = self.title_vectorizer.transform(&titles)?;
        let query_vectors = self.title_vectorizer.transform(&queries)?;
        table.add_column(
            "queryTitleSimilarity",
            row_wise_sparse_dot(&query_vectors, &title_vectors)?,
        )?;
        debug!(elapsed = ?stage.elapsed(), "computed title similarity");

        let stage = Instant::now();
        debug!("computing similarity between query and title in the latent space");
        let title_latent = self.title_svd.transform(&title_vectors)?;
        let query_latent = self.title_svd.transform(&query_vectors)?;
        table.add_column(
            "queryTitleLsi",
            row_wise_dense_dot(&query_latent, &title_latent)?,
        )?;
        debug!(elapsed = ?stage.elapsed(), "computed title latent similarity");

        let stage = Instant::now();
        debug!("computing similarity between query and raw header vectors");
        let headers: Vec<Vec<String>> = pages.par_iter().map(|p| p.all_header_tokens()).collect();
        let header_vectors = self.header_vectorizer.transform(&headers)?;
        let query_vectors = self.header_vectorizer.transform(&queries)?;
        table.add_column(
            "queryHeaderSimilarity",
            row_wise_sparse_dot(&query_vectors, &header_vectors)?,
        )?;
        debug!(elapsed = ?stage.elapsed(), "computed header similarity");

        let stage = Instant::now();
        debug!("computing individual header features");
        for tag in &self.header_tags {
            let tagged: Vec<Vec<String>> =
                pages.par_iter().map(|p| p.header_tokens(tag)).collect();
            let tagged_vectors = self.header_vectorizer.transform(&tagged)?;
            table.add_column(
                format!("queryHeaderSimilarity_{tag}"),
                row_wise_sparse_dot(&query_vectors, &tagged_vectors)?,
            )?;
        }
        debug!(elapsed = ?stage.elapsed(), "computed individual header features");

        debug!(elapsed = ?started.elapsed(), rows = table.row_count(), "transformed batch");
        Ok(table)
    }

    /// Header tags configured at fit time, in column order.
    pub fn header_tags(&self) -> &[String] {
        &self.header_tags
    }

    pub fn all_vectorizer(&self) -> &FittedVectorizer {
        &self.all_vectorizer
    }

    pub fn title_vectorizer(&self) -> &FittedVectorizer {
        &self.title_vectorizer
    }

    pub fn header_vectorizer(&self) -> &FittedVectorizer {
        &self.header_vectorizer
    }

    pub fn all_svd(&self) -> &FittedSvd {
        &self.all_svd
    }

    pub fn title_svd(&self) -> &FittedSvd {
        &self.title_svd
    }

    /// Encode the fitted pipeline (vocabularies, term weights,
    /// singular vectors and values, column means) for reuse across
    /// process restarts.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Decode a pipeline previously encoded with
    /// [`TextFeatureExtractor::to_cbor`].
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn training_pages() -> Vec<RankedPage> {
        let mut pages = Vec::new();
        for i in 0..6 {
            let flavor = if i % 2 == 0 { "rust" } else { "python" };
            pages.push(
                RankedPage::new(format!("http://example.com/{i}"))
                    .with_query([flavor, "tutorial"])
                    .with_body([flavor, "guide", "code", "example", flavor])
                    .with_title([flavor, "tutorial"])
                    .add_header("h1", [flavor, "tutorial"])
                    .add_header("h2", ["install", flavor])
                    .add_header("h3", ["faq"]),
            );
        }
        pages
    }

    fn small_config() -> FeatureConfig {
        FeatureConfig::new()
            .with_all_vectorizer(
                VectorizerConfig::new()
                    .with_min_document_frequency(1)
                    .with_sublinear_tf(true),
            )
            .with_title_vectorizer(VectorizerConfig::new().with_min_document_frequency(1))
            .with_header_vectorizer(VectorizerConfig::new().with_min_document_frequency(1))
            .with_all_latent_dimensions(2)
            .with_title_latent_dimensions(2)
    }

    #[test]
    fn transform_emits_all_columns_in_order() {
        let pages = training_pages();
        let extractor = small_config().fit(&pages).unwrap();
        let table = extractor.transform(&pages).unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(
            names,
            vec![
                "queryBodySimilarity",
                "queryBodyLsi",
                "queryTitleSimilarity",
                "queryTitleLsi",
                "queryHeaderSimilarity",
                "queryHeaderSimilarity_h1",
                "queryHeaderSimilarity_h2",
                "queryHeaderSimilarity_h3",
            ]
        );
        assert_eq!(table.row_count(), pages.len());
        for name in names {
            for value in table.column(name).unwrap() {
                assert!(value.is_finite(), "{name} produced {value}");
            }
        }
    }

    #[test]
    fn raw_similarities_stay_within_cosine_bounds() {
        let pages = training_pages();
        let extractor = small_config().fit(&pages).unwrap();
        let table = extractor.transform(&pages).unwrap();
        for name in [
            "queryBodySimilarity",
            "queryTitleSimilarity",
            "queryHeaderSimilarity",
        ] {
            for &value in table.column(name).unwrap() {
                assert!(
                    (0.0..=1.0 + 1e-9).contains(&value),
                    "{name} out of bounds: {value}"
                );
            }
        }
    }

    #[test]
    fn matching_queries_score_higher_than_mismatched() {
        let pages = training_pages();
        let extractor = small_config().fit(&pages).unwrap();
        let matched = extractor.transform(&pages[..1]).unwrap();
        let mut swapped = pages[0].clone();
        swapped.query = vec!["unrelated".to_string(), "terms".to_string()];
        let mismatched = extractor.transform(&[swapped]).unwrap();
        assert!(
            matched.column("queryBodySimilarity").unwrap()[0]
                > mismatched.column("queryBodySimilarity").unwrap()[0]
        );
    }

    #[test]
    fn missing_header_tag_scores_exactly_zero() {
        let pages = training_pages();
        let extractor = small_config().fit(&pages).unwrap();
        // page with h1 only; h2 and h3 are absent entirely
        let page = RankedPage::new("http://example.com/no-h2")
            .with_query(["rust", "tutorial"])
            .with_body(["rust", "guide"])
            .with_title(["rust"])
            .add_header("h1", ["rust"]);
        let table = extractor.transform(&[page]).unwrap();
        assert_eq!(table.column("queryHeaderSimilarity_h2").unwrap()[0], 0.0);
        assert_eq!(table.column("queryHeaderSimilarity_h3").unwrap()[0], 0.0);
        assert!(table.column("queryHeaderSimilarity_h1").unwrap()[0] > 0.0);
    }

    #[test]
    fn fit_on_empty_collection_fails() {
        match small_config().fit(&[]) {
            Err(Error::Configuration(_)) => {}
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_latent_dimension_fails_at_fit() {
        let pages = training_pages();
        assert!(matches!(
            small_config().with_all_latent_dimensions(10_000).fit(&pages),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn custom_header_tags_shape_the_columns() {
        let pages = training_pages();
        let extractor = small_config()
            .with_header_tags(["h1"])
            .fit(&pages)
            .unwrap();
        let table = extractor.transform(&pages[..2]).unwrap();
        let names: Vec<&str> = table.column_names().collect();
        assert!(names.contains(&"queryHeaderSimilarity_h1"));
        assert!(!names.contains(&"queryHeaderSimilarity_h2"));
    }

    #[test]
    fn transform_is_repeatable() {
        let pages = training_pages();
        let extractor = small_config().fit(&pages).unwrap();
        let first = extractor.transform(&pages).unwrap();
        let second = extractor.transform(&pages).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cbor_round_trip_preserves_behavior() {
        let pages = training_pages();
        let extractor = small_config().fit(&pages).unwrap();
        let bytes = extractor.to_cbor().unwrap();
        let restored = TextFeatureExtractor::from_cbor(&bytes).unwrap();
        assert_eq!(
            extractor.transform(&pages).unwrap(),
            restored.transform(&pages).unwrap()
        );
    }
}
