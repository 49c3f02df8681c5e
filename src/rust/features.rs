//! TF-IDF feature transform.
//!
//! The transform is fitted once on the training corpus and then stored inside
//! the model artifact, so training, evaluation and serving all map text to the
//! same vector space.

use log::debug;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ClassifierError;
use crate::text::terms;

/// Sparse feature vector with indices in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product with a dense row. Indices past the end of `row` are ignored.
    pub fn dot(&self, row: ArrayView1<f32>) -> f32 {
        self.iter()
            .filter_map(|(idx, value)| row.get(idx).map(|w| w * value))
            .sum()
    }
}

/// Options for fitting a [`TfidfTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TfidfOptions {
    pub max_features: usize,
    pub ngram_max: usize,
    pub min_df: usize,
}

impl Default for TfidfOptions {
    fn default() -> Self {
        Self {
            max_features: 10_000,
            ngram_max: 1,
            min_df: 1,
        }
    }
}

/// Fitted vocabulary plus inverse document frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfTransform {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f32>,
    ngram_max: usize,
}

impl TfidfTransform {
    /// Fits the vocabulary and idf weights on `documents`.
    ///
    /// Terms must appear in at least `min_df` documents. When more than
    /// `max_features` terms qualify, the most frequent across the corpus are
    /// kept (ties broken alphabetically). Kept terms are indexed in
    /// alphabetical order and weighted with the smoothed idf
    /// `ln((1 + n) / (1 + df)) + 1`.
    ///
    /// # Returns
    /// * `Err(ClassifierError::ValidationError)` if no term survives, e.g. a
    ///   corpus of empty strings.
    pub fn fit<S: AsRef<str>>(documents: &[S], options: &TfidfOptions) -> Result<Self, ClassifierError> {
        let mut corpus_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let doc_terms = terms(doc.as_ref(), options.ngram_max);
            let mut seen: HashSet<&str> = HashSet::new();
            for term in &doc_terms {
                *corpus_freq.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut candidates: Vec<(&String, usize)> = corpus_freq
            .iter()
            .filter(|(term, _)| doc_freq.get(*term).copied().unwrap_or(0) >= options.min_df)
            .map(|(term, &freq)| (term, freq))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        candidates.truncate(options.max_features);

        if candidates.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Training data contains no usable tokens".into(),
            ));
        }

        let mut kept: Vec<&String> = candidates.into_iter().map(|(term, _)| term).collect();
        kept.sort();

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (index, term) in kept.into_iter().enumerate() {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
            idf.push((((1.0 + n) / (1.0 + df)).ln() + 1.0) as f32);
            vocabulary.insert(term.clone(), index);
        }

        debug!(
            "Fitted TF-IDF over {} documents: {} of {} terms kept",
            documents.len(),
            vocabulary.len(),
            corpus_freq.len()
        );

        Ok(Self {
            vocabulary,
            idf,
            ngram_max: options.ngram_max,
        })
    }

    /// Maps text to an L2-normalized TF-IDF vector. Unknown terms are ignored,
    /// so text with no known terms yields an empty vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for term in terms(text, self.ngram_max) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector = SparseVector {
            indices: Vec::with_capacity(counts.len()),
            values: Vec::with_capacity(counts.len()),
        };
        for (index, count) in counts {
            vector.indices.push(index);
            vector.values.push(count * self.idf[index]);
        }

        let norm = vector.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-10 {
            vector.values.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    pub fn transform_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SparseVector> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }

    /// Number of dimensions of the output vectors.
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn ngram_max(&self) -> usize {
        self.ngram_max
    }

    /// Checks the internal consistency of a deserialized transform.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(ClassifierError::ModelStateError(format!(
                "vocabulary has {} terms but {} idf weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }
        let mut seen = vec![false; self.idf.len()];
        for &index in self.vocabulary.values() {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(ClassifierError::ModelStateError(format!(
                        "vocabulary index {} is out of range or duplicated",
                        index
                    )))
                }
            }
        }
        if !(1..=2).contains(&self.ngram_max) {
            return Err(ClassifierError::ModelStateError(format!(
                "unsupported ngram_max {}",
                self.ngram_max
            )));
        }
        if self.idf.iter().any(|w| !w.is_finite()) {
            return Err(ClassifierError::ModelStateError("non-finite idf weight".into()));
        }
        Ok(())
    }
}
