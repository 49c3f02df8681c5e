//! Text handling shared by every stage: normalization and tokenization.

mod normalize;
mod tokenize;

pub use normalize::{normalize, NormalizeOptions};
pub use tokenize::{terms, tokenize, MIN_TOKEN_CHARS};
