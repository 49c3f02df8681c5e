/// Minimum number of characters a token needs to be kept.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Splits text into word tokens.
///
/// A token is a maximal run of alphanumeric or `_` characters that is at least
/// [`MIN_TOKEN_CHARS`] characters long. The tokenizer does not change case;
/// casing is the normalizer's job.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = 0usize;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() || ch == '_' {
            if start.is_none() {
                start = Some(idx);
                chars = 0;
            }
            chars += 1;
        } else if let Some(s) = start.take() {
            if chars >= MIN_TOKEN_CHARS {
                tokens.push(&text[s..idx]);
            }
        }
    }
    if let Some(s) = start {
        if chars >= MIN_TOKEN_CHARS {
            tokens.push(&text[s..]);
        }
    }

    tokens
}

/// Builds the terms of a document: unigrams, followed by space-joined
/// n-grams up to `ngram_max`.
pub fn terms(text: &str, ngram_max: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let mut out: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    for n in 2..=ngram_max {
        if tokens.len() < n {
            break;
        }
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}
