use serde::{Deserialize, Serialize};

/// Options controlling which normalization steps run.
///
/// The steps always run in the same order, whatever combination is enabled:
/// 1. case folding (`lowercase`)
/// 2. ASCII punctuation removal (`remove_punctuation`)
/// 3. ASCII digit removal (`remove_numbers`)
/// 4. trimming surrounding whitespace (always)
///
/// Every step is idempotent, so normalizing already normalized text with the
/// same options returns it unchanged.
///
/// # Example
/// ```
/// use sentiflow::NormalizeOptions;
///
/// let options = NormalizeOptions::default()
///     .with_lowercase(true)
///     .with_remove_punctuation(true);
/// assert_eq!(options.normalize("  Great Movie!! "), "great movie");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub lowercase: bool,
    pub remove_punctuation: bool,
    pub remove_numbers: bool,
}

impl NormalizeOptions {
    /// Options used when nothing else is configured: lowercase and strip punctuation.
    pub fn standard() -> Self {
        Self {
            lowercase: true,
            remove_punctuation: true,
            remove_numbers: false,
        }
    }

    pub fn with_lowercase(mut self, enabled: bool) -> Self {
        self.lowercase = enabled;
        self
    }

    pub fn with_remove_punctuation(mut self, enabled: bool) -> Self {
        self.remove_punctuation = enabled;
        self
    }

    pub fn with_remove_numbers(mut self, enabled: bool) -> Self {
        self.remove_numbers = enabled;
        self
    }

    /// Applies the enabled steps to `text`. See [`normalize`].
    pub fn normalize(&self, text: &str) -> String {
        normalize(text, self)
    }

    /// Human readable list of enabled steps, in execution order.
    pub fn describe(&self) -> String {
        let mut steps = Vec::new();
        if self.lowercase {
            steps.push("lowercase");
        }
        if self.remove_punctuation {
            steps.push("remove-punctuation");
        }
        if self.remove_numbers {
            steps.push("remove-numbers");
        }
        steps.push("trim");
        steps.join(" -> ")
    }
}

/// Normalizes text for both preprocessing and serving.
///
/// This is the only implementation of the cleaning steps in the crate. The
/// preprocessor applies it to every dataset record and the inference service
/// applies it to every request, so the two can never drift apart.
pub fn normalize(text: &str, options: &NormalizeOptions) -> String {
    let mut out = if options.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };

    if options.remove_punctuation || options.remove_numbers {
        out.retain(|c| {
            !(options.remove_punctuation && c.is_ascii_punctuation()
                || options.remove_numbers && c.is_ascii_digit())
        });
    }

    let trimmed = out.trim();
    if trimmed.len() == out.len() {
        out
    } else {
        trimmed.to_string()
    }
}
