//! Label normalization
//!
//! Converts heterogeneous multi-label hate-speech annotations into the
//! canonical binary label. The KMHAS annotation scheme uses numeric category
//! codes 0..=7 for hate categories and the reserved code `"8"` for "no
//! applicable category".

use haetae_core::{Error, Label, Result};

/// Reserved category code meaning "no applicable category"
pub const NO_CATEGORY_CODE: u8 = 8;

/// Highest valid category code
const MAX_CATEGORY_CODE: u8 = 8;

/// Normalize a sequence of category codes to a binary label.
///
/// This is a logical OR over categories, not a majority vote: a single
/// qualifying category marks the example as hate. An empty sequence (or one
/// containing only the reserved code) is clean.
///
/// Malformed codes never silently become clean; they fail with
/// [`Error::MalformedLabel`] so the caller can decide to skip or abort.
pub fn normalize<S: AsRef<str>>(raw_labels: &[S]) -> Result<Label> {
    let mut label = Label::Clean;

    for raw in raw_labels {
        let code = raw.as_ref().trim();
        // Trailing separators produce empty tokens in the source data.
        if code.is_empty() {
            continue;
        }

        let parsed: u8 = code
            .parse()
            .ok()
            .filter(|c| *c <= MAX_CATEGORY_CODE)
            .ok_or_else(|| Error::malformed_label(code, "category code"))?;

        if parsed != NO_CATEGORY_CODE {
            label = Label::Hate;
        }
    }

    Ok(label)
}

/// Normalize a comma-separated category code field from a raw file.
pub fn normalize_field(field: &str) -> Result<Label> {
    let codes: Vec<&str> = field.split(',').collect();
    normalize(&codes)
}
