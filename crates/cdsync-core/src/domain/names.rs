//! Name normalization
//!
//! Every name comparison between local and remote nodes goes through
//! [`normalize_name`]. The fold is ASCII-only lower-casing: it is locale
//! naive and does not attempt Unicode case folding, so `"Ä"` and `"ä"`
//! are distinct names while `"IMG.JPG"` and `"img.jpg"` are equal.

/// Folds a name for comparison (ASCII lower-case, everything else untouched).
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Returns true if two names are equal after [`normalize_name`].
#[must_use]
pub fn names_match(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}
