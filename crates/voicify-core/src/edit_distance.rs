//! Case-insensitive Levenshtein distance used to rank spoken phrases
//! against recorded command names.

/// Edit distance between `a` and `b` after trimming and lowercasing both.
///
/// Insert, delete and substitute all cost one and are counted per
/// character. The result is symmetric and zero only when the normalized
/// strings are equal.
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(&normalize(a), &normalize(b))
}

fn normalize(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}
