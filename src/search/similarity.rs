/// Similarity between two already-normalized names, in `[0, 1]`.
pub trait Similarity {
    fn ratio(&self, candidate: &str, reference: &str) -> f64;
}

/// Edit-distance ratio: `1 - levenshtein / max(len)`, counted in chars.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl Similarity for NormalizedLevenshtein {
    fn ratio(&self, candidate: &str, reference: &str) -> f64 {
        strsim::normalized_levenshtein(candidate, reference)
    }
}

impl<F> Similarity for F
where
    F: Fn(&str, &str) -> f64,
{
    fn ratio(&self, candidate: &str, reference: &str) -> f64 {
        self(candidate, reference)
    }
}
