//! Name normalization shared by the catalog index, the matcher and the
//! aggregation keys.

/// Trailing tokens that only restate the unit of an ingredient
/// ("Цукор, кг", "Борошно (г)").
const UNIT_MARKERS: &[&str] = &[
    "кг", "г", "гр", "л", "мл", "шт", "kg", "g", "gr", "l", "ml", "pcs", "pc",
];

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '’' | 'ʼ' | '`')
}

/// Case-folds, strips punctuation and collapses whitespace.
///
/// Apostrophes are dropped without a gap so that "м'ясо" and "мясо" agree;
/// any other punctuation acts as a word separator.
pub fn normalize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !is_apostrophe(*c))
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Aggregation key of an ingredient: the normalized name without trailing
/// unit markers. A name made only of a unit marker is kept as is.
pub fn ingredient_key(raw: &str) -> String {
    let normalized = normalize_name(raw);
    let mut tokens: Vec<&str> = normalized.split(' ').collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| UNIT_MARKERS.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}
