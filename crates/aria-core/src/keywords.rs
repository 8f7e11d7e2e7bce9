//! Keyword normalization shared by the store's inverted index and topic
//! extraction. Keywords are lowercase with Spanish accents folded, so
//! "Tecnología" and "tecnologia" index the same.

use std::collections::BTreeSet;

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        other => other,
    }
}

/// Normalize one keyword. Returns `None` when nothing meaningful remains.
pub fn normalize_keyword(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_char)
        .collect();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Normalize and deduplicate a keyword list.
pub fn normalize_keywords<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|k| normalize_keyword(k.as_ref()))
        .collect()
}

/// Split free text into normalized word tokens. Punctuation (including the
/// Spanish opening marks) separates words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter_map(normalize_keyword)
        .collect()
}
