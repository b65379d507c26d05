use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Comparison key for CFC names: upper-cased, accents removed, trimmed.
/// A missing name normalizes to the empty string.
pub fn normalize_cfc(cfc: Option<&str>) -> String {
    match cfc {
        Some(value) => strip_diacritics(&value.to_uppercase()).trim().to_string(),
        None => String::new(),
    }
}

/// Orders person names the way a pt-BR collator would at primary strength,
/// falling back to code-point order so the result is total.
pub fn collate_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(value: &str) -> String {
    strip_diacritics(&value.to_lowercase())
}
