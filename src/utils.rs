const FOLD_TABLE: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵäå", 'a'),
    ("èéẹẻẽêềếệểễë", 'e'),
    ("ìíịỉĩïî", 'i'),
    ("òóọỏõôồốộổỗơờớợởỡö", 'o'),
    ("ùúụủũưừứựửữüû", 'u'),
    ("ỳýỵỷỹÿ", 'y'),
    ("đ", 'd'),
    ("ç", 'c'),
    ("ñ", 'n'),
];

/// Lowercases `input` and strips diacritics, including combining marks.
pub fn fold_diacritics(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .map(fold_char)
        .collect()
}

fn fold_char(c: char) -> char {
    if c.is_ascii() {
        return c;
    }
    FOLD_TABLE
        .iter()
        .find(|(accented, _)| accented.contains(c))
        .map(|(_, base)| *base)
        .unwrap_or(c)
}

/// Folds text and collapses every run of non-alphanumerics into one space,
/// so phrases can be matched on word boundaries.
pub fn normalize_phrase(input: &str) -> String {
    fold_diacritics(input)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `phrase` occurs in `haystack` as whole words. Both must already be normalised.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", phrase))
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Cuts `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// `a / b * 100`, or 0 when the denominator is not positive.
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

pub fn format_count(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
