//! Mapping raw OCR output onto the Vietnamese plate format.
//!
//! A plate reads `NNL-NNNN` or `NNL-NN.NNN`: a two digit province code, one
//! series letter and a numeric suffix. OCR mixes up look-alike glyphs, and it
//! does so in both directions, so the correction table depends on whether a
//! position must hold a digit or a letter.
//!
//! Normalizing an already formatted plate is not a no-op: the cleaning step
//! drops `-` and `.`, so `normalize_plate_text("30A-12.345")` reformats the
//! bare characters rather than returning its input untouched.

/// Returned when the text is too short to be a plate.
pub const NOT_AVAILABLE: &str = "N/A";

/// Fewer cleaned characters than this and the text is discarded.
const MIN_PLATE_CHARS: usize = 4;
/// From this length on the text is split into prefix, series and suffix.
const FULL_PLATE_CHARS: usize = 7;

/// Corrections for positions that must hold a digit.
const LETTER_TO_DIGIT: [(char, char); 8] = [
    ('B', '8'), ('O', '0'), ('I', '1'), ('S', '5'),
    ('A', '4'), ('X', '8'), ('J', '3'), ('G', '6'),
];

/// Corrections for the series position, which must hold a letter.
const DIGIT_TO_LETTER: [(char, char); 7] = [
    ('8', 'B'), ('4', 'A'), ('0', 'O'), ('1', 'I'),
    ('5', 'S'), ('6', 'G'), ('7', 'H'),
];

fn lookup(table: &[(char, char)], c: char) -> char {
    table.iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

/// Upper-case `raw` and keep only `A-Z` and `0-9`.
pub fn clean_text(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Number of letters left after [`clean_text`].
pub fn count_letters(raw: &str) -> usize {
    clean_text(raw).chars().filter(|c| c.is_ascii_alphabetic()).count()
}

/// Normalize raw OCR text into the canonical plate string.
///
/// Only text shorter than four cleaned characters yields [`NOT_AVAILABLE`].
/// Anything that cannot be made to fit the plate shape comes back cleaned
/// but otherwise unchanged.
pub fn normalize_plate_text(raw: &str) -> String {
    let text = clean_text(raw);
    if text.len() < MIN_PLATE_CHARS {
        return NOT_AVAILABLE.to_string();
    }
    if text.len() < FULL_PLATE_CHARS {
        return text;
    }

    // cleaned text is ascii, byte slicing is safe
    let (prefix, rest) = text.split_at(2);
    let (series, suffix) = rest.split_at(1);

    let prefix: String = prefix.chars().map(|c| lookup(&LETTER_TO_DIGIT, c)).collect();
    let suffix: String = suffix.chars().map(|c| lookup(&LETTER_TO_DIGIT, c)).collect();
    let series = series.chars()
        .map(|c| if c.is_ascii_digit() { lookup(&DIGIT_TO_LETTER, c) } else { c })
        .next()
        .unwrap_or_default();

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(&prefix) || !series.is_ascii_alphabetic() || !all_digits(&suffix) {
        return text;
    }

    match suffix.len() {
        4 => format!("{}{}-{}.{}", prefix, series, &suffix[..1], &suffix[1..]),
        5 => format!("{}{}-{}.{}", prefix, series, &suffix[..2], &suffix[2..]),
        _ => format!("{}{}-{}", prefix, series, suffix),
    }
}
