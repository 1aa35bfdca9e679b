//! Normalisation of counting posts written with non-ASCII digits, typographic
//! operators or Roman numerals.

/// Zero code point of each supported decimal digit block.
const DIGIT_ZEROS: &[u32] = &[
    0x0660,  // Arabic-Indic
    0x06F0,  // Extended Arabic-Indic
    0x07C0,  // NKo
    0x0966,  // Devanagari
    0x09E6,  // Bengali
    0x0A66,  // Gurmukhi
    0x0AE6,  // Gujarati
    0x0B66,  // Oriya
    0x0BE6,  // Tamil
    0x0C66,  // Telugu
    0x0CE6,  // Kannada
    0x0D66,  // Malayalam
    0x0E50,  // Thai
    0x0ED0,  // Lao
    0x0F20,  // Tibetan
    0x1040,  // Myanmar
    0x17E0,  // Khmer
    0x1810,  // Mongolian
    0xFF10,  // Fullwidth
    0x1D7CE, // Mathematical bold
];

const ROMAN: &[(u32, &str)] = &[
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

fn ascii_digit(c: char) -> Option<char> {
    let code = u32::from(c);
    DIGIT_ZEROS
        .iter()
        .find(|zero| (**zero..**zero + 10).contains(&code))
        .and_then(|zero| char::from_digit(code - zero, 10))
}

fn ascii_operator(c: char) -> Option<char> {
    match c {
        '×' | '✕' | '·' | '∗' | '＊' => Some('*'),
        '÷' | '∕' | '／' => Some('/'),
        '−' | '–' | '－' => Some('-'),
        '＋' => Some('+'),
        '（' => Some('('),
        '）' => Some(')'),
        _ => None,
    }
}

/// Parse a canonical Roman numeral (case-insensitive). Non-canonical forms
/// such as `IIII` or `VX` are rejected.
#[must_use]
pub fn parse_roman(input: &str) -> Option<u32> {
    if input.is_empty() {
        return None;
    }
    let upper = input.to_ascii_uppercase();
    let mut rest = upper.as_str();
    let mut total = 0;
    for (value, symbol) in ROMAN {
        while let Some(stripped) = rest.strip_prefix(symbol) {
            total += value;
            rest = stripped;
        }
    }
    if !rest.is_empty() || to_roman(total) != upper {
        return None;
    }
    Some(total)
}

fn to_roman(mut value: u32) -> String {
    let mut out = String::new();
    for (step, symbol) in ROMAN {
        while value >= *step {
            out.push_str(symbol);
            value -= step;
        }
    }
    out
}

fn is_roman_letter(c: char) -> bool {
    matches!(
        c.to_ascii_uppercase(),
        'I' | 'V' | 'X' | 'L' | 'C' | 'D' | 'M'
    )
}

/// Rewrite `input` into the ASCII form understood by the expression parser.
///
/// Letters that do not form a valid Roman numeral are left untouched so the
/// parser reports them.
#[must_use]
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut word = String::new();
    for c in input.chars() {
        if c.is_ascii_alphabetic() {
            word.push(c);
            continue;
        }
        flush_word(&mut word, &mut out);
        if let Some(d) = ascii_digit(c) {
            out.push(d);
        } else if let Some(op) = ascii_operator(c) {
            out.push(op);
        } else {
            out.push(c);
        }
    }
    flush_word(&mut word, &mut out);
    out
}

fn flush_word(word: &mut String, out: &mut String) {
    if word.is_empty() {
        return;
    }
    match word.chars().all(is_roman_letter).then(|| parse_roman(word)).flatten() {
        Some(value) => out.push_str(&value.to_string()),
        None => out.push_str(word),
    }
    word.clear();
}
