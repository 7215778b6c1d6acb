use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters removed from amount strings before separator disambiguation.
const AMOUNT_NOISE: &[char] = &[
    '€', '$', '£', ' ', '\u{00A0}', '\u{202F}', '\u{2009}', '\u{2007}', '\t',
];

/// Canonical form used for category keys, keywords and article text.
///
/// Decomposes accents and drops the combining marks, expands the `œ`/`æ`
/// ligatures, lower-cases and collapses whitespace runs to one space.
///
/// # Examples
/// - `"  Élévâtèür  "` → `"elevateur"`
/// - `"Café   crème"` → `"cafe creme"`
/// - `"Œuvre"` → `"oeuvre"`
pub fn normalize_text(input: &str) -> String {
    let stripped: String = input
        .nfd()
        .flat_map(char::to_lowercase)
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let expanded = stripped.replace('œ', "oe").replace('æ', "ae");

    expanded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a locale-formatted amount such as `"1 234,56 €"` or `"1,234.50"`.
///
/// When both `,` and `.` appear, whichever comes last is the decimal separator
/// and the other one is a thousands separator. A lone `,` is a decimal comma.
/// Returns `None` instead of failing when the text is not a finite number.
pub fn parse_euro(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| !AMOUNT_NOISE.contains(c)).collect();

    if cleaned.is_empty() {
        return None;
    }

    let canonical = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Splits a comma-separated keyword field into normalized, non-empty tokens.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_text)
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_strips_accents() {
        assert_eq!(normalize_text("  Élévâtèür  "), "elevateur");
        assert_eq!(normalize_text("Café crème"), "cafe creme");
        assert_eq!(normalize_text("NOËL"), "noel");
    }

    #[test]
    fn test_normalize_text_ligatures_and_whitespace() {
        assert_eq!(normalize_text("Œuvre  d'art"), "oeuvre d'art");
        assert_eq!(normalize_text("Ex\tæquo\n\nlatin"), "ex aequo latin");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_normalize_text_idempotent() {
        for input in ["  Élévâtèür  ", "Cœur  de  BŒUF", "déjà vu", "plain"] {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once);
        }
    }

    #[test]
    fn test_parse_euro_french_format() {
        assert!((parse_euro("1 234,56").unwrap() - 1234.56).abs() < 1e-9);
        assert!((parse_euro("2 000").unwrap() - 2000.0).abs() < 1e-9);
        assert!((parse_euro("1\u{202F}500,00 €").unwrap() - 1500.0).abs() < 1e-9);
        assert!((parse_euro("12,5").unwrap() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_euro_mixed_separators() {
        assert!((parse_euro("1,234.50").unwrap() - 1234.5).abs() < 1e-9);
        assert!((parse_euro("1.234,50").unwrap() - 1234.5).abs() < 1e-9);
        assert!((parse_euro("$1,000,000.25").unwrap() - 1_000_000.25).abs() < 1e-6);
        assert!((parse_euro("42.75").unwrap() - 42.75).abs() < 1e-9);
    }

    #[test]
    fn test_parse_euro_rejects_garbage() {
        assert_eq!(parse_euro(""), None);
        assert_eq!(parse_euro("  € "), None);
        assert_eq!(parse_euro("abc"), None);
        assert_eq!(parse_euro("inf"), None);
        assert_eq!(parse_euro("NaN"), None);
    }

    #[test]
    fn test_split_keywords() {
        assert_eq!(
            split_keywords("Ciment, Béton ,, ,PARPAING"),
            vec!["ciment", "beton", "parpaing"]
        );
        assert!(split_keywords("").is_empty());
    }
}
