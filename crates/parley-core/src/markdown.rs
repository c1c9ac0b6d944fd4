//! Cosmetic cleanup of model output before display.

const REPLACEMENTS: &[(&str, &str)] = &[
    ("::", ":"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{2013}", "-"),
    ("  ", " "),
    ("\n\n\n", "\n\n"),
    ("\n- ", "\n• "),
    ("\n* ", "\n• "),
];

/// Normalizes typographic quotes and dashes, squeezes stray whitespace and
/// turns `-`/`*` list markers into bullets. Applied in a single pass per rule.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for &(from, to) in REPLACEMENTS {
        cleaned = cleaned.replace(from, to);
    }

    // a reply that opens with a list has no preceding newline
    if let Some(rest) = cleaned.strip_prefix("- ").or_else(|| cleaned.strip_prefix("* ")) {
        cleaned = format!("• {rest}");
    }

    cleaned
}
