//! Text cleanup for assembled blocks.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const LIGATURES: [(&str, &str); 7] = [
    ("\u{FB00}", "ff"),
    ("\u{FB01}", "fi"),
    ("\u{FB02}", "fl"),
    ("\u{FB03}", "ffi"),
    ("\u{FB04}", "ffl"),
    ("\u{FB05}", "st"),
    ("\u{FB06}", "st"),
];

fn spaces_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid regex"))
}

fn hyphenation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\p{L}])-\n\s*([\p{Ll}])").expect("valid regex"))
}

fn stray_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[, .]*\s*$").expect("valid regex"))
}

fn negative_dollar_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\(\$\s*(\d+)\s*\)$").expect("valid regex"))
}

fn dollar_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\s*(-?)(\d+)$").expect("valid regex"))
}

fn zero_dollar_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\s*-?\s*0\s*\.?\s*00$").expect("valid regex"))
}

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)%$").expect("valid regex"))
}

/// Check if a character belongs to a script written without word spaces.
///
/// Chinese and Japanese don't use spaces between words; Korean does, so
/// Hangul is not included.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and Extension A
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        // Extensions B-F
        || (0x20000..=0x2EBEF).contains(&code)
        // Hiragana, Katakana
        || (0x3040..=0x30FF).contains(&code)
        // CJK Symbols and Punctuation
        || (0x3000..=0x303F).contains(&code)
}

/// Normalize block text: NFC, ligatures, collapsed spaces, de-hyphenated
/// line breaks, no blank lines. Single line breaks survive as paragraph
/// breaks.
pub fn normalize(text: &str) -> String {
    let mut result: String = text.nfc().collect();
    for (ligature, replacement) in LIGATURES {
        result = result.replace(ligature, replacement);
    }
    result = result.replace('\u{FFFD}', "");
    result = hyphenation_regex().replace_all(&result, "$1$2").to_string();

    result
        .lines()
        .map(|line| spaces_regex().replace_all(line.trim(), " ").to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append `next` to `acc`, separated by a space unless either side is a
/// spaceless script or already carries whitespace.
pub fn join_inline(acc: &mut String, next: &str) {
    let needs_space = match (acc.chars().last(), next.chars().next()) {
        (Some(prev), Some(first)) => {
            !prev.is_whitespace()
                && !first.is_whitespace()
                && !(is_spaceless_script_char(prev) && is_spaceless_script_char(first))
        }
        _ => false,
    };
    if needs_space {
        acc.push(' ');
    }
    acc.push_str(next);
}

/// Append `next` as a new visual line of the same block.
///
/// A line ending in a word hyphen joined to a lowercase continuation is
/// de-hyphenated; otherwise lines of one block join with a space.
pub fn join_lines(acc: &mut String, next: &str) {
    let next = next.trim_start();
    let prev_hyphenated = acc.ends_with('-')
        && acc
            .chars()
            .rev()
            .nth(1)
            .is_some_and(char::is_alphabetic);
    if prev_hyphenated && next.chars().next().is_some_and(char::is_lowercase) {
        acc.pop();
        acc.push_str(next);
    } else {
        join_inline(acc, next);
    }
}

/// First `max` characters of `text`, with "..." when cut.
pub fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// `text` cut to `max` characters on a word boundary where possible.
pub fn truncate(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    if flat.chars().nth(max) == Some(' ') {
        return cut;
    }
    match cut.rfind(' ') {
        Some(pos) if cut[..pos].chars().count() > max / 2 => cut[..pos].to_string(),
        _ => cut,
    }
}

/// Whether the text ends a sentence.
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | ':' | '。' | '！' | '？'))
}

/// Clean the text of one table cell.
///
/// Cells come out of table detection with a stray last line holding only
/// punctuation, and with the decimal point of amounts and percentages
/// pushed onto its own line. The stray line is dropped; when the cell was
/// split over lines, a bare `$1234` reads as `$12.34` and `125%` as `12.5%`.
/// The result is a single line.
pub fn clean_cell(raw: &str) -> String {
    let split = raw.contains('\n');
    let stripped = stray_line_regex().replace(raw, "");
    let flat = normalize(&stripped).replace('\n', " ");

    if split {
        if let Some(caps) = negative_dollar_regex().captures(&flat) {
            return dollars(&caps[1], true);
        }
        if let Some(caps) = dollar_regex().captures(&flat) {
            return dollars(&caps[2], !caps[1].is_empty());
        }
        if let Some(caps) = percent_regex().captures(&flat) {
            let digits = &caps[1];
            if digits.len() >= 2 {
                let (whole, tenths) = digits.split_at(digits.len() - 1);
                return format!("{}.{}%", whole, tenths);
            }
        }
    }
    if zero_dollar_regex().is_match(&flat) {
        return "$0.00".to_string();
    }
    flat
}

/// Format a run of digits whose last two are cents.
fn dollars(digits: &str, negative: bool) -> String {
    let amount = if digits.len() <= 2 {
        format!("0.{:0>2}", digits)
    } else {
        let (whole, cents) = digits.split_at(digits.len() - 2);
        format!("{}.{}", thousands(whole), cents)
    };
    if negative {
        format!("(${})", amount)
    } else {
        format!("${}", amount)
    }
}

fn thousands(digits: &str) -> String {
    let digits = match digits.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ligatures_and_nfc() {
        assert_eq!(normalize("\u{FB01}nd the \u{FB02}ow"), "find the flow");
        assert_eq!(normalize("e\u{0301}"), "é");
    }

    #[test]
    fn test_clean_cell_drops_stray_lines() {
        assert_eq!(clean_cell("Revenue\n."), "Revenue");
        assert_eq!(clean_cell("  North\n  region "), "North region");
        assert_eq!(clean_cell("1,200\n, ."), "1,200");
    }

    #[test]
    fn test_clean_cell_repairs_split_amounts() {
        assert_eq!(clean_cell("$ 1234\n."), "$12.34");
        assert_eq!(clean_cell("$ 123456\n,"), "$1,234.56");
        assert_eq!(clean_cell("$ -1234\n."), "($12.34)");
        assert_eq!(clean_cell("($ 5\n)"), "($0.05)");
        assert_eq!(clean_cell("125%\n."), "12.5%");
        assert_eq!(clean_cell("$ - 0 . 00"), "$0.00");
    }

    #[test]
    fn test_clean_cell_keeps_whole_amounts() {
        assert_eq!(clean_cell("$1200"), "$1200");
        assert_eq!(clean_cell("125%"), "125%");
        assert_eq!(clean_cell("5%\n."), "5%");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize("  a   b\t c \n\n\n d  "), "a b c\nd");
    }

    #[test]
    fn test_normalize_hyphenation() {
        assert_eq!(normalize("infor-\nmation"), "information");
        assert_eq!(normalize("Jean-\nLuc"), "Jean-\nLuc");
    }

    #[test]
    fn test_join_inline() {
        let mut s = String::from("Hello");
        join_inline(&mut s, "World");
        assert_eq!(s, "Hello World");

        let mut cjk = String::from("日本");
        join_inline(&mut cjk, "語");
        assert_eq!(cjk, "日本語");

        let mut korean = String::from("안녕");
        join_inline(&mut korean, "하세요");
        assert_eq!(korean, "안녕 하세요");
    }

    #[test]
    fn test_join_lines_dehyphenates() {
        let mut s = String::from("a long infor-");
        join_lines(&mut s, "mation flow");
        assert_eq!(s, "a long information flow");

        let mut t = String::from("page -");
        join_lines(&mut t, "break");
        assert_eq!(t, "page - break");
    }

    #[test]
    fn test_snippet_and_truncate() {
        assert_eq!(snippet("short text", 60), "short text");
        assert_eq!(snippet("abcdefghij", 4), "abcd...");
        assert_eq!(truncate("one two three four", 13), "one two three");
        assert_eq!(truncate("abcdefghij", 4), "abcd");
    }

    #[test]
    fn test_truncate_counts_characters() {
        // 3 characters before the space but 9 bytes.
        assert_eq!(truncate("日本語 テキストです", 8), "日本語 テキスト");
        assert_eq!(truncate("ééé ééééééé", 8), "ééé éééé");
        assert_eq!(truncate("ééééé ééééé", 8), "ééééé");
    }

    #[test]
    fn test_ends_sentence() {
        assert!(ends_sentence("Done."));
        assert!(!ends_sentence("continues on the next"));
        assert!(!ends_sentence(""));
    }
}
