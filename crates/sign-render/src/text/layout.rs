//! Line generation for the text band
//!
//! Everything here is pure: widths come from a [`TextMeasure`] so the
//! algorithms can be exercised with a fixed-pitch mock.

use log::warn;

use crate::constants::{
    MAX_FILL_CHARS, PAIRED_OVERSHOOT_LIMIT_PX, PAIRED_WIDTH_TOLERANCE_PX, UNDERSCORES_PER_DIGIT,
};
use crate::types::TextMode;

/// Label prefix of unit lines
pub const UNIT_PREFIX: &str = "OV: ";
/// Label prefix of place lines
pub const PLACE_PREFIX: &str = "Ort: ";
/// Label prefix of empty call-name lines
pub const CALL_PREFIX: &str = "Ruf: ";

/// Pixel width of a single text line
pub trait TextMeasure {
    fn width(&self, text: &str) -> f32;
}

/// Parameters of placeholder generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderParams {
    pub unit_len: usize,
    pub call_len: usize,
    pub strength_digits: [u8; 4],
}

/// Strength placeholder: one group of underscores per digit group, joined by `/`
pub fn strength_placeholder(digits: &[u8; 4]) -> String {
    digits
        .iter()
        .map(|d| "_".repeat(*d as usize * UNDERSCORES_PER_DIGIT))
        .collect::<Vec<_>>()
        .join("/")
}

/// Append `_` to `prefix` as long as the line stays within `max_width`
pub fn fill_to_width(prefix: &str, max_width: f32, m: &dyn TextMeasure) -> String {
    let mut line = prefix.to_string();
    for _ in 0..MAX_FILL_CHARS {
        let candidate = format!("{line}_");
        if m.width(&candidate) > max_width {
            break;
        }
        line = candidate;
    }
    line
}

/// Append spaces until `line` reaches `target`. A space that would overshoot
/// the target by more than the overshoot limit is not added.
pub fn pad_to_width(line: &str, target: f32, m: &dyn TextMeasure) -> String {
    let mut out = line.to_string();
    for _ in 0..MAX_FILL_CHARS {
        if m.width(&out) >= target {
            break;
        }
        let candidate = format!("{out} ");
        if m.width(&candidate) > target + PAIRED_OVERSHOOT_LIMIT_PX {
            break;
        }
        out = candidate;
    }
    out
}

/// Label line over strength line, padded to a common width.
///
/// Without a name the label is filled with `_` up to the strength width.
pub fn paired_lines(
    prefix: &str,
    name: Option<&str>,
    strength: &str,
    max_width: f32,
    m: &dyn TextMeasure,
) -> [String; 2] {
    let strength_width = m.width(strength);
    let label = match name {
        Some(name) => {
            let label = format!("{prefix}{name}");
            if m.width(&label) > max_width {
                warn!(
                    "'{}' is {:.0}px wide, canvas only {:.0}px",
                    label,
                    m.width(&label),
                    max_width
                );
            }
            label
        }
        None => fill_to_width(prefix, strength_width, m),
    };

    let target = m.width(&label).max(strength_width);
    let first = pad_to_width(&label, target, m);
    let second = pad_to_width(strength, target, m);

    let diff = (m.width(&first) - m.width(&second)).abs();
    if diff > PAIRED_WIDTH_TOLERANCE_PX {
        warn!(
            "Paired lines differ by {:.1}px: '{}' / '{}'",
            diff,
            first.trim_end(),
            second.trim_end()
        );
    }
    [first, second]
}

fn midpoint_split(text: &str) -> [String; 2] {
    let chars: Vec<char> = text.chars().collect();
    let mid = chars.len() / 2;
    [
        chars[..mid].iter().collect(),
        chars[mid..].iter().collect(),
    ]
}

/// Best word split of `text` into two lines no wider than `max_width`.
///
/// Hyphens count as break opportunities and stay on the first line. Among
/// valid splits the one with the longest first line wins.
fn word_split(text: &str, max_width: f32, m: &dyn TextMeasure) -> Option<[String; 2]> {
    let spaced = text.replace('-', "- ");
    let words: Vec<&str> = spaced.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    let mut best = None;
    for i in 1..words.len() {
        let first = join_words(&words[..i]);
        if m.width(&first) > max_width {
            break;
        }
        let second = join_words(&words[i..]);
        if m.width(&second) <= max_width {
            best = Some([first, second]);
        }
    }
    best
}

fn join_words(words: &[&str]) -> String {
    let mut out = String::new();
    for word in words {
        if !out.is_empty() && !out.ends_with('-') {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Wrap `text` onto at most two lines.
///
/// Text that fits yields `["", text]` so the single line sits on the bottom
/// baseline. Otherwise words are packed greedily; without a usable word
/// boundary the text is split at its character midpoint.
pub fn wrap_two_lines(text: &str, max_width: f32, m: &dyn TextMeasure) -> [String; 2] {
    if m.width(text) <= max_width {
        return [String::new(), text.to_string()];
    }
    word_split(text, max_width, m).unwrap_or_else(|| midpoint_split(text))
}

/// Outcome of a pre-flight fit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFit {
    pub fits: bool,
    pub warning: Option<String>,
    pub estimated_lines: usize,
}

impl TextFit {
    fn ok(lines: usize) -> Self {
        Self {
            fits: true,
            warning: None,
            estimated_lines: lines,
        }
    }

    fn overflow(lines: usize, warning: String) -> Self {
        Self {
            fits: false,
            warning: Some(warning),
            estimated_lines: lines,
        }
    }
}

/// Check whether `text` fits into `max_lines` lines of `max_width`
pub fn validate_fits(text: &str, max_width: f32, max_lines: usize, m: &dyn TextMeasure) -> TextFit {
    let text = text.trim();
    if text.is_empty() {
        return TextFit::ok(0);
    }
    let width = m.width(text);
    if width <= max_width {
        return TextFit::ok(1);
    }
    if max_lines <= 1 {
        return TextFit::overflow(
            2,
            format!(
                "'{text}' needs {width:.0}px but only one line of {max_width:.0}px is available"
            ),
        );
    }

    if text.split_whitespace().count() < 2 && !text.contains('-') {
        let [first, second] = midpoint_split(text);
        if m.width(&first) <= max_width && m.width(&second) <= max_width {
            return TextFit::ok(2);
        }
        return TextFit::overflow(
            3,
            format!("'{text}' is too long even when split into two lines"),
        );
    }

    match word_split(text, max_width, m) {
        Some(_) => TextFit::ok(2),
        None => TextFit::overflow(
            3,
            format!("'{text}' does not fit on two lines of {max_width:.0}px"),
        ),
    }
}

/// Display text derived from a template file stem
pub fn stem_to_text(stem: &str) -> String {
    stem.replace('_', " ").trim().to_string()
}

/// Generate the two text lines of `mode`.
///
/// `stem` is the template's file stem, used by the file-name mode.
/// Graphic-only mode yields two empty lines.
pub fn lines_for_mode(
    mode: &TextMode,
    stem: Option<&str>,
    params: &PlaceholderParams,
    max_width: f32,
    m: &dyn TextMeasure,
) -> [String; 2] {
    let strength = strength_placeholder(&params.strength_digits);
    let user_text = mode.user_text();
    match mode {
        TextMode::UnitStrength { .. } => {
            paired_lines(UNIT_PREFIX, user_text, &strength, max_width, m)
        }
        TextMode::PlaceStrength { .. } => {
            paired_lines(PLACE_PREFIX, user_text, &strength, max_width, m)
        }
        TextMode::RuleStrength => {
            let rule = fill_to_width("", m.width(&strength), m);
            let target = m.width(&rule).max(m.width(&strength));
            [pad_to_width(&rule, target, m), strength]
        }
        TextMode::FreeText { .. } => match user_text {
            Some(text) => wrap_two_lines(text.trim(), max_width, m),
            None => [String::new(), "_".repeat(params.unit_len)],
        },
        TextMode::CallName { .. } => match user_text {
            Some(text) => wrap_two_lines(text.trim(), max_width, m),
            None => [
                String::new(),
                format!("{CALL_PREFIX}{}", "_".repeat(params.call_len)),
            ],
        },
        TextMode::FileName { .. } => {
            let text = user_text
                .map(|t| t.trim().to_string())
                .or_else(|| stem.map(stem_to_text).filter(|t| !t.is_empty()));
            match text {
                Some(text) => wrap_two_lines(&text, max_width, m),
                None => [String::new(), "_".repeat(params.unit_len)],
            }
        }
        TextMode::GraphicOnly { .. } => [String::new(), String::new()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 10px wide
    struct Mono;

    impl TextMeasure for Mono {
        fn width(&self, text: &str) -> f32 {
            text.chars().count() as f32 * 10.0
        }
    }

    #[test]
    fn test_strength_placeholder() {
        assert_eq!(strength_placeholder(&[1, 1, 2, 2]), "__/__/____/____");
        assert_eq!(strength_placeholder(&[1, 2, 1, 3]), "__/____/__/______");
    }

    #[test]
    fn test_fill_to_width() {
        assert_eq!(fill_to_width("OV: ", 80.0, &Mono), "OV: ____");
        assert_eq!(fill_to_width("OV: ", 30.0, &Mono), "OV: ");
    }

    #[test]
    fn test_paired_lines_without_name_match_width() {
        let [first, second] = paired_lines(UNIT_PREFIX, None, "__/__/____/____", 500.0, &Mono);
        assert_eq!(first, "OV: ___________");
        assert_eq!(Mono.width(&first), Mono.width(&second));
    }

    #[test]
    fn test_paired_lines_pad_strength_to_long_name() {
        let [first, second] =
            paired_lines(UNIT_PREFIX, Some("Musterstadt-Nord"), "__/__", 500.0, &Mono);
        assert_eq!(first, "OV: Musterstadt-Nord");
        assert_eq!(second.trim_end(), "__/__");
        assert_eq!(Mono.width(&first), Mono.width(&second));
    }

    #[test]
    fn test_wrap_fits_single_line() {
        assert_eq!(
            wrap_two_lines("Zugtrupp", 100.0, &Mono),
            [String::new(), "Zugtrupp".to_string()]
        );
    }

    #[test]
    fn test_wrap_prefers_word_boundary() {
        let [first, second] = wrap_two_lines("Fachgruppe Wasserschaden Pumpen", 200.0, &Mono);
        assert_eq!(first, "Fachgruppe");
        assert_eq!(second, "Wasserschaden Pumpen");
        assert!(Mono.width(&first) <= 200.0 && Mono.width(&second) <= 200.0);
    }

    #[test]
    fn test_wrap_breaks_after_hyphen() {
        let [first, second] = wrap_two_lines("Notstrom-Einspeisung", 120.0, &Mono);
        assert_eq!(first, "Notstrom-");
        assert_eq!(second, "Einspeisung");
    }

    #[test]
    fn test_wrap_midpoint_without_whitespace() {
        let [first, second] = wrap_two_lines("Brueckenbaugeraet", 80.0, &Mono);
        assert_eq!(first, "Bruecken");
        assert_eq!(format!("{first}{second}"), "Brueckenbaugeraet");
    }

    #[test]
    fn test_validate_fits_single_line() {
        let fit = validate_fits("Kran", 100.0, 2, &Mono);
        assert_eq!(fit, TextFit::ok(1));
        assert_eq!(validate_fits("  ", 100.0, 2, &Mono).estimated_lines, 0);
    }

    #[test]
    fn test_validate_fits_one_line_limit() {
        let fit = validate_fits("Fachgruppe Logistik", 100.0, 1, &Mono);
        assert!(!fit.fits);
        assert_eq!(fit.estimated_lines, 2);
        assert!(fit.warning.is_some());
    }

    #[test]
    fn test_validate_fits_two_lines() {
        assert!(validate_fits("Fachgruppe Logistik", 100.0, 2, &Mono).fits);
        let fit = validate_fits("Fachgruppe Elektroversorgung", 100.0, 2, &Mono);
        assert!(!fit.fits);
        assert_eq!(fit.estimated_lines, 3);
    }

    #[test]
    fn test_lines_for_call_name_placeholder() {
        let params = PlaceholderParams {
            unit_len: 16,
            call_len: 4,
            strength_digits: [1, 1, 2, 2],
        };
        let lines = lines_for_mode(&TextMode::CallName { name: None }, None, &params, 500.0, &Mono);
        assert_eq!(lines, [String::new(), "Ruf: ____".to_string()]);
    }

    #[test]
    fn test_lines_for_file_name() {
        let params = PlaceholderParams {
            unit_len: 16,
            call_len: 14,
            strength_digits: [1, 1, 2, 2],
        };
        let mode = TextMode::FileName {
            override_text: None,
        };
        let lines = lines_for_mode(&mode, Some("Zugtrupp_TEL"), &params, 500.0, &Mono);
        assert_eq!(lines[1], "Zugtrupp TEL");
    }
}
