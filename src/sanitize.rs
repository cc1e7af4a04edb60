//! Cosmetic cleanup of raw model output before it is stored or shown.
//!
//! Not a safety filter — it knows nothing about content policy. The pipeline
//! is deterministic and idempotent: trim, drop repeated lines, cap the
//! length, make sure at least one emotive glyph survives.

/// Hard cap on a displayed reply, in characters.
const MAX_REPLY_CHARS: usize = 500;

/// Marker appended when the reply was cut.
const ELLIPSIS: char = '…';

/// Appended when the model produced no emotive glyph at all.
const DEFAULT_GLYPH: &str = " 😊";

/// The glyphs that count as "expressive". Matches what the character
/// templates ask the model to use.
const GLYPHS: [char; 7] = ['😊', '💕', '😘', '😍', '🥰', '😉', '😋'];

/// Clean one raw model reply. Order matters: trim, dedupe lines, truncate,
/// then guarantee a glyph.
pub fn clean(raw: &str) -> String {
    let trimmed = raw.trim();

    // Drop any line identical to one already kept (models on a repetition
    // spiral tend to echo whole lines). Exact, case-sensitive match; blank
    // lines are dropped too.
    let mut kept: Vec<&str> = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if !line.is_empty() && !kept.contains(&line) {
            kept.push(line);
        }
    }
    let mut text = kept.join("\n");

    // Truncate with enough headroom for the ellipsis and a possibly appended
    // glyph, so cleaning an already-clean string changes nothing.
    let budget = MAX_REPLY_CHARS - 4;
    if text.chars().count() > MAX_REPLY_CHARS {
        text = text.chars().take(budget).collect::<String>().trim_end().to_string();
        text.push(ELLIPSIS);
    }

    if !text.chars().any(|c| GLYPHS.contains(&c)) {
        if text.is_empty() {
            text.push_str(DEFAULT_GLYPH.trim_start());
        } else {
            text.push_str(DEFAULT_GLYPH);
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(clean("  hello 😊  \n"), "hello 😊");
    }

    #[test]
    fn test_empty_input_still_gets_a_glyph() {
        assert_eq!(clean(""), "😊");
        assert_eq!(clean("   \n  "), "😊");
    }

    #[test]
    fn test_appends_glyph_when_missing() {
        assert_eq!(clean("hello"), "hello 😊");
    }

    #[test]
    fn test_keeps_existing_glyph() {
        assert_eq!(clean("hey 💕 you"), "hey 💕 you");
    }

    #[test]
    fn test_dedupes_repeated_lines() {
        let raw = "I missed you! 💕\nI missed you! 💕\nWhat did you do today?";
        assert_eq!(clean(raw), "I missed you! 💕\nWhat did you do today?");
    }

    #[test]
    fn test_dedupe_is_case_sensitive() {
        let raw = "Hello 😊\nhello 😊";
        assert_eq!(clean(raw), "Hello 😊\nhello 😊");
    }

    #[test]
    fn test_drops_blank_lines() {
        assert_eq!(clean("hi 😊\n\n\nthere"), "hi 😊\nthere");
    }

    #[test]
    fn test_truncates_long_output() {
        let raw = "x".repeat(2000);
        let cleaned = clean(&raw);
        assert!(cleaned.chars().count() <= MAX_REPLY_CHARS);
        assert!(cleaned.contains(ELLIPSIS));
    }

    #[test]
    fn test_never_exceeds_budget_even_with_glyph() {
        let raw = "y".repeat(600);
        let cleaned = clean(&raw);
        // Truncated text has no glyph, so the default one is appended; the
        // total still fits the cap.
        assert!(cleaned.ends_with(DEFAULT_GLYPH));
        assert!(cleaned.chars().count() <= MAX_REPLY_CHARS);
    }

    #[test]
    fn test_exactly_at_cap_untouched() {
        let raw = format!("{}😊", "z".repeat(MAX_REPLY_CHARS - 1));
        let cleaned = clean(&raw);
        assert_eq!(cleaned, raw);
    }

    #[test]
    fn test_idempotent_on_clean_input() {
        let inputs = [
            String::new(),
            "hello".to_string(),
            "hey 💕 you\nsecond line".to_string(),
            "  padded  ".to_string(),
            "x".repeat(2000),
            "line\nline\nother 😉\n".to_string(),
            format!("{}\n{}", "a".repeat(400), "b".repeat(400)),
        ];
        for input in inputs {
            let once = clean(&input);
            assert_eq!(clean(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_multibyte_truncation_is_char_safe() {
        let raw = "é".repeat(800);
        let cleaned = clean(&raw);
        assert!(cleaned.chars().count() <= MAX_REPLY_CHARS);
    }
}
