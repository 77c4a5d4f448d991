//! Whole-word identifier rewriting
//!
//! Every textual rename in the pipeline goes through this module. The
//! contract is deliberately narrow: a name matches on word boundaries only,
//! the scan is left-to-right first-match-wins, the replacement text is
//! inserted literally, and there is no syntax awareness whatsoever, so
//! occurrences inside comments or string literals are rewritten like any
//! other. That is adequate for shader globals, whose names are plain
//! identifiers, and keeps the limitation in one testable place.

use regex::{NoExpand, Regex};

fn word_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).unwrap()
}

/// Returns whether `name` occurs as a whole word anywhere in `text`.
pub fn contains_word(text: &str, name: &str) -> bool {
    word_pattern(name).is_match(text)
}

/// Replaces every whole-word occurrence of `name` in `text` with
/// `replacement`, inserted literally.
pub fn replace_word(text: &str, name: &str, replacement: &str) -> String {
    word_pattern(name).replace_all(text, NoExpand(replacement)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_only() {
        assert!(contains_word("float time = 0.;", "time"));
        assert!(!contains_word("float timer = 0.;", "time"));
        assert!(!contains_word("float uptime = 0.;", "time"));

        let rewritten = replace_word("time + timer + time2 + time", "time", "t");
        assert_eq!(rewritten, "t + timer + time2 + t");
    }

    #[test]
    fn test_punctuation_boundaries() {
        let rewritten = replace_word("vec2(width,height)/width", "width", "1920.");
        assert_eq!(rewritten, "vec2(1920.,height)/1920.");
    }

    #[test]
    fn test_replacement_is_literal() {
        // A replacement containing `$` must not be treated as a capture
        // group reference.
        let rewritten = replace_word("a + b", "b", "$0");
        assert_eq!(rewritten, "a + $0");
    }

    #[test]
    fn test_no_syntax_awareness() {
        // Comments are rewritten like code; callers rely on this being
        // consistent rather than clever.
        let rewritten = replace_word("// uses speed\nfloat x = speed;", "speed", "2.0");
        assert_eq!(rewritten, "// uses 2.0\nfloat x = 2.0;");
    }
}
