//! Wildcard patterns derived from a spoken target phrase

use std::collections::HashSet;
use std::fmt;

use globset::{GlobBuilder, GlobMatcher};

/// Extensions tried as `*<target>*<ext>` after the bare patterns
pub const PATTERN_EXTENSIONS: &[&str] = &[".lnk", ".url", ".exe", ".pdf", ".docx", ".xlsx", ".txt"];

/// Quote characters removed during normalization
const QUOTE_CHARS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// A case-insensitive wildcard tested against file basenames
#[derive(Clone)]
pub struct MatchPattern {
    raw: String,
    matcher: Option<GlobMatcher>,
}

impl MatchPattern {
    /// Compile a wildcard pattern
    ///
    /// `*` and `?` keep their glob meaning, braces are literal. A pattern that
    /// still fails to compile is retried with everything except `*` escaped.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into().to_lowercase();
        let matcher = compile(&raw);
        Self { raw, matcher }
    }

    /// The pattern text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Test a basename against the pattern (case-insensitive)
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.matcher
            .as_ref()
            .is_some_and(|m| m.is_match(name.to_lowercase()))
    }
}

impl fmt::Debug for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MatchPattern").field(&self.raw).finish()
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for MatchPattern {}

fn compile(raw: &str) -> Option<GlobMatcher> {
    let literal_braces = raw.replace('{', "[{]").replace('}', "[}]");
    match build_glob(&literal_braces) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::debug!(pattern = raw, error = %e, "pattern rejected, matching literally");
            let escaped = raw
                .split('*')
                .map(globset::escape)
                .collect::<Vec<_>>()
                .join("*");
            build_glob(&escaped)
                .inspect_err(|e| tracing::warn!(pattern = raw, error = %e, "unusable pattern"))
                .ok()
        }
    }
}

fn build_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .backslash_escape(false)
        .build()
        .map(|g| g.compile_matcher())
}

/// Normalize a spoken phrase: lowercase, drop quote characters, trim
#[must_use]
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !QUOTE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Build the ordered, deduplicated pattern list for a target and its hints
///
/// The first pattern is always `*<target>*`. Hints that are already part of
/// the target add nothing.
#[must_use]
pub fn generate_patterns<S: AsRef<str>>(target: &str, hints: &[S]) -> Vec<MatchPattern> {
    let t = normalize(target);

    let mut raw = vec![format!("*{t}*")];
    for hint in hints {
        let h = normalize(hint.as_ref());
        if !h.is_empty() && !t.contains(&h) {
            raw.push(format!("*{h}*"));
        }
    }
    for ext in PATTERN_EXTENSIONS {
        raw.push(format!("*{t}*{ext}"));
    }

    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|p| seen.insert(p.clone()))
        .map(MatchPattern::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(patterns: &[MatchPattern]) -> Vec<&str> {
        patterns.iter().map(MatchPattern::as_str).collect()
    }

    #[test]
    fn test_first_pattern_is_target() {
        for target in ["Chrome", "  Visual Studio Code ", "\u{201C}Budget\u{201D}", ""] {
            let patterns = generate_patterns::<&str>(target, &[]);
            assert_eq!(patterns[0].as_str(), format!("*{}*", normalize(target)));
        }
    }

    #[test]
    fn test_full_pattern_order() {
        let patterns = generate_patterns("Report", &["quarterly"]);
        assert_eq!(
            strs(&patterns),
            vec![
                "*report*",
                "*quarterly*",
                "*report*.lnk",
                "*report*.url",
                "*report*.exe",
                "*report*.pdf",
                "*report*.docx",
                "*report*.xlsx",
                "*report*.txt",
            ]
        );
    }

    #[test]
    fn test_substring_hint_adds_nothing() {
        let with_hint = generate_patterns("google chrome", &["Chrome", " ", "'google'"]);
        let without = generate_patterns::<&str>("google chrome", &[]);
        assert_eq!(strs(&with_hint), strs(&without));
    }

    #[test]
    fn test_duplicate_hints_deduplicated() {
        let patterns = generate_patterns("notes", &["todo", "TODO", "todo"]);
        assert_eq!(patterns.iter().filter(|p| p.as_str() == "*todo*").count(), 1);
    }

    #[test]
    fn test_empty_target_matches_everything() {
        let patterns = generate_patterns::<&str>("", &[]);
        assert_eq!(patterns[0].as_str(), "**");
        assert!(patterns[0].matches("anything.bin"));
    }

    #[test]
    fn test_normalize_strips_quotes() {
        assert_eq!(normalize("  \"Steam\" "), "steam");
        assert_eq!(normalize("\u{2018}Notes\u{2019}"), "notes");
        assert_eq!(normalize("Bob's File"), "bobs file");
    }

    #[test]
    fn test_pattern_matching_is_case_insensitive() {
        let pattern = MatchPattern::new("*chrome*.lnk");
        assert!(pattern.matches("Google Chrome.LNK"));
        assert!(!pattern.matches("Google Chrome.exe"));
    }

    #[test]
    fn test_braces_are_literal() {
        let pattern = MatchPattern::new("*{draft}*");
        assert!(pattern.matches("essay {draft} v2.docx"));
        assert!(!pattern.matches("essay draft.docx"));
    }

    #[test]
    fn test_unbalanced_bracket_matches_literally() {
        let pattern = MatchPattern::new("*notes [old*");
        assert!(pattern.matches("my notes [old].txt"));
        assert!(!pattern.matches("my notes old.txt"));
    }
}
