//! Fuzzy matching of spoken app names against the application index
//!
//! Scoring sits behind the [`Scorer`] trait so the similarity measure can be
//! swapped without touching how candidates are chosen. The default,
//! [`WeightedRatio`], combines whole-string, best-substring and word-level
//! similarity on a 0..=100 scale.

use std::path::PathBuf;

use fuzzy_matcher::FuzzyMatcher as _;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};

use super::alias::AliasTable;
use super::index::{AppEntry, AppIndex};

/// Minimum score a fuzzy match must reach to be accepted
pub const DEFAULT_THRESHOLD: u8 = 70;

/// String similarity on a 0..=100 scale
pub trait Scorer: Send + Sync {
    /// Score how well `candidate` matches `query`
    fn score(&self, query: &str, candidate: &str) -> u8;
}

/// Weighted-ratio similarity
///
/// Takes the best of plain ratio, token-sort and token-set ratios; when one
/// string is much longer than the other, substring (partial) variants are
/// also tried with a penalty.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRatio;

impl Scorer for WeightedRatio {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn score(&self, query: &str, candidate: &str) -> u8 {
        weighted_ratio(query, candidate).round().clamp(0.0, 100.0) as u8
    }
}

/// Skim-style subsequence scoring, normalized against a perfect match
pub struct SkimScorer {
    matcher: SkimMatcherV2,
}

impl SkimScorer {
    /// Create a scorer with case-insensitive skim matching
    #[must_use]
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }
}

impl Default for SkimScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SkimScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkimScorer").finish_non_exhaustive()
    }
}

impl Scorer for SkimScorer {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn score(&self, query: &str, candidate: &str) -> u8 {
        let Some(perfect) = self.matcher.fuzzy_match(query, query).filter(|p| *p > 0) else {
            return 0;
        };
        let Some(score) = self.matcher.fuzzy_match(candidate, query) else {
            return 0;
        };
        (score.max(0) as f64 * 100.0 / perfect as f64).round().min(100.0) as u8
    }
}

/// Which [`Scorer`] a matcher uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// [`WeightedRatio`]
    #[default]
    Weighted,
    /// [`SkimScorer`]
    Skim,
}

impl ScorerKind {
    /// Construct the scorer
    #[must_use]
    pub fn build(self) -> Box<dyn Scorer> {
        match self {
            Self::Weighted => Box::new(WeightedRatio),
            Self::Skim => Box::new(SkimScorer::new()),
        }
    }
}

impl std::str::FromStr for ScorerKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "weighted" | "wratio" => Ok(Self::Weighted),
            "skim" => Ok(Self::Skim),
            other => Err(crate::Error::Config(format!("unknown scorer: {other}"))),
        }
    }
}

/// The winning fuzzy match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMatch {
    /// Path of the matched index entry
    pub path: PathBuf,
    /// Query or alias variant that produced the score
    pub candidate: String,
    /// Similarity score
    pub score: u8,
}

/// Picks the best index entry for a spoken name
pub struct FuzzyMatcher {
    scorer: Box<dyn Scorer>,
    threshold: u8,
}

impl std::fmt::Debug for FuzzyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzyMatcher")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(Box::new(WeightedRatio), DEFAULT_THRESHOLD)
    }
}

impl FuzzyMatcher {
    /// Create a matcher with a scorer and confidence threshold
    #[must_use]
    pub fn new(scorer: Box<dyn Scorer>, threshold: u8) -> Self {
        Self { scorer, threshold }
    }

    /// Find the best entry for `query`, trying its aliases as extra queries
    ///
    /// Returns `None` when the index is not ready, empty, or nothing scores
    /// at least the threshold. Ties go to the first entry in index order.
    #[must_use]
    pub fn find_best_app(&self, query: &str, index: &AppIndex, aliases: &AliasTable) -> Option<PathBuf> {
        self.best_match(query, index, aliases).map(|m| m.path)
    }

    /// Like [`Self::find_best_app`], but reports the score and winning candidate
    #[must_use]
    pub fn best_match(&self, query: &str, index: &AppIndex, aliases: &AliasTable) -> Option<AppMatch> {
        if !index.is_ready() {
            tracing::debug!(query, "application index not ready, skipping fuzzy match");
            return None;
        }

        let snapshot = index.snapshot();
        if snapshot.is_empty() {
            return None;
        }

        let query = query.trim().to_lowercase();
        let mut candidates = vec![query.clone()];
        candidates.extend(aliases.lookup(&query).iter().map(|v| v.to_lowercase()));

        let mut best: Option<(&str, &AppEntry, u8)> = None;
        for candidate in &candidates {
            for entry in snapshot.entries() {
                let score = self.score_entry(candidate, entry);
                if score < self.threshold {
                    continue;
                }
                if best.is_none_or(|(_, _, top)| score > top) {
                    best = Some((candidate.as_str(), entry, score));
                }
            }
        }

        let found = best.map(|(candidate, entry, score)| AppMatch {
            path: entry.path().to_path_buf(),
            candidate: candidate.to_string(),
            score,
        });

        match &found {
            Some(m) => tracing::debug!(
                query = %query,
                candidate = %m.candidate,
                score = m.score,
                path = %m.path.display(),
                "fuzzy match"
            ),
            None => tracing::debug!(query = %query, threshold = self.threshold, "no fuzzy match above threshold"),
        }

        found
    }

    fn score_entry(&self, candidate: &str, entry: &AppEntry) -> u8 {
        let by_name = self.scorer.score(candidate, entry.name());
        if by_name == 100 || entry.stem() == entry.name() {
            return by_name;
        }
        by_name.max(self.scorer.score(candidate, entry.stem()))
    }
}

/// Weighted ratio of two strings on 0.0..=100.0
#[must_use]
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    const UNBASE_SCALE: f64 = 0.95;

    let p1 = process(a);
    let p2 = process(b);
    let len1 = p1.chars().count();
    let len2 = p2.chars().count();
    if len1 == 0 || len2 == 0 {
        return 0.0;
    }

    let base = ratio(&p1, &p2);

    #[allow(clippy::cast_precision_loss)]
    let len_ratio = len1.max(len2) as f64 / len1.min(len2) as f64;

    if len_ratio < 1.5 {
        let token_sort = ratio(&sorted_tokens(&p1), &sorted_tokens(&p2)) * UNBASE_SCALE;
        let token_set = token_set_ratio(&p1, &p2, ratio) * UNBASE_SCALE;
        return base.max(token_sort).max(token_set);
    }

    let partial_scale = if len_ratio > 8.0 { 0.6 } else { 0.9 };
    let partial = partial_ratio(&p1, &p2) * partial_scale;
    let partial_sort =
        partial_ratio(&sorted_tokens(&p1), &sorted_tokens(&p2)) * UNBASE_SCALE * partial_scale;
    let partial_set = token_set_ratio(&p1, &p2, partial_ratio) * UNBASE_SCALE * partial_scale;
    base.max(partial).max(partial_sort).max(partial_set)
}

/// Indel similarity: twice the longest common subsequence over total length
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best [`ratio`] of the shorter string against equal-length windows of the longer
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return 0.0;
    }
    if short.len() == long.len() {
        return ratio_chars(&short, &long);
    }

    let mut best = 0.0_f64;
    for window in long.windows(short.len()) {
        best = best.max(ratio_chars(&short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

#[allow(clippy::cast_precision_loss)]
fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    200.0 * lcs_len(a, b) as f64 / (a.len() + b.len()) as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Lowercase, replace non-alphanumerics with spaces, collapse whitespace
fn process(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Compare the shared words against each side's shared-plus-remaining words
fn token_set_ratio(a: &str, b: &str, measure: fn(&str, &str) -> f64) -> f64 {
    use std::collections::BTreeSet;

    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();

    let join = |words: Vec<&str>| words.join(" ");
    let sect = join(set_a.intersection(&set_b).copied().collect());
    let only_a = join(set_a.difference(&set_b).copied().collect());
    let only_b = join(set_b.difference(&set_a).copied().collect());

    let combined_a = format!("{sect} {only_a}").trim().to_string();
    let combined_b = format!("{sect} {only_b}").trim().to_string();

    measure(&sect, &combined_a)
        .max(measure(&sect, &combined_b))
        .max(measure(&combined_a, &combined_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::index::AppSnapshot;

    fn index_of(paths: &[&str]) -> AppIndex {
        let index = AppIndex::new();
        index.publish(AppSnapshot::from_paths(paths.iter().map(PathBuf::from)));
        index
    }

    #[test]
    fn test_ratio_bounds() {
        assert!((ratio("chrome", "chrome") - 100.0).abs() < f64::EPSILON);
        assert!(ratio("abc", "xyz").abs() < f64::EPSILON);
        assert!(ratio("", "xyz").abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_ratio_finds_substring() {
        assert!((partial_ratio("photoshop", "adobe photoshop 2024") - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_ratio_word_order() {
        let score = WeightedRatio.score("studio visual code", "visual studio code");
        assert!(score >= 90, "score was {score}");
    }

    #[test]
    fn test_weighted_ratio_noise_is_low() {
        for candidate in ["chrome.exe", "notepad.exe", "setup_x64_v1.2.3.exe", "firefox.lnk"] {
            let score = WeightedRatio.score("zzqxw123", candidate);
            assert!(score < DEFAULT_THRESHOLD, "{candidate} scored {score}");
        }
    }

    #[test]
    fn test_skim_scorer_normalized() {
        let scorer = SkimScorer::new();
        assert_eq!(scorer.score("chrome", "xyz"), 0);
        assert!(scorer.score("chrome", "chrome") >= 90);
    }

    #[test]
    fn test_scorer_kind_parse() {
        assert_eq!("Skim".parse::<ScorerKind>().unwrap(), ScorerKind::Skim);
        assert_eq!("weighted".parse::<ScorerKind>().unwrap(), ScorerKind::Weighted);
        assert!("levenshtein".parse::<ScorerKind>().is_err());
    }

    #[test]
    fn test_not_ready_returns_none() {
        let index = AppIndex::new();
        let matcher = FuzzyMatcher::default();
        assert!(matcher.find_best_app("chrome", &index, &AliasTable::new()).is_none());
    }

    #[test]
    fn test_empty_ready_index_returns_none() {
        let index = index_of(&[]);
        assert!(index.is_ready());
        let matcher = FuzzyMatcher::default();
        assert!(matcher.find_best_app("chrome", &index, &AliasTable::new()).is_none());
    }

    #[test]
    fn test_notepad_is_deterministic() {
        let index = index_of(&["/apps/notepad.exe", "/apps/notepad++.exe"]);
        let matcher = FuzzyMatcher::default();
        let aliases = AliasTable::with_defaults();

        let first = matcher.find_best_app("notepad", &index, &aliases);
        assert!(first.is_some());
        for _ in 0..10 {
            assert_eq!(matcher.find_best_app("notepad", &index, &aliases), first);
        }
    }

    #[test]
    fn test_gibberish_returns_none() {
        let index = index_of(&["/apps/chrome.exe", "/apps/notepad.exe", "/apps/Spotify.lnk"]);
        let matcher = FuzzyMatcher::default();
        assert!(
            matcher
                .find_best_app("zzqxw123", &index, &AliasTable::with_defaults())
                .is_none()
        );
    }

    #[test]
    fn test_photoshop_resolves() {
        let index = index_of(&["/apps/Adobe/photoshop.exe", "/apps/paint.exe"]);
        let matcher = FuzzyMatcher::default();
        assert_eq!(
            matcher.find_best_app("photoshop", &index, &AliasTable::with_defaults()),
            Some(PathBuf::from("/apps/Adobe/photoshop.exe"))
        );
    }

    /// Only scores the exact alias variant
    struct AliasOnly;

    impl Scorer for AliasOnly {
        fn score(&self, query: &str, candidate: &str) -> u8 {
            if query == "photoshop.exe" && candidate == "photoshop.exe" { 100 } else { 0 }
        }
    }

    #[test]
    fn test_aliases_are_consulted() {
        let index = index_of(&["/apps/Adobe/photoshop.exe"]);
        let matcher = FuzzyMatcher::new(
            Box::new(AliasOnly),
            DEFAULT_THRESHOLD,
        );

        let found = matcher
            .best_match("Photoshop", &index, &AliasTable::with_defaults())
            .unwrap();
        assert_eq!(found.candidate, "photoshop.exe");
        assert_eq!(found.path, PathBuf::from("/apps/Adobe/photoshop.exe"));
    }

    #[test]
    fn test_alias_rescues_unrelated_name() {
        let index = index_of(&["/apps/firefox.exe"]);
        let matcher = FuzzyMatcher::default();
        let aliases = AliasTable::from_entries([("browser", vec!["firefox"])]);

        assert!(matcher.find_best_app("browser", &index, &AliasTable::new()).is_none());
        assert_eq!(
            matcher.find_best_app("browser", &index, &aliases),
            Some(PathBuf::from("/apps/firefox.exe"))
        );
    }

    #[test]
    fn test_first_entry_wins_ties() {
        let index = index_of(&["/b/chrome.exe", "/a/chrome.exe"]);
        let matcher = FuzzyMatcher::default();
        assert_eq!(
            matcher.find_best_app("chrome", &index, &AliasTable::new()),
            Some(PathBuf::from("/a/chrome.exe"))
        );
    }
}
