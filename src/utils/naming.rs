//! Stack and template naming helpers.

use strsim::levenshtein;

use crate::constants::ENVIRONMENT_PRIORITY;

/// Maximum edit distance for a "did you mean" suggestion, as a percentage of
/// the filter length.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Convert kebab-case to lower snake_case.
pub fn kebab_to_snake_case(name: &str) -> String {
    name.replace('-', "_").to_lowercase()
}

/// Remove a known `-{environment}` suffix, if any.
///
/// Only environments from [`ENVIRONMENT_PRIORITY`] are recognised; the first
/// matching tier wins.
pub fn strip_environment_suffix(stack_name: &str) -> &str {
    ENVIRONMENT_PRIORITY
        .iter()
        .find_map(|env| {
            stack_name.strip_suffix(env).and_then(|rest| rest.strip_suffix('-'))
        })
        .unwrap_or(stack_name)
}

/// Compare two stack names ignoring environment suffixes.
pub fn compare_stack_names(a: &str, b: &str) -> bool {
    strip_environment_suffix(a) == strip_environment_suffix(b)
}

/// Up to three candidates closest to `target`, nearest first.
pub fn find_similar_names(target: &str, candidates: &[String]) -> Vec<String> {
    let mut scored: Vec<_> =
        candidates.iter().map(|name| (name.clone(), levenshtein(target, name))).collect();

    scored.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));
    scored.dedup_by(|(a, _), (b, _)| a == b);

    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name)
        .collect()
}
