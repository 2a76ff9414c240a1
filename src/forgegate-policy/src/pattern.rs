//! Repository pattern matching shared by the policy evaluator and the
//! credential selector, so operators reason with one mental model.

use glob::Pattern;

/// Match a repository pattern against an `owner/repo` string.
///
/// Matching is case-insensitive on both sides. `*` matches everything and
/// `owner/*` matches every repository of that owner. Anything else falls
/// back to a shell-style glob over the full string, which keeps niche
/// wildcards like `*/docs` working; a pattern without wildcard characters
/// degenerates to an exact match.
pub fn repo_pattern_matches(pattern: &str, repo: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let repo = repo.to_lowercase();

    if pattern == "*" {
        return true;
    }

    if let Some(owner) = pattern.strip_suffix("/*") {
        if let Some((repo_owner, _)) = repo.split_once('/') {
            return repo_owner == owner;
        }
        return false;
    }

    Pattern::new(&pattern)
        .map(|glob| glob.matches(&repo))
        .unwrap_or(false)
}
