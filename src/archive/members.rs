use glob::{MatchOptions, Pattern};
use tracing::warn;

/// Archive members matching `pattern`.
/// Patterns without `/` match the member's basename, otherwise its full path.
/// Case-sensitive matching is tried first; case-insensitive only if that finds nothing.
pub fn match_members<'a>(members: &[&'a str], pattern: &str) -> Vec<&'a str> {
    let glob = match Pattern::new(pattern) {
        Ok(glob) => glob,
        Err(err) => {
            warn!("invalid member pattern '{pattern}': {err}");
            return Vec::new();
        }
    };

    let full_path = pattern.contains('/');
    let subject = |member: &'a str| -> &'a str {
        if full_path { member } else { member.rsplit('/').next().unwrap_or(member) }
    };

    for case_sensitive in [true, false] {
        let options = MatchOptions { case_sensitive, ..MatchOptions::new() };
        let hits = members.iter()
            .copied()
            .filter(|member| !member.ends_with('/'))
            .filter(|member| glob.matches_with(subject(member), options))
            .collect::<Vec<_>>();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}
