/// Matches `value` against a wildcard `pattern`, ignoring ASCII case.
///
/// `*` matches any run of characters (including none) and `?` matches exactly
/// one character. Everything else matches itself, case-insensitively.
///
/// ```
/// use gdid::matches_pattern;
///
/// assert!(matches_pattern("sky://idgen-*", "SKY://IDGEN-east"));
/// assert!(matches_pattern("gdid.?", "gdid.v"));
/// assert!(!matches_pattern("gdid.?", "gdid.v2"));
/// ```
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();

    let (mut pi, mut vi) = (0, 0);
    // Position of the last `*` seen and the value index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi].eq_ignore_ascii_case(&v[vi])) {
            pi += 1;
            vi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, vi));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            vi = matched + 1;
            backtrack = Some((star, vi));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match_ignores_case() {
        assert!(matches_pattern("gdid", "GDID"));
        assert!(!matches_pattern("gdid", "gdi"));
        assert!(!matches_pattern("gdi", "gdid"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(matches_pattern("*", ""));
        assert!(matches_pattern("*", "anything"));
        assert!(matches_pattern("a*c", "ac"));
        assert!(matches_pattern("a*c", "abbbc"));
        assert!(matches_pattern("a*b*c", "a-x-b-y-c"));
        assert!(!matches_pattern("a*c", "abcd"));
        assert!(matches_pattern("*idgen*", "sky://idgen-01:7000"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(matches_pattern("n?de", "node"));
        assert!(!matches_pattern("n?de", "nde"));
        assert!(matches_pattern("??", "ab"));
    }

    #[test]
    fn empty_pattern_only_matches_empty() {
        assert!(matches_pattern("", ""));
        assert!(!matches_pattern("", "x"));
    }
}
