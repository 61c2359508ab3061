//! Glob-style path patterns used by scopes and route tables.
//!
//! A pattern is split into `/`-terminated segments and compared positionally
//! against the segments of a path. `?` consumes one character and `*`
//! consumes characters up to the next literal run of the pattern. Braces
//! expand into alternatives, `/{a,b}/` being `/a/` or `/b/`.

use pj_net::UrlParts;
use pj_net::standardize;

/// Cartesian expansion of every `{a,b,...}` group in `pattern`.
pub fn expand(pattern: &str) -> Vec<String> {
    let mut expansions = vec![String::new()];
    for group in brace_groups(pattern) {
        expansions = expansions
            .iter()
            .flat_map(|prefix| {
                group
                    .iter()
                    .map(move |alternative| format!("{prefix}{alternative}"))
            })
            .collect();
    }
    expansions
}

fn brace_groups(pattern: &str) -> Vec<Vec<&str>> {
    let mut groups = Vec::new();
    let mut rest = pattern;
    while !rest.is_empty() {
        if rest.starts_with('{') {
            if let Some(close) = rest.find('}') {
                groups.push(rest[1..close].split(',').collect());
                rest = &rest[close.saturating_add(1)..];
                continue;
            }
        }
        // An unclosed brace is kept as a literal.
        let skip = rest.chars().next().map_or(1, char::len_utf8);
        let end = rest[skip..]
            .find('{')
            .map_or(rest.len(), |index| index.saturating_add(skip));
        groups.push(vec![&rest[..end]]);
        rest = &rest[end..];
    }
    groups
}

/// Whether any expansion of `pattern` matches `path`.
pub fn compare(pattern: &str, path: &str) -> bool {
    expand(pattern).iter().any(|pattern| {
        let patterns = segments(pattern);
        let path = if has_trailing_slash(pattern) {
            path.to_owned()
        } else {
            strip_trailing_slash(path)
        };
        let path_segments = segments(&path);
        patterns.len() <= path_segments.len()
            && patterns
                .iter()
                .zip(path_segments.iter())
                .all(|(pattern, segment)| matches_segment(pattern, segment))
    })
}

/// Splits into `/` and `name` or `name/` pieces.
fn segments(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        if rest.starts_with('/') {
            out.push(&rest[..1]);
            rest = &rest[1..];
            continue;
        }
        let end = rest.find('/').map_or(rest.len(), |index| index.saturating_add(1));
        out.push(&rest[..end]);
        rest = &rest[end..];
    }
    out
}

/// A `/` directly followed by the end, `?` or `#`.
fn has_trailing_slash(input: &str) -> bool {
    trailing_slash_index(input).is_some()
}

fn trailing_slash_index(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    bytes.iter().enumerate().find_map(|(index, byte)| {
        let next = bytes.get(index.saturating_add(1)).copied();
        (*byte == b'/' && matches!(next, None | Some(b'?') | Some(b'#'))).then_some(index)
    })
}

fn strip_trailing_slash(input: &str) -> String {
    match trailing_slash_index(input) {
        Some(index) => format!("{}{}", &input[..index], &input[index.saturating_add(1)..]),
        None => input.to_owned(),
    }
}

/// Matches one pattern segment against one path segment.
pub fn matches_segment(pattern: &str, segment: &str) -> bool {
    let pattern = normalize_stars(pattern);
    let pattern: Vec<char> = pattern.chars().collect();
    let mut rest: Vec<char> = segment.chars().collect();

    for (index, token) in pattern.iter().enumerate() {
        match token {
            '?' => {
                if matches!(rest.first(), None | Some('/')) {
                    return false;
                }
                rest.remove(0);
            }
            '*' => {
                let literal: String = pattern[index.saturating_add(1)..]
                    .iter()
                    .take_while(|ch| !matches!(ch, '?' | '*' | '/'))
                    .collect();
                let remaining: String = rest.iter().collect();
                if literal.is_empty() {
                    rest = if remaining.ends_with('/') { vec!['/'] } else { Vec::new() };
                } else {
                    let Some(found) = remaining.find(&literal) else {
                        return false;
                    };
                    rest = remaining[found..].chars().collect();
                }
            }
            literal => {
                if rest.first() != Some(literal) {
                    return false;
                }
                rest.remove(0);
            }
        }
    }
    rest.is_empty()
}

/// Collapses `**` into `*` and `*?` into `?`.
fn normalize_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '*' {
            out.push(ch);
            continue;
        }
        while chars.peek() == Some(&'*') {
            chars.next();
        }
        if chars.peek() == Some(&'?') {
            continue;
        }
        out.push('*');
    }
    out
}

/// Route table dispatch: `router(table)(url)` calls the handler of the
/// highest-sorting pattern that matches the pathname of `url`.
///
/// `url` must be absolute. Handlers receive the pathname followed by the query.
pub fn router<T, F>(table: Vec<(String, F)>) -> impl Fn(&str) -> Option<T>
where
    F: Fn(&str) -> T,
{
    let mut table = table;
    table.sort_by(|(left, _), (right, _)| right.cmp(left));
    move |url: &str| {
        let canonical = standardize(url, url).ok()?;
        let parts = UrlParts::parse(&canonical).ok()?;
        table
            .iter()
            .find(|(pattern, _)| compare(pattern, parts.pathname()))
            .map(|(_, handler)| handler(&parts.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::compare;
    use super::expand;
    use super::matches_segment;
    use super::router;
    use proptest::prelude::*;

    #[test]
    fn expands_brace_groups_as_a_product() {
        assert_eq!(expand("/{a,b}/{c,d}"), vec!["/a/c", "/a/d", "/b/c", "/b/d"]);
        assert_eq!(expand("/plain"), vec!["/plain"]);
        assert_eq!(expand("/open{"), vec!["/open{"]);
    }

    #[test]
    fn compares_literal_segments() {
        assert!(compare("/", "/"));
        assert!(compare("/", "/anything/below"));
        assert!(compare("/a", "/a"));
        assert!(compare("/a", "/a/"));
        assert!(!compare("/a/", "/a"));
        assert!(compare("/a/", "/a/b"));
        assert!(!compare("/a/b", "/a"));
        assert!(!compare("/a", "/b"));
    }

    #[test]
    fn question_mark_consumes_one_character() {
        assert!(compare("/?", "/a"));
        assert!(compare("/a?c", "/abc"));
        assert!(!compare("/a?c", "/abbc"));
        assert!(!compare("/a?", "/a"));
        assert!(!compare("/a?", "/a/"));
        assert!(!matches_segment("?/", "/"));
    }

    #[test]
    fn star_stays_within_a_segment() {
        assert!(compare("/*", "/abc"));
        assert!(compare("/*/", "/abc/def"));
        assert!(compare("/*.html", "/index.html"));
        assert!(!compare("/*.html", "/index.php"));
        assert!(compare("/**/b", "/a/b"));
        assert!(!compare("/*", "/"));
    }

    #[test]
    fn collapses_star_runs() {
        assert!(matches_segment("a**c", "abbc"));
        assert!(matches_segment("a*?c", "abc"));
        assert!(!matches_segment("a*?c", "abbc"));
    }

    #[test]
    fn braces_select_alternatives() {
        assert!(compare("/{blog,news}/", "/news/today"));
        assert!(!compare("/{blog,news}/", "/shop/today"));
    }

    #[test]
    fn router_prefers_higher_sorting_patterns() {
        let table: Vec<(String, fn(&str) -> String)> = vec![
            ("/".to_owned(), |path| format!("root {path}")),
            ("/docs/".to_owned(), |path| format!("docs {path}")),
        ];
        let route = router(table);
        assert_eq!(
            route("https://example.test/docs/intro?x=1#top"),
            Some("docs /docs/intro?x=1".to_owned())
        );
        assert_eq!(
            route("https://example.test/about"),
            Some("root /about".to_owned())
        );
        assert_eq!(route("not a url"), None);
    }

    #[test]
    fn router_returns_none_without_a_match() {
        let route = router(vec![("/only/".to_owned(), |path: &str| path.to_owned())]);
        assert_eq!(route("https://example.test/other"), None);
    }

    proptest! {
        #[test]
        fn brace_expansion_is_a_disjunction(
            left in "[a-c]{1,3}",
            right in "[a-c]{1,3}",
            segment in "[a-c]{1,3}",
        ) {
            let path = format!("/{segment}/x");
            let braced = compare(&format!("/{{{left},{right}}}/"), &path);
            let either = compare(&format!("/{left}/"), &path) || compare(&format!("/{right}/"), &path);
            prop_assert_eq!(braced, either);
        }

        #[test]
        fn star_matches_any_plain_segment(segment in "[a-z0-9._-]{1,12}") {
            let path = format!("/{segment}");
            prop_assert!(compare("/*", &path));
            prop_assert!(compare("/?*", &path));
        }

        #[test]
        fn each_question_mark_takes_exactly_one_character(
            segment in "[a-z0-9._-]{1,8}",
            extra in 1_usize..3,
        ) {
            let length = segment.chars().count();
            prop_assert!(matches_segment(&"?".repeat(length), &segment));
            prop_assert!(!matches_segment(&"?".repeat(length + extra), &segment));
            prop_assert!(!matches_segment(&"?".repeat(length - 1), &segment));
        }
    }
}
