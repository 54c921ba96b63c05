//! Route template compilation.
//!
//! A route string is the app-relative directory of a route file, written with
//! bracket syntax for dynamic segments:
//!
//! | Segment          | Matches                     | Pathname   |
//! |------------------|-----------------------------|------------|
//! | `about`          | `about`                     | `/about`   |
//! | `[id=int]`       | the `int` matcher's pattern | `/:id(..)` |
//! | `[slug]`         | one segment                 | `/:slug`   |
//! | `[[lang]]`       | zero or one segment         | `/:lang?`  |
//! | `[...rest]`      | one or more segments        | `/:rest+`  |
//! | `[[...rest]]`    | zero or more segments       | `/:rest*`  |
//! | `(group)`        | nothing, organisational     |            |
//!
//! Each segment has a rank, and the score of a route reads those ranks as
//! decimal digits, most significant first, with an end-of-route rank appended.
//! Comparing scores is therefore comparing routes segment by segment: static
//! beats matcher beats dynamic at the first position where two routes differ,
//! and a route that ends beats one that continues with optional segments.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::RouteError;
use super::pattern::RoutePattern;

/// Number of rank digits packed into a score.
const SCORE_DIGITS: u32 = 12;

/// Rank of the implicit end-of-route position.
const END_RANK: i64 = 6;

/// Custom matcher: receives the route string and the app-relative file path,
/// returns a rewritten route string or `None` to leave it unchanged.
pub type MatcherFn = dyn Fn(&str, &str) -> Option<String> + Send + Sync;

// ============================================================================
// Matcher configuration
// ============================================================================

/// A single configured matcher.
#[derive(Clone)]
pub enum RouteMatcher {
    /// `[name]` / `[param=name]` placeholders are replaced by `pattern`.
    Simple { name: String, pattern: String },
    /// Rewrites the whole route string before it is parsed.
    Complex(Arc<MatcherFn>),
}

impl fmt::Debug for RouteMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple { name, pattern } => f
                .debug_struct("Simple")
                .field("name", name)
                .field("pattern", pattern)
                .finish(),
            Self::Complex(_) => f.write_str("Complex(..)"),
        }
    }
}

/// Ordered matcher set used when compiling route strings.
#[derive(Debug, Clone, Default)]
pub struct RouteMatchers {
    entries: Vec<RouteMatcher>,
}

impl RouteMatchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a simple matcher. The pattern is validated here so a bad regex is
    /// reported once, at startup.
    pub fn with(mut self, name: &str, pattern: &str) -> Result<Self, RouteError> {
        self.push(name, pattern)?;
        Ok(self)
    }

    /// Add a custom matcher function.
    pub fn with_fn<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.entries.push(RouteMatcher::Complex(Arc::new(matcher)));
        self
    }

    pub fn push(&mut self, name: &str, pattern: &str) -> Result<(), RouteError> {
        if !is_valid_param(name) {
            return Err(RouteError::InvalidMatcher {
                name: name.to_string(),
                message: "matcher names must be identifiers".into(),
            });
        }
        Regex::new(&format!("^(?:{pattern})$")).map_err(|e| RouteError::InvalidMatcher {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.entries.push(RouteMatcher::Simple {
            name: name.to_string(),
            pattern: pattern.to_string(),
        });
        Ok(())
    }

    /// Pattern of the simple matcher called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            RouteMatcher::Simple { name: n, pattern } if n == name => Some(pattern.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run complex matchers over `route` in registration order.
    fn rewrite(&self, route: &str, path: &str) -> String {
        let mut route = route.to_string();
        for entry in &self.entries {
            if let RouteMatcher::Complex(matcher) = entry
                && let Some(rewritten) = matcher(&route, path)
            {
                route = rewritten;
            }
        }
        route
    }
}

// ============================================================================
// Segments
// ============================================================================

/// One parsed segment of a route string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Group,
    Matcher { name: String, pattern: String },
    Param(String),
    Optional(String),
    CatchAll(String),
    OptionalCatchAll(String),
}

impl Segment {
    /// Digit this segment contributes to the score. Groups contribute none.
    pub const fn rank(&self) -> Option<i64> {
        match self {
            Self::Static(_) => Some(9),
            Self::Matcher { .. } => Some(8),
            Self::Param(_) => Some(7),
            Self::Optional(_) => Some(5),
            Self::CatchAll(_) => Some(4),
            Self::OptionalCatchAll(_) => Some(3),
            Self::Group => None,
        }
    }

    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static(_) | Self::Group)
    }

    fn param(&self) -> Option<&str> {
        match self {
            Self::Matcher { name, .. }
            | Self::Param(name)
            | Self::Optional(name)
            | Self::CatchAll(name)
            | Self::OptionalCatchAll(name) => Some(name),
            Self::Static(_) | Self::Group => None,
        }
    }

    fn regex(&self) -> String {
        match self {
            Self::Static(text) => format!("/{}", regex::escape(text)),
            Self::Group => String::new(),
            Self::Matcher { name, pattern } => format!("/(?P<{name}>(?:{pattern}))"),
            Self::Param(name) => format!("/(?P<{name}>[^/]+?)"),
            Self::Optional(name) => format!("(?:/(?P<{name}>[^/]+?))?"),
            Self::CatchAll(name) => format!("/(?P<{name}>.+?)"),
            Self::OptionalCatchAll(name) => format!("(?:/(?P<{name}>.*?))?"),
        }
    }

    fn pathname(&self) -> String {
        match self {
            Self::Static(text) => format!("/{text}"),
            Self::Group => String::new(),
            Self::Matcher { name, pattern } => format!("/:{name}({pattern})"),
            Self::Param(name) => format!("/:{name}"),
            Self::Optional(name) => format!("/:{name}?"),
            Self::CatchAll(name) => format!("/:{name}+"),
            Self::OptionalCatchAll(name) => format!("/:{name}*"),
        }
    }
}

/// Classify one `/`-separated piece of a route string.
pub fn parse_segment(
    segment: &str,
    route: &str,
    matchers: &RouteMatchers,
) -> Result<Segment, RouteError> {
    let invalid = || RouteError::InvalidSegment {
        segment: segment.to_string(),
        route: route.to_string(),
    };
    let checked = |name: &str| {
        if is_valid_param(name) {
            Ok(name.to_string())
        } else {
            Err(RouteError::InvalidParam {
                name: name.to_string(),
                route: route.to_string(),
            })
        }
    };

    if segment.starts_with('(') && segment.ends_with(')') && segment.len() > 2 {
        return Ok(Segment::Group);
    }

    if let Some(inner) = segment.strip_prefix("[[").and_then(|s| s.strip_suffix("]]")) {
        return match inner.strip_prefix("...") {
            Some(name) => Ok(Segment::OptionalCatchAll(checked(name)?)),
            None => Ok(Segment::Optional(checked(inner)?)),
        };
    }

    if let Some(inner) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Some(name) = inner.strip_prefix("...") {
            return Ok(Segment::CatchAll(checked(name)?));
        }

        if let Some((name, matcher)) = inner.split_once('=') {
            let pattern = matchers
                .get(matcher)
                .ok_or_else(|| RouteError::UnknownMatcher {
                    matcher: matcher.to_string(),
                    route: route.to_string(),
                })?;
            return Ok(Segment::Matcher {
                name: checked(name)?,
                pattern: pattern.to_string(),
            });
        }

        let name = checked(inner)?;
        return Ok(match matchers.get(&name) {
            Some(pattern) => Segment::Matcher {
                pattern: pattern.to_string(),
                name,
            },
            None => Segment::Param(name),
        });
    }

    if segment.contains(['[', ']']) {
        return Err(invalid());
    }
    Ok(Segment::Static(segment.to_string()))
}

/// Parse a full route string into segments.
pub fn parse_route(route: &str, matchers: &RouteMatchers) -> Result<Vec<Segment>, RouteError> {
    route
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| parse_segment(s, route, matchers))
        .collect()
}

/// Score of a parsed route. Higher is more specific.
pub fn score(segments: &[Segment]) -> i64 {
    segments
        .iter()
        .filter_map(Segment::rank)
        .chain(std::iter::once(END_RANK))
        .take(SCORE_DIGITS as usize)
        .enumerate()
        .map(|(i, rank)| rank * 10_i64.pow(SCORE_DIGITS - 1 - i as u32))
        .sum()
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile a route string into a [`RoutePattern`].
///
/// `path` is the app-relative file path handed to custom matchers.
pub fn compile(route: &str, path: &str, matchers: &RouteMatchers) -> Result<RoutePattern, RouteError> {
    let rewritten = matchers.rewrite(route, path);
    let segments = parse_route(&rewritten, matchers)?;

    let body: String = segments.iter().map(Segment::regex).collect();
    let source = if body.is_empty() {
        r"^/(?:index\.html)?$".to_string()
    } else {
        format!(r"^{body}(?:/(?:index\.html)?|\.html)?$")
    };
    let regex = Regex::new(&source).map_err(|e| RouteError::Pattern {
        route: route.to_string(),
        message: e.to_string(),
    })?;

    let pathname: String = segments.iter().map(Segment::pathname).collect();
    let pathname = if pathname.is_empty() { "/".to_string() } else { pathname };

    Ok(RoutePattern::new(
        route.to_string(),
        regex,
        pathname,
        score(&segments),
        segments.iter().any(|s| !s.is_static()),
        segments.iter().filter_map(Segment::param).map(str::to_string).collect(),
    ))
}

fn is_valid_param(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(route: &str) -> RoutePattern {
        compile(route, "", &RouteMatchers::new()).unwrap()
    }

    #[test]
    fn test_parse_segment_kinds() {
        let m = RouteMatchers::new().with("int", r"\d+").unwrap();
        let parse = |s| parse_segment(s, "/x", &m).unwrap();

        assert_eq!(parse("about"), Segment::Static("about".into()));
        assert_eq!(parse("(marketing)"), Segment::Group);
        assert_eq!(parse("[slug]"), Segment::Param("slug".into()));
        assert_eq!(parse("[[lang]]"), Segment::Optional("lang".into()));
        assert_eq!(parse("[...rest]"), Segment::CatchAll("rest".into()));
        assert_eq!(parse("[[...rest]]"), Segment::OptionalCatchAll("rest".into()));
        assert_eq!(
            parse("[id=int]"),
            Segment::Matcher { name: "id".into(), pattern: r"\d+".into() }
        );
        assert_eq!(
            parse("[int]"),
            Segment::Matcher { name: "int".into(), pattern: r"\d+".into() }
        );
    }

    #[test]
    fn test_unknown_matcher_is_error() {
        let err = compile("/posts/[id=uuid]", "", &RouteMatchers::new()).unwrap_err();
        assert!(matches!(err, RouteError::UnknownMatcher { ref matcher, .. } if matcher == "uuid"));
    }

    #[test]
    fn test_invalid_segments() {
        let m = RouteMatchers::new();
        assert!(matches!(
            parse_segment("post-[id]", "/x", &m),
            Err(RouteError::InvalidSegment { .. })
        ));
        assert!(matches!(
            parse_segment("[a-b]", "/x", &m),
            Err(RouteError::InvalidParam { .. })
        ));
        assert!(RouteMatchers::new().with("bad", "(").is_err());
    }

    #[test]
    fn test_static_match() {
        let p = pattern("/blog/featured");
        assert!(p.test("/blog/featured"));
        assert!(p.test("/blog/featured/"));
        assert!(p.test("/blog/featured/index.html"));
        assert!(p.test("/blog/featured.html"));
        assert!(!p.test("/blog/featured/x"));
        assert!(!p.test("/blog"));
        assert!(!p.dynamic());
        assert_eq!(p.pathname(), "/blog/featured");
    }

    #[test]
    fn test_root_match() {
        let p = pattern("/");
        assert!(p.test("/"));
        assert!(p.test("/index.html"));
        assert!(!p.test("/about"));
        assert_eq!(p.pathname(), "/");
    }

    #[test]
    fn test_dynamic_params() {
        let p = pattern("/blog/[slug]");
        let params = p.exec("/blog/hello-world/").unwrap();
        assert_eq!(params.get("slug").map(String::as_str), Some("hello-world"));
        assert!(p.dynamic());
        assert_eq!(p.pathname(), "/blog/:slug");

        let p = pattern("/docs/[...rest]");
        let params = p.exec("/docs/a/b/c").unwrap();
        assert_eq!(params.get("rest").map(String::as_str), Some("a/b/c"));
        assert!(!p.test("/docs"));

        let p = pattern("/docs/[[...rest]]");
        assert!(p.test("/docs"));
        assert!(p.test("/docs/"));
        assert!(p.test("/docs/a/b"));
        assert!(p.exec("/docs/").unwrap().is_empty());

        let p = pattern("/[[lang]]/about");
        assert!(p.test("/about"));
        assert_eq!(p.exec("/en/about").unwrap().get("lang").unwrap(), "en");
    }

    #[test]
    fn test_group_segments_are_transparent() {
        let p = pattern("/(marketing)/pricing");
        assert!(p.test("/pricing"));
        assert_eq!(p.pathname(), "/pricing");
        assert!(!p.dynamic());
    }

    #[test]
    fn test_matcher_segment() {
        let m = RouteMatchers::new().with("int", r"\d+").unwrap();
        let p = compile("/posts/[id=int]", "", &m).unwrap();
        assert!(p.test("/posts/42"));
        assert!(!p.test("/posts/abc"));
        assert_eq!(p.pathname(), r"/posts/:id(\d+)");
    }

    #[test]
    fn test_complex_matcher_rewrites_route() {
        let m = RouteMatchers::new()
            .with("int", r"\d+")
            .unwrap()
            .with_fn(|route, _path| route.contains("[page]").then(|| route.replace("[page]", "[page=int]")));
        let p = compile("/list/[page]", "list/[page]/page.md", &m).unwrap();
        assert!(p.test("/list/3"));
        assert!(!p.test("/list/three"));
        assert_eq!(p.route(), "/list/[page]");
    }

    #[test]
    fn test_static_beats_dynamic() {
        let s = pattern("/blog/featured");
        let d = pattern("/blog/[slug]");
        assert!(s.score() > d.score());
    }

    #[test]
    fn test_score_ordering() {
        let m = RouteMatchers::new().with("int", r"\d+").unwrap();
        let score = |r: &str| compile(r, "", &m).unwrap().score();

        assert!(score("/a/b") > score("/a/[id=int]"));
        assert!(score("/a/[id=int]") > score("/a/[b]"));
        assert!(score("/a/[b]") > score("/a/[...b]"));
        assert!(score("/a") > score("/a/[[b]]"));
        assert!(score("/a/[[b]]") > score("/a/[...b]"));
        assert!(score("/a/[...b]") > score("/a/[[...b]]"));
        assert!(score("/") > score("/[[...rest]]"));
        assert!(score("/about") > score("/[a]/[[...rest]]"));
    }

    #[test]
    fn test_catch_all_below_static_of_same_length() {
        for depth in 1..6 {
            let statics: String = (0..depth).map(|i| format!("/s{i}")).collect();
            let prefix: String = (0..depth - 1).map(|i| format!("/s{i}")).collect();
            let catch_all = format!("{prefix}/[...rest]");
            assert!(pattern(&statics).score() > pattern(&catch_all).score());
        }
    }

    #[test]
    fn test_static_is_max_score_for_length() {
        let m = RouteMatchers::new().with("int", r"\d+").unwrap();
        let max = compile("/a/b/c", "", &m).unwrap().score();
        for route in [
            "/a/b/[c]",
            "/[a]/b/c",
            "/a/[b=int]/c",
            "/a/b/[[c]]",
            "/a/b/[...c]",
            "/a/b/[[...c]]",
        ] {
            assert!(compile(route, "", &m).unwrap().score() < max, "{route}");
        }
    }

    #[test]
    fn test_score_fits_json_numbers() {
        let deep: String = (0..20).map(|i| format!("/s{i}")).collect();
        assert!(pattern(&deep).score() < (1_i64 << 53));
    }
}
