//! Pluralization for log messages.

/// `"s"` unless `n == 1`.
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// `"1 page"`, `"3 pages"`.
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", plural_s(count))
}
