//! Link classification for crawled `href`s.

/// Syntactic classification of links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind<'a> {
    /// External link with URL scheme (https://, mailto:, tel:, etc.)
    External(&'a str),
    /// Pure fragment/anchor link (#section). Value is anchor without `#`.
    Fragment(&'a str),
    /// Site-root-relative path (/about, /posts/hello).
    SiteRoot(&'a str),
    /// File-relative path (./other, ../other).
    FileRelative(&'a str),
}

impl<'a> LinkKind<'a> {
    /// Parse a link string into its syntactic kind.
    #[inline]
    pub fn parse(link: &'a str) -> Self {
        if is_external_link(link) || link.starts_with("//") {
            Self::External(link)
        } else if let Some(anchor) = link.strip_prefix('#') {
            Self::Fragment(anchor)
        } else if let Some(anchor) = link.strip_prefix("./#") {
            Self::Fragment(anchor)
        } else if link.starts_with('/') {
            Self::SiteRoot(link)
        } else {
            Self::FileRelative(link)
        }
    }

    /// Whether the crawler follows this link.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::SiteRoot(_) | Self::FileRelative(_))
    }
}

/// Check if a link has a URL scheme (`http:`, `mailto:`, ...).
///
/// A scheme is at least one character of ASCII alphanumerics or `+-.`
/// before the first colon.
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
