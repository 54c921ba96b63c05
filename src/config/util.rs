//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Extract the path component of a URL string, without surrounding slashes.
///
/// Returns `None` if `url_str` is not an absolute URL.
///
/// # Examples
/// ```ignore
/// extract_url_path("https://example.github.io/my-project/") -> Some("my-project")
/// extract_url_path("https://example.com")                   -> Some("")
/// extract_url_path("/docs/")                                -> None
/// ```
pub fn extract_url_path(url_str: &str) -> Option<String> {
    let parsed = url::Url::parse(url_str).ok()?;
    Some(parsed.path().trim_matches('/').to_string())
}

/// Find config file by searching upward from current directory
///
/// ```text
/// /home/user/site/app/blog/   ← cwd
/// /home/user/site/vessel.toml ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Absolute form of `path`, canonicalized when it exists.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

// ============================================================================
// tests
// ============================================================================
