//! Errors raised while loading `vessel.toml`.

use super::FieldPath;
use owo_colors::OwoColorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid config file")]
    Toml(#[from] toml::de::Error),

    // Not a #[source]: the diagnostics already print in full.
    #[error("{0}")]
    Diagnostics(ConfigDiagnostics),
}

/// One problem with one field.
#[derive(Debug, Clone)]
pub struct ConfigDiagnostic {
    pub field: FieldPath,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {} {}", self.field, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n    {} {}", "hint:".yellow(), hint.dimmed())?;
        }
        Ok(())
    }
}

/// Every problem found while validating, so one run reports them all.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    items: Vec<ConfigDiagnostic>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(field, message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(field, message.into(), Some(hint.into()));
    }

    fn push(&mut self, field: FieldPath, message: String, hint: Option<String>) {
        self.items.push(ConfigDiagnostic {
            field,
            message,
            hint,
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigDiagnostic> {
        self.items.iter()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.items.len();
        write!(
            f,
            "{} ({} {})",
            "invalid configuration".red().bold(),
            count,
            if count == 1 { "problem" } else { "problems" }
        )?;
        for item in &self.items {
            write!(f, "\n{item}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigDiagnostics {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_error_names_file() {
        let err = ConfigError::Io(
            PathBuf::from("vessel.toml"),
            Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "cannot read `vessel.toml`");
    }

    #[test]
    fn test_diagnostics_collect() {
        let mut diag = ConfigDiagnostics::new();
        assert!(diag.is_empty());
        diag.error(FieldPath::new("routes.entries"), "must start with `/`");
        diag.error_with_hint(FieldPath::new("build.concurrency"), "must be positive", "use 1 or more");
        assert_eq!(diag.len(), 2);
        assert_eq!(diag.iter().nth(1).unwrap().hint.as_deref(), Some("use 1 or more"));

        let display = diag.into_result().unwrap_err().to_string();
        assert!(display.contains("2 problems"));
        assert!(display.contains("routes.entries"));
        assert!(display.contains("use 1 or more"));
    }
}
