//! App directory watcher.
//!
//! Raw notify events are collapsed per path by a [`Debouncer`] and handed to
//! [`DevServer::apply_changes`] once the directory has been quiet for
//! [`DEBOUNCE_MS`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;

use super::DevServer;

const DEBOUNCE_MS: u64 = 150;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

// ============================================================================
// Debouncer
// ============================================================================

#[derive(Default)]
pub struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    /// Record a notify event.
    ///
    /// - Removed, then Created/Modified: the file came back
    /// - Modified, then Removed: the file is gone
    /// - Created, then Removed: nothing happened
    /// - anything else: first event wins
    pub fn add_event(&mut self, event: &notify::Event) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            EventKind::Modify(ModifyKind::Name(mode)) => return self.add_rename(mode, &event.paths),
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return,
        };

        for path in &event.paths {
            self.add_change(path, kind);
        }
    }

    /// A rename removes the old path and creates the new one. Backends that
    /// cannot tell the two apart report each path on its own.
    fn add_rename(&mut self, mode: RenameMode, paths: &[PathBuf]) {
        match (mode, paths) {
            (RenameMode::Both, [from, to]) => {
                self.add_change(from, ChangeKind::Removed);
                self.add_change(to, ChangeKind::Created);
            }
            (RenameMode::From, _) => {
                for path in paths {
                    self.add_change(path, ChangeKind::Removed);
                }
            }
            (RenameMode::To, _) => {
                for path in paths {
                    self.add_change(path, ChangeKind::Created);
                }
            }
            _ => {
                for path in paths {
                    let kind = if path.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Removed
                    };
                    self.add_change(path, kind);
                }
            }
        }
    }

    fn add_change(&mut self, path: &Path, kind: ChangeKind) {
        if is_temp_file(path) {
            return;
        }
        match (self.changes.get(path).copied(), kind) {
            (None, _) | (Some(ChangeKind::Removed), ChangeKind::Created | ChangeKind::Modified) => {
                self.changes.insert(path.to_path_buf(), kind);
            }
            (Some(ChangeKind::Modified), ChangeKind::Removed) => {
                self.changes.insert(path.to_path_buf(), ChangeKind::Removed);
            }
            (Some(ChangeKind::Created), ChangeKind::Removed) => {
                self.changes.remove(path);
            }
            _ => return,
        }
        crate::debug!("watch"; "{} {}", kind.label(), path.display());
        self.last_event = Some(Instant::now());
    }

    /// Pending changes, once the debounce window has passed.
    pub fn take_if_ready(&mut self) -> Option<Vec<(PathBuf, ChangeKind)>> {
        let last_event = self.last_event?;
        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return None;
        }

        self.last_event = None;
        let mut changes: Vec<_> = self.changes.drain().collect();
        if changes.is_empty() {
            return None;
        }
        changes.sort();
        Some(changes)
    }

    /// How long to wait before the next [`take_if_ready`](Self::take_if_ready).
    pub fn sleep_duration(&self) -> Duration {
        match self.last_event {
            Some(last_event) => Duration::from_millis(DEBOUNCE_MS)
                .saturating_sub(last_event.elapsed())
                .max(Duration::from_millis(1)),
            None => Duration::from_secs(3600),
        }
    }
}

/// Editor swap and backup files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

// ============================================================================
// Watch loop
// ============================================================================

/// Watch the app directory (and the document template) until `shutdown`
/// fires, applying debounced changes to `server`.
pub fn spawn_watcher(server: Arc<DevServer>, shutdown: Receiver<()>) -> Result<JoinHandle<()>> {
    let (tx, rx) = channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("failed to create file watcher")?;

    let config = server.config();
    watcher
        .watch(config.app_dir(), RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", config.app_dir().display()))?;
    if let Some(template) = &config.app.template {
        watcher.watch(template, RecursiveMode::NonRecursive)?;
    }
    crate::debug!("watch"; "watching {}", config.root_relative(config.app_dir()).display());

    let handle = thread::spawn(move || {
        // Dropping the watcher stops notify.
        let _watcher = watcher;
        let mut debouncer = Debouncer::default();

        loop {
            channel::select! {
                recv(shutdown) -> _ => break,
                recv(rx) -> msg => match msg {
                    Ok(Ok(event)) => debouncer.add_event(&event),
                    Ok(Err(e)) => crate::log!("watch"; "notify error: {}", e),
                    Err(_) => break,
                },
                default(debouncer.sleep_duration()) => {}
            }

            if crate::core::is_serving()
                && let Some(changes) = debouncer.take_if_ready()
            {
                server.apply_changes(&changes);
            }
        }
        crate::debug!("watch"; "stopped");
    });
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, MetadataKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    fn drain(debouncer: &mut Debouncer) -> Vec<(PathBuf, ChangeKind)> {
        let mut changes: Vec<_> = debouncer.changes.drain().collect();
        changes.sort();
        changes
    }

    #[test]
    fn test_dedup_rules() {
        let mut debouncer = Debouncer::default();
        let modify = EventKind::Modify(ModifyKind::Any);
        let create = EventKind::Create(CreateKind::File);
        let remove = EventKind::Remove(RemoveKind::File);

        debouncer.add_event(&event(remove, "/app/a/page.md"));
        debouncer.add_event(&event(create, "/app/a/page.md"));
        debouncer.add_event(&event(modify, "/app/b/page.md"));
        debouncer.add_event(&event(remove, "/app/b/page.md"));
        debouncer.add_event(&event(create, "/app/c/page.md"));
        debouncer.add_event(&event(remove, "/app/c/page.md"));
        debouncer.add_event(&event(create, "/app/d/page.md"));
        debouncer.add_event(&event(modify, "/app/d/page.md"));

        assert_eq!(
            drain(&mut debouncer),
            vec![
                (PathBuf::from("/app/a/page.md"), ChangeKind::Created),
                (PathBuf::from("/app/b/page.md"), ChangeKind::Removed),
                (PathBuf::from("/app/d/page.md"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_rename_removes_old_path() {
        let mut debouncer = Debouncer::default();
        let rename = |mode| EventKind::Modify(ModifyKind::Name(mode));

        debouncer.add_event(
            &notify::Event::new(rename(RenameMode::Both))
                .add_path(PathBuf::from("/app/a/page.md"))
                .add_path(PathBuf::from("/app/a/page.html")),
        );
        debouncer.add_event(&event(rename(RenameMode::From), "/app/b/page.md"));
        debouncer.add_event(&event(rename(RenameMode::To), "/app/c/page.md"));

        assert_eq!(
            drain(&mut debouncer),
            vec![
                (PathBuf::from("/app/a/page.html"), ChangeKind::Created),
                (PathBuf::from("/app/a/page.md"), ChangeKind::Removed),
                (PathBuf::from("/app/b/page.md"), ChangeKind::Removed),
                (PathBuf::from("/app/c/page.md"), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_ignores_noise() {
        let mut debouncer = Debouncer::default();
        debouncer.add_event(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
            "/app/page.md",
        ));
        debouncer.add_event(&event(EventKind::Modify(ModifyKind::Any), "/app/.page.md.swp"));
        debouncer.add_event(&event(EventKind::Modify(ModifyKind::Any), "/app/page.md~"));
        assert!(debouncer.changes.is_empty());
        assert!(debouncer.last_event.is_none());
    }

    #[test]
    fn test_take_waits_for_quiet() {
        let mut debouncer = Debouncer::default();
        assert!(debouncer.take_if_ready().is_none());

        debouncer.add_event(&event(EventKind::Modify(ModifyKind::Any), "/app/page.md"));
        assert!(debouncer.take_if_ready().is_none());
        assert!(debouncer.sleep_duration() <= Duration::from_millis(DEBOUNCE_MS));

        debouncer.last_event = Some(Instant::now() - Duration::from_millis(DEBOUNCE_MS));
        let changes = debouncer.take_if_ready().unwrap();
        assert_eq!(changes, vec![(PathBuf::from("/app/page.md"), ChangeKind::Modified)]);
        assert!(debouncer.take_if_ready().is_none());
    }
}
