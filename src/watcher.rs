//! File system watcher for individual configuration files.
//!
//! Each registration watches one exact file. Under the hood the parent
//! directory is watched non-recursively, so the file can be created, replaced
//! or deleted without losing the registration.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Created,
    Modified,
    Removed,
}

/// Notification that a watched file changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

fn change_kind(kind: &EventKind) -> Option<FileChangeKind> {
    match kind {
        EventKind::Create(_) => Some(FileChangeKind::Created),
        EventKind::Modify(_) => Some(FileChangeKind::Modified),
        EventKind::Remove(_) => Some(FileChangeKind::Removed),
        _ => None,
    }
}

/// Routes raw watcher events for one file to its callback.
///
/// The first platform error ends delivery for good.
struct Delivery<F> {
    target: PathBuf,
    file_name: OsString,
    stopped: bool,
    on_change: F,
}

impl<F: Fn(FileChange)> Delivery<F> {
    fn handle(&mut self, res: std::result::Result<Event, notify::Error>) {
        if self.stopped {
            return;
        }
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(file = %self.target.display(), %err, "file watcher error, no further changes will be reported");
                self.stopped = true;
                return;
            }
        };
        let Some(kind) = change_kind(&event.kind) else {
            return;
        };
        let touches_target = event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()));
        if touches_target {
            (self.on_change)(FileChange {
                path: self.target.clone(),
                kind,
            });
        }
    }
}

/// Watches files, one registration per file path.
#[derive(Default)]
pub struct FileWatcher {
    watchers: HashMap<PathBuf, RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `on_change` whenever `path` is created, modified or removed.
    ///
    /// Replaces any earlier registration for the same path. `on_change` runs
    /// on the watcher's own thread. Errors reported by the platform watcher
    /// after registration are logged and end delivery for that file.
    pub fn watch<F>(&mut self, path: &Path, on_change: F) -> Result<()>
    where
        F: Fn(FileChange) + Send + 'static,
    {
        let target = std::path::absolute(path)?;
        let (Some(dir), Some(file_name)) = (target.parent(), target.file_name()) else {
            return Err(Error::InvalidInput(format!(
                "cannot watch {}: not a file path",
                path.display()
            )));
        };
        let dir = dir.to_path_buf();
        let mut delivery = Delivery {
            target: target.clone(),
            file_name: file_name.to_os_string(),
            stopped: false,
            on_change,
        };

        self.watchers.remove(&target);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| delivery.handle(res),
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::debug!(file = %target.display(), "watching file");
        self.watchers.insert(target, watcher);
        Ok(())
    }

    /// Stop watching `path`. Returns false if it was not watched.
    pub fn unwatch(&mut self, path: &Path) -> bool {
        let Ok(target) = std::path::absolute(path) else {
            return false;
        };
        let removed = self.watchers.remove(&target).is_some();
        if removed {
            tracing::debug!(file = %target.display(), "stopped watching file");
        }
        removed
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        std::path::absolute(path).is_ok_and(|target| self.watchers.contains_key(&target))
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("files", &self.watchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_registrations_are_keyed_by_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");

        let mut watcher = FileWatcher::new();
        watcher.watch(&a, |_| {}).unwrap();
        watcher.watch(&b, |_| {}).unwrap();
        assert_eq!(watcher.len(), 2);

        // Same file again replaces the registration
        watcher.watch(&a, |_| {}).unwrap();
        assert_eq!(watcher.len(), 2);

        assert!(watcher.unwatch(&a));
        assert!(!watcher.unwatch(&a));
        assert!(watcher.is_watching(&b));
        assert!(!watcher.is_watching(&a));
    }

    #[test]
    fn test_platform_error_ends_delivery() {
        let (tx, rx) = mpsc::channel();
        let mut delivery = Delivery {
            target: PathBuf::from("/ws/.vscode/servers.json"),
            file_name: OsString::from("servers.json"),
            stopped: false,
            on_change: move |change: FileChange| {
                let _ = tx.send(change);
            },
        };
        let modified = || {
            Ok(Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(PathBuf::from("/ws/.vscode/servers.json")))
        };

        delivery.handle(modified());
        assert_eq!(rx.try_recv().unwrap().kind, FileChangeKind::Modified);

        delivery.handle(Err(notify::Error::generic("inotify queue overflow")));
        delivery.handle(modified());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new();
        let result = watcher.watch(&dir.path().join("missing").join("servers.json"), |_| {});
        assert!(result.is_err());
        assert!(watcher.is_empty());
    }

    #[test]
    fn test_reports_changes_to_target_only() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("servers.json");
        fs::write(&target, "{}").unwrap();

        let (tx, rx) = mpsc::channel();
        let mut watcher = FileWatcher::new();
        watcher
            .watch(&target, move |change| {
                let _ = tx.send(change);
            })
            .unwrap();

        fs::write(dir.path().join("other.json"), "{}").unwrap();
        fs::write(&target, "{\"version\": \"0.2.1\"}").unwrap();

        let change = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(change.path, std::path::absolute(&target).unwrap());
        assert!(matches!(
            change.kind,
            FileChangeKind::Created | FileChangeKind::Modified
        ));
    }
}
