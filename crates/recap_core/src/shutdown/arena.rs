//! Engine-owned scratch registry.
//!
//! A [`TempArena`] tracks the temp files one workflow run creates.
//! Each path is mirrored into the process-wide [`ShutdownManager`]
//! registry so an abrupt exit still cleans it up; releasing a path on
//! stage success removes it from both, letting the artifact survive.
//! Dropping the arena deletes whatever was not released.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::ShutdownManager;

/// Scratch-path registry owned by one engine run.
pub struct TempArena {
    manager: ShutdownManager,
    paths: Mutex<BTreeSet<PathBuf>>,
}

impl TempArena {
    pub fn new(manager: ShutdownManager) -> Self {
        Self {
            manager,
            paths: Mutex::new(BTreeSet::new()),
        }
    }

    /// Track a scratch path for cleanup.
    pub fn register(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.manager.register_temp_file(&path);
        self.paths.lock().insert(path);
    }

    /// Stop tracking a path; the file survives both arena drop and
    /// process cleanup.
    pub fn release(&self, path: &Path) {
        self.manager.unregister_temp_file(path);
        self.paths.lock().remove(path);
    }

    /// Number of paths still tracked.
    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}

impl Drop for TempArena {
    fn drop(&mut self) {
        let paths: Vec<PathBuf> = self.paths.lock().iter().cloned().collect();
        for path in paths {
            self.manager.unregister_temp_file(&path);
            if !path.exists() {
                continue;
            }
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = result {
                tracing::warn!("Failed to remove scratch path {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn drop_deletes_unreleased_paths() {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch.wav");
        let artifact = dir.path().join("artifact.m4a");
        fs::write(&scratch, b"s").unwrap();
        fs::write(&artifact, b"a").unwrap();

        let manager = ShutdownManager::new();
        {
            let arena = TempArena::new(manager.clone());
            arena.register(&scratch);
            arena.register(&artifact);
            arena.release(&artifact);
            assert_eq!(arena.len(), 1);
        }

        assert!(!scratch.exists());
        assert!(artifact.exists());
        // Nothing left behind in the process-wide registry either.
        assert!(manager.tracked_temp_files().is_empty());
    }

    #[test]
    fn registered_paths_are_mirrored_to_manager() {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("chunk.tmp");
        fs::write(&scratch, b"x").unwrap();

        let manager = ShutdownManager::new();
        let arena = TempArena::new(manager.clone());
        arena.register(&scratch);
        assert_eq!(manager.tracked_temp_files(), vec![scratch.clone()]);

        arena.release(&scratch);
        assert!(manager.tracked_temp_files().is_empty());
        assert!(scratch.exists());
    }
}
