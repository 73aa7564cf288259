//! Read-mode file streams with hash-based change detection.
//!
//! The event thread ticks every registered stream once per iteration; a
//! stream hashes the file contents and fans the change out to its
//! subscribers when the hash moved.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

/// Callback invoked when the watched file changes.
pub type ChangeSubscriber = Box<dyn FnMut() + Send>;

/// A watched file handle.
pub struct FileStream {
    path: PathBuf,
    last_hash: Option<u64>,
    subscribers: Vec<ChangeSubscriber>,
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("last_hash", &self.last_hash)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl FileStream {
    /// Start watching a file. The initial contents are hashed immediately
    /// so only subsequent edits count as changes.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_hash = hash_file(&path);
        Self {
            path,
            last_hash,
            subscribers: Vec::new(),
        }
    }

    /// The watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a change subscriber.
    pub fn on_change(&mut self, subscriber: ChangeSubscriber) {
        self.subscribers.push(subscriber);
    }

    /// Re-hash the file and fire subscribers on a hash delta. Returns
    /// whether a change was detected. An unreadable file is not a change.
    pub fn tick(&mut self) -> bool {
        let Some(hash) = hash_file(&self.path) else {
            return false;
        };
        let changed = match self.last_hash {
            Some(previous) => previous != hash,
            None => true,
        };
        self.last_hash = Some(hash);
        if changed {
            for subscriber in &mut self.subscribers {
                subscriber();
            }
        }
        changed
    }
}

fn hash_file(path: &Path) -> Option<u64> {
    let contents = fs::read(path).ok()?;
    let mut hasher = DefaultHasher::new();
    hasher.write(&contents);
    Some(hasher.finish())
}
