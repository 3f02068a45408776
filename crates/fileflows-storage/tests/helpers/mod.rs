//! Test helpers: a dispatcher wired to an in-process remote store and a
//! scratch directory, plus file fixtures.
//!
//! Run from workspace root: `cargo test -p fileflows-storage --test file_ops_test`.

pub mod fixtures;

use fileflows_storage::{FileOps, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Install a subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Dispatcher, its remote store and a scratch directory.
pub struct TestEnv {
    pub ops: FileOps,
    pub store: Arc<MemoryStore>,
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        Self {
            ops: FileOps::with_store(store.clone()),
            store,
            temp_dir,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a local file below the scratch directory, creating parents.
    pub fn write(&self, relative: &str, data: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, data).expect("Failed to write fixture");
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
