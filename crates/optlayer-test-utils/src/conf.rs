//! [`TestConfDir`] for tests that read and write layer config files.

use optlayer_conf::ConfigStore;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding conf files, removed on drop.
///
/// # Example
///
/// ```rust
/// use optlayer_test_utils::TestConfDir;
///
/// let dir = TestConfDir::new();
/// let path = dir.write("project.conf", "render.bounces = 4\n");
/// assert!(path.exists());
/// dir.assert_contains("project.conf", "render.bounces = 4");
/// ```
pub struct TestConfDir {
    temp_dir: TempDir,
}

impl Default for TestConfDir {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `name` inside the directory; the file need not exist.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    /// Write `content` to `name`, creating parent directories.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> String {
        let path = self.path(name);
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("Could not read file: {}", path.display()))
    }

    /// Parse `name` the way layers load it.
    pub fn load(&self, name: &str) -> ConfigStore {
        ConfigStore::load(&self.path(name)).unwrap()
    }

    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_contains(&self, name: &str, content: &str) {
        let file_content = self.read(name);
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            name,
            content,
            file_content
        );
    }

    /// # Panics
    /// Panics if the file exists.
    pub fn assert_missing(&self, name: &str) {
        let path = self.path(name);
        assert!(!path.exists(), "Expected file NOT to exist: {}", path.display());
    }
}
