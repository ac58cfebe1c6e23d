//! Test fixtures for creating reproducible project directories.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Requirements document used by most fixtures.
pub const SAMPLE_PRD: &str = "# Todo App\n\n\
A small React web app for tracking todos.\n\n\
## Requirements\n\
1. Users can add todos\n\
2. Users can mark todos as done\n\
- The list must persist between reloads\n";

/// A temporary project directory, removed when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::with_requirements();
/// assert!(fixture.file_exists("PRD.md"));
/// ```
pub struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    /// An empty project.
    ///
    /// # Panics
    ///
    /// Panics if temporary directory creation fails.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// A project with `PRD.md` holding [`SAMPLE_PRD`].
    #[must_use]
    pub fn with_requirements() -> Self {
        Self::empty().with_file("PRD.md", SAMPLE_PRD)
    }

    /// A React-style project with tests, components, and a lint config.
    #[must_use]
    pub fn react_project() -> Self {
        Self::with_requirements()
            .with_dir("tests")
            .with_dir("src/components")
            .with_file(".eslintrc.json", "{}")
            .with_file("package.json", r#"{"dependencies": {"react": "^18"}}"#)
    }

    /// Add a file, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write fixture file");
        self
    }

    /// Add a directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn with_dir(self, relative: &str) -> Self {
        std::fs::create_dir_all(self.temp_dir.path().join(relative))
            .expect("Failed to create fixture directory");
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    #[must_use]
    pub fn path_buf(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    #[must_use]
    pub fn file_exists(&self, relative: &str) -> bool {
        self.temp_dir.path().join(relative).exists()
    }

    /// Read a file of the project.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read.
    #[must_use]
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.temp_dir.path().join(relative))
            .expect("Failed to read fixture file")
    }
}
