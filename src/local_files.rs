use std::fs;
use std::path::Path;

use crate::error::Result;

/// Trait for the file operations the mapping validator depends on.
pub trait FileAccess {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<String>;
}

/// Local filesystem implementation
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileAccess for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }
}

/// In-memory file set for tests.
#[cfg(test)]
pub(crate) struct MemFs {
    files: std::collections::HashMap<std::path::PathBuf, String>,
}

#[cfg(test)]
impl MemFs {
    pub fn new() -> Self {
        Self {
            files: std::collections::HashMap::new(),
        }
    }

    pub fn with(mut self, path: &str, content: &str) -> Self {
        self.files
            .insert(std::path::PathBuf::from(path), content.to_string());
        self
    }
}

#[cfg(test)]
impl FileAccess for MemFs {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            crate::error::Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_returns_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello").unwrap();
        let fs = LocalFs::new();
        assert!(fs.exists(file.path()));
        assert_eq!(fs.read(file.path()).unwrap(), "hello\n");
    }

    #[test]
    fn exists_is_false_for_missing_path() {
        let fs = LocalFs::new();
        assert!(!fs.exists(Path::new("/no/such/file.yaml")));
    }
}
