//! Script source input.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A script handed to the engine: its path plus the full source text.
///
/// The pair is read once at engine entry and never mutated; every component
/// downstream borrows it.
///
/// # Examples
///
/// ```
/// use script_schema_extraction::ScriptSource;
///
/// let source = ScriptSource::new("/opt/scripts/align.py", "import argparse\n");
/// assert_eq!(source.stem(), "align");
/// assert_eq!(source.extension(), Some("py"));
/// ```
#[derive(Debug, Clone)]
pub struct ScriptSource {
    path: PathBuf,
    text: String,
}

impl ScriptSource {
    /// Creates a source from an already-loaded script.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Reads the script at `path`.
    pub fn read(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        Ok(Self { path, text })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// File stem used as the schema name.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("script")
    }

    /// Directory containing the script, when the path has one.
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_and_extension() {
        let source = ScriptSource::new("/tmp/scripts/trim_reads.py", "");
        assert_eq!(source.stem(), "trim_reads");
        assert_eq!(source.extension(), Some("py"));
        assert_eq!(
            source.directory(),
            Some(Path::new("/tmp/scripts"))
        );
    }

    #[test]
    fn test_bare_name_has_no_directory() {
        let source = ScriptSource::new("script.py", "");
        assert_eq!(source.directory(), None);
    }
}
