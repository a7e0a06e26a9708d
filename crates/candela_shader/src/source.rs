//! Shader source loading
//!
//! A [`ShaderSource`] pairs WGSL text with an origin label so compile and
//! validation errors can name the shader they came from.

use std::fs;
use std::path::Path;

use crate::ShaderError;

/// WGSL source text with an origin label.
#[derive(Clone, Debug)]
pub struct ShaderSource {
    label: String,
    text: String,
}

impl ShaderSource {
    /// Wrap an in-memory source string.
    pub fn from_str(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    /// Read a source file; the label is the file stem.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();

        log::debug!("Loaded shader source '{}' from {:?}", label, path);
        Ok(Self { label, text })
    }

    /// Origin label used in error messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The WGSL text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_str() {
        let source = ShaderSource::from_str("basic", "// wgsl");
        assert_eq!(source.label(), "basic");
        assert_eq!(source.text(), "// wgsl");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glow.wgsl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "// comment only").unwrap();

        let source = ShaderSource::from_file(&path).unwrap();
        assert_eq!(source.label(), "glow");
        assert!(source.text().starts_with("// comment"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.wgsl");

        let err = ShaderSource::from_file(&path).unwrap_err();
        match err {
            ShaderError::Io { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
