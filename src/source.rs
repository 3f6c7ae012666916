//! Sources of named XML documents.
//!
//! The dataset only sees [`DocumentSource`]; where the bytes come from (a
//! single file, a directory, a zip archive, memory) is decided here.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DemError, Result};
use crate::zip_handler::ZipHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl NamedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

pub trait DocumentSource: Send + Sync {
    /// Every XML document the source holds. Order is not significant.
    fn documents(&self) -> Result<Vec<NamedDocument>>;

    /// Where the documents come from, for error messages.
    fn location(&self) -> &Path;
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(ext))
}

/// A single `.xml` file.
#[derive(Debug, Clone)]
pub struct XmlFile {
    path: PathBuf,
}

impl XmlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for XmlFile {
    fn documents(&self) -> Result<Vec<NamedDocument>> {
        if !has_extension(&self.path, "xml") {
            return Err(DemError::UnsupportedInput(self.path.clone()));
        }
        let name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(vec![NamedDocument::new(name, fs::read(&self.path)?)])
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// `*.xml` files directly inside a directory, plus the XML members of any
/// `*.zip` archives next to them.
#[derive(Debug, Clone)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for Directory {
    fn documents(&self) -> Result<Vec<NamedDocument>> {
        let mut paths = fs::read_dir(&self.path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            if !path.is_file() {
                continue;
            }
            if has_extension(&path, "xml") {
                documents.extend(XmlFile::new(&path).documents()?);
            } else if has_extension(&path, "zip") {
                documents.extend(ZipHandler::new(&path).documents()?);
            }
        }

        debug!(
            "Found {} XML documents in {}",
            documents.len(),
            self.path.display()
        );
        Ok(documents)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Documents held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    label: PathBuf,
    documents: Vec<NamedDocument>,
}

impl MemorySource {
    pub fn new(documents: Vec<NamedDocument>) -> Self {
        Self {
            label: PathBuf::from("<memory>"),
            documents,
        }
    }
}

impl DocumentSource for MemorySource {
    fn documents(&self) -> Result<Vec<NamedDocument>> {
        Ok(self.documents.clone())
    }

    fn location(&self) -> &Path {
        &self.label
    }
}

/// Picks the source matching `path`: a directory, a `.zip` or an `.xml` file.
pub fn open_source(path: &Path) -> Result<Box<dyn DocumentSource>> {
    if path.is_dir() {
        Ok(Box::new(Directory::new(path)))
    } else if path.is_file() && has_extension(path, "zip") {
        Ok(Box::new(ZipHandler::new(path)))
    } else if path.is_file() && has_extension(path, "xml") {
        Ok(Box::new(XmlFile::new(path)))
    } else {
        Err(DemError::UnsupportedInput(path.to_path_buf()))
    }
}
