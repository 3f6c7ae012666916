use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::Result;
use crate::source::{DocumentSource, NamedDocument};

/// macOSで作成されたZIPに含まれる不要なディレクトリ
const MACOS_METADATA_DIR: &str = "__MACOSX/";

/// Upper bound on the buffer reserved from a member's declared size.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// ヘッダーの宣言サイズは信用せず、上限付きで確保する
fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}

/// XML members of a zip archive, at any depth.
#[derive(Debug, Clone)]
pub struct ZipHandler {
    path: PathBuf,
}

impl ZipHandler {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reads the XML members from any zip stream.
    pub fn read_xml_members<R: Read + Seek>(reader: R) -> Result<Vec<NamedDocument>> {
        let mut archive = ZipArchive::new(reader)?;
        let mut documents = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();

            if entry.is_dir()
                || name.starts_with(MACOS_METADATA_DIR)
                || name.contains(&format!("/{}", MACOS_METADATA_DIR))
                || !name.to_ascii_lowercase().ends_with(".xml")
            {
                continue;
            }

            let mut bytes = Vec::with_capacity(initial_capacity(entry.size()));
            entry.read_to_end(&mut bytes)?;
            documents.push(NamedDocument::new(name, bytes));
        }

        Ok(documents)
    }
}

impl DocumentSource for ZipHandler {
    fn documents(&self) -> Result<Vec<NamedDocument>> {
        let file = File::open(&self.path)?;
        let documents = Self::read_xml_members(file)?;
        debug!(
            "Found {} XML members in {}",
            documents.len(),
            self.path.display()
        );
        Ok(documents)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}
