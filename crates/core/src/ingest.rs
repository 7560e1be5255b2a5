use crate::{Document, IngestError};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads a file as UTF-8 text without trimming or normalising anything.
pub fn load_document(path: &Path) -> Result<Document, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    let bytes = fs::read(path)?;
    let content = String::from_utf8(bytes).map_err(|_| IngestError::NotUtf8(path.to_path_buf()))?;

    Ok(Document::new(name, content))
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Loads explicit files plus every `.txt` under `folder`, skipping files
/// that cannot be read. Fails only when nothing usable was found.
pub fn load_documents_best_effort(
    files: &[PathBuf],
    folder: Option<&Path>,
) -> Result<IngestionReport, IngestError> {
    let mut paths = files.to_vec();
    if let Some(folder) = folder {
        paths.extend(discover_text_files(folder));
    }

    if paths.is_empty() {
        let origin = folder.map_or_else(|| "no paths given".to_string(), |dir| dir.display().to_string());
        return Err(IngestError::NoDocuments(origin));
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in paths {
        match load_document(&path) {
            Ok(document) => documents.push(document),
            Err(error) => skipped_files.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    if documents.is_empty() {
        return Err(IngestError::NoDocuments(format!(
            "all {} file(s) were skipped",
            skipped_files.len()
        )));
    }

    Ok(IngestionReport {
        documents,
        skipped_files,
    })
}
