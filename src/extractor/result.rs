use crate::error::{ErrorKind, ExtractorError};
use crate::scanner::folder_scanner::ArchiveCandidate;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    Error,
    Skipped,
}

impl ExtractionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionStatus::Success => "Success",
            ExtractionStatus::Error => "Error",
            ExtractionStatus::Skipped => "Skipped",
        }
    }
}

/// Outcome for one folder. Built once by the orchestrator and never changed afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub status: ExtractionStatus,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    pub archive_name: Option<String>,
    pub original_size_mb: Option<f64>,
    pub extracted_size_mb: Option<f64>,
    pub files: Vec<String>,
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub duration: Duration,
}

impl ExtractionResult {
    pub fn success(
        candidate: &ArchiveCandidate,
        files: Vec<String>,
        extracted_bytes: u64,
        duration: Duration,
    ) -> Self {
        let message = format!(
            "Extracted {} file(s) ({})",
            files.len(),
            candidate.format.kind.method_label()
        );

        Self {
            status: ExtractionStatus::Success,
            message,
            error_kind: None,
            archive_name: Some(candidate.file_name.clone()),
            original_size_mb: Some(bytes_to_mb(candidate.size)),
            extracted_size_mb: Some(bytes_to_mb(extracted_bytes)),
            files,
            created: candidate.created.map(DateTime::<Local>::from),
            modified: Some(DateTime::<Local>::from(candidate.modified)),
            duration,
        }
    }

    /// Failed extraction. When the archive is known its original size is kept and
    /// the extracted size is zero.
    pub fn failure(
        candidate: Option<&ArchiveCandidate>,
        error: &ExtractorError,
        duration: Duration,
    ) -> Self {
        Self {
            status: ExtractionStatus::Error,
            message: failure_message(error),
            error_kind: Some(error.kind()),
            archive_name: candidate.map(|c| c.file_name.clone()),
            original_size_mb: candidate.map(|c| bytes_to_mb(c.size)),
            extracted_size_mb: candidate.map(|_| 0.0),
            files: Vec::new(),
            created: candidate.and_then(|c| c.created).map(DateTime::<Local>::from),
            modified: candidate.map(|c| DateTime::<Local>::from(c.modified)),
            duration,
        }
    }

    pub fn skipped(folder: &Path, duration: Duration) -> Self {
        let error = ExtractorError::NoCandidate {
            folder: folder.display().to_string(),
        };

        Self {
            status: ExtractionStatus::Skipped,
            message: "No valid archive found".to_string(),
            error_kind: Some(error.kind()),
            archive_name: None,
            original_size_mb: None,
            extracted_size_mb: None,
            files: Vec::new(),
            created: None,
            modified: None,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ExtractionStatus::Error
    }
}

fn failure_message(error: &ExtractorError) -> String {
    match error {
        ExtractorError::WrongPassword { .. } => {
            format!("Wrong or missing password: {}", error)
        }
        _ => format!("Error: {}", error),
    }
}

/// Bytes to megabytes, rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Folder-to-result mapping that keeps insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderResults {
    entries: Vec<FolderResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderResult {
    pub folder: PathBuf,
    pub result: ExtractionResult,
}

impl FolderResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the result for `folder`; a replaced entry keeps its position.
    pub fn insert(&mut self, folder: PathBuf, result: ExtractionResult) {
        match self.entries.iter_mut().find(|entry| entry.folder == folder) {
            Some(entry) => entry.result = result,
            None => self.entries.push(FolderResult { folder, result }),
        }
    }

    pub fn get(&self, folder: &Path) -> Option<&ExtractionResult> {
        self.entries
            .iter()
            .find(|entry| entry.folder == folder)
            .map(|entry| &entry.result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &ExtractionResult)> {
        self.entries
            .iter()
            .map(|entry| (entry.folder.as_path(), &entry.result))
    }

    pub fn folders(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|entry| entry.folder.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.result.is_error()).count()
    }
}
