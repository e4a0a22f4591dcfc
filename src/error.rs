use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Unsupported archive format: {file}")]
    UnsupportedFormat { file: String },

    #[error("Wrong or missing password for {archive}: {detail}")]
    WrongPassword { archive: String, detail: String },

    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String, searched: Vec<String> },

    #[error("External tool failed with exit code {code}: {stderr}")]
    ExternalToolFailure { code: i32, stderr: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No valid archive found in {folder}")]
    NoCandidate { folder: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Corrupt or unreadable archive {archive}: {message}")]
    Archive { archive: String, message: String },
}

/// Serializable classification of an [`ExtractorError`], carried by results and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    WrongPassword,
    ToolNotFound,
    ExternalToolFailure,
    Io,
    NoCandidate,
    Config,
    InvalidPath,
    Cancelled,
    Archive,
}

impl ExtractorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractorError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ExtractorError::WrongPassword { .. } => ErrorKind::WrongPassword,
            ExtractorError::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            ExtractorError::ExternalToolFailure { .. } => ErrorKind::ExternalToolFailure,
            ExtractorError::Io(_) => ErrorKind::Io,
            ExtractorError::NoCandidate { .. } => ErrorKind::NoCandidate,
            ExtractorError::Config { .. } => ErrorKind::Config,
            ExtractorError::InvalidPath { .. } => ErrorKind::InvalidPath,
            ExtractorError::Cancelled => ErrorKind::Cancelled,
            ExtractorError::Archive { .. } => ErrorKind::Archive,
        }
    }

    pub fn is_password_error(&self) -> bool {
        matches!(self, ExtractorError::WrongPassword { .. })
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractorError {
    fn user_message(&self) -> String {
        match self {
            ExtractorError::UnsupportedFormat { file } => {
                format!("File is not a supported archive: {}", file)
            }
            ExtractorError::WrongPassword { archive, .. } => {
                format!("Wrong password for archive: {}", archive)
            }
            ExtractorError::ToolNotFound { tool, searched } => {
                if searched.is_empty() {
                    format!("{} was not found", tool)
                } else {
                    format!("{} was not found (searched: {})", tool, searched.join(", "))
                }
            }
            ExtractorError::ExternalToolFailure { code, stderr } => {
                let detail = stderr.lines().last().unwrap_or("").trim();
                if detail.is_empty() {
                    format!("External extractor exited with code {}", code)
                } else {
                    format!("External extractor exited with code {}: {}", code, detail)
                }
            }
            ExtractorError::NoCandidate { folder } => {
                format!("No valid archive found in {}", folder)
            }
            ExtractorError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ExtractorError::InvalidPath { path } => {
                format!("Invalid path: {}", path)
            }
            ExtractorError::Cancelled => "Extraction was cancelled by user".to_string(),
            ExtractorError::Archive { archive, message } => {
                format!("Could not read archive {}: {}", archive, message)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractorError::UnsupportedFormat { .. } => Some(
                "Supported formats: .zip, .rar, .7z, .tar, .tar.gz, .tgz, .tar.bz2, .tbz2, .tar.xz, .txz, .gz, .bz2, .xz".to_string()
            ),
            ExtractorError::WrongPassword { .. } => Some(
                "Pass the archive password with --password or the BACKUP_EXTRACTOR_PASSWORD environment variable.".to_string()
            ),
            ExtractorError::ToolNotFound { .. } => Some(
                "Install 7-Zip or point to the executable with --seven-zip or extraction.seven_zip_path in the config file.".to_string()
            ),
            ExtractorError::ExternalToolFailure { .. } => Some(
                "Run with -vv to see the extractor output, and check that the archive is not damaged.".to_string()
            ),
            ExtractorError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all values are in range.".to_string()
            ),
            ExtractorError::InvalidPath { .. } => Some(
                "Make sure the root folder exists and is a directory you can read.".to_string()
            ),
            ExtractorError::Io(error) if error.kind() == std::io::ErrorKind::PermissionDenied => Some(
                "Ensure you have read and write permissions for the backup folders.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExtractorError {
    fn from(error: toml::de::Error) -> Self {
        ExtractorError::Config {
            message: error.to_string(),
        }
    }
}

impl From<walkdir::Error> for ExtractorError {
    fn from(error: walkdir::Error) -> Self {
        let path = error
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match error.into_io_error() {
            Some(io_error) => ExtractorError::Io(io_error),
            None => ExtractorError::InvalidPath {
                path: format!("filesystem loop detected at {}", path),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;
