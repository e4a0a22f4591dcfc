use crate::error::{ExtractorError, Result};
use crate::extractor::strategy::{
    display_name, ensure_output_dir, ExtractContext, ExtractRequest, ExtractionStrategy,
};
use crate::scanner::format_registry::StrategyKind;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Sequential in-process ZIP extraction with optional ZipCrypto password.
#[derive(Debug, Default)]
pub struct ZipStrategy;

impl ExtractionStrategy for ZipStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PlainZip
    }

    fn extract(&self, request: &ExtractRequest<'_>, ctx: &ExtractContext<'_>) -> Result<Vec<String>> {
        ensure_output_dir(request.output)?;

        let file = File::open(request.archive)?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| map_zip_error(request.archive, e, request.password))?;

        debug!(
            "Extracting {} zip entries from {}",
            archive.len(),
            request.archive.display()
        );

        let mut throttle = ctx.throttle();
        let mut names = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut entry = match request.password {
                Some(password) => archive.by_index_decrypt(index, password.as_bytes()),
                None => archive.by_index(index),
            }
            .map_err(|e| map_zip_error(request.archive, e, request.password))?;

            let relative = match entry.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!("Skipping unsafe zip entry path: {}", entry.name());
                    continue;
                }
            };

            let target = request.output.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let encrypted = entry.encrypted();
            let mut writer = BufWriter::new(File::create(&target)?);
            io::copy(&mut entry, &mut writer).map_err(|e| {
                // ZipCrypto checks a single header byte, so a wrong key can still reach the data.
                if encrypted && is_decode_failure(&e) {
                    ExtractorError::WrongPassword {
                        archive: request.archive.display().to_string(),
                        detail: e.to_string(),
                    }
                } else {
                    ExtractorError::Io(e)
                }
            })?;
            writer.flush()?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
                }
            }

            let name = display_name(&relative);
            if let Some(progress) = throttle.record(&name) {
                ctx.report_entry(&progress);
            }
            names.push(name);
        }

        if let Some(progress) = throttle.finish() {
            ctx.report_entry(&progress);
        }

        Ok(names)
    }
}

fn is_decode_failure(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
    )
}

fn map_zip_error(archive: &Path, error: ZipError, password: Option<&str>) -> ExtractorError {
    let archive = archive.display().to_string();

    match error {
        ZipError::UnsupportedArchive(detail) if detail == ZipError::PASSWORD_REQUIRED => {
            ExtractorError::WrongPassword {
                archive,
                detail: if password.is_none() {
                    "password required".to_string()
                } else {
                    detail.to_string()
                },
            }
        }
        ZipError::InvalidPassword => ExtractorError::WrongPassword {
            archive,
            detail: "invalid password".to_string(),
        },
        ZipError::Io(e) => ExtractorError::Io(e),
        other => ExtractorError::Archive {
            archive,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::extractor::cancel::CancelToken;
    use crate::scanner::format_registry::FormatRegistry;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::unstable::write::FileOptionsExt;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)], password: Option<&'static [u8]>) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let mut options = SimpleFileOptions::default();
        if let Some(password) = password {
            options = options.with_deprecated_encryption(password);
        }
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn run(archive: &Path, output: &Path, password: Option<&str>) -> Result<Vec<String>> {
        let format = FormatRegistry::default().resolve_path(archive).unwrap();
        let request = ExtractRequest {
            archive,
            format,
            output,
            password,
        };
        ZipStrategy.extract(&request, &ExtractContext::new(CancelToken::new()))
    }

    #[test]
    fn test_extracts_entries_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("backup.zip");
        write_zip(
            &archive,
            &[("a.txt", "alpha"), ("dir/b.txt", "bravo")],
            None,
        );

        let output = temp_dir.path().join("extracted_backup");
        let names = run(&archive, &output, None).unwrap();

        assert_eq!(names, vec!["a.txt".to_string(), "dir/b.txt".to_string()]);
        assert_eq!(fs::read(output.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(output.join("dir/b.txt")).unwrap(), b"bravo");
    }

    #[test]
    fn test_encrypted_zip_with_password() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("secret.zip");
        write_zip(&archive, &[("secret.txt", "hidden content")], Some(&b"s3cret"[..]));

        let output = temp_dir.path().join("out");
        let names = run(&archive, &output, Some("s3cret")).unwrap();

        assert_eq!(names, vec!["secret.txt".to_string()]);
        assert_eq!(fs::read(output.join("secret.txt")).unwrap(), b"hidden content");
    }

    #[test]
    fn test_encrypted_zip_without_password_is_password_error() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("secret.zip");
        write_zip(&archive, &[("secret.txt", "hidden content")], Some(&b"s3cret"[..]));

        let error = run(&archive, &temp_dir.path().join("out"), None).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongPassword);
    }

    #[test]
    fn test_encrypted_zip_with_wrong_password_is_password_error() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("secret.zip");
        write_zip(&archive, &[("secret.txt", "hidden content")], Some(&b"s3cret"[..]));

        let error = run(&archive, &temp_dir.path().join("out"), Some("nope")).unwrap_err();
        assert!(error.is_password_error());
    }

    #[test]
    fn test_corrupt_zip_is_archive_error() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file at all").unwrap();

        let error = run(&archive, &temp_dir.path().join("out"), None).unwrap_err();
        assert!(matches!(
            error,
            ExtractorError::Archive { .. } | ExtractorError::Io(_)
        ));
    }

    #[test]
    fn test_output_folder_created_for_empty_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("empty.zip");
        write_zip(&archive, &[], None);

        let output: PathBuf = temp_dir.path().join("extracted_empty");
        let names = run(&archive, &output, None).unwrap();
        assert!(names.is_empty());
        assert!(output.is_dir());
    }
}
