use crate::config::ReportConfig;
use crate::error::{ExtractorError, Result};
use crate::extractor::result::{round2, ExtractionResult, ExtractionStatus, FolderResults};
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

const SEPARATOR_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunTotals {
    pub folder_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub total_original_size_mb: f64,
    pub total_extracted_size_mb: f64,
}

impl RunTotals {
    /// Sizes are summed only where a folder defines them.
    pub fn from_results(results: &FolderResults) -> Self {
        let mut totals = RunTotals::default();

        for (_, result) in results.iter() {
            totals.folder_count += 1;
            match result.status {
                ExtractionStatus::Success => totals.success_count += 1,
                ExtractionStatus::Error => totals.error_count += 1,
                ExtractionStatus::Skipped => totals.skipped_count += 1,
            }
            totals.total_original_size_mb += result.original_size_mb.unwrap_or(0.0);
            totals.total_extracted_size_mb += result.extracted_size_mb.unwrap_or(0.0);
        }

        totals.total_original_size_mb = round2(totals.total_original_size_mb);
        totals.total_extracted_size_mb = round2(totals.total_extracted_size_mb);
        totals
    }
}

/// End-of-run summary. Built once from the result collection.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Local>,
    pub root: PathBuf,
    pub password_used: bool,
    pub results: FolderResults,
    pub totals: RunTotals,
}

impl RunReport {
    /// Plain-text rendering, folders in insertion order.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        let separator = "=".repeat(SEPARATOR_WIDTH);

        writeln!(
            out,
            "EXTRACTION REPORT - {}",
            self.generated_at.format(TIMESTAMP_FORMAT)
        )?;
        writeln!(out, "Root folder: {}", self.root.display())?;
        writeln!(
            out,
            "Password used: {}",
            if self.password_used { "Yes" } else { "No" }
        )?;
        writeln!(out)?;
        writeln!(out, "{}", separator)?;

        for (folder, result) in self.results.iter() {
            writeln!(out)?;
            write_folder(out, &folder_label(&self.root, folder), result)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", separator)?;
        writeln!(out, "Folders processed: {}", self.totals.folder_count)?;
        writeln!(
            out,
            "Succeeded: {}  Errors: {}  Skipped: {}",
            self.totals.success_count, self.totals.error_count, self.totals.skipped_count
        )?;
        writeln!(
            out,
            "Total original size: {:.2} MB",
            self.totals.total_original_size_mb
        )?;
        writeln!(
            out,
            "Total extracted size: {:.2} MB",
            self.totals.total_extracted_size_mb
        )?;

        Ok(())
    }
}

fn write_folder(out: &mut String, label: &str, result: &ExtractionResult) -> std::fmt::Result {
    let icon = match result.status {
        ExtractionStatus::Success => "✅",
        ExtractionStatus::Error => "❌",
        ExtractionStatus::Skipped => "⏭",
    };

    writeln!(out, "📁 {}", label)?;
    writeln!(out, "   {} Status: {}", icon, result.status.label())?;
    if let Some(archive) = &result.archive_name {
        writeln!(out, "   Archive: {}", archive)?;
    }
    if let Some(created) = result.created {
        writeln!(out, "   Created: {}", created.format(TIMESTAMP_FORMAT))?;
    }
    if let Some(modified) = result.modified {
        writeln!(out, "   Modified: {}", modified.format(TIMESTAMP_FORMAT))?;
    }
    writeln!(out, "   Original size: {}", format_mb(result.original_size_mb))?;
    writeln!(out, "   Extracted size: {}", format_mb(result.extracted_size_mb))?;
    writeln!(out, "   Message: {}", result.message)?;
    writeln!(
        out,
        "   Processing time: {:.2}s",
        result.duration.as_secs_f64()
    )?;

    if !result.files.is_empty() {
        writeln!(out, "   Extracted files:")?;
        for file in &result.files {
            writeln!(out, "      - {}", file)?;
        }
    }

    Ok(())
}

fn format_mb(value: Option<f64>) -> String {
    match value {
        Some(mb) => format!("{:.2} MB", mb),
        None => "n/a".to_string(),
    }
}

/// Folder path relative to the scanned root, `.` for the root itself.
pub fn folder_label(root: &Path, folder: &Path) -> String {
    match folder.strip_prefix(root) {
        Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Ok(relative) => relative.display().to_string(),
        Err(_) => folder.display().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    file_name: String,
    write_json: bool,
}

impl ReportBuilder {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            file_name: config.file_name.clone(),
            write_json: config.write_json,
        }
    }

    pub fn build(
        &self,
        results: &FolderResults,
        root: &Path,
        password_used: bool,
        timestamp: DateTime<Local>,
    ) -> RunReport {
        RunReport {
            generated_at: timestamp,
            root: root.to_path_buf(),
            password_used,
            results: results.clone(),
            totals: RunTotals::from_results(results),
        }
    }

    pub fn report_path(&self, root: &Path) -> PathBuf {
        root.join(&self.file_name)
    }

    pub fn json_path(&self, root: &Path) -> PathBuf {
        self.report_path(root).with_extension("json")
    }

    /// Overwrites the report inside the scanned root and returns the text report's path.
    pub fn write(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.report_path(&report.root);
        fs::write(&path, report.to_text())?;
        info!("Report written to {}", path.display());

        if self.write_json {
            let json_path = self.json_path(&report.root);
            let json = serde_json::to_string_pretty(report).map_err(|e| ExtractorError::Config {
                message: format!("Failed to serialize report to JSON: {}", e),
            })?;
            fs::write(&json_path, json)?;
            info!("JSON report written to {}", json_path.display());
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractorError;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn result(status: ExtractionStatus, original: Option<f64>, extracted: Option<f64>) -> ExtractionResult {
        ExtractionResult {
            status,
            message: format!("{} message", status.label()),
            error_kind: None,
            archive_name: Some("backup.zip".to_string()),
            original_size_mb: original,
            extracted_size_mb: extracted,
            files: vec!["a.txt".to_string()],
            created: None,
            modified: None,
            duration: Duration::from_millis(1500),
        }
    }

    fn sample_results() -> FolderResults {
        let mut results = FolderResults::new();
        results.insert(
            PathBuf::from("/data/B"),
            result(ExtractionStatus::Success, Some(1.25), Some(2.5)),
        );
        results.insert(
            PathBuf::from("/data/A"),
            result(ExtractionStatus::Error, Some(0.5), Some(0.0)),
        );
        results.insert(
            PathBuf::from("/data/C"),
            ExtractionResult::skipped(Path::new("/data/C"), Duration::ZERO),
        );
        results
    }

    fn builder() -> ReportBuilder {
        ReportBuilder::new(&ReportConfig::default())
    }

    #[test]
    fn test_totals_sum_defined_sizes_only() {
        let totals = RunTotals::from_results(&sample_results());

        assert_eq!(totals.folder_count, 3);
        assert_eq!(totals.success_count, 1);
        assert_eq!(totals.error_count, 1);
        assert_eq!(totals.skipped_count, 1);
        assert_eq!(totals.total_original_size_mb, 1.75);
        assert_eq!(totals.total_extracted_size_mb, 2.5);
    }

    #[test]
    fn test_totals_round_to_two_decimals() {
        let mut results = FolderResults::new();
        for name in ["a", "b", "c"] {
            results.insert(
                PathBuf::from(name),
                result(ExtractionStatus::Success, Some(0.1), Some(0.1)),
            );
        }

        let totals = RunTotals::from_results(&results);
        assert_eq!(totals.total_original_size_mb, 0.3);
    }

    #[test]
    fn test_render_follows_insertion_order() {
        let timestamp = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let report = builder().build(&sample_results(), Path::new("/data"), true, timestamp);
        let text = report.to_text();

        assert!(text.starts_with("EXTRACTION REPORT - 2024-05-01 12:30:00"));
        assert!(text.contains("Root folder: /data"));
        assert!(text.contains("Password used: Yes"));

        let b = text.find("📁 B").unwrap();
        let a = text.find("📁 A").unwrap();
        let c = text.find("📁 C").unwrap();
        assert!(b < a && a < c);

        assert!(text.contains("✅ Status: Success"));
        assert!(text.contains("❌ Status: Error"));
        assert!(text.contains("Original size: n/a"));
        assert!(text.contains("Processing time: 1.50s"));
        assert!(text.contains("      - a.txt"));
        assert!(text.contains("Folders processed: 3"));
        assert!(text.contains("Total original size: 1.75 MB"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let timestamp = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let first = builder().build(&sample_results(), Path::new("/data"), false, timestamp);
        let second = builder().build(&sample_results(), Path::new("/data"), false, timestamp);
        assert_eq!(first.to_text(), second.to_text());
    }

    #[test]
    fn test_write_overwrites_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("extraction_report.txt");
        fs::write(&path, "stale").unwrap();

        let report = builder().build(&FolderResults::new(), temp_dir.path(), false, Local::now());
        let written = builder().write(&report).unwrap();

        assert_eq!(written, path);
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        assert!(text.contains("Folders processed: 0"));
        assert!(!temp_dir.path().join("extraction_report.json").exists());
    }

    #[test]
    fn test_write_json_report() {
        let temp_dir = TempDir::new().unwrap();
        let config = ReportConfig {
            write_json: true,
            ..ReportConfig::default()
        };
        let builder = ReportBuilder::new(&config);

        let mut results = FolderResults::new();
        let error = ExtractorError::Cancelled;
        results.insert(
            temp_dir.path().join("A"),
            ExtractionResult::failure(None, &error, Duration::ZERO),
        );
        let report = builder.build(&results, temp_dir.path(), false, Local::now());
        builder.write(&report).unwrap();

        let json: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp_dir.path().join("extraction_report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["totals"]["error_count"], 1);
        assert_eq!(json["results"]["entries"][0]["result"]["status"], "error");
    }

    #[test]
    fn test_write_to_missing_root_fails() {
        let report = builder().build(
            &FolderResults::new(),
            Path::new("/nonexistent/backup/root"),
            false,
            Local::now(),
        );
        assert!(builder().write(&report).is_err());
    }

    #[test]
    fn test_folder_label() {
        assert_eq!(folder_label(Path::new("/data"), Path::new("/data")), ".");
        assert_eq!(folder_label(Path::new("/data"), Path::new("/data/A/B")), "A/B");
        assert_eq!(folder_label(Path::new("/data"), Path::new("/other")), "/other");
    }
}
