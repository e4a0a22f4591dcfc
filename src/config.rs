use crate::error::{ExtractorError, Result};
use crate::scanner::format_registry::FormatRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "backup-extractor.toml";
pub const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub extraction: ExtractionConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Archive suffixes considered during discovery, with or without the leading dot.
    pub extensions: Vec<String>,
    pub max_depth: usize,
    pub follow_links: bool,
    /// Skip folders named with the output prefix so previous results are not rescanned.
    pub skip_extracted_dirs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub output_prefix: String,
    pub workers: Option<usize>,
    pub seven_zip_path: Option<PathBuf>,
    pub progress_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub file_name: String,
    pub write_json: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: FormatRegistry::default()
                .supported_suffixes()
                .map(str::to_string)
                .collect(),
            max_depth: 32,
            follow_links: false,
            skip_extracted_dirs: true,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_prefix: "extracted_".to_string(),
            workers: None, // one per CPU
            seven_zip_path: None,
            progress_interval_ms: 250,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file_name: "extraction_report.txt".to_string(),
            write_json: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractorError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExtractorError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ExtractorError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = [DEFAULT_CONFIG_FILE, ".backup-extractor.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref seven_zip) = cli_args.seven_zip_path {
            self.extraction.seven_zip_path = Some(seven_zip.clone());
        }

        if let Some(workers) = cli_args.workers {
            self.extraction.workers = Some(workers);
        }

        if let Some(ref report_name) = cli_args.report_name {
            self.report.file_name = report_name.clone();
        }

        if let Some(write_json) = cli_args.write_json {
            self.report.write_json = write_json;
        }

        if let Some(max_depth) = cli_args.max_depth {
            self.scan.max_depth = max_depth;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ExtractorError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| ExtractorError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.extensions.is_empty() {
            return Err(ExtractorError::Config {
                message: "At least one archive extension must be specified".to_string(),
            });
        }

        let registry = FormatRegistry::default();
        for extension in &self.scan.extensions {
            if !registry.is_known_suffix(extension) {
                return Err(ExtractorError::Config {
                    message: format!("Unknown archive extension: {}", extension),
                });
            }
        }

        if self.scan.max_depth == 0 {
            return Err(ExtractorError::Config {
                message: "Maximum directory depth must be greater than 0".to_string(),
            });
        }

        let prefix = self.extraction.output_prefix.trim();
        if prefix.is_empty() || prefix.contains(&['/', '\\'][..]) {
            return Err(ExtractorError::Config {
                message: "Output prefix must be a non-empty folder name prefix".to_string(),
            });
        }

        if let Some(workers) = self.extraction.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(ExtractorError::Config {
                    message: format!("Worker count must be between 1 and {}", MAX_WORKERS),
                });
            }
        }

        if self.extraction.progress_interval_ms == 0 {
            return Err(ExtractorError::Config {
                message: "Progress interval must be greater than 0".to_string(),
            });
        }

        let report_name = self.report.file_name.trim();
        if report_name.is_empty() || report_name.contains(&['/', '\\'][..]) {
            return Err(ExtractorError::Config {
                message: "Report file name must be a plain file name".to_string(),
            });
        }

        Ok(())
    }

    /// Worker count for the RAR pool: the configured value, or one per CPU.
    pub fn worker_count(&self) -> usize {
        self.extraction
            .workers
            .unwrap_or_else(num_cpus::get)
            .clamp(1, MAX_WORKERS)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.extraction.progress_interval_ms)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub seven_zip_path: Option<PathBuf>,
    pub workers: Option<usize>,
    pub report_name: Option<String>,
    pub write_json: Option<bool>,
    pub max_depth: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seven_zip_path(mut self, path: Option<PathBuf>) -> Self {
        self.seven_zip_path = path;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_report_name(mut self, report_name: Option<String>) -> Self {
        self.report_name = report_name;
        self
    }

    pub fn with_write_json(mut self, write_json: Option<bool>) -> Self {
        self.write_json = write_json;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.scan.extensions.contains(&".zip".to_string()));
        assert!(config.scan.extensions.contains(&".tar.gz".to_string()));
        assert_eq!(config.extraction.output_prefix, "extracted_");
        assert_eq!(config.report.file_name, "extraction_report.txt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.scan.extensions.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scan.extensions = vec![".docx".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.report.file_name = "../escape.txt".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.extraction.workers = Some(3);
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.extraction.workers, Some(3));
        assert_eq!(loaded_config.scan.max_depth, config.scan.max_depth);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[report]\nfile_name = \"custom.txt\"").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.report.file_name, "custom.txt");
        assert_eq!(config.extraction.output_prefix, "extracted_");
        assert!(!config.scan.extensions.is_empty());
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load_from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ExtractorError::Config { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_workers(Some(2))
            .with_report_name(Some("summary.txt".to_string()))
            .with_seven_zip_path(Some(PathBuf::from("/opt/7z")));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.report.file_name, "summary.txt");
        assert_eq!(config.extraction.seven_zip_path, Some(PathBuf::from("/opt/7z")));
    }

    #[test]
    fn test_worker_count_defaults_to_cpus() {
        let config = Config::default();
        assert!(config.worker_count() >= 1);
        assert!(config.worker_count() <= MAX_WORKERS);
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[scan]"));
        assert!(sample.contains("[extraction]"));
        assert!(sample.contains("[report]"));
    }
}
