pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod report;
pub mod scanner;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, ExtractionConfig, ReportConfig, ScanConfig};
pub use error::{ErrorKind, ExtractorError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    CancelToken, ExtractionOrchestrator, ExtractionResult, ExtractionStatus, FolderResults,
    PlannedExtraction, RunEvent, RunHandle, RunOutcome, RunRequest, RunState,
};
pub use report::{ReportBuilder, RunReport, RunTotals};
pub use scanner::{ArchiveCandidate, FolderScanner, FormatRegistry, StrategyKind};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager, RunProgress};

use std::path::{Path, PathBuf};

/// Command-line facade: drives one run and renders it to the terminal.
pub struct BackupExtractor {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl BackupExtractor {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        Ok(Self::with_shutdown(
            config,
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new()?,
        ))
    }

    /// Same as `new` without installing a Ctrl+C handler.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_shutdown(
            config,
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new_for_test(),
        )
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(!quiet && output_mode == OutputMode::Human),
            shutdown,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            cli_args.output_mode(),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    /// Extracts every selected folder and waits for the run to finish.
    ///
    /// Per-folder failures are part of the returned outcome. Only problems that
    /// prevent the run from starting come back as `Err`.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let root = validate_root(&request.root)?;
        let request = RunRequest { root, ..request };

        let orchestrator = ExtractionOrchestrator::new(&self.config)?;
        self.output_formatter
            .start_operation(&format!("Extracting backups under {}", request.root.display()));

        let root = request.root.clone();
        let mut handle = orchestrator.spawn(request, self.shutdown.token())?;
        let progress = RunProgress::new(&self.progress_manager);
        let mut outcome = None;

        while let Some(event) = handle.next_event().await {
            progress.handle(&event);
            self.output_formatter.print_event(&event);
            if let RunEvent::Done(done) = event {
                outcome = Some(done);
            }
        }
        handle.join()?;
        self.progress_manager.clear();

        let outcome = outcome.ok_or_else(|| {
            ExtractorError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "extraction worker stopped without a result",
            ))
        })?;

        self.output_formatter.print_report_text(&outcome.report_text);
        self.output_formatter.print_run_summary(&root, &outcome);
        Ok(outcome)
    }

    /// Discovery and candidate selection only; nothing is written.
    pub fn dry_run(&self, request: &RunRequest) -> Result<Vec<PlannedExtraction>> {
        let root = validate_root(&request.root)?;
        let request = RunRequest {
            root: root.clone(),
            ..request.clone()
        };

        let plan = ExtractionOrchestrator::new(&self.config)?.plan(&request)?;
        self.output_formatter.print_plan(&root, &plan);
        Ok(plan)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &ExtractorError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// The root must be an existing directory. Returns it in canonical form.
pub fn validate_root(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(ExtractorError::InvalidPath {
            path: root.display().to_string(),
        });
    }
    Ok(root.canonicalize()?)
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: version_info(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Backup Extractor {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn quiet_extractor() -> BackupExtractor {
        BackupExtractor::new_for_test(Config::default(), OutputMode::Plain, 0, true)
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        BackupExtractor::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[scan]"));
        assert!(content.contains("[extraction]"));
        assert!(content.contains("[report]"));
        assert!(Config::load_from_file(&config_path).unwrap().validate().is_ok());
    }

    #[test]
    fn test_validate_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_root(temp_dir.path()).is_ok());

        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            validate_root(&file),
            Err(ExtractorError::InvalidPath { .. })
        ));
        assert!(validate_root(&temp_dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn test_run_on_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = quiet_extractor()
            .run(RunRequest::new(temp_dir.path()))
            .await
            .unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.state, RunState::Done);
        assert!(temp_dir.path().join("extraction_report.txt").exists());
    }

    #[tokio::test]
    async fn test_run_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = quiet_extractor()
            .run(RunRequest::new(temp_dir.path().join("missing")))
            .await;
        assert!(matches!(result, Err(ExtractorError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_requested_shutdown_cancels_run() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("A");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("data.gz"), b"ignored").unwrap();

        let extractor = quiet_extractor();
        extractor.request_shutdown();
        assert!(!extractor.is_running());

        let outcome = extractor.run(RunRequest::new(temp_dir.path())).await.unwrap();
        assert!(outcome.is_cancelled());
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("A");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("db.sql.gz"), b"not really gzip").unwrap();

        let plan = quiet_extractor()
            .dry_run(&RunRequest::new(temp_dir.path()))
            .unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].strategy, Some(StrategyKind::SingleStreamCompressor));
        assert!(!temp_dir.path().join("extraction_report.txt").exists());
        assert!(!folder.join("extracted_db.sql").exists());
    }

    #[test]
    fn test_version_info() {
        assert!(!version_info().is_empty());

        let build_info = build_info();
        assert!(build_info.to_string().contains("Backup Extractor"));
        assert!(build_info.to_string().contains(build_info.version));
    }
}
