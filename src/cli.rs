use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "backup-extractor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract the newest backup archive in every folder of a tree")]
#[command(
    long_about = "Backup Extractor walks a root folder, picks the most recently modified \
                  archive in each folder that holds one, extracts it next to the archive \
                  and writes a plain-text report into the root."
)]
#[command(after_help = "EXAMPLES:\n  \
    backup-extractor /mnt/backups\n  \
    backup-extractor /mnt/backups --password s3cret --json-report\n  \
    backup-extractor /mnt/backups --folders /mnt/backups/db,/mnt/backups/www\n  \
    backup-extractor /mnt/backups --dry-run\n  \
    backup-extractor --generate-config")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Root folder to scan
    #[arg(required_unless_present = "generate_config")]
    pub root: Option<PathBuf>,

    /// Password for encrypted archives
    #[arg(short, long, env = "BACKUP_EXTRACTOR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Only process these folders (comma-separated) instead of scanning the root
    #[arg(long, value_delimiter = ',')]
    pub folders: Option<Vec<PathBuf>>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Explicit path to the 7-Zip executable
    #[arg(long = "seven-zip", value_name = "PATH")]
    pub seven_zip: Option<PathBuf>,

    /// Worker threads for RAR extraction
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub workers: Option<u16>,

    /// Report file name, written inside the root folder
    #[arg(long)]
    pub report_name: Option<String>,

    /// Also write the report as JSON
    #[arg(long)]
    pub json_report: bool,

    /// Maximum directory depth to scan
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be extracted without extracting)
    #[arg(long, help = "Show which archives would be extracted without doing it")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<&OutputFormat> for OutputMode {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_seven_zip_path(self.seven_zip.clone())
            .with_workers(self.workers.map(usize::from))
            .with_report_name(self.report_name.clone())
            .with_write_json(self.json_report.then_some(true))
            .with_max_depth(self.max_depth)
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(&self.output_format)
    }

    /// Explicit folders, made absolute against the current directory.
    pub fn folder_subset(&self) -> Vec<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_default();
        self.folders
            .iter()
            .flatten()
            .map(|folder| {
                if folder.is_absolute() {
                    folder.clone()
                } else {
                    cwd.join(folder)
                }
            })
            .collect()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("backup-extractor").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_parse_root_and_password() {
        let cli = parse(&["/data", "--password", "s3cret"]);
        assert_eq!(cli.root, Some(PathBuf::from("/data")));
        assert_eq!(cli.password.as_deref(), Some("s3cret"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_folders_are_comma_separated() {
        let cli = parse(&["/data", "--folders", "/data/A,/data/B"]);
        assert_eq!(
            cli.folder_subset(),
            vec![PathBuf::from("/data/A"), PathBuf::from("/data/B")]
        );
    }

    #[test]
    fn test_relative_folders_become_absolute() {
        let cli = parse(&["/data", "--folders", "A"]);
        let folders = cli.folder_subset();
        assert_eq!(folders.len(), 1);
        assert!(folders[0].is_absolute());
        assert!(folders[0].ends_with("A"));
    }

    #[test]
    fn test_generate_config_needs_no_root() {
        let cli = parse(&["--generate-config"]);
        assert!(cli.generate_config);
        assert!(cli.root.is_none());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["backup-extractor", "/data", "-q", "-v"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_workers_range_checked() {
        assert!(Cli::try_parse_from(["backup-extractor", "/data", "--workers", "0"]).is_err());
        assert_eq!(parse(&["/data", "--workers", "4"]).workers, Some(4));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = parse(&[
            "/data",
            "--seven-zip",
            "/opt/7z",
            "--workers",
            "2",
            "--report-name",
            "report.txt",
            "--json-report",
            "--max-depth",
            "3",
        ]);
        let overrides = cli.create_cli_overrides();

        assert_eq!(overrides.seven_zip_path, Some(PathBuf::from("/opt/7z")));
        assert_eq!(overrides.workers, Some(2));
        assert_eq!(overrides.report_name.as_deref(), Some("report.txt"));
        assert_eq!(overrides.write_json, Some(true));
        assert_eq!(overrides.max_depth, Some(3));

        let plain = parse(&["/data"]).create_cli_overrides();
        assert_eq!(plain.write_json, None);
    }

    #[test]
    fn test_output_mode() {
        assert_eq!(
            parse(&["/data", "--output-format", "json"]).output_mode(),
            OutputMode::Json
        );
        assert_eq!(parse(&["/data"]).output_mode(), OutputMode::Human);
    }

    #[test]
    fn test_verbosity_level() {
        assert_eq!(parse(&["/data", "-vv"]).verbosity_level(), 2);
        assert_eq!(parse(&["/data", "-q"]).verbosity_level(), 0);
        assert!(!parse(&["/data", "-q"]).is_verbose());
    }
}
