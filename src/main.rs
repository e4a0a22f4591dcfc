use backup_extractor::{
    build_info, BackupExtractor, Cli, ExtractorError, OutputFormatter, OutputMode, RunOutcome, RunRequest,
    UserFriendlyError,
};
use clap::Parser;
use std::path::PathBuf;
use std::process;

const EXIT_OK: i32 = 0;
const EXIT_STARTUP: i32 = 1;
const EXIT_FOLDER_ERRORS: i32 = 2;
const EXIT_INVALID_ROOT: i32 = 3;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(cli.verbosity_level());

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let Some(root) = cli.root.clone() else {
        eprintln!("A root folder is required");
        return EXIT_STARTUP;
    };

    let extractor = match BackupExtractor::from_cli(&cli) {
        Ok(extractor) => extractor,
        Err(e) => {
            print_startup_error(&e, cli.output_mode());
            return EXIT_STARTUP;
        }
    };

    if cli.is_verbose() {
        extractor.output_formatter().info(&build_info().to_string());
    }

    let request = RunRequest::new(root)
        .with_password(cli.password.clone())
        .with_folders(cli.folder_subset());

    if cli.dry_run {
        return handle_dry_run(&extractor, &request);
    }

    match extractor.run(request).await {
        Ok(outcome) => exit_code_for(&outcome),
        Err(e) => {
            extractor.handle_error(&e);
            exit_code_for_error(&e)
        }
    }
}

fn exit_code_for(outcome: &RunOutcome) -> i32 {
    if outcome.is_cancelled() {
        EXIT_CANCELLED
    } else if outcome.error_count() > 0 {
        EXIT_FOLDER_ERRORS
    } else {
        EXIT_OK
    }
}

fn exit_code_for_error(error: &ExtractorError) -> i32 {
    match error {
        ExtractorError::InvalidPath { .. } => EXIT_INVALID_ROOT,
        ExtractorError::Cancelled => EXIT_CANCELLED,
        _ => EXIT_STARTUP,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(backup_extractor::config::DEFAULT_CONFIG_FILE));

    match BackupExtractor::generate_sample_config(&config_path) {
        Ok(()) => {
            println!(
                "Generated sample configuration file: {}",
                config_path.display()
            );
            println!("\nTo use this configuration:");
            println!(
                "  backup-extractor <root-folder> --config {}",
                config_path.display()
            );
            println!("\nEdit the file to customize settings for your needs.");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            EXIT_STARTUP
        }
    }
}

fn handle_dry_run(extractor: &BackupExtractor, request: &RunRequest) -> i32 {
    let formatter = extractor.output_formatter();
    formatter.info("DRY RUN MODE - No archives will be extracted");

    match extractor.dry_run(request) {
        Ok(_) => {
            formatter.info("Run without --dry-run to perform the extraction");
            EXIT_OK
        }
        Err(e) => {
            extractor.handle_error(&e);
            exit_code_for_error(&e)
        }
    }
}

fn print_startup_error(error: &ExtractorError, mode: OutputMode) {
    let formatter = OutputFormatter::new(mode, 0, false);
    formatter.print_user_friendly_error(error);
}

fn setup_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "backup_extractor=warn",
        1 => "backup_extractor=info",
        _ => "backup_extractor=debug",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init()
        .ok();
}
