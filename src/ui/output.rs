use crate::error::{ExtractorError, UserFriendlyError};
use crate::extractor::{ExtractionStatus, PlannedExtraction, RunEvent, RunOutcome};
use crate::report::folder_label;
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "+ ");
static CROSS: Emoji = Emoji("❌ ", "x ");
static SKIP: Emoji = Emoji("⏭  ", "- ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static PACKAGE: Emoji = Emoji("📦 ", "* ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &ExtractorError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Live run events. Human mode renders them through progress bars instead.
    pub fn print_event(&self, event: &RunEvent) {
        match (self.mode, event) {
            (OutputMode::Json, RunEvent::Progress { percent, label }) => {
                self.print_json_object(&serde_json::json!({
                    "type": "progress",
                    "percent": percent,
                    "eta": label
                }));
            }
            (OutputMode::Json, RunEvent::Status(message)) if !self.quiet => {
                self.print_json_object(&serde_json::json!({
                    "type": "status",
                    "message": message
                }));
            }
            (OutputMode::Plain, RunEvent::Progress { percent, label }) if self.should_show_message(1) => {
                println!("PROGRESS: {}% ({})", percent, label);
            }
            (OutputMode::Plain, RunEvent::Status(message)) if self.should_show_message(1) => {
                println!("STATUS: {}", message);
            }
            _ => {}
        }
    }

    pub fn print_run_summary(&self, root: &Path, outcome: &RunOutcome) {
        match self.mode {
            OutputMode::Human => {
                if !self.quiet {
                    self.print_human_summary(root, outcome);
                }
            }
            OutputMode::Json => self.print_json_summary(root, outcome),
            OutputMode::Plain => {
                if !self.quiet {
                    self.print_plain_summary(root, outcome);
                }
            }
        }
    }

    /// Full report text, shown from `-v` upwards.
    pub fn print_report_text(&self, text: &str) {
        if self.mode != OutputMode::Json && self.should_show_message(1) {
            println!();
            println!("{}", text);
        }
    }

    pub fn print_plan(&self, root: &Path, plan: &[PlannedExtraction]) {
        match self.mode {
            OutputMode::Json => {
                let folders: Vec<serde_json::Value> = plan
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "folder": folder_label(root, &entry.folder),
                            "archive": entry.candidate.as_ref().map(|c| c.file_name.clone()),
                            "output": entry.output.as_ref().map(|p| p.display().to_string()),
                            "strategy": entry.strategy.map(|k| format!("{:?}", k)),
                        })
                    })
                    .collect();
                self.print_json_object(&serde_json::json!({
                    "type": "plan",
                    "root": root.display().to_string(),
                    "folders": folders
                }));
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_header("Dry run");
                if plan.is_empty() {
                    println!("No archives found under {}", root.display());
                    return;
                }
                for entry in plan {
                    let label = folder_label(root, &entry.folder);
                    match (&entry.candidate, &entry.output, entry.strategy) {
                        (Some(candidate), Some(output), Some(kind)) => println!(
                            "{}{} -> {} [{:?}]",
                            if self.use_colors { PACKAGE.to_string() } else { String::new() },
                            candidate.path.display(),
                            output.display(),
                            kind
                        ),
                        _ => println!("{}: no valid archive", label),
                    }
                }
                println!();
                println!("{} folder(s) would be processed", plan.len());
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}", style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let (emoji, styled) = match msg_type {
                MessageType::Success => (CHECKMARK, style(message).green().bold()),
                MessageType::Error => (CROSS, style(message).red().bold()),
                MessageType::Warning => (WARNING, style(message).yellow().bold()),
                MessageType::Info => (INFO, style(message).cyan()),
            };
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "+",
                MessageType::Error => "x",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };
            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Local::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_summary(&self, root: &Path, outcome: &RunOutcome) {
        println!();
        self.print_separator();

        for (folder, result) in outcome.results.iter() {
            let icon = match result.status {
                ExtractionStatus::Success => CHECKMARK,
                ExtractionStatus::Error => CROSS,
                ExtractionStatus::Skipped => SKIP,
            };
            let label = folder_label(root, folder);
            if self.use_colors {
                println!("{}{} {}", icon, style(label).bold(), style(&result.message).dim());
            } else {
                println!("{}{}: {}", icon, label, result.message);
            }
        }

        self.print_separator();
        let totals = &outcome.totals;
        println!("  Folders processed: {}", self.highlight(totals.folder_count));
        println!(
            "  Succeeded: {}  Errors: {}  Skipped: {}",
            totals.success_count, totals.error_count, totals.skipped_count
        );
        println!("  Original size:  {:.2} MB", totals.total_original_size_mb);
        println!("  Extracted size: {:.2} MB", totals.total_extracted_size_mb);
        println!("  Time taken:     {}", format_duration(outcome.elapsed));
        if let Some(path) = &outcome.report_path {
            println!("  Report:         {}", path.display());
        }
        self.print_separator();

        let summary = outcome.summary();
        if outcome.is_cancelled() || outcome.error_count() > 0 {
            self.warning(&summary);
        } else {
            self.success(&summary);
        }
    }

    fn print_json_summary(&self, root: &Path, outcome: &RunOutcome) {
        let summary = serde_json::json!({
            "type": "summary",
            "root": root.display().to_string(),
            "state": outcome.state,
            "message": outcome.summary(),
            "totals": outcome.totals,
            "results": outcome.results,
            "report_path": outcome.report_path.as_ref().map(|p| p.display().to_string()),
            "duration_ms": outcome.elapsed.as_millis() as u64,
        });

        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_plain_summary(&self, root: &Path, outcome: &RunOutcome) {
        for (folder, result) in outcome.results.iter() {
            println!(
                "{}: {} - {}",
                folder_label(root, folder),
                result.status.label().to_uppercase(),
                result.message
            );
        }
        println!("COMPLETED: {}", outcome.summary());
        println!("Folders processed: {}", outcome.totals.folder_count);
        println!("Errors: {}", outcome.totals.error_count);
        println!("Duration: {}", format_duration(outcome.elapsed));
        if let Some(path) = &outcome.report_path {
            println!("Report: {}", path.display());
        }
    }

    fn highlight(&self, value: usize) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}
