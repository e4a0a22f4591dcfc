use crate::config::Config;
use crate::error::{ExtractorError, Result, UserFriendlyError};
use crate::extractor::cancel::CancelToken;
use crate::extractor::rar_strategy::RarStrategy;
use crate::extractor::result::{ExtractionResult, FolderResults};
use crate::extractor::seven_zip_strategy::SevenZipStrategy;
use crate::extractor::stream_strategy::StreamStrategy;
use crate::extractor::strategy::{
    directory_size, EntryProgress, ExtractContext, ExtractRequest, ExtractionStrategy, StrategySet,
};
use crate::extractor::tar_strategy::TarStrategy;
use crate::extractor::zip_strategy::ZipStrategy;
use crate::report::{folder_label, ReportBuilder, RunTotals};
use crate::scanner::folder_scanner::{ArchiveCandidate, FolderScanner};
use crate::scanner::format_registry::StrategyKind;
use chrono::Local;
use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Messages from the extraction worker to whoever is watching the run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Progress { percent: u8, label: String },
    Status(String),
    Done(RunOutcome),
}

pub type EventSender = UnboundedSender<RunEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Scanning,
    Extracting,
    Done,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: FolderResults,
    pub totals: RunTotals,
    /// Rendered report, the same text that was written into the root.
    pub report_text: String,
    pub state: RunState,
    pub elapsed: Duration,
    pub report_path: Option<PathBuf>,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    pub fn error_count(&self) -> usize {
        self.results.error_count()
    }

    /// Same wording as the final status event.
    pub fn summary(&self) -> String {
        summary_message(self.state, &self.results)
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub root: PathBuf,
    pub password: Option<String>,
    /// Explicit folder subset; empty means discover everything under `root`.
    pub folders: Vec<PathBuf>,
}

impl RunRequest {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            password: None,
            folders: Vec::new(),
        }
    }

    /// An empty password counts as no password.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn with_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.folders = folders;
        self
    }
}

/// What a run would do for one folder, without touching anything.
#[derive(Debug, Clone)]
pub struct PlannedExtraction {
    pub folder: PathBuf,
    pub candidate: Option<ArchiveCandidate>,
    pub output: Option<PathBuf>,
    pub strategy: Option<StrategyKind>,
}

pub struct ExtractionOrchestrator {
    scanner: FolderScanner,
    strategies: StrategySet,
    output_prefix: String,
    workers: usize,
    progress_interval: Duration,
    report_builder: ReportBuilder,
}

impl ExtractionOrchestrator {
    pub fn new(config: &Config) -> Result<Self> {
        let skip_prefix = config
            .scan
            .skip_extracted_dirs
            .then(|| config.extraction.output_prefix.clone());

        let mut strategies = StrategySet::default();
        strategies.insert(Box::new(ZipStrategy));
        strategies.insert(Box::new(RarStrategy));
        strategies.insert(Box::new(TarStrategy));
        strategies.insert(Box::new(StreamStrategy));
        strategies.insert(Box::new(SevenZipStrategy::new(
            config.extraction.seven_zip_path.as_deref(),
        )?));

        Ok(Self {
            scanner: FolderScanner::new(&config.scan).with_skip_prefix(skip_prefix),
            strategies,
            output_prefix: config.extraction.output_prefix.clone(),
            workers: config.worker_count(),
            progress_interval: config.progress_interval(),
            report_builder: ReportBuilder::new(&config.report),
        })
    }

    /// Replaces the strategy registered for the same kind.
    pub fn with_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategies.insert(strategy);
        self
    }

    pub fn scanner(&self) -> &FolderScanner {
        &self.scanner
    }

    pub fn report_builder(&self) -> &ReportBuilder {
        &self.report_builder
    }

    /// Starts the run on a dedicated worker thread and returns immediately.
    pub fn spawn(self, request: RunRequest, cancel: CancelToken) -> Result<RunHandle> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker_cancel = cancel.clone();

        let worker = thread::Builder::new()
            .name("extraction-worker".to_string())
            .spawn(move || {
                self.run(&request, &worker_cancel, &sender);
            })?;

        Ok(RunHandle {
            events: receiver,
            cancel,
            worker: Some(worker),
        })
    }

    /// Runs the whole extraction on the calling thread. Emits exactly one `Done` at the end.
    pub fn run(&self, request: &RunRequest, cancel: &CancelToken, events: &EventSender) -> RunOutcome {
        let started = Instant::now();
        let mut state = RunState::Scanning;
        debug!("Run state: {:?}", state);
        emit(events, RunEvent::Status(format!("Scanning {}...", request.root.display())));

        let folders = match self.resolve_folders(request) {
            Ok(folders) => folders,
            Err(e) => {
                warn!("Folder discovery failed: {}", e);
                emit(events, RunEvent::Status(format!("Scan failed: {}", e.user_message())));
                Vec::new()
            }
        };

        let mut results = FolderResults::new();

        if folders.is_empty() {
            emit(events, RunEvent::Status("No archives found".to_string()));
        } else {
            state = RunState::Extracting;
            debug!("Run state: {:?} ({} folders)", state, folders.len());

            let pool = self.build_pool();
            let on_entry = |progress: &EntryProgress| {
                emit(
                    events,
                    RunEvent::Status(format!(
                        "Extracted {} file(s): {}",
                        progress.extracted_count, progress.file_name
                    )),
                );
            };
            let on_status = |message: &str| emit(events, RunEvent::Status(message.to_string()));
            let ctx = ExtractContext::new(cancel.clone())
                .with_pool(pool.as_ref())
                .with_entry_callback(&on_entry)
                .with_status_callback(&on_status)
                .with_progress_interval(self.progress_interval);

            let total = folders.len();
            let loop_started = Instant::now();

            for (index, folder) in folders.iter().enumerate() {
                if cancel.is_cancelled() {
                    state = RunState::Cancelled;
                    break;
                }

                emit(
                    events,
                    RunEvent::Status(format!(
                        "Processing: {}...",
                        folder_label(&request.root, folder)
                    )),
                );

                match self.process_folder(folder, request.password.as_deref(), &ctx) {
                    Some(result) => results.insert(folder.clone(), result),
                    None => {
                        state = RunState::Cancelled;
                        break;
                    }
                }

                let completed = index + 1;
                let remaining = estimate_remaining(loop_started.elapsed(), completed, total);
                emit(
                    events,
                    RunEvent::Progress {
                        percent: progress_percent(completed, total),
                        label: format_eta(remaining),
                    },
                );
            }
        }

        if state != RunState::Cancelled {
            state = RunState::Done;
        }
        info!(
            "Run finished in state {:?}: {} folder(s), {} error(s)",
            state,
            results.len(),
            results.error_count()
        );
        emit(events, RunEvent::Status(summary_message(state, &results)));

        let report = self.report_builder.build(
            &results,
            &request.root,
            request.password.is_some(),
            Local::now(),
        );
        let report_path = match self.report_builder.write(&report) {
            Ok(path) => {
                emit(events, RunEvent::Status(format!("Report saved to {}", path.display())));
                Some(path)
            }
            Err(e) => {
                warn!("Could not write report: {}", e);
                emit(events, RunEvent::Status(format!("Could not write report: {}", e.user_message())));
                None
            }
        };

        let outcome = RunOutcome {
            report_text: report.to_text(),
            totals: report.totals,
            results,
            state,
            elapsed: started.elapsed(),
            report_path,
        };

        emit(events, RunEvent::Done(outcome.clone()));
        outcome
    }

    /// Folder-by-folder preview for dry runs.
    pub fn plan(&self, request: &RunRequest) -> Result<Vec<PlannedExtraction>> {
        let folders = self.resolve_folders(request)?;
        let mut plan = Vec::with_capacity(folders.len());

        for folder in folders {
            let candidate = self.scanner.latest_archive(&folder)?;
            plan.push(PlannedExtraction {
                output: candidate
                    .as_ref()
                    .map(|c| c.output_folder(&self.output_prefix)),
                strategy: candidate.as_ref().map(|c| c.format.kind),
                candidate,
                folder,
            });
        }

        Ok(plan)
    }

    /// Extracts one chosen archive into its output folder.
    pub fn extract_candidate(
        &self,
        candidate: &ArchiveCandidate,
        password: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<Vec<String>> {
        let strategy = self.strategies.get(candidate.format.kind).ok_or_else(|| {
            ExtractorError::UnsupportedFormat {
                file: candidate.file_name.clone(),
            }
        })?;

        let output = candidate.output_folder(&self.output_prefix);
        let request = ExtractRequest {
            archive: &candidate.path,
            format: candidate.format,
            output: &output,
            password,
        };

        strategy.extract(&request, ctx)
    }

    /// `None` when the strategy stopped because the run was cancelled.
    fn process_folder(
        &self,
        folder: &Path,
        password: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Option<ExtractionResult> {
        let started = Instant::now();

        let candidate = match self.scanner.latest_archive(folder) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                debug!("No archive left in {}", folder.display());
                return Some(ExtractionResult::skipped(folder, started.elapsed()));
            }
            Err(e) => {
                warn!("Cannot read folder {}: {}", folder.display(), e);
                return Some(ExtractionResult::failure(None, &e, started.elapsed()));
            }
        };

        debug!(
            "Latest archive in {}: {} ({:?})",
            folder.display(),
            candidate.file_name,
            candidate.format.kind
        );

        match self.extract_candidate(&candidate, password, ctx) {
            Ok(files) => {
                let extracted = directory_size(&candidate.output_folder(&self.output_prefix));
                Some(ExtractionResult::success(
                    &candidate,
                    files,
                    extracted,
                    started.elapsed(),
                ))
            }
            Err(ExtractorError::Cancelled) => None,
            Err(e) => {
                warn!("Extraction failed for {}: {}", candidate.path.display(), e);
                Some(ExtractionResult::failure(
                    Some(&candidate),
                    &e,
                    started.elapsed(),
                ))
            }
        }
    }

    fn resolve_folders(&self, request: &RunRequest) -> Result<Vec<PathBuf>> {
        if request.folders.is_empty() {
            return self.scanner.discover_folders(&request.root);
        }

        let mut seen = HashSet::new();
        Ok(request
            .folders
            .iter()
            .filter(|folder| seen.insert(folder.to_path_buf()))
            .cloned()
            .collect())
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        match ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|index| format!("rar-worker-{}", index))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Falling back to sequential RAR extraction: {}", e);
                None
            }
        }
    }
}

/// Receiving side of a spawned run.
pub struct RunHandle {
    events: UnboundedReceiver<RunEvent>,
    cancel: CancelToken,
    worker: Option<thread::JoinHandle<()>>,
}

impl RunHandle {
    /// Raises the stop flag. The folder in progress finishes; no new folder starts.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// For callers outside an async runtime.
    pub fn blocking_next_event(&mut self) -> Option<RunEvent> {
        self.events.blocking_recv()
    }

    /// Drains events until the worker exits and returns the final outcome.
    pub fn wait(mut self) -> Option<RunOutcome> {
        let mut outcome = None;
        while let Some(event) = self.blocking_next_event() {
            if let RunEvent::Done(done) = event {
                outcome = Some(done);
            }
        }
        let _ = self.join();
        outcome
    }

    pub fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| {
                ExtractorError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "extraction worker panicked",
                ))
            }),
            None => Ok(()),
        }
    }
}

fn emit(events: &EventSender, event: RunEvent) {
    if events.send(event).is_err() {
        debug!("Event receiver dropped; continuing without observers");
    }
}

fn summary_message(state: RunState, results: &FolderResults) -> String {
    let errors = results.error_count();
    match state {
        RunState::Cancelled => format!(
            "Extraction cancelled after {} folder(s)",
            results.len()
        ),
        _ if errors == 0 => "Extraction completed successfully".to_string(),
        _ => format!("Completed with {} error(s)", errors),
    }
}

/// Percent of folders done, `(completed * 100) / total`.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed * 100) / total).min(100) as u8
}

/// Average time per completed folder times the folders left.
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Duration {
    if completed == 0 || completed >= total {
        return Duration::ZERO;
    }
    let average = elapsed / completed as u32;
    average * (total - completed) as u32
}

pub fn format_eta(remaining: Duration) -> String {
    let seconds = remaining.as_secs_f64();
    if seconds > 3600.0 {
        format!("{:.1} hours remaining", seconds / 3600.0)
    } else if seconds > 60.0 {
        format!("{:.1} minutes remaining", seconds / 60.0)
    } else {
        format!("{:.0} seconds remaining", seconds)
    }
}
