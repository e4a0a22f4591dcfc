use crate::error::Result;
use crate::extractor::cancel::CancelToken;
use crate::scanner::format_registry::{ArchiveFormat, StrategyKind};
use rayon::ThreadPool;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

pub type EntryCallback<'a> = &'a (dyn Fn(&EntryProgress) + Send + Sync);
pub type StatusCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// One archive to unpack into one output folder.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub archive: &'a Path,
    pub format: ArchiveFormat,
    pub output: &'a Path,
    pub password: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryProgress {
    pub file_name: String,
    pub extracted_count: usize,
}

/// Per-run facilities handed to every strategy call.
pub struct ExtractContext<'a> {
    cancel: CancelToken,
    pool: Option<&'a ThreadPool>,
    on_entry: Option<EntryCallback<'a>>,
    on_status: Option<StatusCallback<'a>>,
    progress_interval: Duration,
}

impl<'a> ExtractContext<'a> {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            pool: None,
            on_entry: None,
            on_status: None,
            progress_interval: Duration::from_millis(250),
        }
    }

    pub fn with_pool(mut self, pool: Option<&'a ThreadPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_entry_callback(mut self, callback: EntryCallback<'a>) -> Self {
        self.on_entry = Some(callback);
        self
    }

    pub fn with_status_callback(mut self, callback: StatusCallback<'a>) -> Self {
        self.on_status = Some(callback);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn pool(&self) -> Option<&'a ThreadPool> {
        self.pool
    }

    pub fn progress_interval(&self) -> Duration {
        self.progress_interval
    }

    pub fn throttle(&self) -> ThrottledProgress {
        ThrottledProgress::new(self.progress_interval)
    }

    pub fn report_entry(&self, progress: &EntryProgress) {
        if let Some(callback) = self.on_entry {
            callback(progress);
        }
    }

    pub fn report_status(&self, message: &str) {
        if let Some(callback) = self.on_status {
            callback(message);
        }
    }
}

pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Unpacks the archive and returns the names of the files written, in extraction order.
    /// The output folder is created if missing; a failure may leave partial output behind.
    fn extract(&self, request: &ExtractRequest<'_>, ctx: &ExtractContext<'_>) -> Result<Vec<String>>;
}

/// Limits entry progress to one event per polling interval.
#[derive(Debug)]
pub struct ThrottledProgress {
    interval: Duration,
    last_emit: Option<Instant>,
    count: usize,
    pending: Option<String>,
}

impl ThrottledProgress {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            count: 0,
            pending: None,
        }
    }

    pub fn record(&mut self, file_name: &str) -> Option<EntryProgress> {
        self.count += 1;

        let due = self
            .last_emit
            .map_or(true, |last| last.elapsed() >= self.interval);

        if due {
            self.last_emit = Some(Instant::now());
            self.pending = None;
            Some(EntryProgress {
                file_name: file_name.to_string(),
                extracted_count: self.count,
            })
        } else {
            self.pending = Some(file_name.to_string());
            None
        }
    }

    /// Final event for entries swallowed by the rate limit, if any.
    pub fn finish(&mut self) -> Option<EntryProgress> {
        self.pending.take().map(|file_name| EntryProgress {
            file_name,
            extracted_count: self.count,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Strategy lookup by kind.
#[derive(Default)]
pub struct StrategySet {
    strategies: HashMap<StrategyKind, Box<dyn ExtractionStrategy>>,
}

impl StrategySet {
    pub fn insert(&mut self, strategy: Box<dyn ExtractionStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&dyn ExtractionStrategy> {
        self.strategies.get(&kind).map(|strategy| strategy.as_ref())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

pub fn ensure_output_dir(output: &Path) -> Result<()> {
    fs::create_dir_all(output)?;
    Ok(())
}

/// Forward-slash form of an archive-relative path.
pub fn display_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Files under `output`, relative and sorted.
pub fn list_output_files(output: &Path) -> Vec<String> {
    WalkDir::new(output)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(output)
                .ok()
                .map(display_name)
        })
        .collect()
}

/// Total size in bytes of all files under `path`. Unreadable entries count as zero.
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
