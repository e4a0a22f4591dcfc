use crate::error::{ExtractorError, Result};
use crate::extractor::cancel::CancelToken;
use crate::extractor::strategy::{
    display_name, ensure_output_dir, ExtractContext, ExtractRequest, ExtractionStrategy,
    ThrottledProgress,
};
use crate::scanner::format_registry::StrategyKind;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use unrar::error::{Code, UnrarError};
use unrar::Archive;

/// RAR extraction spread over the run's worker pool.
///
/// Members are listed once, then dealt round-robin into one bucket per worker.
/// Each worker opens its own handle on the archive, extracts the members in its
/// bucket and skips the rest. The stop flag is checked before every member.
///
/// Skipping a member of a solid archive still decompresses it, so solid archives
/// are extracted in a single sequential pass.
#[derive(Debug, Default)]
pub struct RarStrategy;

#[derive(Debug, Clone)]
struct RarMember {
    path: PathBuf,
    is_dir: bool,
    encrypted: bool,
}

#[derive(Debug, Default)]
struct RarListing {
    members: Vec<RarMember>,
    solid: bool,
    encrypted_headers: bool,
}

impl RarListing {
    fn is_encrypted(&self) -> bool {
        self.encrypted_headers || self.members.iter().any(|member| member.encrypted)
    }
}

struct Completed {
    names: Vec<String>,
    throttle: ThrottledProgress,
}

impl ExtractionStrategy for RarStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rar
    }

    fn extract(&self, request: &ExtractRequest<'_>, ctx: &ExtractContext<'_>) -> Result<Vec<String>> {
        ensure_output_dir(request.output)?;

        let listing = list_members(request.archive, request.password)?;
        let encrypted = listing.is_encrypted();
        let mut files = Vec::new();

        for member in &listing.members {
            if !is_safe_relative(&member.path) {
                warn!("Skipping unsafe rar entry path: {}", member.path.display());
                continue;
            }

            if member.is_dir {
                fs::create_dir_all(request.output.join(&member.path))?;
            } else {
                files.push(member.path.clone());
            }
        }

        if files.is_empty() {
            return Ok(Vec::new());
        }

        let pool_threads = ctx.pool().map_or(1, |pool| pool.current_num_threads());
        let workers = worker_count(listing.solid, pool_threads, files.len());
        let buckets = partition(&files, workers);

        debug!(
            "Extracting {} rar members from {} across {} worker(s){}",
            files.len(),
            request.archive.display(),
            workers,
            if listing.solid { " (solid)" } else { "" }
        );

        let completed = Mutex::new(Completed {
            names: Vec::with_capacity(files.len()),
            throttle: ctx.throttle(),
        });

        let on_done = |path: &Path| {
            let name = display_name(path);
            let mut state = match completed.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(progress) = state.throttle.record(&name) {
                ctx.report_entry(&progress);
            }
            state.names.push(name);
        };

        let run_bucket = |bucket: &HashSet<PathBuf>| {
            extract_bucket(request, bucket, encrypted, ctx.cancel_token(), &on_done)
        };

        match ctx.pool() {
            Some(pool) => pool.install(|| buckets.par_iter().try_for_each(run_bucket))?,
            None => buckets.iter().try_for_each(run_bucket)?,
        }

        let mut completed = match completed.into_inner() {
            Ok(completed) => completed,
            Err(poisoned) => poisoned.into_inner(),
        };

        if completed.names.len() < files.len() && ctx.cancel_token().is_cancelled() {
            debug!(
                "RAR extraction stopped after {} of {} members",
                completed.names.len(),
                files.len()
            );
            return Err(ExtractorError::Cancelled);
        }

        if let Some(progress) = completed.throttle.finish() {
            ctx.report_entry(&progress);
        }

        Ok(completed.names)
    }
}

fn open<'a>(archive: &'a Path, password: Option<&'a str>) -> Archive<'a> {
    match password {
        Some(password) => Archive::with_password(archive, password.as_bytes()),
        None => Archive::new(archive),
    }
}

fn list_members(archive: &Path, password: Option<&str>) -> Result<RarListing> {
    let handle = open(archive, password)
        .open_for_listing()
        .map_err(|e| map_rar_error(archive, e, false))?;

    let mut listing = RarListing {
        solid: handle.is_solid(),
        encrypted_headers: handle.has_encrypted_headers(),
        ..RarListing::default()
    };

    let encrypted_headers = listing.encrypted_headers;
    for header in handle {
        let header = header.map_err(|e| map_rar_error(archive, e, encrypted_headers))?;
        listing.members.push(RarMember {
            is_dir: header.is_directory(),
            encrypted: header.is_encrypted(),
            path: header.filename,
        });
    }

    Ok(listing)
}

/// Solid archives get one worker; otherwise one per pool thread, never more than members.
fn worker_count(solid: bool, pool_threads: usize, files: usize) -> usize {
    if solid {
        1
    } else {
        pool_threads.clamp(1, files.max(1))
    }
}

fn extract_bucket(
    request: &ExtractRequest<'_>,
    bucket: &HashSet<PathBuf>,
    encrypted: bool,
    cancel: &CancelToken,
    on_done: &(dyn Fn(&Path) + Sync),
) -> Result<()> {
    let to_error = |e| map_rar_error(request.archive, e, encrypted);

    let mut remaining = bucket.len();
    let mut archive = open(request.archive, request.password)
        .open_for_processing()
        .map_err(to_error)?;

    while remaining > 0 {
        if cancel.is_cancelled() {
            break;
        }

        let Some(header) = archive.read_header().map_err(to_error)? else {
            break;
        };

        let name = header.entry().filename.clone();
        archive = if header.entry().is_file() && bucket.contains(&name) {
            let target = request.output.join(&name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let entry_encrypted = header.entry().is_encrypted();
            let next = header
                .extract_to(&target)
                .map_err(|e| map_rar_error(request.archive, e, entry_encrypted))?;
            remaining -= 1;
            on_done(&name);
            next
        } else {
            header.skip().map_err(to_error)?
        };
    }

    Ok(())
}

/// Deals members round-robin into `workers` buckets.
fn partition(files: &[PathBuf], workers: usize) -> Vec<HashSet<PathBuf>> {
    let count = workers.max(1);
    let mut buckets = vec![HashSet::new(); count];
    for (index, file) in files.iter().enumerate() {
        buckets[index % count].insert(file.clone());
    }
    buckets
}

fn is_safe_relative(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn map_rar_error(archive: &Path, error: UnrarError, encrypted: bool) -> ExtractorError {
    let archive = archive.display().to_string();

    match error.code {
        Code::MissingPassword | Code::BadPassword => ExtractorError::WrongPassword {
            archive,
            detail: error.to_string(),
        },
        // encrypted data decoded with the wrong key fails its checksum
        Code::BadData if encrypted => ExtractorError::WrongPassword {
            archive,
            detail: error.to_string(),
        },
        _ => ExtractorError::Archive {
            archive,
            message: error.to_string(),
        },
    }
}
