use crate::error::{ExtractorError, Result};
use crate::extractor::strategy::{
    directory_size, ensure_output_dir, list_output_files, ExtractContext, ExtractRequest,
    ExtractionStrategy,
};
use crate::scanner::format_registry::StrategyKind;
use log::{debug, info, warn};
use regex::Regex;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const TOOL_NAME: &str = "7-Zip";
const PATH_CANDIDATES: &[&str] = &["7z", "7zz", "7za"];
const POLL_STEP: Duration = Duration::from_millis(50);
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const PASSWORD_FAILURE_PATTERN: &str =
    r"(?i)wrong password|can ?not open encrypted archive|password is incorrect|data error in encrypted file";

#[cfg(windows)]
const KNOWN_LOCATIONS: &[&str] = &[
    r"C:\Program Files\7-Zip\7z.exe",
    r"C:\Program Files (x86)\7-Zip\7z.exe",
];

#[cfg(not(windows))]
const KNOWN_LOCATIONS: &[&str] = &[
    "/usr/bin/7z",
    "/usr/local/bin/7z",
    "/opt/homebrew/bin/7z",
    "/usr/bin/7zz",
];

/// Outcome of looking for the 7-Zip executable.
#[derive(Debug, Clone)]
pub enum ToolLocation {
    Found(PathBuf),
    Missing { searched: Vec<String> },
}

/// Looks for 7-Zip: configured path first, then well-known install locations, then `PATH`.
pub fn locate_seven_zip(configured: Option<&Path>) -> ToolLocation {
    let mut searched = Vec::new();

    if let Some(path) = configured {
        if path.is_file() {
            return ToolLocation::Found(path.to_path_buf());
        }
        warn!("Configured 7-Zip path does not exist: {}", path.display());
        searched.push(path.display().to_string());
    }

    for location in KNOWN_LOCATIONS {
        let path = Path::new(location);
        if path.is_file() {
            return ToolLocation::Found(path.to_path_buf());
        }
        searched.push(location.to_string());
    }

    for name in PATH_CANDIDATES {
        if let Ok(path) = which::which(name) {
            return ToolLocation::Found(path);
        }
    }
    searched.push(format!("PATH ({})", PATH_CANDIDATES.join(", ")));

    ToolLocation::Missing { searched }
}

/// `.7z` extraction by driving the external 7-Zip executable.
pub struct SevenZipStrategy {
    tool: ToolLocation,
    password_failure: Regex,
}

impl SevenZipStrategy {
    /// Runs tool discovery once; a missing tool is only reported when a `.7z` is extracted.
    pub fn new(configured: Option<&Path>) -> Result<Self> {
        let tool = locate_seven_zip(configured);
        match &tool {
            ToolLocation::Found(path) => info!("Using 7-Zip at {}", path.display()),
            ToolLocation::Missing { .. } => warn!("7-Zip not found; .7z archives will fail"),
        }
        Self::with_location(tool)
    }

    pub fn with_location(tool: ToolLocation) -> Result<Self> {
        let password_failure =
            Regex::new(PASSWORD_FAILURE_PATTERN).map_err(|e| ExtractorError::Config {
                message: format!("Invalid password failure pattern: {}", e),
            })?;

        Ok(Self {
            tool,
            password_failure,
        })
    }

    pub fn tool_path(&self) -> Option<&Path> {
        match &self.tool {
            ToolLocation::Found(path) => Some(path),
            ToolLocation::Missing { .. } => None,
        }
    }

    fn require_tool(&self) -> Result<&Path> {
        match &self.tool {
            ToolLocation::Found(path) => Ok(path),
            ToolLocation::Missing { searched } => Err(ExtractorError::ToolNotFound {
                tool: TOOL_NAME.to_string(),
                searched: searched.clone(),
            }),
        }
    }

    fn classify_failure(&self, status: ExitStatus, stderr: &str, diagnostics: &[String]) -> ExtractorError {
        let code = status.code().unwrap_or(-1);
        let combined = format!("{}\n{}", stderr.trim(), diagnostics.join("\n"));

        if self.password_failure.is_match(&combined) {
            return ExtractorError::WrongPassword {
                archive: String::new(),
                detail: combined.trim().to_string(),
            };
        }

        ExtractorError::ExternalToolFailure {
            code,
            stderr: combined.trim().to_string(),
        }
    }
}

impl ExtractionStrategy for SevenZipStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SevenZipExternal
    }

    fn extract(&self, request: &ExtractRequest<'_>, ctx: &ExtractContext<'_>) -> Result<Vec<String>> {
        let tool = self.require_tool()?;
        ensure_output_dir(request.output)?;

        debug!(
            "Running {} for {}",
            tool.display(),
            request.archive.display()
        );

        let mut child = build_command(tool, request).spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = AtomicBool::new(false);

        let (names, diagnostics, stderr_text, status) = thread::scope(|scope| {
            let stderr_reader = scope.spawn(move || {
                let mut text = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut text);
                }
                text
            });

            scope.spawn(|| monitor_output_size(request.output, ctx, &finished));

            let mut names = Vec::new();
            let mut diagnostics = Vec::new();
            let mut throttle = ctx.throttle();

            if let Some(stdout) = stdout {
                for line in BufReader::new(stdout).split(b'\n') {
                    let line = match line {
                        Ok(line) => String::from_utf8_lossy(&line).trim_end().to_string(),
                        Err(e) => {
                            warn!("Lost 7-Zip output stream: {}", e);
                            break;
                        }
                    };

                    if let Some(name) = parse_extracted_name(&line) {
                        if let Some(progress) = throttle.record(name) {
                            ctx.report_entry(&progress);
                        }
                        names.push(name.to_string());
                    } else if is_diagnostic(&line) {
                        diagnostics.push(line);
                    }
                }
            }

            if let Some(progress) = throttle.finish() {
                ctx.report_entry(&progress);
            }

            let status = child.wait();
            finished.store(true, Ordering::SeqCst);
            let stderr_text = stderr_reader.join().unwrap_or_default();

            (names, diagnostics, stderr_text, status)
        });

        let status = status?;
        if !status.success() {
            return Err(match self.classify_failure(status, &stderr_text, &diagnostics) {
                ExtractorError::WrongPassword { detail, .. } => ExtractorError::WrongPassword {
                    archive: request.archive.display().to_string(),
                    detail,
                },
                other => other,
            });
        }

        if names.is_empty() {
            return Ok(list_output_files(request.output));
        }

        Ok(names)
    }
}

fn build_command(tool: &Path, request: &ExtractRequest<'_>) -> Command {
    let mut output_flag = OsString::from("-o");
    output_flag.push(request.output.as_os_str());

    let mut command = Command::new(tool);
    command
        .arg("x")
        .arg(request.archive)
        .arg(output_flag)
        .args(["-y", "-mmt=on", "-bb3", "-bsp0", "-sccUTF-8"])
        .arg(format!("-p{}", request.password.unwrap_or("")))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    command
}

/// `- name` lines are the files 7-Zip reports as written.
fn parse_extracted_name(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn is_diagnostic(line: &str) -> bool {
    let lowercase = line.to_ascii_lowercase();
    lowercase.starts_with("error") || lowercase.contains("password")
}

fn monitor_output_size(output: &Path, ctx: &ExtractContext<'_>, finished: &AtomicBool) {
    let started = Instant::now();
    let interval = ctx.progress_interval();
    let mut last_sample = Instant::now();

    while !finished.load(Ordering::SeqCst) {
        thread::sleep(POLL_STEP.min(interval));
        if last_sample.elapsed() < interval || finished.load(Ordering::SeqCst) {
            continue;
        }
        last_sample = Instant::now();

        let megabytes = directory_size(output) as f64 / BYTES_PER_MB;
        let seconds = started.elapsed().as_secs_f64();
        let speed = if seconds > 0.0 { megabytes / seconds } else { 0.0 };
        ctx.report_status(&format!(
            "Extracting... {:.1} MB ({:.1} MB/s)",
            megabytes, speed
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::extractor::cancel::CancelToken;
    use crate::scanner::format_registry::FormatRegistry;
    use tempfile::TempDir;

    fn request<'a>(archive: &'a Path, output: &'a Path, password: Option<&'a str>) -> ExtractRequest<'a> {
        ExtractRequest {
            archive,
            format: FormatRegistry::default().resolve("x.7z").unwrap(),
            output,
            password,
        }
    }

    #[test]
    fn test_parse_extracted_name() {
        assert_eq!(parse_extracted_name("- docs/readme.txt"), Some("docs/readme.txt"));
        assert_eq!(parse_extracted_name("Path = archive.7z"), None);
        assert_eq!(parse_extracted_name("- "), None);
    }

    #[test]
    fn test_command_arguments() {
        let archive = Path::new("/data/A/backup.7z");
        let output = Path::new("/data/A/extracted_backup");
        let command = build_command(Path::new("/usr/bin/7z"), &request(archive, output, Some("pw")));

        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(args[0], "x");
        assert_eq!(args[1], "/data/A/backup.7z");
        assert_eq!(args[2], "-o/data/A/extracted_backup");
        assert!(args.contains(&"-y".to_string()));
        assert!(args.contains(&"-bb3".to_string()));
        assert!(args.contains(&"-ppw".to_string()));
    }

    #[test]
    fn test_empty_password_flag_when_none() {
        let command = build_command(
            Path::new("7z"),
            &request(Path::new("a.7z"), Path::new("out"), None),
        );
        assert!(command.get_args().any(|a| a == "-p"));
    }

    #[test]
    fn test_missing_tool_reported_on_use() {
        let strategy = SevenZipStrategy::with_location(ToolLocation::Missing {
            searched: vec!["/usr/bin/7z".to_string()],
        })
        .unwrap();
        assert!(strategy.tool_path().is_none());

        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("backup.7z");
        std::fs::write(&archive, b"7z").unwrap();
        let output = temp_dir.path().join("out");

        let error = strategy
            .extract(
                &request(&archive, &output, None),
                &ExtractContext::new(CancelToken::new()),
            )
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ToolNotFound);
    }

    #[test]
    fn test_configured_missing_path_is_listed_as_searched() {
        match locate_seven_zip(Some(Path::new("/definitely/not/7z"))) {
            ToolLocation::Missing { searched } => {
                assert_eq!(searched[0], "/definitely/not/7z");
            }
            ToolLocation::Found(path) => {
                assert_ne!(path, PathBuf::from("/definitely/not/7z"));
            }
        }
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-7z");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_tool_success_collects_names() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(
            temp_dir.path(),
            "#!/bin/sh\n\
             out=\"\"\n\
             for arg in \"$@\"; do case \"$arg\" in -o*) out=\"${arg#-o}\" ;; esac; done\n\
             mkdir -p \"$out\"\n\
             printf 'hello' > \"$out/a.txt\"\n\
             echo 'Extracting archive: backup.7z'\n\
             echo '- a.txt'\n",
        );
        let strategy = SevenZipStrategy::with_location(ToolLocation::Found(tool)).unwrap();

        let archive = temp_dir.path().join("backup.7z");
        std::fs::write(&archive, b"7z").unwrap();
        let output = temp_dir.path().join("extracted_backup");

        let names = strategy
            .extract(
                &request(&archive, &output, None),
                &ExtractContext::new(CancelToken::new()),
            )
            .unwrap();

        assert_eq!(names, vec!["a.txt".to_string()]);
        assert_eq!(std::fs::read(output.join("a.txt")).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_tool_wrong_password() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(
            temp_dir.path(),
            "#!/bin/sh\necho 'ERROR: Wrong password : secret.txt' >&2\nexit 2\n",
        );
        let strategy = SevenZipStrategy::with_location(ToolLocation::Found(tool)).unwrap();

        let archive = temp_dir.path().join("secret.7z");
        std::fs::write(&archive, b"7z").unwrap();

        let error = strategy
            .extract(
                &request(&archive, &temp_dir.path().join("out"), Some("bad")),
                &ExtractContext::new(CancelToken::new()),
            )
            .unwrap_err();

        assert!(error.is_password_error());
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_tool_generic_failure() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_tool(
            temp_dir.path(),
            "#!/bin/sh\necho 'ERROR: Data Error : broken.bin' >&2\nexit 2\n",
        );
        let strategy = SevenZipStrategy::with_location(ToolLocation::Found(tool)).unwrap();

        let archive = temp_dir.path().join("broken.7z");
        std::fs::write(&archive, b"7z").unwrap();

        let error = strategy
            .extract(
                &request(&archive, &temp_dir.path().join("out"), None),
                &ExtractContext::new(CancelToken::new()),
            )
            .unwrap_err();

        match error {
            ExtractorError::ExternalToolFailure { code, stderr } => {
                assert_eq!(code, 2);
                assert!(stderr.contains("Data Error"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
