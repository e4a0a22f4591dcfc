use serde::Serialize;
use std::path::Path;

/// Extraction mechanism used for a family of archive suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PlainZip,
    Rar,
    SevenZipExternal,
    TarFamily,
    SingleStreamCompressor,
}

impl StrategyKind {
    /// Method label shown in result messages.
    pub fn method_label(&self) -> &'static str {
        match self {
            StrategyKind::PlainZip | StrategyKind::Rar | StrategyKind::SevenZipExternal => {
                "optimized"
            }
            StrategyKind::TarFamily | StrategyKind::SingleStreamCompressor => "stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveFormat {
    pub suffix: &'static str,
    pub kind: StrategyKind,
    pub compression: Compression,
}

impl ArchiveFormat {
    const fn new(suffix: &'static str, kind: StrategyKind, compression: Compression) -> Self {
        Self {
            suffix,
            kind,
            compression,
        }
    }

    fn matches(&self, lowercase_name: &str) -> bool {
        lowercase_name.len() > self.suffix.len() && lowercase_name.ends_with(self.suffix)
    }

    /// File name with this format's suffix removed, compared case-insensitively.
    pub fn strip_suffix<'a>(&self, file_name: &'a str) -> &'a str {
        let lowercase = file_name.to_ascii_lowercase();
        if lowercase.ends_with(self.suffix) {
            &file_name[..file_name.len() - self.suffix.len()]
        } else {
            file_name
        }
    }
}

const FORMATS: &[ArchiveFormat] = &[
    ArchiveFormat::new(".zip", StrategyKind::PlainZip, Compression::None),
    ArchiveFormat::new(".rar", StrategyKind::Rar, Compression::None),
    ArchiveFormat::new(".7z", StrategyKind::SevenZipExternal, Compression::None),
    ArchiveFormat::new(".tar", StrategyKind::TarFamily, Compression::None),
    ArchiveFormat::new(".tar.gz", StrategyKind::TarFamily, Compression::Gzip),
    ArchiveFormat::new(".tar.bz2", StrategyKind::TarFamily, Compression::Bzip2),
    ArchiveFormat::new(".tar.xz", StrategyKind::TarFamily, Compression::Xz),
    // short forms are decompressed as a single stream, like `.gz`
    ArchiveFormat::new(".gz", StrategyKind::SingleStreamCompressor, Compression::Gzip),
    ArchiveFormat::new(".tgz", StrategyKind::SingleStreamCompressor, Compression::Gzip),
    ArchiveFormat::new(".bz2", StrategyKind::SingleStreamCompressor, Compression::Bzip2),
    ArchiveFormat::new(".tbz2", StrategyKind::SingleStreamCompressor, Compression::Bzip2),
    ArchiveFormat::new(".xz", StrategyKind::SingleStreamCompressor, Compression::Xz),
    ArchiveFormat::new(".txz", StrategyKind::SingleStreamCompressor, Compression::Xz),
];

/// Maps file names to archive formats by longest matching suffix.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<ArchiveFormat>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self {
            formats: FORMATS.to_vec(),
        }
    }
}

impl FormatRegistry {
    /// Registry restricted to the given suffixes. Unknown suffixes are ignored.
    pub fn with_suffixes(suffixes: &[String]) -> Self {
        let wanted: Vec<String> = suffixes.iter().map(|s| normalize_suffix(s)).collect();
        Self {
            formats: FORMATS
                .iter()
                .filter(|format| wanted.iter().any(|w| w == format.suffix))
                .copied()
                .collect(),
        }
    }

    /// Resolves a file name to its format. `.tar.gz` wins over `.gz`; matching ignores case.
    ///
    /// The longest suffix is picked from the full table before the enabled set is
    /// consulted, so a restricted registry never demotes `data.tar.gz` to `.gz`.
    pub fn resolve(&self, file_name: &str) -> Option<ArchiveFormat> {
        let lowercase = file_name.to_ascii_lowercase();
        let format = FORMATS
            .iter()
            .filter(|format| format.matches(&lowercase))
            .max_by_key(|format| format.suffix.len())?;

        self.formats.contains(format).then_some(*format)
    }

    pub fn resolve_path(&self, path: &Path) -> Option<ArchiveFormat> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.resolve(name))
    }

    pub fn is_archive(&self, path: &Path) -> bool {
        self.resolve_path(path).is_some()
    }

    pub fn is_known_suffix(&self, suffix: &str) -> bool {
        let suffix = normalize_suffix(suffix);
        self.formats.iter().any(|format| format.suffix == suffix)
    }

    pub fn supported_suffixes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formats.iter().map(|format| format.suffix)
    }
}

fn normalize_suffix(suffix: &str) -> String {
    let suffix = suffix.trim().to_ascii_lowercase();
    if suffix.starts_with('.') {
        suffix
    } else {
        format!(".{}", suffix)
    }
}

/// Output folder stem: the file name with only its last extension removed.
pub fn archive_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    }
}
