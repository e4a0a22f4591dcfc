pub mod folder_scanner;
pub mod format_registry;

pub use folder_scanner::{ArchiveCandidate, FolderScanner};
pub use format_registry::{ArchiveFormat, Compression, FormatRegistry, StrategyKind};
