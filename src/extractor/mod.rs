pub mod cancel;
pub mod orchestrator;
pub mod rar_strategy;
pub mod result;
pub mod seven_zip_strategy;
pub mod strategy;
pub mod stream_strategy;
pub mod tar_strategy;
pub mod zip_strategy;

pub use cancel::CancelToken;
pub use orchestrator::{
    ExtractionOrchestrator, PlannedExtraction, RunEvent, RunHandle, RunOutcome, RunRequest, RunState,
};
pub use result::{ExtractionResult, ExtractionStatus, FolderResults};
pub use strategy::{EntryProgress, ExtractContext, ExtractRequest, ExtractionStrategy, StrategySet};
