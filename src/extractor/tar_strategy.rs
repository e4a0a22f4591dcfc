use crate::error::Result;
use crate::extractor::stream_strategy::{map_decode_error, open_decoder};
use crate::extractor::strategy::{
    display_name, ensure_output_dir, ExtractContext, ExtractRequest, ExtractionStrategy,
};
use crate::scanner::format_registry::StrategyKind;
use log::{debug, warn};
use std::fs::File;
use tar::Archive;

/// Plain and compressed tar archives, unpacked entry by entry.
#[derive(Debug, Default)]
pub struct TarStrategy;

impl ExtractionStrategy for TarStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TarFamily
    }

    fn extract(&self, request: &ExtractRequest<'_>, ctx: &ExtractContext<'_>) -> Result<Vec<String>> {
        ensure_output_dir(request.output)?;

        let reader = open_decoder(File::open(request.archive)?, request.format.compression);
        let mut archive = Archive::new(reader);
        let decode_error = |e| map_decode_error(request.archive, e);

        let mut throttle = ctx.throttle();
        let mut names = Vec::new();

        for entry in archive.entries().map_err(decode_error)? {
            let mut entry = entry.map_err(decode_error)?;
            let relative = entry.path().map_err(decode_error)?.into_owned();
            let is_file = entry.header().entry_type().is_file();

            // unpack_in refuses paths that would escape the output folder
            if !entry.unpack_in(request.output).map_err(decode_error)? {
                warn!("Skipping unsafe tar entry path: {}", relative.display());
                continue;
            }

            if is_file {
                let name = display_name(&relative);
                if let Some(progress) = throttle.record(&name) {
                    ctx.report_entry(&progress);
                }
                names.push(name);
            }
        }

        if let Some(progress) = throttle.finish() {
            ctx.report_entry(&progress);
        }

        debug!(
            "Unpacked {} files from {}",
            names.len(),
            request.archive.display()
        );

        Ok(names)
    }
}
