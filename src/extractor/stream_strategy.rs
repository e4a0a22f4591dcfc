use crate::error::{ExtractorError, Result};
use crate::extractor::strategy::{
    ensure_output_dir, EntryProgress, ExtractContext, ExtractRequest, ExtractionStrategy,
};
use crate::scanner::format_registry::{Compression, StrategyKind};
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use xz2::read::XzDecoder;

/// Wraps an archive file in the decompressor for its suffix.
pub(crate) fn open_decoder(file: File, compression: Compression) -> Box<dyn Read + Send> {
    let reader = BufReader::new(file);
    match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
        Compression::Xz => Box::new(XzDecoder::new_multi_decoder(reader)),
    }
}

/// Decoder failures become archive errors; everything else stays an IO error.
pub(crate) fn map_decode_error(archive: &Path, error: io::Error) -> ExtractorError {
    match error.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            ExtractorError::Archive {
                archive: archive.display().to_string(),
                message: error.to_string(),
            }
        }
        _ => ExtractorError::Io(error),
    }
}

/// Single-stream decompression (`.gz`, `.bz2`, `.xz` and the `.tgz` style short forms)
/// into one file named after the archive.
#[derive(Debug, Default)]
pub struct StreamStrategy;

impl ExtractionStrategy for StreamStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SingleStreamCompressor
    }

    fn extract(&self, request: &ExtractRequest<'_>, ctx: &ExtractContext<'_>) -> Result<Vec<String>> {
        ensure_output_dir(request.output)?;

        let file_name = request
            .archive
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ExtractorError::InvalidPath {
                path: request.archive.display().to_string(),
            })?;

        let output_name = match request.format.strip_suffix(file_name) {
            "" => "decompressed".to_string(),
            stem => stem.to_string(),
        };
        let target = request.output.join(&output_name);

        debug!(
            "Decompressing {} into {}",
            request.archive.display(),
            target.display()
        );

        let archive_metadata = fs::metadata(request.archive)?;
        let mut reader = open_decoder(File::open(request.archive)?, request.format.compression);
        let mut writer = BufWriter::new(File::create(&target)?);

        io::copy(&mut reader, &mut writer).map_err(|e| map_decode_error(request.archive, e))?;
        writer.flush()?;
        drop(writer);

        if let Ok(modified) = archive_metadata.modified() {
            let _ = filetime::set_file_mtime(&target, filetime::FileTime::from_system_time(modified));
        }

        ctx.report_entry(&EntryProgress {
            file_name: output_name.clone(),
            extracted_count: 1,
        });

        Ok(vec![output_name])
    }
}
