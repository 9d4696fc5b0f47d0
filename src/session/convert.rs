use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::Path;
use std::time::Instant;

use crate::encode::backend::{FrameBackend, FrameGeometry, FrameRef, InMemoryBackend};
use crate::encode::encoder::FrameEncoder;
use crate::foundation::core::ROW_WIDTH;
use crate::foundation::error::{ConvertError, ConvertResult};
use crate::show::reader::ShowReader;
use crate::state::accumulator::Accumulator;

/// Options controlling one show-file conversion.
#[derive(Clone, Debug)]
pub struct ConvertOpts {
    /// Number of universes every frame must contain.
    pub universes: NonZeroUsize,
    /// Duration of a final frame cut off by end-of-input, in milliseconds.
    pub last_duration_ms: NonZeroU64,
    /// Log progress every this many records (0 = off). Has no effect on the output.
    pub progress_interval: u64,
}

impl ConvertOpts {
    /// Options for `universes` universes with a 1 ms last frame and no progress logging.
    pub fn new(universes: NonZeroUsize) -> Self {
        Self {
            universes,
            last_duration_ms: NonZeroU64::MIN,
            progress_interval: 0,
        }
    }

    /// Build options from raw command-line values.
    pub fn from_raw(
        universes: i64,
        last_duration_ms: i64,
        progress_interval: i64,
    ) -> ConvertResult<Self> {
        let universes = usize::try_from(universes)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConvertError::validation("non-positive universe count"))?;
        let last_duration_ms = u64::try_from(last_duration_ms)
            .ok()
            .and_then(NonZeroU64::new)
            .ok_or_else(|| ConvertError::validation("last frame duration must be at least 1 ms"))?;
        let progress_interval = u64::try_from(progress_interval)
            .map_err(|_| ConvertError::validation("progress interval must not be negative"))?;

        Ok(Self {
            universes,
            last_duration_ms,
            progress_interval,
        })
    }
}

/// Counters collected over one conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConvertStats {
    /// Update records read from the show file.
    pub records: u64,
    /// Frames emitted to the backend.
    pub frames: u64,
    /// Universe updates replaced by a following data line before any duration line.
    pub overwritten_updates: u64,
    /// Presentation timestamp after the last frame (total timeline length), in milliseconds.
    pub duration_ms: u64,
}

/// Convert a show-file stream, writing frames to `backend`.
///
/// The encoder is closed exactly once on every path. If both the conversion and the close fail,
/// the conversion error is returned and the close error is logged.
#[tracing::instrument(skip(input, backend))]
pub fn convert<R: BufRead, B: FrameBackend>(
    input: R,
    backend: B,
    opts: &ConvertOpts,
) -> ConvertResult<ConvertStats> {
    let mut encoder = FrameEncoder::open(opts.universes, backend)?;
    let pumped = pump(ShowReader::new(input), &mut encoder, opts);
    let closed = encoder.close();

    match (pumped, closed) {
        (Ok(mut stats), Ok(())) => {
            stats.duration_ms = encoder.next_pts();
            tracing::info!(
                records = stats.records,
                frames = stats.frames,
                duration_ms = stats.duration_ms,
                "conversion finished"
            );
            Ok(stats)
        }
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::error!(error = %close_err, "closing output after failure also failed");
            Err(err)
        }
    }
}

/// Convert the show file at `input_path`.
pub fn convert_file<B: FrameBackend>(
    input_path: &Path,
    backend: B,
    opts: &ConvertOpts,
) -> ConvertResult<ConvertStats> {
    let input = open_show(input_path)?;
    convert(input, backend, opts)
}

fn open_show(path: &Path) -> ConvertResult<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        ConvertError::resource(format!("could not open showfile '{}': {e}", path.display()))
    })?;
    Ok(BufReader::new(file))
}

fn pump<R: BufRead, B: FrameBackend>(
    mut reader: ShowReader<R>,
    encoder: &mut FrameEncoder<B>,
    opts: &ConvertOpts,
) -> ConvertResult<ConvertStats> {
    let mut acc = Accumulator::new(opts.universes, opts.last_duration_ms);
    let mut stats = ConvertStats::default();
    let start = Instant::now();

    for (count, record) in reader.by_ref().enumerate() {
        let record = record?;
        stats.records += 1;

        if let Some(emit) = acc.apply(&record)? {
            encoder.emit(acc.states(), emit.duration_ms)?;
            stats.frames += 1;
        }

        let count = count as u64;
        if opts.progress_interval != 0 && count != 0 && count % opts.progress_interval == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            tracing::info!(
                record = count,
                frames = stats.frames,
                elapsed_s = elapsed,
                avg_records_per_s = count as f64 / elapsed.max(f64::EPSILON),
                "progress"
            );
        }
    }

    stats.overwritten_updates = reader.overwritten_updates();
    Ok(stats)
}

/// One emitted frame rendered as a packed gray image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels (one row per universe).
    pub height: u32,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
    /// Display duration in milliseconds.
    pub duration_ms: u64,
    /// `width * height` gray8 pixels.
    pub pixels: Vec<u8>,
}

/// Run the conversion in memory and return the `index`-th emitted frame (0-based).
pub fn snapshot_at<R: BufRead>(
    input: R,
    opts: &ConvertOpts,
    index: u64,
) -> ConvertResult<Snapshot> {
    let backend = CaptureOne {
        inner: InMemoryBackend::new(),
        wanted: index,
        seen: 0,
    };
    let mut encoder = FrameEncoder::open(opts.universes, backend)?;
    let pumped = pump(ShowReader::new(input), &mut encoder, opts);
    let closed = encoder.close();
    let stats = pumped?;
    closed?;

    let frame = encoder
        .into_backend()
        .inner
        .into_frames()
        .into_iter()
        .next()
        .ok_or_else(|| {
            ConvertError::validation(format!(
                "frame index {index} is past the last frame ({} emitted)",
                stats.frames
            ))
        })?;

    Ok(Snapshot {
        width: ROW_WIDTH as u32,
        height: opts.universes.get() as u32,
        pts_ms: frame.pts_ms,
        duration_ms: frame.duration_ms,
        pixels: frame.data,
    })
}

/// Keeps only one frame of the stream.
struct CaptureOne {
    inner: InMemoryBackend,
    wanted: u64,
    seen: u64,
}

impl FrameBackend for CaptureOne {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        self.inner.begin(geometry)
    }

    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()> {
        let idx = self.seen;
        self.seen += 1;
        if idx == self.wanted {
            self.inner.write_frame(frame)?;
        }
        Ok(())
    }

    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()> {
        self.inner.finish(end_pts_ms)
    }
}

/// Convenience wrapper of [`snapshot_at`] for a show file on disk.
pub fn snapshot_file(input_path: &Path, opts: &ConvertOpts, index: u64) -> ConvertResult<Snapshot> {
    snapshot_at(open_show(input_path)?, opts, index)
}

#[cfg(test)]
#[path = "../../tests/unit/session/convert.rs"]
mod tests;
