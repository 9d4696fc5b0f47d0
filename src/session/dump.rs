use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::num::NonZeroU64;
use std::path::Path;

use crate::decode::source::{DecodedFrame, FrameSource};
use crate::encode::layout::read_row;
use crate::foundation::core::{ROW_WIDTH, SHOW_HEADER};
use crate::foundation::error::{ConvertError, ConvertResult};

/// Options for reading a converted video back into a show file.
#[derive(Clone, Debug)]
pub struct DumpOpts {
    /// Duration given to a final frame whose length the container does not record.
    pub last_duration_ms: NonZeroU64,
}

impl Default for DumpOpts {
    fn default() -> Self {
        Self {
            last_duration_ms: NonZeroU64::MIN,
        }
    }
}

impl DumpOpts {
    /// Build options from the raw command-line value.
    pub fn from_raw(last_duration_ms: i64) -> ConvertResult<Self> {
        let last_duration_ms = u64::try_from(last_duration_ms)
            .ok()
            .and_then(NonZeroU64::new)
            .ok_or_else(|| ConvertError::validation("last frame duration must be at least 1 ms"))?;
        Ok(Self { last_duration_ms })
    }
}

/// Counters collected over one dump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DumpStats {
    /// Frames read from the video.
    pub frames: u64,
    /// Universe lines written.
    pub universe_lines: u64,
    /// Timestamp after the last frame, in milliseconds.
    pub duration_ms: u64,
}

/// Read frames from a Matroska or YUV4MPEG2 stream and write them to `out` as a show file.
///
/// Every frame becomes one data line per row, in row order, closed by `0` duration lines and
/// the frame's own duration after the last row. Converting the result with the same universe
/// count reproduces the frames.
#[tracing::instrument(skip(input, out))]
pub fn dump<R: BufRead, W: Write>(
    input: R,
    mut out: W,
    opts: &DumpOpts,
) -> ConvertResult<DumpStats> {
    let mut source = FrameSource::open(input)?;
    let mut stats = DumpStats::default();
    let mut line = String::new();

    write_out(&mut out, format_args!("{SHOW_HEADER}\n"))?;

    let mut held = source.next().transpose()?;
    while let Some(frame) = held {
        let next = source.next().transpose()?;
        let duration_ms = match (frame.duration_ms, &next) {
            (Some(d), _) => d,
            (None, Some(n)) => n.pts_ms.saturating_sub(frame.pts_ms),
            (None, None) => source
                .segment_duration_ms()
                .map(|end| end.saturating_sub(frame.pts_ms))
                .filter(|&d| d > 0)
                .unwrap_or(opts.last_duration_ms.get()),
        };
        if duration_ms == 0 {
            return Err(ConvertError::decode(format!(
                "frame at {} ms has zero duration",
                frame.pts_ms
            )));
        }

        stats.universe_lines += write_frame(&mut out, &mut line, &frame, duration_ms)?;
        stats.frames += 1;
        stats.duration_ms = frame.pts_ms.saturating_add(duration_ms);
        held = next;
    }

    out.flush()
        .map_err(|e| ConvertError::resource(format!("writing show output: {e}")))?;
    tracing::info!(
        frames = stats.frames,
        duration_ms = stats.duration_ms,
        "dump finished"
    );
    Ok(stats)
}

/// Dump the video at `input_path`.
pub fn dump_file<W: Write>(
    input_path: &Path,
    out: W,
    opts: &DumpOpts,
) -> ConvertResult<DumpStats> {
    let file = File::open(input_path).map_err(|e| {
        ConvertError::resource(format!(
            "could not open video '{}': {e}",
            input_path.display()
        ))
    })?;
    dump(BufReader::new(file), out, opts)
}

fn write_frame<W: Write>(
    out: &mut W,
    line: &mut String,
    frame: &DecodedFrame,
    duration_ms: u64,
) -> ConvertResult<u64> {
    use std::fmt::Write as _;

    let width = frame.width as usize;
    if width < ROW_WIDTH {
        return Err(ConvertError::decode(format!(
            "frame width {width} is narrower than a {ROW_WIDTH}-byte universe row"
        )));
    }

    let rows = frame.height as usize;
    if frame.pixels.len() != width * rows {
        return Err(ConvertError::decode(format!(
            "frame holds {} bytes, {rows} rows of {width} need {}",
            frame.pixels.len(),
            width * rows
        )));
    }
    for (idx, row) in frame.pixels.chunks_exact(width).take(rows).enumerate() {
        let (universe, channels) = read_row(row)?;
        line.clear();
        let _ = write!(line, "{universe} ");
        for (i, v) in channels.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "{v}");
        }
        let control = if idx + 1 == rows { duration_ms } else { 0 };
        write_out(out, format_args!("{line}\n{control}\n"))?;
    }
    Ok(rows as u64)
}

fn write_out<W: Write>(out: &mut W, args: std::fmt::Arguments<'_>) -> ConvertResult<()> {
    out.write_fmt(args)
        .map_err(|e| ConvertError::resource(format!("writing show output: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/session/dump.rs"]
mod tests;
