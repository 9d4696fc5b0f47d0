use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::encode::backend::{FrameBackend, FrameGeometry, FrameRef};
use crate::encode::ffmpeg::ensure_parent_dir;
use crate::encode::matroska::MatroskaWriter;
use crate::foundation::error::{ConvertError, ConvertResult};

/// Options for [`MatroskaBackend`].
#[derive(Clone, Debug)]
pub struct MatroskaOpts {
    /// Output `.mkv` path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl MatroskaOpts {
    /// Create options for writing to `out_path`, overwriting by default.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Backend writing uncompressed gray frames straight into a Matroska file.
///
/// Needs no external tools. The file is finalized by patching the segment duration.
pub struct MatroskaBackend {
    opts: MatroskaOpts,
    writer: Option<MatroskaWriter<BufWriter<File>>>,
}

impl MatroskaBackend {
    /// Create a backend for `opts`; nothing is opened until `begin`.
    pub fn new(opts: MatroskaOpts) -> Self {
        Self { opts, writer: None }
    }
}

impl FrameBackend for MatroskaBackend {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        if self.writer.is_some() {
            return Err(ConvertError::resource("matroska backend already started"));
        }
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ConvertError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        let file = File::create(&self.opts.out_path).map_err(|e| {
            ConvertError::resource(format!(
                "could not open output '{}': {e}",
                self.opts.out_path.display()
            ))
        })?;
        let writer = MatroskaWriter::new(BufWriter::new(file), geometry)
            .map_err(|e| ConvertError::resource(format!("writing matroska header: {e}")))?;
        tracing::debug!(path = %self.opts.out_path.display(), ?geometry, "matroska output opened");

        self.writer = Some(writer);
        Ok(geometry.width as usize)
    }

    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ConvertError::resource("matroska backend not started"))?;
        writer
            .write_frame(frame)
            .map_err(|e| ConvertError::resource(format!("writing frame to matroska output: {e}")))
    }

    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| ConvertError::resource("matroska backend not started"))?;
        let duration_offset = writer.duration_offset();

        let mut file = writer
            .into_inner()
            .map_err(|e| ConvertError::resource(format!("flushing matroska output: {e}")))?
            .into_inner()
            .map_err(|e| ConvertError::resource(format!("flushing matroska output: {}", e.error())))?;

        patch_duration(&mut file, duration_offset, end_pts_ms).map_err(|e| {
            ConvertError::resource(format!(
                "finalizing '{}': {e}",
                self.opts.out_path.display()
            ))
        })?;

        tracing::debug!(end_pts_ms, "matroska output finalized");
        Ok(())
    }
}

/// Duration is a float in timestamp-scale (millisecond) units.
fn patch_duration(file: &mut File, offset: u64, end_pts_ms: u64) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&(end_pts_ms as f64).to_be_bytes())?;
    file.sync_all()
}
