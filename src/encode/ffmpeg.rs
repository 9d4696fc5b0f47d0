use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::backend::{FrameBackend, FrameGeometry, FrameRef};
use crate::encode::matroska::MatroskaWriter;
use crate::foundation::error::{ConvertError, ConvertResult};

/// Options for [`FfmpegBackend`] FFV1/Matroska output.
#[derive(Clone, Debug)]
pub struct FfmpegOpts {
    /// Output `.mkv` file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl FfmpegOpts {
    /// Create options for outputting an FFV1 MKV to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Backend that spawns the system `ffmpeg` and streams Matroska-framed gray frames to stdin.
///
/// `ffmpeg` re-encodes them losslessly as intra-only FFV1, keeping the millisecond timestamps.
pub struct FfmpegBackend {
    opts: FfmpegOpts,

    child: Option<Child>,
    stdin: Option<MatroskaWriter<BufWriter<ChildStdin>>>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegBackend {
    /// Create a new backend that streams into `ffmpeg`.
    pub fn new(opts: FfmpegOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
        }
    }

    fn wait_child(&mut self) -> ConvertResult<()> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| ConvertError::resource("ffmpeg backend not started"))?;

        let status = child.wait().map_err(|e| {
            ConvertError::resource(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ConvertError::resource("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ConvertError::resource(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ConvertError::resource(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl FrameBackend for FfmpegBackend {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        if self.child.is_some() {
            return Err(ConvertError::resource("ffmpeg backend already started"));
        }
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ConvertError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ConvertError::resource(
                "ffmpeg is required for FFV1 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if self.opts.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        // Input: V_UNCOMPRESSED gray8 in Matroska, timestamps already in milliseconds.
        cmd.args(["-loglevel", "error", "-f", "matroska", "-i", "pipe:0"]);
        // Output: lossless intra-only FFV1, one packet per input frame.
        cmd.args([
            "-map",
            "0:v:0",
            "-an",
            "-c:v",
            "ffv1",
            "-g",
            "1",
            "-slicecrc",
            "0",
            "-pix_fmt",
            "gray",
            "-fps_mode",
            "passthrough",
            "-f",
            "matroska",
        ])
        .arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ConvertError::resource(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConvertError::resource("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConvertError::resource("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });
        self.child = Some(child);
        self.stderr_drain = Some(stderr_drain);

        match MatroskaWriter::new(BufWriter::new(stdin), geometry) {
            Ok(writer) => self.stdin = Some(writer),
            Err(e) => {
                // ffmpeg usually explains a broken pipe on stderr.
                let exit = self.wait_child().err();
                return Err(ConvertError::resource(match exit {
                    Some(exit) => format!("writing container header to ffmpeg: {e} ({exit})"),
                    None => format!("writing container header to ffmpeg: {e}"),
                }));
            }
        }
        tracing::debug!(path = %self.opts.out_path.display(), ?geometry, "ffmpeg encoder spawned");
        Ok(geometry.width as usize)
    }

    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ConvertError::resource("ffmpeg backend is not accepting frames"));
        };
        stdin.write_frame(frame).map_err(|e| {
            ConvertError::resource(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }

    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()> {
        // Closing stdin is ffmpeg's signal to flush the encoder and write the trailer.
        let flushed = match self.stdin.take() {
            Some(writer) => writer.into_inner().map(drop),
            None => Ok(()),
        };
        let exited = self.wait_child();
        flushed.map_err(|e| {
            ConvertError::resource(format!("failed to flush frames to ffmpeg stdin: {e}"))
        })?;
        exited?;

        tracing::debug!(end_pts_ms, "ffmpeg encoder finished");
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> ConvertResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
