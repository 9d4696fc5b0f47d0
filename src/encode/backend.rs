use crate::foundation::core::ROW_WIDTH;
use crate::foundation::error::{ConvertError, ConvertResult};

/// Frame geometry provided to a [`FrameBackend`] when the encoder opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FrameGeometry {
    /// Logical row width in bytes (always [`ROW_WIDTH`]).
    pub width: u32,
    /// Number of rows, one per universe.
    pub height: u32,
    /// Time base numerator over 1000; presentation timestamps are in milliseconds.
    pub time_base_ms: u32,
}

impl FrameGeometry {
    /// Geometry for `universes` rows of one universe each.
    pub fn for_universes(universes: usize) -> ConvertResult<Self> {
        let height = u32::try_from(universes)
            .ok()
            .filter(|&h| h > 0)
            .ok_or_else(|| {
                ConvertError::validation(format!("universe count {universes} is out of range"))
            })?;
        Ok(Self {
            width: ROW_WIDTH as u32,
            height,
            time_base_ms: 1,
        })
    }
}

/// One serialized frame handed to a backend.
#[derive(Clone, Copy, Debug)]
pub struct FrameRef<'a> {
    /// Pixel rows, `stride` bytes apart.
    pub data: &'a [u8],
    /// Physical bytes per row.
    pub stride: usize,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
    /// Display duration in milliseconds.
    pub duration_ms: u64,
}

/// Video backend contract.
///
/// Call order: `begin` once, `write_frame` in strictly increasing timestamp order, `finish` once.
pub trait FrameBackend {
    /// Prepare for frames of `geometry`. Returns the physical row stride (at least
    /// `geometry.width`) the frame buffer must use.
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize>;
    /// Consume one frame.
    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()>;
    /// Flush buffered output and finalize at `end_pts_ms`, the timestamp after the last frame.
    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()>;
}

impl<B: FrameBackend + ?Sized> FrameBackend for &mut B {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        (**self).begin(geometry)
    }

    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()> {
        (**self).finish(end_pts_ms)
    }
}

impl<B: FrameBackend + ?Sized> FrameBackend for Box<B> {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        (**self).begin(geometry)
    }

    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()> {
        (**self).finish(end_pts_ms)
    }
}

/// A frame captured by [`InMemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
    /// Display duration in milliseconds.
    pub duration_ms: u64,
    /// Frame bytes including any row padding.
    pub data: Vec<u8>,
}

/// In-memory backend for tests and previews.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    padding: usize,
    geometry: Option<FrameGeometry>,
    stride: usize,
    frames: Vec<CapturedFrame>,
    end_pts_ms: Option<u64>,
}

impl InMemoryBackend {
    /// Create a backend with packed rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that pads every row by `padding` bytes.
    pub fn with_row_padding(padding: usize) -> Self {
        Self {
            padding,
            ..Self::default()
        }
    }

    /// Geometry captured in `begin`, if any.
    pub fn geometry(&self) -> Option<FrameGeometry> {
        self.geometry
    }

    /// Physical row stride handed out in `begin`.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Captured frames in timeline order.
    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    /// Consume the backend, returning the captured frames.
    pub fn into_frames(self) -> Vec<CapturedFrame> {
        self.frames
    }

    /// Timestamp passed to `finish`, once finished.
    pub fn end_pts_ms(&self) -> Option<u64> {
        self.end_pts_ms
    }
}

impl FrameBackend for InMemoryBackend {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        self.geometry = Some(geometry);
        self.stride = geometry.width as usize + self.padding;
        self.frames.clear();
        self.end_pts_ms = None;
        Ok(self.stride)
    }

    fn write_frame(&mut self, frame: FrameRef<'_>) -> ConvertResult<()> {
        if self.geometry.is_none() {
            return Err(ConvertError::resource("in-memory backend not started"));
        }
        if self.end_pts_ms.is_some() {
            return Err(ConvertError::resource("in-memory backend is already finalized"));
        }
        self.frames.push(CapturedFrame {
            pts_ms: frame.pts_ms,
            duration_ms: frame.duration_ms,
            data: frame.data.to_vec(),
        });
        Ok(())
    }

    fn finish(&mut self, end_pts_ms: u64) -> ConvertResult<()> {
        self.end_pts_ms = Some(end_pts_ms);
        Ok(())
    }
}
