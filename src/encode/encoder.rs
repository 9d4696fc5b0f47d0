use std::num::NonZeroUsize;

use crate::encode::backend::{FrameBackend, FrameGeometry, FrameRef};
use crate::encode::layout::write_rows;
use crate::foundation::core::{ROW_WIDTH, UniverseStates};
use crate::foundation::error::{ConvertError, ConvertResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Open,
    Closed,
}

/// Encoding session: serializes snapshots and drives a [`FrameBackend`].
///
/// `open` is the only constructor; `close` must be called explicitly. Dropping an open encoder
/// does not finalize the output.
pub struct FrameEncoder<B: FrameBackend> {
    backend: B,
    universe_count: NonZeroUsize,
    stride: usize,
    fbuf: Vec<u8>,
    next_pts: u64,
    frames: u64,
    state: Lifecycle,
}

impl<B: FrameBackend> FrameEncoder<B> {
    /// Start a session of `universe_count` rows on `backend`.
    #[tracing::instrument(skip(backend))]
    pub fn open(universe_count: NonZeroUsize, mut backend: B) -> ConvertResult<Self> {
        let geometry = FrameGeometry::for_universes(universe_count.get())?;
        let stride = backend.begin(geometry)?;
        if stride < ROW_WIDTH {
            return Err(ConvertError::resource(format!(
                "backend row stride {stride} is smaller than {ROW_WIDTH}"
            )));
        }
        let len = stride
            .checked_mul(universe_count.get())
            .ok_or_else(|| ConvertError::resource("frame buffer size overflows"))?;

        Ok(Self {
            backend,
            universe_count,
            stride,
            fbuf: vec![0u8; len],
            next_pts: 0,
            frames: 0,
            state: Lifecycle::Open,
        })
    }

    /// Serialize `states` as the next frame, shown for `duration_ms`.
    pub fn emit(&mut self, states: &UniverseStates, duration_ms: u64) -> ConvertResult<()> {
        if self.state == Lifecycle::Closed {
            return Err(ConvertError::resource("closed"));
        }
        if states.len() != self.universe_count.get() {
            return Err(ConvertError::cardinality(format!(
                "frame needs {} universes, got {}",
                self.universe_count,
                states.len()
            )));
        }
        let end = self
            .next_pts
            .checked_add(duration_ms)
            .ok_or_else(|| ConvertError::resource("presentation timestamp overflow"))?;

        write_rows(&mut self.fbuf, self.stride, states)?;
        self.backend.write_frame(FrameRef {
            data: &self.fbuf,
            stride: self.stride,
            pts_ms: self.next_pts,
            duration_ms,
        })?;

        self.next_pts = end;
        self.frames += 1;
        Ok(())
    }

    /// Flush and finalize the output. Idempotent: only the first call does anything.
    ///
    /// The session counts as closed even when teardown fails.
    pub fn close(&mut self) -> ConvertResult<()> {
        if self.state == Lifecycle::Closed {
            return Ok(());
        }
        self.state = Lifecycle::Closed;
        tracing::debug!(frames = self.frames, end_pts_ms = self.next_pts, "closing encoder");
        self.backend.finish(self.next_pts)
    }

    /// Presentation timestamp the next frame would get, in milliseconds.
    pub fn next_pts(&self) -> u64 {
        self.next_pts
    }

    /// Frames handed to the backend so far.
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state == Lifecycle::Closed
    }

    /// Borrow the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consume the encoder, returning the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
