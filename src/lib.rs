//! Converts OLA recorder show files into a DMX timeline video.
//!
//! Each emitted snapshot of all configured universes becomes one 8-bit gray frame, and each
//! universe becomes one 514-byte row of that frame (2-byte little-endian universe id, then
//! 512 channel values). The pipeline is strictly sequential:
//!
//! - [`ShowReader`] parses the text format into [`UpdateRecord`]s
//! - [`Accumulator`] merges them and decides when a frame is complete
//! - [`FrameEncoder`] lays out frames and drives a [`FrameBackend`]
//!
//! [`convert`] wires the three together and guarantees the encoder is closed. [`dump`] goes the
//! other way, turning a converted video back into show-file lines.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Reading frames back from converted videos.
pub mod decode;
/// Frame serialization and video backends.
pub mod encode;
/// Top-level conversion entry points.
pub mod session;
/// Show-file parsing.
pub mod show;
/// Snapshot accumulation.
pub mod state;

pub use crate::foundation::core::{
    CHANNELS_PER_UNIVERSE, FrameControl, ROW_WIDTH, SHOW_HEADER, UniverseData, UniverseStates,
    UpdateRecord,
};
pub use crate::foundation::error::{ConvertError, ConvertResult};

pub use crate::decode::matroska::MatroskaReader;
pub use crate::decode::source::{DecodedFrame, FrameSource};
pub use crate::decode::y4m::Y4mReader;
pub use crate::encode::backend::{
    CapturedFrame, FrameBackend, FrameGeometry, FrameRef, InMemoryBackend,
};
pub use crate::encode::encoder::FrameEncoder;
pub use crate::encode::ffmpeg::{FfmpegBackend, FfmpegOpts, is_ffmpeg_on_path};
pub use crate::encode::file::{MatroskaBackend, MatroskaOpts};
pub use crate::session::convert::{
    ConvertOpts, ConvertStats, Snapshot, convert, convert_file, snapshot_at, snapshot_file,
};
pub use crate::session::dump::{DumpOpts, DumpStats, dump, dump_file};
pub use crate::show::reader::ShowReader;
pub use crate::state::accumulator::{Accumulator, Emit};
