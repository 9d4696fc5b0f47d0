//! Frame serialization and video backends.
//!
//! The [`encoder::FrameEncoder`] turns snapshots into fixed-layout gray frames and feeds them to a
//! [`backend::FrameBackend`] in timeline order.

/// Backend trait and the in-memory backend.
pub mod backend;
/// Encoding session lifecycle.
pub mod encoder;
/// `ffmpeg`-based FFV1 output via the system `ffmpeg`.
pub mod ffmpeg;
/// Direct Matroska file output.
pub mod file;
/// Universe row layout.
pub mod layout;
/// Matroska element writer.
pub mod matroska;
