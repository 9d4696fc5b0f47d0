//! Reading DMX timeline frames back from converted videos.
//!
//! Two inputs are understood: the uncompressed gray Matroska written by `--codec raw`, and a
//! gray YUV4MPEG2 stream (any codec decoded by `ffmpeg -f yuv4mpegpipe -pix_fmt gray`).

/// Matroska `V_UNCOMPRESSED` reader.
pub mod matroska;
/// Format sniffing and the decoded frame type.
pub mod source;
/// YUV4MPEG2 gray reader.
pub mod y4m;
