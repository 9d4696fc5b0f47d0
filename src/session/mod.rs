//! Top-level conversion loop: Reader → Accumulator → Encoder, and its reverse.

/// Show-file conversion entry points.
pub mod convert;
/// Reading converted videos back into show files.
pub mod dump;
