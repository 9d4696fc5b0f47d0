//! OLA recorder show-file parsing.

/// Line-oriented show-file reader.
pub mod reader;
