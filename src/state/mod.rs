//! Cross-universe snapshot accumulation.

/// Update merging and emit decisions.
pub mod accumulator;
