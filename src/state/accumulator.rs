use std::num::{NonZeroU64, NonZeroUsize};

use crate::foundation::core::{FrameControl, UniverseStates, UpdateRecord};
use crate::foundation::error::{ConvertError, ConvertResult};

/// Signal that the accumulated state is a complete frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Emit {
    /// How long the frame is displayed, in milliseconds.
    pub duration_ms: u64,
}

/// Merges per-universe updates into one cross-universe snapshot.
#[derive(Debug)]
pub struct Accumulator {
    universe_count: NonZeroUsize,
    last_duration_ms: NonZeroU64,
    states: UniverseStates,
}

impl Accumulator {
    /// Create an accumulator expecting exactly `universe_count` universes.
    ///
    /// `last_duration_ms` replaces the duration of a record cut off by end-of-input.
    pub fn new(universe_count: NonZeroUsize, last_duration_ms: NonZeroU64) -> Self {
        Self {
            universe_count,
            last_duration_ms,
            states: UniverseStates::new(),
        }
    }

    /// Current snapshot, ordered by universe id.
    pub fn states(&self) -> &UniverseStates {
        &self.states
    }

    /// Merge one record and report whether a frame should be emitted.
    pub fn apply(&mut self, record: &UpdateRecord) -> ConvertResult<Option<Emit>> {
        self.states.insert(record.universe, record.channels);
        if self.states.len() > self.universe_count.get() {
            return Err(ConvertError::cardinality(format!(
                "too many universes in showfile (universe {} exceeds the configured {})",
                record.universe, self.universe_count
            )));
        }

        let duration_ms = match record.control {
            FrameControl::Hold => return Ok(None),
            FrameControl::Display(ms) => ms,
            FrameControl::EndOfStream => self.last_duration_ms.get(),
        };

        if self.states.len() != self.universe_count.get() {
            return Err(ConvertError::cardinality(format!(
                "universe state(s) undefined at encode ({} of {} known)",
                self.states.len(),
                self.universe_count
            )));
        }

        Ok(Some(Emit { duration_ms }))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/state/accumulator.rs"]
mod tests;
