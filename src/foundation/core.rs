use std::collections::BTreeMap;

/// Number of DMX channels carried by one universe.
pub const CHANNELS_PER_UNIVERSE: usize = 512;

/// Logical bytes per pixel row: 2-byte little-endian universe id, then the channels.
pub const ROW_WIDTH: usize = 2 + CHANNELS_PER_UNIVERSE;

/// Show-file header line. Skipped wherever it appears.
pub const SHOW_HEADER: &str = "OLA Show";

/// Channel values of one universe, starting from channel zero.
pub type UniverseData = [u8; CHANNELS_PER_UNIVERSE];

/// Latest known channel data per universe, ordered by ascending universe id.
///
/// Iteration order is row order in the emitted frame.
pub type UniverseStates = BTreeMap<u32, UniverseData>;

/// What the duration marker following a universe update asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum FrameControl {
    /// State changed, more updates follow for the same instant.
    Hold,
    /// Display the accumulated state for this many milliseconds.
    Display(u64),
    /// The stream ended with a snapshot in progress.
    EndOfStream,
}

impl FrameControl {
    /// Decode the raw `int64` control value (`-1`, `0` or a positive duration).
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -1 => Some(Self::EndOfStream),
            0 => Some(Self::Hold),
            ms if ms > 0 => Some(Self::Display(ms as u64)),
            _ => None,
        }
    }

    /// Encode back to the raw control value. Durations past `i64::MAX` saturate.
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Hold => 0,
            Self::Display(ms) => i64::try_from(ms).unwrap_or(i64::MAX),
            Self::EndOfStream => -1,
        }
    }

    fn from_duration(ms: u64) -> Self {
        if ms == 0 { Self::Hold } else { Self::Display(ms) }
    }
}

/// One universe update plus the duration marker that closed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Duration marker.
    pub control: FrameControl,
    /// Universe the channel data belongs to.
    pub universe: u32,
    /// Full channel array; channels not present in the line are zero.
    pub channels: UniverseData,
}

impl UpdateRecord {
    pub(crate) fn closed_by_duration(universe: u32, channels: UniverseData, ms: u64) -> Self {
        Self {
            control: FrameControl::from_duration(ms),
            universe,
            channels,
        }
    }

    pub(crate) fn at_end_of_stream(universe: u32, channels: UniverseData) -> Self {
        Self {
            control: FrameControl::EndOfStream,
            universe,
            channels,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
