use crate::foundation::core::{CHANNELS_PER_UNIVERSE, ROW_WIDTH, UniverseData, UniverseStates};
use crate::foundation::error::{ConvertError, ConvertResult};

/// Write one universe row: 2-byte little-endian id followed by the channel data.
///
/// Only the low 16 bits of `universe` are stored. `dst` must hold at least [`ROW_WIDTH`] bytes;
/// nothing past that is touched.
pub fn write_row(dst: &mut [u8], universe: u32, data: &UniverseData) {
    dst[0] = (universe & 0xff) as u8;
    dst[1] = ((universe >> 8) & 0xff) as u8;
    dst[2..ROW_WIDTH].copy_from_slice(data);
}

/// Write every universe, in ascending id order, one row per `stride` bytes.
pub fn write_rows(buf: &mut [u8], stride: usize, states: &UniverseStates) -> ConvertResult<()> {
    if stride < ROW_WIDTH {
        return Err(ConvertError::resource(format!(
            "row stride {stride} is smaller than the {ROW_WIDTH}-byte universe row"
        )));
    }
    let needed = stride * states.len().saturating_sub(1) + ROW_WIDTH;
    if !states.is_empty() && buf.len() < needed {
        return Err(ConvertError::resource(format!(
            "frame buffer holds {} bytes, {} universes need {needed}",
            buf.len(),
            states.len()
        )));
    }

    for (row, (universe, data)) in buf.chunks_mut(stride).zip(states) {
        write_row(row, *universe, data);
    }
    Ok(())
}

/// Decode one row back into its universe id and channel data.
pub fn read_row(src: &[u8]) -> ConvertResult<(u16, UniverseData)> {
    if src.len() < ROW_WIDTH {
        return Err(ConvertError::validation(format!(
            "universe row needs {ROW_WIDTH} bytes, got {}",
            src.len()
        )));
    }
    let universe = u16::from_le_bytes([src[0], src[1]]);
    let mut data = [0u8; CHANNELS_PER_UNIVERSE];
    data.copy_from_slice(&src[2..ROW_WIDTH]);
    Ok((universe, data))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/layout.rs"]
mod tests;
