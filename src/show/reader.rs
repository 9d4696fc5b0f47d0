use std::io::BufRead;

use crate::foundation::core::{CHANNELS_PER_UNIVERSE, SHOW_HEADER, UniverseData, UpdateRecord};
use crate::foundation::error::{ConvertError, ConvertResult};

/// Record being assembled from the lines read so far.
///
/// A data line moves the reader into `Data`; a duration line closes the record. A second data
/// line while in `Data` replaces the held update, so well-formed files alternate strictly between
/// one data line and one duration line.
#[derive(Debug)]
enum Pending {
    Empty,
    Data { universe: u32, channels: UniverseData },
}

/// One classified, non-skipped show-file line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShowLine {
    Duration(u64),
    Universe { universe: u32, channels: UniverseData },
}

/// Lazy reader turning an OLA show file into [`UpdateRecord`]s.
///
/// The sequence is finite and not restartable. After end-of-input or the first error, `next`
/// keeps returning `None`.
pub struct ShowReader<R> {
    input: R,
    buf: Vec<u8>,
    line_no: u64,
    overwritten: u64,
    done: bool,
}

impl<R: BufRead> ShowReader<R> {
    /// Wrap a buffered show-file stream.
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::new(),
            line_no: 0,
            overwritten: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    /// Universe updates replaced by a following data line before any duration line was read.
    pub fn overwritten_updates(&self) -> u64 {
        self.overwritten
    }

    fn read_record(&mut self) -> ConvertResult<Option<UpdateRecord>> {
        let mut pending = Pending::Empty;

        loop {
            self.buf.clear();
            if self.input.read_until(b'\n', &mut self.buf)? == 0 {
                self.done = true;
                return Ok(match pending {
                    Pending::Empty => None,
                    Pending::Data { universe, channels } => {
                        Some(UpdateRecord::at_end_of_stream(universe, channels))
                    }
                });
            }
            self.line_no += 1;
            let line_no = self.line_no;

            let raw = std::str::from_utf8(&self.buf)
                .map_err(|_| ConvertError::parse(line_no, "line is not valid text"))?;
            match parse_line(raw, line_no)? {
                None => continue,
                Some(ShowLine::Duration(ms)) => {
                    let Pending::Data { universe, channels } = pending else {
                        return Err(ConvertError::parse(line_no, "no frame before frame time"));
                    };
                    return Ok(Some(UpdateRecord::closed_by_duration(universe, channels, ms)));
                }
                Some(ShowLine::Universe { universe, channels }) => {
                    if let Pending::Data { universe: dropped, .. } = pending {
                        self.overwritten += 1;
                        tracing::warn!(
                            line = line_no,
                            dropped,
                            universe,
                            "universe update replaced before any duration line"
                        );
                    }
                    pending = Pending::Data { universe, channels };
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for ShowReader<R> {
    type Item = ConvertResult<UpdateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(rec) => rec.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for ShowReader<R> {}

/// Classify one raw line. Header and blank lines yield `None`.
pub(crate) fn parse_line(raw: &str, line_no: u64) -> ConvertResult<Option<ShowLine>> {
    let line = trim(raw);
    if line.is_empty() || line == SHOW_HEADER {
        return Ok(None);
    }

    let (head, chans) = split_segments(line);
    let value = parse_number(head)
        .ok_or_else(|| ConvertError::parse(line_no, "bad frame duration / universe number"))?;

    if chans.is_empty() {
        return Ok(Some(ShowLine::Duration(value)));
    }

    let universe = u32::try_from(value)
        .map_err(|_| ConvertError::parse(line_no, "universe number out of range"))?;
    let channels = parse_channels(chans).map_err(|msg| ConvertError::parse(line_no, msg))?;
    Ok(Some(ShowLine::Universe { universe, channels }))
}

/// Parse a comma-separated channel list into a zero-filled universe.
pub(crate) fn parse_channels(s: &str) -> Result<UniverseData, &'static str> {
    let mut data = [0u8; CHANNELS_PER_UNIVERSE];
    let s = s.strip_suffix(',').unwrap_or(s);

    for (idx, tok) in s.split(',').enumerate() {
        if tok.is_empty() || tok.len() > 3 || !tok.bytes().all(|b| b.is_ascii_digit()) {
            return Err("channel undefined / has wrong format");
        }
        let v = tok
            .bytes()
            .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
        let v = u8::try_from(v).map_err(|_| "channel value overflow")?;
        let slot = data.get_mut(idx).ok_or("too many channels for one universe")?;
        *slot = v;
    }

    Ok(data)
}

fn trim(s: &str) -> &str {
    // C-locale whitespace, including vertical tab.
    s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'))
}

/// Split at the first space; the second segment starts after the run of spaces.
fn split_segments(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((head, rest)) => (head, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}

fn parse_number(tok: &str) -> Option<u64> {
    if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tok.parse().ok()
}

#[cfg(test)]
#[path = "../../tests/unit/show/reader.rs"]
mod tests;
