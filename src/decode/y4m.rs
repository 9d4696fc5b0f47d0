use std::io::{BufRead, ErrorKind};

use crate::decode::source::DecodedFrame;
use crate::foundation::error::{ConvertError, ConvertResult};

/// Stream signature of a YUV4MPEG2 file.
pub const Y4M_MAGIC: &[u8] = b"YUV4MPEG2";

/// Lazy frame reader over a `Cmono` YUV4MPEG2 stream.
///
/// Timestamps derive from the constant `F` rate, rounded to whole milliseconds.
pub struct Y4mReader<R> {
    input: R,
    width: u32,
    height: u32,
    frame_len: usize,
    rate_num: u64,
    rate_den: u64,
    index: u64,
    line: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Y4mReader<R> {
    /// Parse the stream header.
    pub fn new(mut input: R) -> ConvertResult<Self> {
        let mut line = Vec::new();
        input.read_until(b'\n', &mut line)?;
        let header = line
            .strip_suffix(b"\n")
            .ok_or_else(|| ConvertError::decode("unterminated YUV4MPEG2 header"))?;
        let header = std::str::from_utf8(header)
            .map_err(|_| ConvertError::decode("YUV4MPEG2 header is not text"))?;

        let mut tokens = header.split(' ');
        if tokens.next().map(str::as_bytes) != Some(Y4M_MAGIC) {
            return Err(ConvertError::decode("missing YUV4MPEG2 signature"));
        }
        let mut width = None;
        let mut height = None;
        let mut rate = None;
        // Absent C means 4:2:0.
        let mut colour = "420jpeg";
        for tok in tokens {
            let Some(tag) = tok.chars().next() else {
                continue;
            };
            let value = &tok[tag.len_utf8()..];
            match tag {
                'W' => width = value.parse::<u32>().ok().filter(|&w| w > 0),
                'H' => height = value.parse::<u32>().ok().filter(|&h| h > 0),
                'F' => {
                    rate = value
                        .split_once(':')
                        .and_then(|(n, d)| Some((n.parse::<u64>().ok()?, d.parse::<u64>().ok()?)))
                        .filter(|&(n, d)| n > 0 && d > 0);
                }
                'C' => colour = value,
                _ => {}
            }
        }

        if colour != "mono" {
            return Err(ConvertError::decode(format!(
                "YUV4MPEG2 colour space C{colour} is not 8-bit gray; decode with -pix_fmt gray"
            )));
        }
        let (width, height) = width
            .zip(height)
            .ok_or_else(|| ConvertError::decode("YUV4MPEG2 header lacks a valid W or H"))?;
        let (rate_num, rate_den) =
            rate.ok_or_else(|| ConvertError::decode("YUV4MPEG2 header lacks a valid F rate"))?;
        let frame_len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| ConvertError::decode("YUV4MPEG2 frame size overflows"))?;

        Ok(Self {
            input,
            width,
            height,
            frame_len,
            rate_num,
            rate_den,
            index: 0,
            line: Vec::new(),
            done: false,
        })
    }

    fn pts_ms(&self, index: u64) -> u64 {
        let num = u128::from(self.rate_num);
        let ms = (u128::from(index) * 1000 * u128::from(self.rate_den) + num / 2) / num;
        u64::try_from(ms).unwrap_or(u64::MAX)
    }

    fn read_frame(&mut self) -> ConvertResult<Option<DecodedFrame>> {
        self.line.clear();
        if self.input.read_until(b'\n', &mut self.line)? == 0 {
            return Ok(None);
        }
        if !self.line.starts_with(b"FRAME") || self.line.last() != Some(&b'\n') {
            return Err(ConvertError::decode(format!(
                "expected FRAME marker before frame {}",
                self.index
            )));
        }

        let mut pixels = vec![0u8; self.frame_len];
        self.input.read_exact(&mut pixels).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                ConvertError::decode(format!("truncated frame {}", self.index))
            } else {
                e.into()
            }
        })?;

        let pts_ms = self.pts_ms(self.index);
        let next = self.pts_ms(self.index + 1);
        self.index += 1;
        Ok(Some(DecodedFrame {
            width: self.width,
            height: self.height,
            pts_ms,
            duration_ms: Some(next - pts_ms),
            pixels,
        }))
    }
}

impl<R: BufRead> Iterator for Y4mReader<R> {
    type Item = ConvertResult<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for Y4mReader<R> {}

#[cfg(test)]
#[path = "../../tests/unit/decode/y4m.rs"]
mod tests;
