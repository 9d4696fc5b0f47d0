//! Pull reader for uncompressed gray Matroska video.
//!
//! Reads what [`MatroskaWriter`](crate::encode::matroska::MatroskaWriter) produces, plus the
//! usual variations of a remux: SimpleBlocks, sized Segments, SeekHead/Cues/Tags. Laced blocks
//! and unknown-size Clusters are rejected.

use std::collections::VecDeque;
use std::io::{self, Read};

use crate::decode::source::DecodedFrame;
use crate::encode::matroska::{
    BLOCK, BLOCK_DURATION, BLOCK_GROUP, CLUSTER, CLUSTER_TIMESTAMP, CODEC_ID, CODEC_UNCOMPRESSED,
    COLOUR_SPACE, DURATION, EBML, GRAY8_FOURCC, INFO, PIXEL_HEIGHT, PIXEL_WIDTH, SEGMENT,
    SIMPLE_BLOCK, TIMESTAMP_SCALE, TRACK_ENTRY, TRACK_NUMBER, TRACK_TYPE, TRACKS, VIDEO,
};
use crate::foundation::error::{ConvertError, ConvertResult};

const DOC_TYPE: u32 = 0x4282;
const DEFAULT_SCALE_NS: u64 = 1_000_000;
const TRACK_TYPE_VIDEO: u64 = 1;

#[derive(Clone, Copy, Debug)]
struct VideoTrack {
    number: u64,
    width: u32,
    height: u32,
}

#[derive(Debug)]
struct Header {
    id: u32,
    size: Option<u64>,
}

/// Lazy frame reader over a Matroska stream.
///
/// Frames come out in storage order. After end-of-input or the first error, `next` keeps
/// returning `None`.
pub struct MatroskaReader<R> {
    input: R,
    scale_ns: u64,
    duration_ticks: Option<f64>,
    track: Option<VideoTrack>,
    queue: VecDeque<DecodedFrame>,
    done: bool,
}

impl<R: Read> MatroskaReader<R> {
    /// Check the EBML header and enter the first Segment.
    pub fn new(mut input: R) -> ConvertResult<Self> {
        let header = read_header(&mut input)?
            .ok_or_else(|| ConvertError::decode("empty matroska input"))?;
        if header.id != EBML {
            return Err(ConvertError::decode("missing EBML header"));
        }
        let size = header
            .size
            .ok_or_else(|| ConvertError::decode("EBML header has unknown size"))?;
        let ebml = read_payload(&mut input, size, "EBML header")?;
        let doc_type = children(&ebml)?
            .into_iter()
            .find_map(|(id, payload)| (id == DOC_TYPE).then_some(payload));
        if !matches!(doc_type, Some(b"matroska" | b"webm")) {
            return Err(ConvertError::decode("EBML document is not matroska"));
        }

        let segment = read_header(&mut input)?
            .ok_or_else(|| ConvertError::decode("matroska input has no Segment"))?;
        if segment.id != SEGMENT {
            return Err(ConvertError::decode(format!(
                "expected Segment, found element {:#x}",
                segment.id
            )));
        }

        Ok(Self {
            input,
            scale_ns: DEFAULT_SCALE_NS,
            duration_ticks: None,
            track: None,
            queue: VecDeque::new(),
            done: false,
        })
    }

    /// Segment duration from Info, in milliseconds, once Info has been read.
    pub fn segment_duration_ms(&self) -> Option<u64> {
        let ms = self.duration_ticks? * self.scale_ns as f64 / 1e6;
        (ms.is_finite() && ms >= 0.0).then(|| ms.round() as u64)
    }

    /// Read top-level elements until a frame is queued or the input ends.
    fn fill(&mut self) -> ConvertResult<()> {
        while self.queue.is_empty() {
            let Some(header) = read_header(&mut self.input)? else {
                self.done = true;
                return Ok(());
            };
            match (header.id, header.size) {
                (CLUSTER, Some(size)) => {
                    let payload = read_payload(&mut self.input, size, "Cluster")?;
                    self.read_cluster(&payload)?;
                }
                (INFO, Some(size)) => {
                    let payload = read_payload(&mut self.input, size, "Info")?;
                    self.read_info(&payload)?;
                }
                (TRACKS, Some(size)) => {
                    let payload = read_payload(&mut self.input, size, "Tracks")?;
                    self.read_tracks(&payload)?;
                }
                (_, Some(size)) => skip(&mut self.input, size)?,
                (CLUSTER, None) => {
                    return Err(ConvertError::decode("unknown-size Cluster is not supported"));
                }
                (id, None) => {
                    return Err(ConvertError::decode(format!(
                        "top-level element {id:#x} has unknown size"
                    )));
                }
            }
        }
        Ok(())
    }

    fn read_info(&mut self, payload: &[u8]) -> ConvertResult<()> {
        for (id, p) in children(payload)? {
            match id {
                TIMESTAMP_SCALE => {
                    self.scale_ns = parse_uint(p)?;
                    if self.scale_ns == 0 {
                        return Err(ConvertError::decode("TimestampScale is zero"));
                    }
                }
                DURATION => self.duration_ticks = Some(parse_float(p)?),
                _ => {}
            }
        }
        Ok(())
    }

    fn read_tracks(&mut self, payload: &[u8]) -> ConvertResult<()> {
        for (id, entry) in children(payload)? {
            if id != TRACK_ENTRY {
                continue;
            }
            let mut number = None;
            let mut kind = None;
            let mut codec: Option<&[u8]> = None;
            let mut width = None;
            let mut height = None;
            let mut colour: Option<&[u8]> = None;
            for (id, p) in children(entry)? {
                match id {
                    TRACK_NUMBER => number = Some(parse_uint(p)?),
                    TRACK_TYPE => kind = Some(parse_uint(p)?),
                    CODEC_ID => codec = Some(p),
                    VIDEO => {
                        for (id, p) in children(p)? {
                            match id {
                                PIXEL_WIDTH => width = Some(parse_uint(p)?),
                                PIXEL_HEIGHT => height = Some(parse_uint(p)?),
                                COLOUR_SPACE => colour = Some(p),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
            if kind != Some(TRACK_TYPE_VIDEO) {
                continue;
            }

            let codec = codec.unwrap_or_default();
            if codec != CODEC_UNCOMPRESSED.as_bytes() {
                return Err(ConvertError::decode(format!(
                    "unsupported video codec '{}'; decode it to gray YUV4MPEG2 first",
                    String::from_utf8_lossy(codec)
                )));
            }
            if let Some(c) = colour
                && c != &GRAY8_FOURCC[..]
            {
                return Err(ConvertError::decode(format!(
                    "uncompressed track colour space '{}' is not 8-bit gray",
                    String::from_utf8_lossy(c)
                )));
            }
            let dim = |v: Option<u64>, what: &str| {
                v.and_then(|v| u32::try_from(v).ok())
                    .filter(|&v| v > 0)
                    .ok_or_else(|| ConvertError::decode(format!("video track lacks a valid {what}")))
            };
            self.track = Some(VideoTrack {
                number: number
                    .ok_or_else(|| ConvertError::decode("video track has no TrackNumber"))?,
                width: dim(width, "PixelWidth")?,
                height: dim(height, "PixelHeight")?,
            });
            return Ok(());
        }
        Err(ConvertError::decode("matroska input has no video track"))
    }

    fn read_cluster(&mut self, payload: &[u8]) -> ConvertResult<()> {
        let track = self
            .track
            .ok_or_else(|| ConvertError::decode("Cluster before Tracks"))?;
        let mut cluster_ts = None;

        for (id, p) in children(payload)? {
            match id {
                CLUSTER_TIMESTAMP => cluster_ts = Some(parse_uint(p)?),
                SIMPLE_BLOCK => self.push_block(track, cluster_ts, p, None)?,
                BLOCK_GROUP => {
                    let mut block = None;
                    let mut duration = None;
                    for (id, p) in children(p)? {
                        match id {
                            BLOCK => block = Some(p),
                            BLOCK_DURATION => duration = Some(parse_uint(p)?),
                            _ => {}
                        }
                    }
                    let block =
                        block.ok_or_else(|| ConvertError::decode("BlockGroup without Block"))?;
                    self.push_block(track, cluster_ts, block, duration)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn push_block(
        &mut self,
        track: VideoTrack,
        cluster_ts: Option<u64>,
        block: &[u8],
        duration_ticks: Option<u64>,
    ) -> ConvertResult<()> {
        let cluster_ts = cluster_ts
            .ok_or_else(|| ConvertError::decode("block before its Cluster timestamp"))?;
        let (track_no, n) = parse_size(block)?;
        let rest = &block[n..];
        if rest.len() < 3 {
            return Err(truncated());
        }
        if rest[2] & 0x06 != 0 {
            return Err(ConvertError::decode("laced blocks are not supported"));
        }
        if track_no != Some(track.number) {
            return Ok(());
        }

        let pixels = &rest[3..];
        let expected = track.width as usize * track.height as usize;
        if pixels.len() != expected {
            return Err(ConvertError::decode(format!(
                "frame holds {} bytes, track geometry needs {expected}",
                pixels.len()
            )));
        }

        let rel = i16::from_be_bytes([rest[0], rest[1]]);
        let ticks = u64::try_from(i128::from(cluster_ts) + i128::from(rel))
            .map_err(|_| ConvertError::decode("negative block timestamp"))?;
        let pts_ms = self.ticks_to_ms(ticks)?;
        let duration_ms = duration_ticks.map(|d| self.ticks_to_ms(d)).transpose()?;

        self.queue.push_back(DecodedFrame {
            width: track.width,
            height: track.height,
            pts_ms,
            duration_ms,
            pixels: pixels.to_vec(),
        });
        Ok(())
    }

    fn ticks_to_ms(&self, ticks: u64) -> ConvertResult<u64> {
        let ms = u128::from(ticks) * u128::from(self.scale_ns) / 1_000_000;
        u64::try_from(ms).map_err(|_| ConvertError::decode("timestamp out of range"))
    }
}

impl<R: Read> Iterator for MatroskaReader<R> {
    type Item = ConvertResult<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.queue.is_empty()
            && !self.done
            && let Err(e) = self.fill()
        {
            self.done = true;
            self.queue.clear();
            return Some(Err(e));
        }
        self.queue.pop_front().map(Ok)
    }
}

impl<R: Read> std::iter::FusedIterator for MatroskaReader<R> {}

fn truncated() -> ConvertError {
    ConvertError::decode("truncated matroska element")
}

/// Split a master element payload into `(id, payload)` children.
fn children(mut buf: &[u8]) -> ConvertResult<Vec<(u32, &[u8])>> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        let (id, id_len) = parse_id(buf)?;
        let (size, size_len) = parse_size(&buf[id_len..])?;
        let size = size.ok_or_else(|| {
            ConvertError::decode(format!("element {id:#x} has unknown size inside a sized parent"))
        })?;
        let start = id_len + size_len;
        let end = usize::try_from(size)
            .ok()
            .and_then(|s| start.checked_add(s))
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| ConvertError::decode(format!("element {id:#x} overruns its parent")))?;
        out.push((id, &buf[start..end]));
        buf = &buf[end..];
    }
    Ok(out)
}

/// Element id with its marker bits kept, plus its encoded length.
fn parse_id(buf: &[u8]) -> ConvertResult<(u32, usize)> {
    let first = *buf.first().ok_or_else(truncated)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 4 {
        return Err(ConvertError::decode("invalid element id"));
    }
    let bytes = buf.get(..len).ok_or_else(truncated)?;
    Ok((bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)), len))
}

/// Data size (or track number) vint with the marker stripped. All-ones means unknown.
fn parse_size(buf: &[u8]) -> ConvertResult<(Option<u64>, usize)> {
    let first = *buf.first().ok_or_else(truncated)?;
    if first == 0 {
        return Err(ConvertError::decode("invalid element size"));
    }
    let len = first.leading_zeros() as usize + 1;
    let bytes = buf.get(..len).ok_or_else(truncated)?;
    let mut v = u64::from(first) & (0xFF >> len);
    for &b in &bytes[1..] {
        v = (v << 8) | u64::from(b);
    }
    let unknown = (1u64 << (7 * len)) - 1;
    Ok(((v != unknown).then_some(v), len))
}

fn parse_uint(p: &[u8]) -> ConvertResult<u64> {
    if p.len() > 8 {
        return Err(ConvertError::decode("unsigned integer element longer than 8 bytes"));
    }
    Ok(p.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

fn parse_float(p: &[u8]) -> ConvertResult<f64> {
    match p.len() {
        0 => Ok(0.0),
        4 => Ok(f64::from(f32::from_be_bytes([p[0], p[1], p[2], p[3]]))),
        8 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(p);
            Ok(f64::from_be_bytes(b))
        }
        n => Err(ConvertError::decode(format!("float element of {n} bytes"))),
    }
}

fn read_header<R: Read>(input: &mut R) -> ConvertResult<Option<Header>> {
    let mut raw = [0u8; 12];
    if !read_first(input, &mut raw[0])? {
        return Ok(None);
    }
    let id_len = raw[0].leading_zeros() as usize + 1;
    if id_len > 4 {
        return Err(ConvertError::decode("invalid element id"));
    }
    read_exact(input, &mut raw[1..=id_len])?;
    let size_len = raw[id_len].leading_zeros() as usize + 1;
    if size_len > 8 {
        return Err(ConvertError::decode("invalid element size"));
    }
    read_exact(input, &mut raw[id_len + 1..id_len + size_len])?;

    let (id, _) = parse_id(&raw[..id_len])?;
    let (size, _) = parse_size(&raw[id_len..id_len + size_len])?;
    Ok(Some(Header { id, size }))
}

/// Read one byte; `false` on clean end-of-input.
fn read_first<R: Read>(input: &mut R, byte: &mut u8) -> ConvertResult<bool> {
    loop {
        match input.read(std::slice::from_mut(byte)) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_exact<R: Read>(input: &mut R, buf: &mut [u8]) -> ConvertResult<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            truncated()
        } else {
            e.into()
        }
    })
}

fn read_payload<R: Read>(input: &mut R, size: u64, what: &str) -> ConvertResult<Vec<u8>> {
    let mut payload = Vec::new();
    input.by_ref().take(size).read_to_end(&mut payload)?;
    if (payload.len() as u64) < size {
        return Err(ConvertError::decode(format!("truncated {what}")));
    }
    Ok(payload)
}

fn skip<R: Read>(input: &mut R, size: u64) -> ConvertResult<()> {
    let skipped = io::copy(&mut input.by_ref().take(size), &mut io::sink())?;
    if skipped < size {
        return Err(truncated());
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/decode/matroska.rs"]
mod tests;
