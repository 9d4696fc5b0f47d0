//! Minimal streaming Matroska writer for 8-bit gray `V_UNCOMPRESSED` video.
//!
//! Layout: EBML header, one Segment of unknown size, Info (1 ms timestamp scale), one video
//! track, then one Cluster per frame holding a single BlockGroup with the frame's duration.
//! Unknown-size segments keep the output streamable into a pipe.

use std::io::{self, Write};

use crate::encode::backend::{FrameGeometry, FrameRef};

pub(crate) const EBML: u32 = 0x1A45_DFA3;
pub(crate) const SEGMENT: u32 = 0x1853_8067;
pub(crate) const INFO: u32 = 0x1549_A966;
pub(crate) const TIMESTAMP_SCALE: u32 = 0x2A_D7B1;
pub(crate) const DURATION: u32 = 0x4489;
pub(crate) const TRACKS: u32 = 0x1654_AE6B;
pub(crate) const TRACK_ENTRY: u32 = 0xAE;
pub(crate) const CODEC_ID: u32 = 0x86;
pub(crate) const VIDEO: u32 = 0xE0;
pub(crate) const PIXEL_WIDTH: u32 = 0xB0;
pub(crate) const PIXEL_HEIGHT: u32 = 0xBA;
pub(crate) const COLOUR_SPACE: u32 = 0x2E_B524;
pub(crate) const CLUSTER: u32 = 0x1F43_B675;
pub(crate) const CLUSTER_TIMESTAMP: u32 = 0xE7;
pub(crate) const BLOCK_GROUP: u32 = 0xA0;
pub(crate) const BLOCK: u32 = 0xA1;
pub(crate) const BLOCK_DURATION: u32 = 0x9B;
pub(crate) const SIMPLE_BLOCK: u32 = 0xA3;

pub(crate) const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
pub(crate) const TRACK_TYPE: u32 = 0x83;
const FLAG_LACING: u32 = 0x9C;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;

/// "Unknown size" marker for a Segment written to a stream.
const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Matroska codec id for uncompressed video.
pub const CODEC_UNCOMPRESSED: &str = "V_UNCOMPRESSED";

/// FourCC selecting 8-bit gray for uncompressed tracks.
pub const GRAY8_FOURCC: &[u8; 4] = b"Y800";

/// Streams frames into a Matroska container.
pub struct MatroskaWriter<W: Write> {
    out: W,
    geometry: FrameGeometry,
    written: u64,
    duration_offset: u64,
    last_pts: Option<u64>,
    head: Vec<u8>,
}

impl<W: Write> MatroskaWriter<W> {
    /// Write the container header for `geometry` and return the writer.
    pub fn new(mut out: W, geometry: FrameGeometry) -> io::Result<Self> {
        let mut head = Vec::with_capacity(256);

        let mut ebml = Vec::new();
        put_uint(&mut ebml, 0x4286, 1); // EBMLVersion
        put_uint(&mut ebml, 0x42F7, 1); // EBMLReadVersion
        put_uint(&mut ebml, 0x42F2, 4); // EBMLMaxIDLength
        put_uint(&mut ebml, 0x42F3, 8); // EBMLMaxSizeLength
        put_str(&mut ebml, 0x4282, "matroska"); // DocType
        put_uint(&mut ebml, 0x4287, 4); // DocTypeVersion
        put_uint(&mut ebml, 0x4285, 2); // DocTypeReadVersion
        put_master(&mut head, EBML, &ebml);

        put_id(&mut head, SEGMENT);
        head.extend_from_slice(&UNKNOWN_SIZE);

        let app = concat!("ola-video ", env!("CARGO_PKG_VERSION"));
        let mut info = Vec::new();
        put_uint(&mut info, TIMESTAMP_SCALE, 1_000_000);
        put_str(&mut info, MUXING_APP, app);
        put_str(&mut info, WRITING_APP, app);
        let duration_in_info = info.len() as u64;
        put_float(&mut info, DURATION, 0.0);
        // Duration payload follows its 2-byte id and 1-byte size.
        let duration_offset = head.len() as u64
            + id_len(INFO)
            + size_len(info.len() as u64)
            + duration_in_info
            + 3;
        put_master(&mut head, INFO, &info);

        let mut video = Vec::new();
        put_uint(&mut video, PIXEL_WIDTH, u64::from(geometry.width));
        put_uint(&mut video, PIXEL_HEIGHT, u64::from(geometry.height));
        put_bytes(&mut video, COLOUR_SPACE, GRAY8_FOURCC);

        let mut entry = Vec::new();
        put_uint(&mut entry, TRACK_NUMBER, 1);
        put_uint(&mut entry, TRACK_UID, 1);
        put_uint(&mut entry, TRACK_TYPE, 1);
        put_uint(&mut entry, FLAG_LACING, 0);
        put_str(&mut entry, CODEC_ID, CODEC_UNCOMPRESSED);
        put_master(&mut entry, VIDEO, &video);

        let mut tracks = Vec::new();
        put_master(&mut tracks, TRACK_ENTRY, &entry);
        put_master(&mut head, TRACKS, &tracks);

        out.write_all(&head)?;
        Ok(Self {
            out,
            geometry,
            written: head.len() as u64,
            duration_offset,
            last_pts: None,
            head: Vec::with_capacity(64),
        })
    }

    /// Byte offset of the 8-byte big-endian `Duration` float inside the Info element.
    pub fn duration_offset(&self) -> u64 {
        self.duration_offset
    }

    /// Total bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append one frame as its own Cluster. Rows are packed to `geometry.width` bytes.
    pub fn write_frame(&mut self, frame: FrameRef<'_>) -> io::Result<()> {
        if let Some(last) = self.last_pts
            && frame.pts_ms <= last
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame timestamp {} does not follow {last}",
                    frame.pts_ms
                ),
            ));
        }

        let width = self.geometry.width as usize;
        let rows = self.geometry.height as usize;
        if rows == 0
            || frame.stride < width
            || frame.data.len() < frame.stride * (rows - 1) + width
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame buffer does not match the track geometry",
            ));
        }
        let payload_len = (width * rows) as u64;

        // Block: track number vint, 16-bit relative timestamp, flags, then the pixels.
        let block_len = 4 + payload_len;
        let mut block_duration = Vec::with_capacity(10);
        put_uint(&mut block_duration, BLOCK_DURATION, frame.duration_ms);
        let group_len =
            id_len(BLOCK) + size_len(block_len) + block_len + block_duration.len() as u64;

        let mut cluster_ts = Vec::with_capacity(10);
        put_uint(&mut cluster_ts, CLUSTER_TIMESTAMP, frame.pts_ms);
        let cluster_len =
            cluster_ts.len() as u64 + id_len(BLOCK_GROUP) + size_len(group_len) + group_len;

        self.head.clear();
        put_id(&mut self.head, CLUSTER);
        put_size(&mut self.head, cluster_len);
        self.head.extend_from_slice(&cluster_ts);
        put_id(&mut self.head, BLOCK_GROUP);
        put_size(&mut self.head, group_len);
        put_id(&mut self.head, BLOCK);
        put_size(&mut self.head, block_len);
        self.head.extend_from_slice(&[0x81, 0x00, 0x00, 0x00]);
        self.out.write_all(&self.head)?;

        if frame.stride == width {
            self.out.write_all(&frame.data[..width * rows])?;
        } else {
            for row in frame.data.chunks(frame.stride).take(rows) {
                self.out.write_all(&row[..width])?;
            }
        }
        self.out.write_all(&block_duration)?;

        self.written += self.head.len() as u64 + payload_len + block_duration.len() as u64;
        self.last_pts = Some(frame.pts_ms);
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Encoded length of an element id.
pub(crate) fn id_len(id: u32) -> u64 {
    match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Encoded length of a data size vint (the all-ones value of each width is reserved).
pub(crate) fn size_len(len: u64) -> u64 {
    (1..=8u64)
        .find(|n| len < (1u64 << (7 * n)) - 1)
        .unwrap_or(8)
}

pub(crate) fn put_id(buf: &mut Vec<u8>, id: u32) {
    let n = id_len(id) as usize;
    buf.extend_from_slice(&id.to_be_bytes()[4 - n..]);
}

pub(crate) fn put_size(buf: &mut Vec<u8>, len: u64) {
    let n = size_len(len) as usize;
    let marked = len | (1u64 << (7 * n));
    buf.extend_from_slice(&marked.to_be_bytes()[8 - n..]);
}

pub(crate) fn put_uint(buf: &mut Vec<u8>, id: u32, v: u64) {
    let bytes = v.to_be_bytes();
    let skip = (v.leading_zeros() / 8).min(7) as usize;
    put_bytes(buf, id, &bytes[skip..]);
}

pub(crate) fn put_float(buf: &mut Vec<u8>, id: u32, v: f64) {
    put_bytes(buf, id, &v.to_be_bytes());
}

pub(crate) fn put_str(buf: &mut Vec<u8>, id: u32, s: &str) {
    put_bytes(buf, id, s.as_bytes());
}

pub(crate) fn put_bytes(buf: &mut Vec<u8>, id: u32, payload: &[u8]) {
    put_id(buf, id);
    put_size(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

pub(crate) fn put_master(buf: &mut Vec<u8>, id: u32, children: &[u8]) {
    put_bytes(buf, id, children);
}

#[cfg(test)]
#[path = "../../tests/unit/encode/matroska.rs"]
mod tests;
