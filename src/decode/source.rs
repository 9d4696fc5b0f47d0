use std::io::BufRead;

use crate::decode::matroska::MatroskaReader;
use crate::decode::y4m::{Y4M_MAGIC, Y4mReader};
use crate::encode::matroska::EBML;
use crate::foundation::error::{ConvertError, ConvertResult};

/// One frame read back from a video, rows packed to `width` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Row width in bytes.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
    /// Display duration in milliseconds, when the container stores one.
    pub duration_ms: Option<u64>,
    /// `width * height` gray8 pixels.
    pub pixels: Vec<u8>,
}

/// A frame stream of either supported container, picked from the first bytes of input.
pub enum FrameSource<R> {
    /// Matroska with an uncompressed gray track.
    Matroska(MatroskaReader<R>),
    /// YUV4MPEG2 with `Cmono` frames.
    Y4m(Y4mReader<R>),
}

impl<R: BufRead> FrameSource<R> {
    /// Sniff the container and read its stream header.
    pub fn open(mut input: R) -> ConvertResult<Self> {
        let (is_matroska, is_y4m) = {
            let head = input.fill_buf()?;
            (head.starts_with(&EBML.to_be_bytes()), head.starts_with(Y4M_MAGIC))
        };
        if is_matroska {
            Ok(Self::Matroska(MatroskaReader::new(input)?))
        } else if is_y4m {
            Ok(Self::Y4m(Y4mReader::new(input)?))
        } else {
            Err(ConvertError::decode(
                "input is neither Matroska nor YUV4MPEG2",
            ))
        }
    }

    /// Segment duration in milliseconds, once the container has declared it.
    pub fn segment_duration_ms(&self) -> Option<u64> {
        match self {
            Self::Matroska(r) => r.segment_duration_ms(),
            Self::Y4m(_) => None,
        }
    }
}

impl<R: BufRead> Iterator for FrameSource<R> {
    type Item = ConvertResult<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Matroska(r) => r.next(),
            Self::Y4m(r) => r.next(),
        }
    }
}
