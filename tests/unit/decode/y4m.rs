use super::*;

fn stream(header: &str, frames: &[&[u8]]) -> Vec<u8> {
    let mut out = format!("{header}\n").into_bytes();
    for f in frames {
        out.extend_from_slice(b"FRAME\n");
        out.extend_from_slice(f);
    }
    out
}

#[test]
fn gray_frames_get_rate_derived_timestamps() {
    let a = [1u8; 6];
    let b = [2u8; 6];
    let bytes = stream("YUV4MPEG2 W3 H2 F30:1 Ip A1:1 Cmono", &[&a, &b]);
    let frames: Vec<DecodedFrame> = Y4mReader::new(bytes.as_slice())
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(frames.len(), 2);
    assert_eq!((frames[0].pts_ms, frames[0].duration_ms), (0, Some(33)));
    assert_eq!((frames[1].pts_ms, frames[1].duration_ms), (33, Some(34)));
    assert_eq!(frames[1].pixels, b.to_vec());
    assert_eq!((frames[0].width, frames[0].height), (3, 2));
}

#[test]
fn non_gray_streams_are_rejected() {
    let err = Y4mReader::new(stream("YUV4MPEG2 W4 H2 F25:1 C420jpeg", &[]).as_slice())
        .err()
        .unwrap();
    assert!(err.to_string().contains("not 8-bit gray"));
    assert!(Y4mReader::new(stream("YUV4MPEG2 W4 H2 F25:1", &[]).as_slice()).is_err());
}

#[test]
fn header_needs_size_and_rate() {
    assert!(Y4mReader::new(stream("YUV4MPEG2 H2 F25:1 Cmono", &[]).as_slice()).is_err());
    assert!(Y4mReader::new(stream("YUV4MPEG2 W4 H2 F0:1 Cmono", &[]).as_slice()).is_err());
    assert!(Y4mReader::new(&b"YUV4MPEG2 W4 H2 F25:1 Cmono"[..]).is_err());
}

#[test]
fn truncated_frame_is_a_decode_error() {
    let bytes = stream("YUV4MPEG2 W3 H2 F25:1 Cmono", &[&[0u8; 4]]);
    let mut reader = Y4mReader::new(bytes.as_slice()).unwrap();
    assert!(matches!(reader.next(), Some(Err(ConvertError::Decode(ref m))) if m.contains("truncated")));
    assert!(reader.next().is_none());
}

#[test]
fn frame_marker_may_carry_parameters() {
    let mut bytes = b"YUV4MPEG2 W1 H1 F1000:1 Cmono\nFRAME Ixyz\n".to_vec();
    bytes.push(42);
    let frame = Y4mReader::new(bytes.as_slice()).unwrap().next().unwrap().unwrap();
    assert_eq!((frame.pixels[0], frame.duration_ms), (42, Some(1)));
}
