use super::*;
use crate::foundation::core::FrameControl;

fn read_all(src: &str) -> Vec<ConvertResult<UpdateRecord>> {
    ShowReader::new(src.as_bytes()).collect()
}

fn chans(prefix: &[u8]) -> UniverseData {
    let mut d = [0u8; CHANNELS_PER_UNIVERSE];
    d[..prefix.len()].copy_from_slice(prefix);
    d
}

#[test]
fn channel_tokens_respect_byte_range() {
    assert_eq!(parse_channels("255").unwrap()[0], 255);
    assert_eq!(parse_channels("001,02,3").unwrap(), chans(&[1, 2, 3]));
    assert_eq!(parse_channels("256").unwrap_err(), "channel value overflow");
    assert_eq!(
        parse_channels("1,,2").unwrap_err(),
        "channel undefined / has wrong format"
    );
    assert_eq!(
        parse_channels(",1").unwrap_err(),
        "channel undefined / has wrong format"
    );
    assert_eq!(
        parse_channels("1,x").unwrap_err(),
        "channel undefined / has wrong format"
    );
}

#[test]
fn trailing_comma_is_ignored() {
    assert_eq!(parse_channels("7,8,").unwrap(), chans(&[7, 8]));
    assert!(parse_channels("7,8,,").is_err());
}

#[test]
fn full_universe_parses_and_one_more_channel_fails() {
    let full = vec!["9"; CHANNELS_PER_UNIVERSE].join(",");
    assert_eq!(parse_channels(&full).unwrap(), [9u8; CHANNELS_PER_UNIVERSE]);

    let over = format!("{full},1");
    assert_eq!(
        parse_channels(&over).unwrap_err(),
        "too many channels for one universe"
    );
}

#[test]
fn header_and_blank_lines_are_skipped_anywhere() {
    let recs = read_all("OLA Show\n\n1 10,20\n   \nOLA Show\n 40 \n");
    assert_eq!(recs.len(), 1);
    let r = recs[0].as_ref().unwrap();
    assert_eq!(r.universe, 1);
    assert_eq!(r.channels, chans(&[10, 20]));
    assert_eq!(r.control, FrameControl::Display(40));
}

#[test]
fn alternating_pairs_produce_one_record_each() {
    let recs: Vec<_> = read_all("OLA Show\n0 1\n0\n1 2\n25\n")
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].control, FrameControl::Hold);
    assert_eq!(recs[0].universe, 0);
    assert_eq!(recs[1].control, FrameControl::Display(25));
    assert_eq!(recs[1].universe, 1);
}

#[test]
fn end_of_input_after_data_line_yields_sentinel() {
    let recs: Vec<_> = read_all("0 5,6\n100\n0 005")
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[1].control, FrameControl::EndOfStream);
    assert_eq!(recs[1].control.as_raw(), -1);
    assert_eq!(recs[1].channels, chans(&[5]));
}

#[test]
fn end_of_input_after_duration_ends_cleanly() {
    let mut reader = ShowReader::new("0 1\n10\n\n".as_bytes());
    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().is_none());
    assert!(reader.next().is_none());
}

#[test]
fn duration_without_data_is_fatal() {
    let recs = read_all("OLA Show\n100\n");
    assert_eq!(recs.len(), 1);
    match &recs[0] {
        Err(ConvertError::Parse { line, msg }) => {
            assert_eq!(*line, 2);
            assert_eq!(msg, "no frame before frame time");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn reader_is_fused_after_error() {
    let mut reader = ShowReader::new("0 1,300\n10\n0 1\n10\n".as_bytes());
    assert!(matches!(
        reader.next(),
        Some(Err(ConvertError::Parse { line: 1, .. }))
    ));
    assert!(reader.next().is_none());
}

#[test]
fn bad_numbers_are_rejected() {
    for src in ["x 1,2\n", "-1 1\n", "+3\n", "12ms\n"] {
        let recs = read_all(src);
        assert!(
            matches!(&recs[0], Err(ConvertError::Parse { msg, .. }) if msg.contains("bad frame duration")),
            "{src:?} => {recs:?}"
        );
    }
    let recs = read_all("4294967296 1\n");
    assert!(matches!(&recs[0], Err(ConvertError::Parse { .. })));
}

#[test]
fn back_to_back_data_lines_keep_the_last_one_and_count_it() {
    let mut reader = ShowReader::new("0 1\n1 2\n50\n".as_bytes());
    let rec = reader.next().unwrap().unwrap();
    assert_eq!(rec.universe, 1);
    assert_eq!(rec.channels, chans(&[2]));
    assert_eq!(reader.overwritten_updates(), 1);
    assert_eq!(reader.lines_read(), 3);
}

#[test]
fn spaces_between_segments_are_collapsed() {
    assert_eq!(
        parse_line("3    4,5\r\n", 1).unwrap(),
        Some(ShowLine::Universe {
            universe: 3,
            channels: chans(&[4, 5])
        })
    );
}

#[test]
fn parsing_the_same_line_twice_is_identical() {
    let a = parse_line("12 255,0,17,", 1).unwrap();
    let b = parse_line("12 255,0,17,", 1).unwrap();
    assert_eq!(a, b);
}

#[test]
fn non_utf8_line_is_a_parse_error_with_its_line_number() {
    let bytes: &[u8] = b"0 1\n10\n0 2\xe9\n";
    let mut reader = ShowReader::new(bytes);
    assert!(reader.next().unwrap().is_ok());
    match reader.next() {
        Some(Err(ConvertError::Parse { line, msg })) => {
            assert_eq!(line, 3);
            assert_eq!(msg, "line is not valid text");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(reader.next().is_none());
}

/// Serves `data`, then fails every further read.
struct FailingAfter {
    data: &'static [u8],
    pos: usize,
}

impl std::io::Read for FailingAfter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos == self.data.len() {
            return Err(std::io::Error::other("disk gone"));
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn stream_failure_mid_file_is_an_io_error() {
    let input = std::io::BufReader::new(FailingAfter {
        data: b"0 1\n5\n",
        pos: 0,
    });
    let recs = read_all_from(input);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].as_ref().unwrap().control, FrameControl::Display(5));
    match &recs[1] {
        Err(ConvertError::Io(e)) => assert_eq!(e.to_string(), "disk gone"),
        other => panic!("unexpected: {other:?}"),
    }
}

fn read_all_from<R: BufRead>(input: R) -> Vec<ConvertResult<UpdateRecord>> {
    ShowReader::new(input).collect()
}

#[test]
fn durations_are_bounded_by_u64() {
    let recs = read_all("0 1\n4294967296\n");
    assert_eq!(
        recs[0].as_ref().unwrap().control,
        FrameControl::Display(4_294_967_296)
    );

    let recs = read_all("0 1\n18446744073709551615\n");
    assert_eq!(recs[0].as_ref().unwrap().control, FrameControl::Display(u64::MAX));

    let recs = read_all("0 1\n18446744073709551616\n");
    assert!(matches!(
        &recs[0],
        Err(ConvertError::Parse { line: 2, msg }) if msg.contains("bad frame duration")
    ));
}
