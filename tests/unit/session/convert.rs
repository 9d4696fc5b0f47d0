use super::*;
use crate::encode::layout::read_row;

fn opts(universes: usize, last: u64) -> ConvertOpts {
    ConvertOpts {
        last_duration_ms: NonZeroU64::new(last).unwrap(),
        ..ConvertOpts::new(NonZeroUsize::new(universes).unwrap())
    }
}

#[test]
fn raw_options_are_validated() {
    assert!(ConvertOpts::from_raw(0, 1, 0).is_err());
    assert!(ConvertOpts::from_raw(-3, 1, 0).is_err());
    assert!(ConvertOpts::from_raw(1, 0, 0).is_err());
    assert!(ConvertOpts::from_raw(1, 1, -1).is_err());
    let o = ConvertOpts::from_raw(4, 20, 100).unwrap();
    assert_eq!(
        (o.universes.get(), o.last_duration_ms.get(), o.progress_interval),
        (4, 20, 100)
    );
}

#[test]
fn stats_count_records_frames_and_timeline_length() {
    let src = "OLA Show\n0 1\n0\n1 2\n40\n0 3\n";
    let stats = convert(src.as_bytes(), InMemoryBackend::new(), &opts(2, 5)).unwrap();
    assert_eq!(
        stats,
        ConvertStats {
            records: 3,
            frames: 2,
            overwritten_updates: 0,
            duration_ms: 45,
        }
    );
}

#[test]
fn backend_is_finished_when_parsing_fails() {
    struct FinishRecorder<'a>(&'a mut Option<u64>);
    impl FrameBackend for FinishRecorder<'_> {
        fn begin(&mut self, g: FrameGeometry) -> ConvertResult<usize> {
            Ok(g.width as usize)
        }
        fn write_frame(&mut self, _f: FrameRef<'_>) -> ConvertResult<()> {
            Ok(())
        }
        fn finish(&mut self, end: u64) -> ConvertResult<()> {
            *self.0 = Some(end);
            Ok(())
        }
    }

    let mut finished = None;
    let err = convert(
        "0 1\n30\n0 999\n".as_bytes(),
        FinishRecorder(&mut finished),
        &opts(1, 1),
    )
    .unwrap_err();
    assert!(matches!(err, ConvertError::Parse { line: 3, .. }));
    assert_eq!(finished, Some(30));
}

#[test]
fn primary_error_wins_over_teardown_error() {
    struct BrokenTrailer;
    impl FrameBackend for BrokenTrailer {
        fn begin(&mut self, g: FrameGeometry) -> ConvertResult<usize> {
            Ok(g.width as usize)
        }
        fn write_frame(&mut self, _f: FrameRef<'_>) -> ConvertResult<()> {
            Ok(())
        }
        fn finish(&mut self, _end: u64) -> ConvertResult<()> {
            Err(ConvertError::resource("writing trailer"))
        }
    }

    let err = convert("5\n".as_bytes(), BrokenTrailer, &opts(1, 1)).unwrap_err();
    assert!(err.to_string().contains("no frame before frame time"));

    let err = convert("0 1\n5\n".as_bytes(), BrokenTrailer, &opts(1, 1)).unwrap_err();
    assert!(err.to_string().contains("writing trailer"));
}

#[test]
fn snapshot_picks_the_requested_frame() {
    let src = "0 10\n0\n1 20\n100\n0 30\n50\n";
    let snap = snapshot_at(src.as_bytes(), &opts(2, 1), 1).unwrap();
    assert_eq!((snap.width, snap.height), (514, 2));
    assert_eq!((snap.pts_ms, snap.duration_ms), (100, 50));
    assert_eq!(snap.pixels.len(), 514 * 2);
    assert_eq!(read_row(&snap.pixels[..514]).unwrap().1[0], 30);
    assert_eq!(read_row(&snap.pixels[514..]).unwrap().1[0], 20);

    let err = snapshot_at(src.as_bytes(), &opts(2, 1), 2).unwrap_err();
    assert!(err.to_string().contains("past the last frame"));
}

#[test]
fn missing_input_file_is_reported() {
    let err = convert_file(
        Path::new("definitely/not/here.show"),
        InMemoryBackend::new(),
        &opts(1, 1),
    )
    .unwrap_err();
    assert!(err.to_string().contains("could not open showfile"));
}
