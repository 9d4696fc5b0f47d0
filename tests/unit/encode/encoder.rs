use super::*;
use crate::encode::backend::InMemoryBackend;
use crate::encode::layout::read_row;
use crate::foundation::core::CHANNELS_PER_UNIVERSE;

fn n(v: usize) -> NonZeroUsize {
    NonZeroUsize::new(v).unwrap()
}

fn states(ids: &[u32]) -> UniverseStates {
    ids.iter()
        .map(|&id| (id, [id as u8; CHANNELS_PER_UNIVERSE]))
        .collect()
}

/// Backend whose `finish` always fails, counting how often it was asked.
#[derive(Default)]
struct FailingFinish {
    finishes: u32,
}

impl FrameBackend for FailingFinish {
    fn begin(&mut self, geometry: FrameGeometry) -> ConvertResult<usize> {
        Ok(geometry.width as usize)
    }

    fn write_frame(&mut self, _frame: FrameRef<'_>) -> ConvertResult<()> {
        Ok(())
    }

    fn finish(&mut self, _end_pts_ms: u64) -> ConvertResult<()> {
        self.finishes += 1;
        Err(ConvertError::resource("writing trailer"))
    }
}

#[test]
fn open_reports_geometry_to_backend() {
    let enc = FrameEncoder::open(n(3), InMemoryBackend::new()).unwrap();
    let g = enc.backend().geometry().unwrap();
    assert_eq!((g.width, g.height, g.time_base_ms), (514, 3, 1));
    assert_eq!(enc.next_pts(), 0);
    assert!(!enc.is_closed());
}

#[test]
fn emit_advances_timestamps_by_duration() {
    let mut enc = FrameEncoder::open(n(2), InMemoryBackend::new()).unwrap();
    enc.emit(&states(&[4, 1]), 100).unwrap();
    enc.emit(&states(&[4, 1]), 10).unwrap();
    enc.close().unwrap();

    let backend = enc.into_backend();
    let pts: Vec<(u64, u64)> = backend
        .frames()
        .iter()
        .map(|f| (f.pts_ms, f.duration_ms))
        .collect();
    assert_eq!(pts, vec![(0, 100), (100, 10)]);
    assert_eq!(backend.end_pts_ms(), Some(110));

    let first = &backend.frames()[0].data;
    assert_eq!(read_row(&first[..514]).unwrap().0, 1);
    assert_eq!(read_row(&first[514..]).unwrap().0, 4);
}

#[test]
fn padded_strides_leave_backend_bytes_untouched() {
    let mut enc = FrameEncoder::open(n(2), InMemoryBackend::with_row_padding(14)).unwrap();
    enc.emit(&states(&[0, 1]), 5).unwrap();
    let frame = &enc.backend().frames()[0].data;
    assert_eq!(frame.len(), 528 * 2);
    assert!(frame[514..528].iter().all(|&b| b == 0));
    assert_eq!(read_row(&frame[528..]).unwrap(), (1, [1u8; 512]));
}

#[test]
fn emit_after_close_is_rejected() {
    let mut enc = FrameEncoder::open(n(1), InMemoryBackend::new()).unwrap();
    enc.close().unwrap();
    let err = enc.emit(&states(&[0]), 1).unwrap_err();
    assert!(matches!(err, ConvertError::Resource(ref m) if m == "closed"));
    assert!(enc.backend().frames().is_empty());
}

#[test]
fn emit_with_wrong_universe_count_is_rejected() {
    let mut enc = FrameEncoder::open(n(2), InMemoryBackend::new()).unwrap();
    assert!(matches!(
        enc.emit(&states(&[0]), 1),
        Err(ConvertError::Cardinality(_))
    ));
    assert_eq!(enc.next_pts(), 0);
}

#[test]
fn close_is_idempotent_even_when_teardown_fails() {
    let mut enc = FrameEncoder::open(n(1), FailingFinish::default()).unwrap();
    enc.emit(&states(&[0]), 1).unwrap();
    assert!(enc.close().is_err());
    assert!(enc.is_closed());
    assert!(enc.close().is_ok());
    assert_eq!(enc.backend().finishes, 1);
}

#[test]
fn timestamp_overflow_is_a_resource_error() {
    let mut enc = FrameEncoder::open(n(1), InMemoryBackend::new()).unwrap();
    enc.emit(&states(&[0]), u64::MAX).unwrap();
    assert!(matches!(
        enc.emit(&states(&[0]), 1),
        Err(ConvertError::Resource(_))
    ));
    assert_eq!(enc.frames_written(), 1);
}
