use super::*;

fn ramp(seed: u8) -> UniverseData {
    let mut d = [0u8; CHANNELS_PER_UNIVERSE];
    for (i, v) in d.iter_mut().enumerate() {
        *v = (i as u8).wrapping_add(seed);
    }
    d
}

#[test]
fn row_starts_with_little_endian_id() {
    let mut row = [0u8; ROW_WIDTH];
    write_row(&mut row, 0x0102, &ramp(0));
    assert_eq!(&row[..4], &[0x02, 0x01, 0, 1]);
    assert_eq!(row[ROW_WIDTH - 1], 255);
}

#[test]
fn decoding_a_row_restores_id_and_channels() {
    let mut row = [0u8; ROW_WIDTH];
    write_row(&mut row, 513, &ramp(3));
    assert_eq!(read_row(&row).unwrap(), (513, ramp(3)));
}

#[test]
fn ids_above_u16_are_truncated() {
    let mut row = [0u8; ROW_WIDTH];
    write_row(&mut row, 0x1_0005, &ramp(0));
    assert_eq!(read_row(&row).unwrap().0, 5);
}

#[test]
fn rows_follow_ascending_ids_and_leave_padding_alone() {
    let stride = ROW_WIDTH + 30;
    let mut buf = vec![0xAAu8; stride * 3];
    let mut states = UniverseStates::new();
    states.insert(9, ramp(9));
    states.insert(1, ramp(1));
    states.insert(4, ramp(4));

    write_rows(&mut buf, stride, &states).unwrap();

    let ids: Vec<u16> = buf
        .chunks(stride)
        .map(|row| read_row(row).unwrap().0)
        .collect();
    assert_eq!(ids, vec![1, 4, 9]);
    for row in buf.chunks(stride) {
        assert!(row[ROW_WIDTH..].iter().all(|&b| b == 0xAA));
    }
    assert_eq!(read_row(&buf[stride..]).unwrap().1, ramp(4));
}

#[test]
fn undersized_buffers_are_rejected() {
    let mut states = UniverseStates::new();
    states.insert(0, ramp(0));
    states.insert(1, ramp(1));

    let mut buf = vec![0u8; ROW_WIDTH * 2 - 1];
    assert!(write_rows(&mut buf, ROW_WIDTH, &states).is_err());
    assert!(write_rows(&mut buf, ROW_WIDTH - 1, &states).is_err());
    assert!(read_row(&buf[..10]).is_err());
}
