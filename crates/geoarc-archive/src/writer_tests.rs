use geoarc_core::{StructId, StructPool};

use crate::{LayoutError, LinkRecord, StructWriter};

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
}

#[test]
fn fields_are_little_endian() {
    let mut pool = StructPool::new();
    let s = pool.add(15, 0);
    pool.commit(s, 0);

    let mut buf = vec![0u8; 15];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_u8(0xab);
    out.write_u16(0x1234);
    out.write_u32(0xdead_beef);
    out.write_u64(0x0102_0304_0506_0708);
    out.end();

    assert_eq!(buf[0], 0xab);
    assert_eq!(&buf[1..3], &[0x34, 0x12]);
    assert_eq!(&buf[3..7], &[0xef, 0xbe, 0xad, 0xde]);
    assert_eq!(&buf[7..15], &[8, 7, 6, 5, 4, 3, 2, 1]);
}

#[test]
#[should_panic(expected = "declared end")]
fn size_mismatch_panics_on_end() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.commit(s, 0);

    let mut buf = vec![0u8; 8];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_u32(1);
    out.end();
}

#[test]
#[should_panic(expected = "still open")]
fn nested_begin_panics() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 0);
    let b = pool.add(4, 0);
    pool.commit(a, 0);
    pool.commit(b, 4);

    let mut buf = vec![0u8; 8];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(a);
    out.begin(b);
}

#[test]
fn plain_pointer_is_relative_to_anchor() {
    let mut pool = StructPool::new();
    let s = pool.add(4, 0);
    let target = pool.add(16, 2);
    pool.set_anchor(target, 8);
    pool.commit(s, 0);
    pool.commit(target, 100);

    let mut buf = vec![0u8; 120];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_pointer(Some(target)).unwrap();
    out.end();

    let delta = read_u32(&buf, 0) as i32;
    assert_eq!(delta, 108);
    assert_eq!(0i64 + delta as i64, pool.anchor_location(target) as i64);
}

#[test]
fn null_pointer_writes_zero() {
    let mut pool = StructPool::new();
    let s = pool.add(4, 0);
    pool.commit(s, 0);

    let mut buf = vec![0xffu8; 4];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_pointer(None).unwrap();
    out.end();

    assert_eq!(read_u32(&buf, 0), 0);
}

#[test]
fn pointer_past_signed_range_is_rejected() {
    let mut pool = StructPool::new();
    let s = pool.add(4, 0);
    let far = pool.add(4, 0);
    pool.commit(s, 0);
    pool.commit(far, 0xf000_0000);

    let mut buf = vec![0u8; 4];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    let err = out.write_pointer(Some(far)).unwrap_err();
    assert_eq!(
        err,
        LayoutError::PointerOutOfRange {
            pos: 0,
            target: far,
            delta: 0xf000_0000,
        }
    );
}

#[test]
fn flagged_pointer_keeps_flags_in_alignment_bits() {
    let mut pool = StructPool::new();
    let s = pool.add(4, 0);
    let target = pool.add(8, 2);
    pool.commit(s, 0);
    pool.commit(target, 100);

    let mut buf = vec![0u8; 108];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_flagged_pointer(target, 0b11).unwrap();
    out.end();

    let raw = read_u32(&buf, 0);
    assert_eq!(raw, 103);
    assert_eq!(raw & 0b11, 0b11);
    assert_eq!((raw & !0b11) as i32, 100);
}

#[test]
fn flagged_pointer_rejects_flags_wider_than_alignment() {
    let mut pool = StructPool::new();
    let s = pool.add(4, 0);
    let target = pool.add(4, 0);
    pool.commit(s, 0);
    pool.commit(target, 4);

    let mut buf = vec![0u8; 8];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    let err = out.write_flagged_pointer(target, 1).unwrap_err();
    assert_eq!(
        err,
        LayoutError::FlagBitsExceedAlignment {
            pos: 0,
            target,
            flag_bits: 1,
            align_log2: 0,
        }
    );
}

#[test]
fn tagged_pointer_shifts_delta_around_flags() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    let target = pool.add(8, 2);
    pool.commit(s, 4);
    pool.commit(target, 64);

    let mut buf = vec![0u8; 72];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_tagged_pointer(target, 2, 0b10).unwrap();

    // base is pos masked down to a 2-byte boundary (already 4 here), so the
    // delta is 60, shifted left around the two flag bits.
    let raw = read_u32(&buf, 4);
    assert_eq!(raw, (60 << 1) | 0b10);
    assert_eq!(raw & 0b11, 0b10);
    let base = 4u32 & !1;
    assert_eq!(base + (((raw & !0b11) >> 1) as u32), 64);
}

#[test]
fn tagged_pointer_rejects_insufficient_alignment() {
    let mut pool = StructPool::new();
    let s = pool.add(4, 0);
    let target = pool.add(4, 1);
    pool.commit(s, 0);
    pool.commit(target, 8);

    let mut buf = vec![0u8; 12];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    let err = out.write_tagged_pointer(target, 3, 0b101).unwrap_err();
    assert_eq!(
        err,
        LayoutError::FlagBitsExceedAlignment {
            pos: 0,
            target,
            flag_bits: 3,
            align_log2: 1,
        }
    );
}

#[test]
fn foreign_pointer_records_a_link_and_writes_the_placeholder() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.commit(s, 0);

    let mut buf = vec![0u8; 8];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.begin(s);
    out.write_u32(7);
    out.write_foreign_pointer(9, 3, 0x1234_5678_9abc, 0b101);
    out.end();

    let links = out.take_links();
    assert_eq!(
        links,
        vec![LinkRecord {
            pos: 4,
            tile_and_shift: (9 << 4) | 3,
            target_id: 0x1234_5678_9abc,
            flags: 0b101,
        }]
    );
    assert!(out.links().is_empty());
    assert_eq!(read_u32(&buf, 4), 0b101);
}

#[test]
fn link_record_round_trips_through_the_side_stream() {
    let record = LinkRecord {
        pos: 0xdead_beef,
        tile_and_shift: (0x0abc_def << 4) | 0xf,
        target_id: u64::MAX - 1,
        flags: 0x7,
    };
    assert_eq!(LinkRecord::from_bytes(&record.to_bytes()), record);
}

#[test]
fn chain_writes_every_struct_in_location_order() {
    let mut pool = StructPool::new();
    let ids: Vec<StructId> = (0..3).map(|_| pool.add(4, 2)).collect();
    for pair in ids.windows(2) {
        pool.set_next(pair[0], Some(pair[1]));
    }
    for (i, &id) in ids.iter().enumerate() {
        pool.commit(id, 4 * i as u32);
    }

    let mut buf = vec![0u8; 12];
    let mut out = StructWriter::new(&pool, &mut buf);
    out.write_chain(ids[0], |out, id| {
        out.write_u32(0x100 + id.as_u32());
        Ok(())
    })
    .unwrap();

    for (i, &id) in ids.iter().enumerate() {
        assert_eq!(read_u32(&buf, 4 * i), 0x100 + id.as_u32());
    }
}

#[test]
#[should_panic(expected = "chain out of location order")]
fn chain_against_location_order_panics() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 0);
    let b = pool.add(4, 0);
    pool.set_next(a, Some(b));
    pool.commit(a, 4);
    pool.commit(b, 0);

    let mut buf = vec![0u8; 8];
    let mut out = StructWriter::new(&pool, &mut buf);
    let _ = out.write_chain(a, |out, _| {
        out.write_u32(0);
        Ok(())
    });
}
