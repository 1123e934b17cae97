use geoarc_core::StructPool;

use crate::{Archive, StructLayout};

#[test]
fn zero_drift_places_in_arrival_order() {
    let mut pool = StructPool::new();
    let mut archive = Archive::new();
    let mut layout = StructLayout::new(0);

    let byte = pool.add(1, 0);
    let word = pool.add(4, 2);
    layout.place(&mut archive, &mut pool, byte).unwrap();
    layout.place(&mut archive, &mut pool, word).unwrap();
    layout.flush(&mut archive, &mut pool).unwrap();

    assert_eq!(pool.location(byte), 0);
    assert_eq!(pool.location(word), 4);
    assert_eq!(archive.padding(), 3);
}

#[test]
fn deferred_struct_slips_in_at_its_alignment() {
    let mut pool = StructPool::new();
    let mut archive = Archive::new();
    let mut layout = StructLayout::new(8);

    let a = pool.add(1, 0);
    let b = pool.add(4, 2); // cursor 1: deferred
    let c = pool.add(1, 0); // fills 1
    let d = pool.add(2, 1); // fills 2..4, after which b fits at 4

    layout.place(&mut archive, &mut pool, a).unwrap();
    layout.place(&mut archive, &mut pool, b).unwrap();
    assert_eq!(layout.deferred(), 1);
    layout.place(&mut archive, &mut pool, c).unwrap();
    layout.place(&mut archive, &mut pool, d).unwrap();
    layout.flush(&mut archive, &mut pool).unwrap();

    assert_eq!(pool.location(a), 0);
    assert_eq!(pool.location(c), 1);
    assert_eq!(pool.location(d), 2);
    assert_eq!(pool.location(b), 4);
    assert_eq!(archive.padding(), 0);
}

#[test]
fn exhausted_drift_budget_forces_oldest_deferred_out() {
    let mut pool = StructPool::new();
    let mut archive = Archive::new();
    let mut layout = StructLayout::new(2);

    let a = pool.add(1, 0);
    let b = pool.add(4, 2); // deferred at cursor 1, budget ends at 3
    let c = pool.add(1, 0); // 1..2, within budget
    let d = pool.add(1, 0); // 2..3, exactly at budget
    let e = pool.add(1, 0); // would end at 4: budget blown, b goes first

    for id in [a, b, c, d, e] {
        layout.place(&mut archive, &mut pool, id).unwrap();
    }
    layout.flush(&mut archive, &mut pool).unwrap();

    assert_eq!(pool.location(a), 0);
    assert_eq!(pool.location(c), 1);
    assert_eq!(pool.location(d), 2);
    assert_eq!(pool.location(b), 4);
    assert_eq!(pool.location(e), 8);
    assert_eq!(archive.padding(), 1);
}

#[test]
fn flush_drains_in_arrival_order() {
    let mut pool = StructPool::new();
    let mut archive = Archive::new();
    let mut layout = StructLayout::new(4);

    let a = pool.add(1, 0);
    let b = pool.add(4, 2);
    let c = pool.add(2, 1);
    layout.place(&mut archive, &mut pool, a).unwrap();
    layout.place(&mut archive, &mut pool, b).unwrap();
    layout.place(&mut archive, &mut pool, c).unwrap();
    assert_eq!(layout.deferred(), 2);

    layout.flush(&mut archive, &mut pool).unwrap();

    assert_eq!(pool.location(b), 4);
    assert_eq!(pool.location(c), 8);
    assert_eq!(layout.deferred(), 0);
}

#[test]
fn put_commits_unconditionally() {
    let mut pool = StructPool::new();
    let mut archive = Archive::new();
    let mut layout = StructLayout::new(16);

    let a = pool.add(1, 0);
    let b = pool.add(4, 2);
    layout.put(&mut archive, &mut pool, a).unwrap();
    let location = layout.put(&mut archive, &mut pool, b).unwrap();

    assert_eq!(location, 4);
    assert_eq!(archive.padding(), 3);
}
