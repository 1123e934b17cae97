use crate::{StructId, StructPool, align_up};

#[test]
fn align_up_rounds_to_power_of_two() {
    assert_eq!(align_up(0, 0), 0);
    assert_eq!(align_up(5, 0), 5);
    assert_eq!(align_up(5, 1), 6);
    assert_eq!(align_up(5, 2), 8);
    assert_eq!(align_up(8, 2), 8);
    assert_eq!(align_up(9, 3), 16);
}

#[test]
fn aligned_location_is_pure() {
    let mut pool = StructPool::new();
    let s = pool.add(12, 2);

    assert_eq!(pool.aligned_location(s, 1), 4);
    assert_eq!(pool.aligned_location(s, 1), 4);
    assert_eq!(pool.aligned_location(s, 4), 4);
}

#[test]
fn commit_fixes_location_once() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 1);

    assert!(!pool.is_placed(s));
    assert_eq!(pool.try_location(s), None);

    pool.commit(s, 16);
    assert!(pool.is_placed(s));
    assert_eq!(pool.location(s), 16);
}

#[test]
#[should_panic(expected = "placed twice")]
fn double_commit_panics() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.commit(s, 0);
    pool.commit(s, 8);
}

#[test]
#[should_panic(expected = "read before placement")]
fn location_before_placement_panics() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.location(s);
}

#[test]
#[should_panic(expected = "misaligned offset")]
fn misaligned_commit_panics() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 2);
    pool.commit(s, 6);
}

#[test]
#[should_panic(expected = "queued twice")]
fn double_queue_panics() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.mark_queued(s);
    pool.mark_queued(s);
}

#[test]
fn queued_then_placed() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.mark_queued(s);
    assert!(pool.is_queued(s));

    pool.commit(s, 0);
    assert!(pool.is_placed(s));
    assert!(!pool.is_queued(s));
}

#[test]
fn anchor_location_adds_anchor() {
    let mut pool = StructPool::new();
    let s = pool.add(20, 2);
    pool.set_anchor(s, 8);
    pool.commit(s, 100);

    assert_eq!(pool.location(s), 100);
    assert_eq!(pool.anchor_location(s), 108);
}

#[test]
#[should_panic(expected = "set_size")]
fn resize_after_commit_panics() {
    let mut pool = StructPool::new();
    let s = pool.add(8, 0);
    pool.commit(s, 0);
    pool.set_size(s, 16);
}

#[test]
fn chain_follows_next_links() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 0);
    let b = pool.add(4, 0);
    let c = pool.add(4, 0);
    pool.set_next(a, Some(b));
    pool.set_next(b, Some(c));

    let ids: Vec<StructId> = pool.chain(a).collect();
    assert_eq!(ids, vec![a, b, c]);
}

#[test]
fn isolated_struct_is_its_own_chain() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 0);

    let ids: Vec<StructId> = pool.chain(a).collect();
    assert_eq!(ids, vec![a]);
}

#[test]
fn group_size_sums_aligned_extents() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 2); // 0..4
    let b = pool.add(3, 0); // 4..7
    let c = pool.add(8, 2); // 8..16 (1 byte padding)
    let g = pool.add_group(&[a, b, c]);

    assert_eq!(pool.size(g), 16);
    assert_eq!(pool.align_log2(g), 2);
}

#[test]
fn group_commit_commits_children() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 2);
    let b = pool.add(3, 0);
    let c = pool.add(8, 2);
    let g = pool.add_group(&[a, b, c]);

    pool.commit(g, 64);
    assert_eq!(pool.location(a), 64);
    assert_eq!(pool.location(b), 68);
    assert_eq!(pool.location(c), 72);
}

#[test]
fn nested_groups_commit_recursively() {
    let mut pool = StructPool::new();
    let a = pool.add(4, 2);
    let b = pool.add(4, 2);
    let inner = pool.add_group(&[a, b]);
    let tail = pool.add(2, 1);
    let outer = pool.add_group(&[inner, tail]);

    assert_eq!(pool.size(outer), 10);
    pool.commit(outer, 32);
    assert_eq!(pool.location(a), 32);
    assert_eq!(pool.location(b), 36);
    assert_eq!(pool.location(tail), 40);
}

#[test]
fn struct_id_roundtrip() {
    let id = StructId::from_raw(7);
    assert_eq!(id.as_u32(), 7);
}
