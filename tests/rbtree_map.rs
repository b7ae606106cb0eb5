use std::collections::BTreeMap;

use proptest::prelude::*;
use rubra_tree::rbtree_map::Entry;
use rubra_tree::{RBTreeMap, Rank};

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 10_000;

/// Generates random keys in a range small enough to force collisions.
fn key_strategy() -> impl Strategy<Value = i64> {
    -5_000i64..5_000i64
}

fn value_strategy() -> impl Strategy<Value = i64> {
    any::<i64>()
}

// ─── Operations enum for driving randomized tests ────────────────────────────

#[derive(Debug, Clone)]
enum MapOp {
    Insert(i64, i64),
    Remove(i64),
    Get(i64),
    ContainsKey(i64),
    Floor(i64),
    Ceiling(i64),
    Rank(i64),
    FirstKeyValue,
    LastKeyValue,
    PopFirst,
    PopLast,
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        5 => (key_strategy(), value_strategy()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        3 => key_strategy().prop_map(MapOp::Remove),
        2 => key_strategy().prop_map(MapOp::Get),
        1 => key_strategy().prop_map(MapOp::ContainsKey),
        1 => key_strategy().prop_map(MapOp::Floor),
        1 => key_strategy().prop_map(MapOp::Ceiling),
        1 => key_strategy().prop_map(MapOp::Rank),
        1 => Just(MapOp::FirstKeyValue),
        1 => Just(MapOp::LastKeyValue),
        1 => Just(MapOp::PopFirst),
        1 => Just(MapOp::PopLast),
    ]
}

// ─── Core CRUD operations ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Replays a random sequence of operations on both RBTreeMap and BTreeMap
    /// and asserts identical results at every step.
    #[test]
    fn map_ops_match_btreemap(ops in proptest::collection::vec(map_op_strategy(), TEST_SIZE)) {
        let mut rb_map: RBTreeMap<i64, i64> = RBTreeMap::new();
        let mut bt_map: BTreeMap<i64, i64> = BTreeMap::new();

        for op in &ops {
            match op {
                MapOp::Insert(k, v) => {
                    prop_assert_eq!(rb_map.insert(*k, *v), bt_map.insert(*k, *v), "insert({}, {})", k, v);
                }
                MapOp::Remove(k) => {
                    prop_assert_eq!(rb_map.remove(k), bt_map.remove(k), "remove({})", k);
                }
                MapOp::Get(k) => {
                    prop_assert_eq!(rb_map.get(k), bt_map.get(k), "get({})", k);
                }
                MapOp::ContainsKey(k) => {
                    prop_assert_eq!(rb_map.contains_key(k), bt_map.contains_key(k), "contains_key({})", k);
                }
                MapOp::Floor(k) => {
                    let expected = bt_map.range(..=*k).next_back();
                    prop_assert_eq!(rb_map.floor(k), expected, "floor({})", k);
                }
                MapOp::Ceiling(k) => {
                    let expected = bt_map.range(*k..).next();
                    prop_assert_eq!(rb_map.ceiling(k), expected, "ceiling({})", k);
                }
                MapOp::Rank(k) => {
                    let expected = bt_map.range(..*k).count();
                    prop_assert_eq!(rb_map.rank(k), expected, "rank({})", k);
                }
                MapOp::FirstKeyValue => {
                    prop_assert_eq!(rb_map.first_key_value(), bt_map.first_key_value(), "first_key_value");
                }
                MapOp::LastKeyValue => {
                    prop_assert_eq!(rb_map.last_key_value(), bt_map.last_key_value(), "last_key_value");
                }
                MapOp::PopFirst => {
                    prop_assert_eq!(rb_map.pop_first(), bt_map.pop_first(), "pop_first");
                }
                MapOp::PopLast => {
                    prop_assert_eq!(rb_map.pop_last(), bt_map.pop_last(), "pop_last");
                }
            }
            prop_assert_eq!(rb_map.len(), bt_map.len(), "len mismatch after {:?}", op);
            prop_assert_eq!(rb_map.is_empty(), bt_map.is_empty(), "is_empty mismatch after {:?}", op);
        }

        // Structural invariants hold once the dust settles.
        prop_assert!(rb_map.is_bst());
        prop_assert!(rb_map.is_red_black());
    }

    /// Checks the tree invariants after every single mutation of a shorter
    /// random sequence.
    #[test]
    fn invariants_hold_after_every_mutation(ops in proptest::collection::vec((any::<bool>(), -256i64..256), 0..1_000)) {
        let mut rb_map: RBTreeMap<i64, i64> = RBTreeMap::new();

        for (is_insert, key) in ops {
            if is_insert {
                rb_map.insert(key, key);
            } else {
                rb_map.remove(&key);
            }

            prop_assert!(rb_map.is_bst(), "BST ordering violated after mutating {}", key);
            prop_assert!(rb_map.is_red_black(), "Red-Black coloring violated after mutating {}", key);
        }
    }

    /// Tests that iteration order matches BTreeMap after random insertions.
    #[test]
    fn iter_matches_btreemap(entries in proptest::collection::vec((key_strategy(), value_strategy()), TEST_SIZE)) {
        let mut rb_map: RBTreeMap<i64, i64> = RBTreeMap::new();
        let mut bt_map: BTreeMap<i64, i64> = BTreeMap::new();

        for (k, v) in &entries {
            rb_map.insert(*k, *v);
            bt_map.insert(*k, *v);
        }

        prop_assert!(rb_map.iter().eq(bt_map.iter()));
        prop_assert!(rb_map.iter().rev().eq(bt_map.iter().rev()));
        prop_assert!(rb_map.keys().eq(bt_map.keys()));
        prop_assert!(rb_map.values().eq(bt_map.values()));
        prop_assert!(rb_map.into_iter().eq(bt_map.into_iter()));
    }

    /// The Red-Black height bound holds for any insertion order.
    #[test]
    fn height_stays_logarithmic(keys in proptest::collection::hash_set(any::<i64>(), 1..2_048)) {
        let mut map: RBTreeMap<i64, ()> = RBTreeMap::new();
        for &k in &keys {
            map.insert(k, ());
        }

        let n = map.len() as f64;
        let bound = 2.0 * (n + 1.0).log2();
        prop_assert!(
            map.height() as f64 <= bound,
            "height {} exceeds 2*log2(n+1) = {:.2} for n = {}",
            map.height(),
            bound,
            map.len()
        );
    }

    /// For every present key, `rank_of` is its position in the ascending
    /// sequence, and select is the inverse of rank.
    #[test]
    fn rank_is_position_in_sorted_order(keys in proptest::collection::btree_set(key_strategy(), 0..512)) {
        let map: RBTreeMap<i64, i64> = keys.iter().map(|&k| (k, k)).collect();

        for (position, &key) in keys.iter().enumerate() {
            prop_assert_eq!(map.rank_of(&key), Some(position));
            prop_assert_eq!(map.rank(&key), position);
            prop_assert_eq!(map.get_by_rank(position), Some((&key, &key)));
            prop_assert_eq!(map[Rank(position)], key);
        }

        prop_assert_eq!(map.get_by_rank(keys.len()), None);
    }

    /// `floor(k) <= k <= ceiling(k)` whenever the bounds exist; both equal
    /// `k` when `k` is present.
    #[test]
    fn floor_and_ceiling_bound_the_key(keys in proptest::collection::btree_set(key_strategy(), 1..512), probe in key_strategy()) {
        let map: RBTreeMap<i64, i64> = keys.iter().map(|&k| (k, k)).collect();

        if let Some((&floor, _)) = map.floor(&probe) {
            prop_assert!(floor <= probe);
        }
        if let Some((&ceiling, _)) = map.ceiling(&probe) {
            prop_assert!(ceiling >= probe);
        }
        if map.contains_key(&probe) {
            prop_assert_eq!(map.floor(&probe), Some((&probe, &probe)));
            prop_assert_eq!(map.ceiling(&probe), Some((&probe, &probe)));
        }
    }

    /// Repeatedly calling `pop_first` yields the keys in strictly ascending
    /// order and leaves the map empty.
    #[test]
    fn pop_first_drains_ascending(keys in proptest::collection::hash_set(any::<i64>(), 0..512)) {
        let mut map: RBTreeMap<i64, ()> = keys.iter().map(|&k| (k, ())).collect();

        let mut previous = None;
        let mut drained = 0;
        while let Some((key, ())) = map.pop_first() {
            if let Some(previous) = previous {
                prop_assert!(key > previous, "{} not strictly greater than {}", key, previous);
            }
            previous = Some(key);
            drained += 1;
        }

        prop_assert_eq!(drained, keys.len());
        prop_assert!(map.is_empty());
    }

    /// Snapshots agree with the lazy iterator.
    #[test]
    fn snapshots_match_iteration(entries in proptest::collection::vec((key_strategy(), value_strategy()), 0..512)) {
        let map: RBTreeMap<i64, i64> = entries.into_iter().collect();

        let sorted = map.to_sorted_vec();
        prop_assert!(sorted.into_iter().eq(map.iter()));

        // Level order is a permutation of the sorted sequence.
        let mut level_order = map.to_level_order_vec();
        prop_assert_eq!(level_order.len(), map.len());
        level_order.sort_unstable_by_key(|&(k, _)| k);
        prop_assert!(level_order.into_iter().eq(map.iter()));
    }
}

// ─── The worked example ──────────────────────────────────────────────────────

#[test]
fn worked_example() {
    let mut map = RBTreeMap::new();
    for key in [50, 30, 70, 20, 40, 60, 80] {
        map.insert(key, key.to_string());
    }

    let keys: Vec<i32> = map.keys().copied().collect();
    assert_eq!(keys, [20, 30, 40, 50, 60, 70, 80]);
    assert!(map.is_bst());
    assert!(map.is_red_black());

    assert_eq!(map.remove(&20), Some("20".to_string()));
    assert_eq!(map.remove(&80), Some("80".to_string()));

    let keys: Vec<i32> = map.keys().copied().collect();
    assert_eq!(keys, [30, 40, 50, 60, 70]);
    assert!(map.is_bst());
    assert!(map.is_red_black());
}

#[test]
fn removing_an_absent_key_changes_nothing() {
    let mut map = RBTreeMap::from([(2, "b"), (1, "a"), (3, "c")]);
    let before = map.to_level_order_vec().into_iter().map(|(&k, &v)| (k, v)).collect::<Vec<_>>();

    assert_eq!(map.remove(&42), None);

    assert_eq!(map.len(), 3);
    let after = map.to_level_order_vec().into_iter().map(|(&k, &v)| (k, v)).collect::<Vec<_>>();
    assert_eq!(after, before, "shape changed by a failed removal");
}

#[test]
fn extremes_on_an_empty_map() {
    let mut map: RBTreeMap<i32, i32> = RBTreeMap::new();
    assert_eq!(map.first_key_value(), None);
    assert_eq!(map.last_key_value(), None);
    assert_eq!(map.pop_first(), None);
    assert_eq!(map.pop_last(), None);
    assert_eq!(map.floor(&1), None);
    assert_eq!(map.ceiling(&1), None);
    assert_eq!(map.rank(&1), 0);
    assert_eq!(map.height(), 0);
}

// ─── Iterators ───────────────────────────────────────────────────────────────

#[test]
fn iter_is_double_ended_and_exact() {
    let map = RBTreeMap::from([(1, "a"), (2, "b"), (3, "c"), (4, "d")]);

    let mut iter = map.iter();
    assert_eq!(iter.len(), 4);
    assert_eq!(iter.next(), Some((&1, &"a")));
    assert_eq!(iter.next_back(), Some((&4, &"d")));
    assert_eq!(iter.len(), 2);
    assert_eq!(iter.next(), Some((&2, &"b")));
    assert_eq!(iter.next_back(), Some((&3, &"c")));
    assert_eq!(iter.next(), None);
    assert_eq!(iter.next_back(), None);
    assert_eq!(iter.len(), 0);
}

#[test]
fn into_iter_consumes_in_order() {
    let map = RBTreeMap::from([(3, "c"), (1, "a"), (2, "b")]);
    let pairs: Vec<(i32, &str)> = map.into_iter().collect();
    assert_eq!(pairs, [(1, "a"), (2, "b"), (3, "c")]);
}

// ─── Entry API ───────────────────────────────────────────────────────────────

#[test]
fn entry_inserts_and_updates() {
    let mut map: RBTreeMap<&str, i32> = RBTreeMap::new();

    assert_eq!(*map.entry("a").or_insert(1), 1);
    assert_eq!(*map.entry("a").or_insert(2), 1);

    map.entry("a").and_modify(|v| *v += 10).or_insert(0);
    assert_eq!(map["a"], 11);

    map.entry("b").and_modify(|v| *v += 10).or_insert(7);
    assert_eq!(map["b"], 7);

    match map.entry("a") {
        Entry::Occupied(entry) => {
            assert_eq!(entry.key(), &"a");
            assert_eq!(entry.remove_entry(), ("a", 11));
        }
        Entry::Vacant(_) => panic!("entry for \"a\" should be occupied"),
    }
    assert!(!map.contains_key("a"));
    assert!(map.is_red_black());
}

// ─── Trait impls ─────────────────────────────────────────────────────────────

#[test]
fn equality_ordering_and_debug() {
    let a = RBTreeMap::from([(1, "one"), (2, "two")]);
    let b: RBTreeMap<i32, &str> = [(2, "two"), (1, "one")].into();
    let c = RBTreeMap::from([(1, "one"), (3, "three")]);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a < c);
    assert_eq!(a.clone(), a);
    assert_eq!(format!("{a:?}"), r#"{1: "one", 2: "two"}"#);
}

#[test]
#[should_panic(expected = "no entry found for key")]
fn index_with_absent_key_panics() {
    let map = RBTreeMap::from([(1, "a")]);
    let _ = map[&2];
}

#[test]
#[should_panic(expected = "index out of bounds")]
fn index_with_out_of_bounds_rank_panics() {
    let map = RBTreeMap::from([(1, "a")]);
    let _ = map[Rank(1)];
}

// ─── The frequency-ranking consumer ──────────────────────────────────────────

/// Two-table top-k: one map counts occurrences by word, a second map keyed by
/// `(count, word)` hands back the most frequent words through `pop_last`.
#[test]
fn top_k_most_frequent_words() {
    let text = "it was the best of times it was the worst of times it was the age of wisdom";

    let mut counts: RBTreeMap<&str, u32> = RBTreeMap::new();
    for word in text.split_whitespace() {
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut by_count: RBTreeMap<(u32, &str), ()> = counts.iter().map(|(&word, &n)| ((n, word), ())).collect();

    let mut top = Vec::new();
    for _ in 0..3 {
        let ((count, word), ()) = by_count.pop_last().unwrap();
        top.push((word, count));
    }

    assert_eq!(top, [("was", 3), ("the", 3), ("of", 3)]);
    assert_eq!(counts["it"], 3);
    assert_eq!(counts["wisdom"], 1);
}
