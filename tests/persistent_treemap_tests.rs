//! Unit tests for PersistentTreeMap.

use podium::persistent::{PersistentTreeMap, Side};
use rstest::rstest;
use std::collections::BTreeMap;

// =============================================================================
// Basic Construction Tests
// =============================================================================

#[rstest]
fn test_new_creates_empty_map() {
    let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
}

#[rstest]
fn test_default_creates_empty_map() {
    let map: PersistentTreeMap<i32, String> = PersistentTreeMap::default();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
}

#[rstest]
fn test_singleton_creates_map_with_one_entry() {
    let map = PersistentTreeMap::singleton(42, "answer".to_string());
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&42), Some(&"answer".to_string()));
}

// =============================================================================
// Insert and Get Tests
// =============================================================================

#[rstest]
fn test_insert_single_entry() {
    let map = PersistentTreeMap::new().insert(1, "one".to_string());
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&1), Some(&"one".to_string()));
}

#[rstest]
fn test_insert_multiple_entries() {
    let map = PersistentTreeMap::new()
        .insert(2, "two".to_string())
        .insert(1, "one".to_string())
        .insert(3, "three".to_string());

    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&1), Some(&"one".to_string()));
    assert_eq!(map.get(&2), Some(&"two".to_string()));
    assert_eq!(map.get(&3), Some(&"three".to_string()));
}

#[rstest]
fn test_insert_overwrites_existing_key() {
    let map1 = PersistentTreeMap::new().insert(1, "one".to_string());
    let map2 = map1.insert(1, "ONE".to_string());

    // Original map is unchanged
    assert_eq!(map1.get(&1), Some(&"one".to_string()));
    // New map has updated value
    assert_eq!(map2.get(&1), Some(&"ONE".to_string()));
    // Length should not change
    assert_eq!(map1.len(), 1);
    assert_eq!(map2.len(), 1);
}

#[rstest]
fn test_insert_preserves_original_map() {
    let map1 = PersistentTreeMap::new().insert(1, "one".to_string());
    let map2 = map1.insert(2, "two".to_string());

    assert_eq!(map1.len(), 1);
    assert_eq!(map2.len(), 2);
    assert_eq!(map1.get(&2), None);
    assert_eq!(map2.get(&2), Some(&"two".to_string()));
}

#[rstest]
fn test_get_nonexistent_key_returns_none() {
    let map = PersistentTreeMap::new().insert(1, "one".to_string());
    assert_eq!(map.get(&2), None);
}

#[rstest]
fn test_get_on_empty_map_returns_none() {
    let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    assert_eq!(map.get(&1), None);
}

#[rstest]
fn test_get_with_borrowed_key() {
    let map = PersistentTreeMap::new().insert("hello".to_string(), 42);
    assert_eq!(map.get("hello"), Some(&42));
    assert_eq!(map.get("world"), None);
}

// =============================================================================
// Contains Key Tests
// =============================================================================

#[rstest]
fn test_contains_key_existing() {
    let map = PersistentTreeMap::new()
        .insert(1, "one".to_string())
        .insert(2, "two".to_string());

    assert!(map.contains_key(&1));
    assert!(map.contains_key(&2));
}

#[rstest]
fn test_contains_key_nonexistent() {
    let map = PersistentTreeMap::new().insert(1, "one".to_string());
    assert!(!map.contains_key(&2));
}

// =============================================================================
// Remove Tests
// =============================================================================

#[rstest]
fn test_remove_existing_key() {
    let map = PersistentTreeMap::new()
        .insert(1, "one".to_string())
        .insert(2, "two".to_string());
    let removed = map.remove(&1);

    assert_eq!(map.len(), 2); // Original unchanged
    assert_eq!(removed.len(), 1);
    assert_eq!(removed.get(&1), None);
    assert_eq!(removed.get(&2), Some(&"two".to_string()));
}

#[rstest]
fn test_remove_nonexistent_key_returns_same_map() {
    let map = PersistentTreeMap::new().insert(1, "one".to_string());
    let removed = map.remove(&2);

    assert_eq!(removed.len(), 1);
    assert_eq!(removed.get(&1), Some(&"one".to_string()));
}

#[rstest]
fn test_remove_from_empty_map() {
    let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    let removed = map.remove(&1);
    assert!(removed.is_empty());
}

#[rstest]
fn test_remove_last_entry() {
    let map = PersistentTreeMap::singleton(1, "one".to_string());
    let removed = map.remove(&1);
    assert!(removed.is_empty());
    assert_eq!(removed.validate(), 1);
}

#[rstest]
#[case(0)]
#[case(13)]
#[case(31)]
#[case(63)]
fn test_remove_each_position_keeps_remaining_entries(#[case] victim: i32) {
    let map: PersistentTreeMap<i32, i32> = (0..64).map(|key| (key, key)).collect();
    let removed = map.remove(&victim);

    assert_eq!(removed.len(), 63);
    assert!(removed.validate() > 0);
    for key in 0..64 {
        if key == victim {
            assert_eq!(removed.get(&key), None);
        } else {
            assert_eq!(removed.get(&key), Some(&key));
        }
    }
}

// =============================================================================
// Structural Validity Tests
// =============================================================================

#[rstest]
fn test_validate_reports_positive_black_height_through_growth() {
    let mut map = PersistentTreeMap::new();
    for key in 0..512 {
        map = map.insert(key, ());
        assert!(map.validate() > 0, "invalid tree after inserting {key}");
    }
}

#[rstest]
fn test_validate_reports_positive_black_height_through_shrinkage() {
    let mut map: PersistentTreeMap<i32, ()> = (0..512).map(|key| (key, ())).collect();
    for key in 0..512 {
        map = map.remove(&key);
        assert!(map.validate() > 0, "invalid tree after removing {key}");
    }
    assert!(map.is_empty());
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[rstest]
fn test_iter_returns_entries_in_sorted_order() {
    let map = PersistentTreeMap::new()
        .insert(3, "three".to_string())
        .insert(1, "one".to_string())
        .insert(2, "two".to_string());

    let keys: Vec<&i32> = map.iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec![&1, &2, &3]);
}

#[rstest]
fn test_iter_on_empty_map() {
    let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    assert_eq!(map.iter().count(), 0);
}

#[rstest]
fn test_iter_is_exact_size() {
    let map: PersistentTreeMap<i32, i32> = (0..10).map(|key| (key, key)).collect();
    let iterator = map.iter();
    assert_eq!(iterator.len(), 10);
}

#[rstest]
fn test_keys_and_values() {
    let map = PersistentTreeMap::new()
        .insert(2, 20)
        .insert(1, 10)
        .insert(3, 30);

    let keys: Vec<&i32> = map.keys().collect();
    let values: Vec<&i32> = map.values().collect();
    assert_eq!(keys, vec![&1, &2, &3]);
    assert_eq!(values, vec![&10, &20, &30]);
}

#[rstest]
fn test_reference_into_iterator() {
    let map = PersistentTreeMap::new().insert(1, 10).insert(2, 20);
    let mut sum = 0;
    for (_, value) in &map {
        sum += value;
    }
    assert_eq!(sum, 30);
}

// =============================================================================
// FromIterator Tests
// =============================================================================

#[rstest]
fn test_from_iterator_collects_all_entries() {
    let map: PersistentTreeMap<i32, i32> = vec![(3, 30), (1, 10), (2, 20)].into_iter().collect();
    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&1), Some(&10));
    assert_eq!(map.get(&3), Some(&30));
}

#[rstest]
fn test_from_iterator_later_duplicates_win() {
    let map: PersistentTreeMap<i32, i32> = vec![(1, 10), (1, 99)].into_iter().collect();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&1), Some(&99));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[rstest]
fn test_all_historical_versions_stay_queryable() {
    // Mirror every mutation into a BTreeMap model and snapshot both;
    // every retained snapshot must stay intact and valid.
    let mut snapshots: Vec<(PersistentTreeMap<i32, i32>, BTreeMap<i32, i32>)> = Vec::new();
    let mut map = PersistentTreeMap::new();
    let mut model = BTreeMap::new();

    for step in 0..128 {
        let key = (step * 53) % 128;
        if step % 3 == 2 {
            map = map.remove(&key);
            model.remove(&key);
        } else {
            map = map.insert(key, step);
            model.insert(key, step);
        }
        snapshots.push((map.clone(), model.clone()));
    }

    for (snapshot, model) in &snapshots {
        assert!(snapshot.validate() > 0);
        let entries: Vec<(i32, i32)> = snapshot.iter().map(|(key, value)| (*key, *value)).collect();
        let expected: Vec<(i32, i32)> = model.iter().map(|(key, value)| (*key, *value)).collect();
        assert_eq!(entries, expected);
    }
}

// =============================================================================
// Lookup Observer Tests
// =============================================================================

#[rstest]
fn test_get_with_observes_each_turn() {
    let map: PersistentTreeMap<i32, i32> = (0..31).map(|key| (key, key)).collect();

    let mut path = Vec::new();
    let found = map.get_with(&17, |entry, side| path.push((*entry.key(), side)));
    assert_eq!(found.map(|entry| *entry.value()), Some(17));

    // Each recorded turn must be consistent with the ordering:
    // a Left turn means the target orders before that key.
    for (key, side) in path {
        match side {
            Side::Left => assert!(17 < key),
            Side::Right => assert!(17 > key),
        }
    }
}

// =============================================================================
// Equality and Formatting Tests
// =============================================================================

#[rstest]
fn test_equal_maps_compare_equal_regardless_of_insertion_order() {
    let forward: PersistentTreeMap<i32, i32> = (0..20).map(|key| (key, key)).collect();
    let backward: PersistentTreeMap<i32, i32> = (0..20).rev().map(|key| (key, key)).collect();
    assert_eq!(forward, backward);
}

#[rstest]
fn test_maps_with_different_entries_compare_unequal() {
    let left = PersistentTreeMap::new().insert(1, 10);
    let right = PersistentTreeMap::new().insert(1, 11);
    assert_ne!(left, right);
}

#[rstest]
fn test_display_formats_sorted_entries() {
    let map = PersistentTreeMap::new()
        .insert(3, "three")
        .insert(1, "one")
        .insert(2, "two");
    assert_eq!(format!("{map}"), "{1: one, 2: two, 3: three}");
}

#[rstest]
fn test_display_empty_map() {
    let map: PersistentTreeMap<i32, i32> = PersistentTreeMap::new();
    assert_eq!(format!("{map}"), "{}");
}

#[rstest]
fn test_debug_formats_as_map() {
    let map = PersistentTreeMap::new().insert(1, "one");
    assert_eq!(format!("{map:?}"), "{1: \"one\"}");
}
