// Property tests for key-set partitioning

use proptest::prelude::*;
use rediff::keys::{diff_keys, KeyPartition};
use std::collections::BTreeSet;

fn key_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-f]{1,3}", 0..40)
}

fn as_set(keys: &[String]) -> BTreeSet<String> {
    keys.iter().cloned().collect()
}

proptest! {
    /// Unique and shared keys are disjoint and together cover both sides
    #[test]
    fn prop_partition_covers_union(a in key_list(), b in key_list()) {
        let partition = KeyPartition::compute(a.clone(), b.clone());
        let unique_a = as_set(&partition.unique_to_a);
        let unique_b = as_set(&partition.unique_to_b);
        let shared = as_set(&partition.shared);

        prop_assert!(unique_a.is_disjoint(&unique_b));
        prop_assert!(shared.is_disjoint(&unique_a));
        prop_assert!(shared.is_disjoint(&unique_b));

        let union: BTreeSet<String> = a.iter().chain(b.iter()).cloned().collect();
        let covered: BTreeSet<String> = unique_a.iter().chain(&unique_b).chain(&shared).cloned().collect();
        prop_assert_eq!(covered, union);
    }

    /// Each unique key really sits on only its own side
    #[test]
    fn prop_unique_keys_belong_to_one_side(a in key_list(), b in key_list()) {
        let set_a = as_set(&a);
        let set_b = as_set(&b);
        let unique = diff_keys(&a, &b);

        for key in &unique.unique_to_a {
            prop_assert!(set_a.contains(key) && !set_b.contains(key));
        }
        for key in &unique.unique_to_b {
            prop_assert!(set_b.contains(key) && !set_a.contains(key));
        }
        prop_assert_eq!(unique.len(), set_a.symmetric_difference(&set_b).count());
    }

    /// Output lists carry no duplicates even when a scan repeats keys
    #[test]
    fn prop_partition_has_no_duplicates(a in key_list(), b in key_list()) {
        let partition = KeyPartition::compute(a, b);
        prop_assert_eq!(as_set(&partition.shared).len(), partition.shared.len());
        prop_assert_eq!(as_set(&partition.unique_to_a).len(), partition.unique_to_a.len());
        prop_assert_eq!(as_set(&partition.unique_to_b).len(), partition.unique_to_b.len());
    }

    /// Swapping sides swaps the unique sets and keeps the shared set
    #[test]
    fn prop_partition_symmetric(a in key_list(), b in key_list()) {
        let forward = KeyPartition::compute(a.clone(), b.clone());
        let backward = KeyPartition::compute(b, a);
        prop_assert_eq!(&forward.unique_to_a, &backward.unique_to_b);
        prop_assert_eq!(&forward.unique_to_b, &backward.unique_to_a);
        prop_assert_eq!(as_set(&forward.shared), as_set(&backward.shared));
    }
}
