// Value comparison module
// Structural equality between two same-typed values, ignoring element order

use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::keys::diff_keys;
use crate::value::{Bytes, ContainerType, Value};

/// Decides whether two values read from side A and side B are identical.
pub struct ValueComparator;

impl ValueComparator {
    /// Compare two values declared as `ty`.
    ///
    /// Lists compare as multisets (order ignored, duplicate counts kept),
    /// sets compare by distinct members, maps compare field by field.
    /// A shape that does not match `ty` is logged as an issue and counts
    /// as different.
    pub fn identical(ty: ContainerType, a: &Value, b: &Value) -> bool {
        match (ty, a, b) {
            (_, Value::Mismatched, _) | (_, _, Value::Mismatched) => false,
            // A failed read says nothing about the real value
            (_, Value::Unreadable, _) | (_, _, Value::Unreadable) => false,
            (ContainerType::Scalar, Value::Scalar(x), Value::Scalar(y)) => x == y,
            (ContainerType::List, Value::List(x), Value::List(y)) => Self::lists_identical(x, y),
            (ContainerType::Set, Value::Set(x), Value::Set(y)) => Self::sets_identical(x, y),
            (ContainerType::Map, Value::Map(x), Value::Map(y)) => Self::maps_identical(x, y),
            // Key deleted on both sides since the scan
            (_, Value::Missing, Value::Missing) => true,
            _ => {
                warn!(
                    declared = %ty,
                    a = a.shape(),
                    b = b.shape(),
                    "[ISSUE] not caught type, treating as different"
                );
                false
            }
        }
    }

    fn lists_identical(a: &[Bytes], b: &[Bytes]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        let mut a: Vec<&Bytes> = a.iter().collect();
        let mut b: Vec<&Bytes> = b.iter().collect();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    fn sets_identical(a: &[Bytes], b: &[Bytes]) -> bool {
        let a: BTreeSet<&Bytes> = a.iter().collect();
        let b: BTreeSet<&Bytes> = b.iter().collect();
        a == b
    }

    fn maps_identical(a: &HashMap<Bytes, Bytes>, b: &HashMap<Bytes, Bytes>) -> bool {
        let mut fields_a: Vec<&Bytes> = a.keys().collect();
        let mut fields_b: Vec<&Bytes> = b.keys().collect();
        fields_a.sort();
        fields_b.sort();

        let partition = diff_keys(&fields_a, &fields_b);
        if !partition.is_empty() {
            return false;
        }

        fields_a.iter().all(|field| a.get(*field) == b.get(*field))
    }
}
