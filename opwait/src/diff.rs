//! List reconciliation helpers
//!
//! All helpers use multiset semantics: duplicate values are counted, and a
//! value is matched against the first equal, not yet matched entry.

/// Elements to add and remove to turn one list into another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDiff<T> {
    /// Elements of `new` with no counterpart in `old`, in `new` order
    pub added: Vec<T>,
    /// Elements of `old` with no counterpart in `new`, in `old` order
    pub removed: Vec<T>,
}

impl<T> ListDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute added/removed elements between `old` and `new`
///
/// Each element of `new` cancels the first still unmatched equal element of
/// `old`. With `old = [a, a, b]` and `new = [a, b]`, one `a` is removed.
pub fn list_diff<T: PartialEq + Clone>(old: &[T], new: &[T]) -> ListDiff<T> {
    let mut unmatched: Vec<Option<&T>> = old.iter().map(Some).collect();
    let mut added = Vec::new();

    for item in new {
        match unmatched.iter().position(|entry| *entry == Some(item)) {
            Some(index) => unmatched[index] = None,
            None => added.push(item.clone()),
        }
    }

    let removed = unmatched.into_iter().flatten().cloned().collect();
    ListDiff { added, removed }
}

/// Whether both lists hold the same elements with the same multiplicity,
/// ignoring order
pub fn same_members<T: Ord>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&T> = a.iter().collect();
    let mut b: Vec<&T> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

/// Select items whose key matches a wanted value
///
/// Items are scanned in order; each wanted value is consumed by the first
/// item carrying that key. Items for which `key` returns `None` are never
/// selected. Returns the selected items and the wanted values nothing matched.
pub fn take_first_matches<'a, T, K, F>(wanted: &[K], items: &'a [T], key: F) -> (Vec<&'a T>, Vec<K>)
where
    K: PartialEq + Clone,
    F: Fn(&T) -> Option<K>,
{
    let mut remaining: Vec<K> = wanted.to_vec();
    let mut selected = Vec::new();

    for item in items {
        let Some(item_key) = key(item) else {
            continue;
        };
        if let Some(index) = remaining.iter().position(|k| *k == item_key) {
            remaining.remove(index);
            selected.push(item);
        }
    }

    (selected, remaining)
}
