//! Interval index over arena handles
//!
//! An [`IntervalIndex`] is an AVL tree ordered by `(start, handle)` and
//! augmented with the maximum end coordinate of each subtree, so that all
//! stored intervals intersecting a query can be enumerated in
//! `O(log n + k)`. The tree nodes live in their own [`Arena`]; the indexed
//! entities carry no linkage fields.
//!
//! Zero-length intervals are first-class: an insertion mutation occupies the
//! empty range `[p, p)`. Intersection therefore uses touch semantics whenever
//! either side is empty (see [`overlaps`]).

use crate::arena::{Arena, Handle, Unlinked};
use std::cmp::Ordering;
use std::ops::Range;

type NodeId<T> = Handle<Node<T>>;

#[derive(Debug, Clone)]
struct Node<T> {
    handle: Handle<T>,
    start: usize,
    end: usize,
    max_end: usize,
    height: i32,
    left: Option<NodeId<T>>,
    right: Option<NodeId<T>>,
}

/// Returns `true` if `[start, end)` intersects the query `[qstart, qend)`.
///
/// Two non-empty intervals intersect if they share a position. When either
/// interval is empty, touching counts: `[5, 5)` intersects `[2, 5)` and
/// `[5, 9)`, and the point query `[5, 5)` intersects `[2, 5)`.
pub fn overlaps(start: usize, end: usize, qstart: usize, qend: usize) -> bool {
    if start == end || qstart == qend {
        start <= qend && qstart <= end
    } else {
        start < qend && qstart < end
    }
}

fn shifted(value: usize, delta: isize) -> usize {
    let result = value as isize + delta;
    assert!(result >= 0, "Interval shifted to a negative coordinate");
    result as usize
}

/// An augmented balanced tree of `[start, end)` ranges keyed by handle.
#[derive(Debug, Clone)]
pub struct IntervalIndex<T> {
    nodes: Arena<Node<T>>,
    root: Option<NodeId<T>>,
}

impl<T> Default for IntervalIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntervalIndex<T> {
    /// Creates an empty index.
    pub fn new() -> Self {
        IntervalIndex {
            nodes: Arena::new(),
            root: None,
        }
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Maximum end coordinate over all stored intervals.
    pub fn max_end(&self) -> Option<usize> {
        self.root.map(|root| self.nodes[root].max_end)
    }

    fn height(&self, node: Option<NodeId<T>>) -> i32 {
        node.map_or(0, |id| self.nodes[id].height)
    }

    fn subtree_max(&self, node: Option<NodeId<T>>) -> Option<usize> {
        node.map(|id| self.nodes[id].max_end)
    }

    fn update(&mut self, id: NodeId<T>) {
        let (left, right, end) = {
            let node = &self.nodes[id];
            (node.left, node.right, node.end)
        };
        let height = 1 + self.height(left).max(self.height(right));
        let max_end = [Some(end), self.subtree_max(left), self.subtree_max(right)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(end);
        let node = &mut self.nodes[id];
        node.height = height;
        node.max_end = max_end;
    }

    fn balance_factor(&self, id: NodeId<T>) -> i32 {
        let node = &self.nodes[id];
        self.height(node.left) - self.height(node.right)
    }

    fn rotate_right(&mut self, id: NodeId<T>) -> NodeId<T> {
        let pivot = self.nodes[id].left.expect("rotate_right without a left child");
        self.nodes[id].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(id);
        self.update(id);
        self.update(pivot);
        pivot
    }

    fn rotate_left(&mut self, id: NodeId<T>) -> NodeId<T> {
        let pivot = self.nodes[id].right.expect("rotate_left without a right child");
        self.nodes[id].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(id);
        self.update(id);
        self.update(pivot);
        pivot
    }

    fn rebalance(&mut self, id: NodeId<T>) -> NodeId<T> {
        self.update(id);
        let balance = self.balance_factor(id);
        if balance > 1 {
            let left = self.nodes[id].left.expect("left-heavy node without a left child");
            if self.balance_factor(left) < 0 {
                let rotated = self.rotate_left(left);
                self.nodes[id].left = Some(rotated);
            }
            return self.rotate_right(id);
        }
        if balance < -1 {
            let right = self.nodes[id].right.expect("right-heavy node without a right child");
            if self.balance_factor(right) > 0 {
                let rotated = self.rotate_right(right);
                self.nodes[id].right = Some(rotated);
            }
            return self.rotate_left(id);
        }
        id
    }

    fn key(&self, id: NodeId<T>) -> (usize, Handle<T>) {
        let node = &self.nodes[id];
        (node.start, node.handle)
    }

    fn insert_at(&mut self, node: Option<NodeId<T>>, new: NodeId<T>) -> NodeId<T> {
        let Some(id) = node else {
            return new;
        };
        match self.key(new).cmp(&self.key(id)) {
            Ordering::Less => {
                let left = self.nodes[id].left;
                let child = self.insert_at(left, new);
                self.nodes[id].left = Some(child);
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                let child = self.insert_at(right, new);
                self.nodes[id].right = Some(child);
            }
            Ordering::Equal => panic!("Handle {:?} is already indexed", self.nodes[new].handle),
        }
        self.rebalance(id)
    }

    /// Inserts `handle` with the given range.
    ///
    /// # Panics
    ///
    /// Panics if the range is reversed or the handle is already indexed at the same start.
    pub fn insert(&mut self, handle: Handle<T>, range: Range<usize>) {
        assert!(range.start <= range.end, "Reversed interval {:?}", range);
        let new = self.nodes.allocate(Node {
            handle,
            start: range.start,
            end: range.end,
            max_end: range.end,
            height: 1,
            left: None,
            right: None,
        });
        let root = self.root;
        self.root = Some(self.insert_at(root, new));
    }

    // Detaches the minimum node of the subtree; returns (new subtree root, min node).
    fn take_min(&mut self, id: NodeId<T>) -> (Option<NodeId<T>>, NodeId<T>) {
        match self.nodes[id].left {
            None => (self.nodes[id].right, id),
            Some(left) => {
                let (child, min) = self.take_min(left);
                self.nodes[id].left = child;
                (Some(self.rebalance(id)), min)
            }
        }
    }

    fn erase_at(
        &mut self,
        node: Option<NodeId<T>>,
        key: (usize, Handle<T>),
        removed: &mut Option<NodeId<T>>,
    ) -> Option<NodeId<T>> {
        let id = node?;
        match key.cmp(&self.key(id)) {
            Ordering::Less => {
                let left = self.nodes[id].left;
                let child = self.erase_at(left, key, removed);
                self.nodes[id].left = child;
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                let child = self.erase_at(right, key, removed);
                self.nodes[id].right = child;
            }
            Ordering::Equal => {
                *removed = Some(id);
                let (left, right) = (self.nodes[id].left, self.nodes[id].right);
                return match (left, right) {
                    (None, None) => None,
                    (Some(child), None) | (None, Some(child)) => Some(child),
                    (Some(left), Some(right)) => {
                        let (rest, min) = self.take_min(right);
                        self.nodes[min].left = Some(left);
                        self.nodes[min].right = rest;
                        Some(self.rebalance(min))
                    }
                };
            }
        }
        Some(self.rebalance(id))
    }

    /// Removes `handle`, stored with start coordinate `start`, and returns its range.
    pub fn erase(&mut self, handle: Handle<T>, start: usize) -> Option<Range<usize>> {
        let mut removed = None;
        let root = self.root;
        self.root = self.erase_at(root, (start, handle), &mut removed);
        removed.map(|id| {
            let node = self.nodes.free(Unlinked::new(id));
            node.start..node.end
        })
    }

    /// Returns the range stored for `handle` at `start`, if any.
    pub fn get(&self, handle: Handle<T>, start: usize) -> Option<Range<usize>> {
        let key = (start, handle);
        let mut node = self.root;
        while let Some(id) = node {
            match key.cmp(&self.key(id)) {
                Ordering::Less => node = self.nodes[id].left,
                Ordering::Greater => node = self.nodes[id].right,
                Ordering::Equal => {
                    let n = &self.nodes[id];
                    return Some(n.start..n.end);
                }
            }
        }
        None
    }

    /// Iterates over the stored intervals intersecting `[start, end)`, in start order.
    pub fn intersect(&self, start: usize, end: usize) -> Intersect<'_, T> {
        let mut iter = Intersect {
            index: self,
            stack: Vec::new(),
            start,
            end,
        };
        iter.push_left(self.root);
        iter
    }

    /// Iterates over all stored intervals in start order.
    pub fn iter(&self) -> Intersect<'_, T> {
        self.intersect(0, usize::MAX)
    }

    /// All stored `(handle, range)` pairs in start order.
    pub fn entries(&self) -> Vec<(Handle<T>, Range<usize>)> {
        self.iter().collect()
    }

    /// Adds `delta` to every stored coordinate.
    pub fn shift(&mut self, delta: isize) {
        if delta == 0 {
            return;
        }
        for id in self.nodes.handles() {
            let node = &mut self.nodes[id];
            node.start = shifted(node.start, delta);
            node.end = shifted(node.end, delta);
            node.max_end = shifted(node.max_end, delta);
        }
    }

    fn build(&mut self, entries: &[(Handle<T>, Range<usize>)]) -> Option<NodeId<T>> {
        if entries.is_empty() {
            return None;
        }
        let mid = entries.len() / 2;
        let (handle, range) = entries[mid].clone();
        let left = self.build(&entries[..mid]);
        let right = self.build(&entries[mid + 1..]);
        let id = self.nodes.allocate(Node {
            handle,
            start: range.start,
            end: range.end,
            max_end: range.end,
            height: 1,
            left,
            right,
        });
        self.update(id);
        Some(id)
    }

    /// Builds an index from entries sorted by `(start, handle)`.
    pub fn from_sorted(entries: &[(Handle<T>, Range<usize>)]) -> Self {
        let mut index = IntervalIndex::new();
        index.root = index.build(entries);
        index
    }

    /// Splits the index at `breakpoint`.
    ///
    /// Entries starting before the breakpoint stay in `self`; the others are
    /// returned in a new index. Coordinates are not changed.
    ///
    /// # Panics
    ///
    /// Panics if an entry straddles the breakpoint. Callers cut such entries first.
    pub fn split(&mut self, breakpoint: usize) -> IntervalIndex<T> {
        let entries = self.entries();
        let at = entries.partition_point(|(_, range)| range.start < breakpoint);
        for (handle, range) in &entries[..at] {
            assert!(
                range.end <= breakpoint,
                "Entry {:?} {:?} straddles split point {}",
                handle,
                range,
                breakpoint
            );
        }
        *self = Self::from_sorted(&entries[..at]);
        Self::from_sorted(&entries[at..])
    }

    /// Moves all entries of `other` into this index.
    pub fn absorb(&mut self, other: IntervalIndex<T>) {
        for (handle, range) in other.entries() {
            self.insert(handle, range);
        }
    }

    /// Verifies ordering, balance, and the max-end augmentation.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        fn walk<T>(
            index: &IntervalIndex<T>,
            node: Option<NodeId<T>>,
            count: &mut usize,
        ) -> std::result::Result<(i32, Option<usize>), String> {
            let Some(id) = node else {
                return Ok((0, None));
            };
            *count += 1;
            let n = &index.nodes[id];
            let (lh, lmax) = walk(index, n.left, count)?;
            let (rh, rmax) = walk(index, n.right, count)?;
            if let Some(left) = n.left {
                if index.key(left) >= index.key(id) {
                    return Err(format!("Tree order violated at {:?}", n.handle));
                }
            }
            if let Some(right) = n.right {
                if index.key(right) <= index.key(id) {
                    return Err(format!("Tree order violated at {:?}", n.handle));
                }
            }
            if (lh - rh).abs() > 1 || n.height != 1 + lh.max(rh) {
                return Err(format!("Tree balance violated at {:?}", n.handle));
            }
            let expected = [Some(n.end), lmax, rmax].into_iter().flatten().max();
            if Some(n.max_end) != expected {
                return Err(format!("Max-end augmentation violated at {:?}", n.handle));
            }
            Ok((n.height, Some(n.max_end)))
        }

        let mut count = 0;
        walk(self, self.root, &mut count)?;
        if count != self.len() {
            return Err(format!("Tree reaches {} of {} nodes", count, self.len()));
        }
        let entries = self.entries();
        if entries.windows(2).any(|w| (w[0].1.start, w[0].0) >= (w[1].1.start, w[1].0)) {
            return Err("In-order traversal is not sorted".to_string());
        }
        Ok(())
    }
}

/// Iterator over intervals intersecting a query, see [`IntervalIndex::intersect`].
pub struct Intersect<'a, T> {
    index: &'a IntervalIndex<T>,
    stack: Vec<NodeId<T>>,
    start: usize,
    end: usize,
}

impl<'a, T> Intersect<'a, T> {
    fn push_left(&mut self, mut node: Option<NodeId<T>>) {
        while let Some(id) = node {
            let n = &self.index.nodes[id];
            if n.max_end < self.start {
                break;
            }
            self.stack.push(id);
            node = n.left;
        }
    }
}

impl<'a, T> Iterator for Intersect<'a, T> {
    type Item = (Handle<T>, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            let n = &self.index.nodes[id];
            if n.start > self.end {
                self.stack.clear();
                return None;
            }
            let (handle, start, end, right) = (n.handle, n.start, n.end, n.right);
            self.push_left(right);
            if overlaps(start, end, self.start, self.end) {
                return Some((handle, start..end));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item;

    fn handles(n: usize) -> Vec<Handle<Item>> {
        let mut arena = Arena::new();
        (0..n).map(|_| arena.allocate(Item)).collect()
    }

    fn hits(index: &IntervalIndex<Item>, start: usize, end: usize) -> Vec<Range<usize>> {
        index.intersect(start, end).map(|(_, range)| range).collect()
    }

    #[test]
    fn test_overlap_semantics() {
        assert!(overlaps(0, 5, 4, 6));
        assert!(!overlaps(0, 5, 5, 9));
        assert!(overlaps(5, 5, 2, 5));
        assert!(overlaps(5, 5, 5, 9));
        assert!(overlaps(2, 5, 5, 5));
        assert!(overlaps(2, 5, 2, 2));
        assert!(!overlaps(2, 5, 6, 6));
    }

    #[test]
    fn test_insert_and_intersect() {
        let h = handles(4);
        let mut index = IntervalIndex::new();
        index.insert(h[0], 0..10);
        index.insert(h[1], 5..15);
        index.insert(h[2], 20..30);
        index.insert(h[3], 12..12);

        assert_eq!(index.len(), 4);
        assert_eq!(hits(&index, 9, 11), vec![0..10, 5..15]);
        assert_eq!(hits(&index, 12, 13), vec![5..15, 12..12]);
        assert_eq!(hits(&index, 15, 20), Vec::<Range<usize>>::new());
        assert_eq!(hits(&index, 10, 10), vec![0..10, 5..15]);
        assert_eq!(hits(&index, 30, 30), vec![20..30]);
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_erase_keeps_balance() {
        let h = handles(64);
        let mut index = IntervalIndex::new();
        for (i, &handle) in h.iter().enumerate() {
            index.insert(handle, i * 2..i * 2 + 5);
        }
        assert!(index.validate().is_ok());

        for (i, &handle) in h.iter().enumerate().filter(|(i, _)| i % 3 == 0) {
            assert_eq!(index.erase(handle, i * 2), Some(i * 2..i * 2 + 5));
        }
        assert!(index.validate().is_ok());
        assert_eq!(index.len(), 64 - 22);
        assert_eq!(index.erase(h[0], 0), None);
        assert_eq!(index.max_end(), Some(62 * 2 + 5));
    }

    #[test]
    fn test_intersect_matches_linear_scan() {
        let h = handles(40);
        let mut index = IntervalIndex::new();
        let mut ranges = Vec::new();
        for (i, &handle) in h.iter().enumerate() {
            let start = (i * 37) % 101;
            let len = (i * 13) % 17;
            index.insert(handle, start..start + len);
            ranges.push((handle, start..start + len));
        }
        ranges.sort_by_key(|(handle, range)| (range.start, *handle));

        for (qs, qe) in [(0, 0), (3, 9), (50, 50), (17, 80), (100, 120)] {
            let expected: Vec<Range<usize>> = ranges
                .iter()
                .filter(|(_, r)| overlaps(r.start, r.end, qs, qe))
                .map(|(_, r)| r.clone())
                .collect();
            assert_eq!(hits(&index, qs, qe), expected, "query {}..{}", qs, qe);
        }
    }

    #[test]
    fn test_shift() {
        let h = handles(2);
        let mut index = IntervalIndex::new();
        index.insert(h[0], 0..4);
        index.insert(h[1], 4..8);
        index.shift(10);
        assert_eq!(hits(&index, 0, 100), vec![10..14, 14..18]);
        assert_eq!(index.max_end(), Some(18));
        assert_eq!(index.get(h[1], 14), Some(14..18));
        index.shift(-10);
        assert_eq!(index.get(h[0], 0), Some(0..4));
    }

    #[test]
    fn test_split() {
        let h = handles(4);
        let mut index = IntervalIndex::new();
        index.insert(h[0], 0..4);
        index.insert(h[1], 2..6);
        index.insert(h[2], 6..9);
        index.insert(h[3], 6..6);

        let right = index.split(6);
        assert_eq!(hits(&index, 0, 100), vec![0..4, 2..6]);
        assert_eq!(hits(&right, 0, 100), vec![6..9, 6..6]);
        assert!(index.validate().is_ok());
        assert!(right.validate().is_ok());
    }

    #[test]
    #[should_panic(expected = "straddles")]
    fn test_split_rejects_straddling_entry() {
        let h = handles(1);
        let mut index = IntervalIndex::new();
        index.insert(h[0], 0..10);
        let _ = index.split(5);
    }

    #[test]
    fn test_absorb() {
        let h = handles(3);
        let mut left = IntervalIndex::new();
        left.insert(h[0], 0..3);
        let mut right = IntervalIndex::new();
        right.insert(h[1], 0..2);
        right.insert(h[2], 1..1);
        right.shift(3);
        left.absorb(right);
        assert_eq!(hits(&left, 0, 10), vec![0..3, 3..5, 4..4]);
    }
}
