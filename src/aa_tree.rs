//! AaTree: a sentinel-based AA tree keyed by `u32`, storing caller-created
//! nodes in a generational arena.
//!
//! Nodes are created unattached with [`AaTree::allocate`] and linked in by
//! [`AaTree::insert`]. The tree owns only structure (key, level, children);
//! a node's payload leaves through the destructor when the node is removed
//! or the tree is torn down.
//!
//! One reserved arena slot is the sentinel: level 0, both children pointing
//! at itself. Every empty subtree is the sentinel, so rebalancing never
//! branches on a missing child.

use crate::destructor::{Destructor, Keep};
use crate::error::InsertError;
use core::cmp::Ordering;
use core::mem;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tracing::trace;

new_key_type! {
    struct NodeKey;
}

/// Stable, generational reference to a node. A handle never resolves to a
/// different node after its own node has been removed or freed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle(NodeKey);

#[derive(Debug)]
struct Links {
    key: u32,
    level: u32,
    left: NodeKey,
    right: NodeKey,
    attached: bool,
}

pub struct AaTree<T, D = Keep>
where
    D: Destructor<T>,
{
    links: SlotMap<NodeKey, Links>,
    payloads: SecondaryMap<NodeKey, T>,
    null: NodeKey,
    root: NodeKey,
    size: usize,
    destructor: D,
}

/// Transient state of one `remove` call.
struct Removal {
    key: u32,
    // Deepest node visited so far.
    last: NodeKey,
    // Most recent node where the descent went right; the match if the key
    // is present.
    deleted: NodeKey,
    // (matched node, successor) until the successor has taken over the
    // matched node's position.
    stand_in: Option<(NodeKey, NodeKey)>,
    removed: Option<NodeKey>,
}

impl<T> AaTree<T> {
    pub fn new() -> Self {
        Self::with_destructor(Keep)
    }
}

impl<T> Default for AaTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, D> AaTree<T, D>
where
    D: Destructor<T>,
{
    pub fn with_destructor(destructor: D) -> Self {
        let mut links = SlotMap::with_key();
        let null = links.insert_with_key(|k| Links {
            key: 0,
            level: 0,
            left: k,
            right: k,
            attached: false,
        });
        Self {
            links,
            payloads: SecondaryMap::new(),
            null,
            root: null,
            size: 0,
            destructor,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Create an unattached node. It joins the tree only through `insert`.
    pub fn allocate(&mut self, payload: T) -> NodeHandle {
        let null = self.null;
        let k = self.links.insert(Links {
            key: 0,
            level: 0,
            left: null,
            right: null,
            attached: false,
        });
        self.payloads.insert(k, payload);
        NodeHandle(k)
    }

    /// Reclaim an unattached node without running the destructor. Attached
    /// nodes and stale handles yield `None`.
    pub fn free(&mut self, node: NodeHandle) -> Option<T> {
        match self.links.get(node.0) {
            Some(l) if !l.attached && node.0 != self.null => {}
            _ => return None,
        }
        self.links.remove(node.0);
        self.payloads.remove(node.0)
    }

    pub fn get(&self, node: NodeHandle) -> Option<&T> {
        self.payloads.get(node.0)
    }

    pub fn get_mut(&mut self, node: NodeHandle) -> Option<&mut T> {
        self.payloads.get_mut(node.0)
    }

    /// Key of an attached node.
    pub fn key_of(&self, node: NodeHandle) -> Option<u32> {
        self.links
            .get(node.0)
            .filter(|l| l.attached)
            .map(|l| l.key)
    }

    pub fn is_attached(&self, node: NodeHandle) -> bool {
        self.key_of(node).is_some()
    }

    pub fn find(&self, key: u32) -> Option<NodeHandle> {
        let mut t = self.root;
        while t != self.null {
            let l = &self.links[t];
            t = match key.cmp(&l.key) {
                Ordering::Less => l.left,
                Ordering::Greater => l.right,
                Ordering::Equal => return Some(NodeHandle(t)),
            };
        }
        None
    }

    pub fn contains_key(&self, key: u32) -> bool {
        self.find(key).is_some()
    }

    /// Node with the smallest key.
    pub fn first(&self) -> Option<NodeHandle> {
        self.spine_end(|l| l.left)
    }

    /// Node with the largest key.
    pub fn last(&self) -> Option<NodeHandle> {
        self.spine_end(|l| l.right)
    }

    fn spine_end(&self, step: impl Fn(&Links) -> NodeKey) -> Option<NodeHandle> {
        if self.root == self.null {
            return None;
        }
        let mut t = self.root;
        loop {
            let next = step(&self.links[t]);
            if next == self.null {
                return Some(NodeHandle(t));
            }
            t = next;
        }
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        self.height_of(self.root)
    }

    fn height_of(&self, t: NodeKey) -> usize {
        if t == self.null {
            return 0;
        }
        let l = &self.links[t];
        1 + self.height_of(l.left).max(self.height_of(l.right))
    }

    /// Link `node` into the tree under `key`.
    ///
    /// A key that is already present is rejected with
    /// [`InsertError::DuplicateKey`]; the tree and the offered node are left
    /// exactly as they were, and the node can be reused or freed.
    pub fn insert(&mut self, key: u32, node: NodeHandle) -> Result<(), InsertError> {
        let n = node.0;
        match self.links.get(n) {
            None => return Err(InsertError::StaleHandle),
            Some(_) if n == self.null => return Err(InsertError::StaleHandle),
            Some(l) if l.attached => return Err(InsertError::AlreadyAttached),
            Some(_) => {}
        }
        self.root = self.insert_at(self.root, key, n)?;
        Ok(())
    }

    fn insert_at(&mut self, t: NodeKey, key: u32, n: NodeKey) -> Result<NodeKey, InsertError> {
        if t == self.null {
            let null = self.null;
            let l = &mut self.links[n];
            l.key = key;
            l.level = 1;
            l.left = null;
            l.right = null;
            l.attached = true;
            self.size += 1;
            return Ok(n);
        }

        match key.cmp(&self.links[t].key) {
            Ordering::Less => {
                let left = self.links[t].left;
                let sub = self.insert_at(left, key, n)?;
                self.links[t].left = sub;
            }
            Ordering::Greater => {
                let right = self.links[t].right;
                let sub = self.insert_at(right, key, n)?;
                self.links[t].right = sub;
            }
            Ordering::Equal => return Err(InsertError::DuplicateKey { key }),
        }

        let t = self.skew(t);
        Ok(self.split(t))
    }

    /// Unlink the node holding `key` and release its payload through the
    /// destructor. Returns the payload when the destructor hands it back.
    pub fn remove(&mut self, key: u32) -> Option<T> {
        let mut r = Removal {
            key,
            last: self.null,
            deleted: self.null,
            stand_in: None,
            removed: None,
        };
        self.root = self.remove_at(self.root, &mut r);
        debug_assert!(r.stand_in.is_none());

        // Structure is consistent again before caller code runs.
        let gone = r.removed?;
        self.links.remove(gone);
        let payload = self.payloads.remove(gone)?;
        self.destructor.release(payload)
    }

    fn remove_at(&mut self, t: NodeKey, r: &mut Removal) -> NodeKey {
        if t == self.null {
            return t;
        }

        r.last = t;
        if r.key < self.links[t].key {
            let left = self.links[t].left;
            let sub = self.remove_at(left, r);
            self.links[t].left = sub;
        } else {
            r.deleted = t;
            let right = self.links[t].right;
            let sub = self.remove_at(right, r);
            self.links[t].right = sub;
        }

        if t == r.last && r.deleted != self.null && self.links[r.deleted].key == r.key {
            // `t` is the matched node or its in-order successor; either way
            // its left child is the sentinel and its right subtree replaces it.
            let target = mem::replace(&mut r.deleted, self.null);
            if target != t {
                r.stand_in = Some((target, t));
            }
            self.links[target].attached = false;
            r.removed = Some(target);
            self.size -= 1;
            return self.links[t].right;
        }

        let mut t = t;
        if let Some((target, successor)) = r.stand_in {
            if target == t {
                r.stand_in = None;
                let (level, left, right) = {
                    let l = &self.links[target];
                    (l.level, l.left, l.right)
                };
                let s = &mut self.links[successor];
                s.level = level;
                s.left = left;
                s.right = right;
                t = successor;
            }
        }

        let level = self.links[t].level;
        let left = self.links[t].left;
        let right = self.links[t].right;
        if self.links[left].level + 1 < level || self.links[right].level + 1 < level {
            let level = level - 1;
            self.links[t].level = level;
            if self.links[right].level > level {
                self.links[right].level = level;
            }

            t = self.skew(t);
            let r1 = self.links[t].right;
            let r1 = self.skew(r1);
            self.links[t].right = r1;
            let r2 = self.links[r1].right;
            let r2 = self.skew(r2);
            self.links[r1].right = r2;

            t = self.split(t);
            let r1 = self.links[t].right;
            let r1 = self.split(r1);
            self.links[t].right = r1;
        }
        t
    }

    /// Rotate right when the left child sits on the same level.
    fn skew(&mut self, t: NodeKey) -> NodeKey {
        if t == self.null {
            return t;
        }
        let l = self.links[t].left;
        if self.links[l].level != self.links[t].level {
            return t;
        }
        self.links[t].left = self.links[l].right;
        self.links[l].right = t;
        l
    }

    /// Rotate left and raise the new root when two right links share a level.
    fn split(&mut self, t: NodeKey) -> NodeKey {
        if t == self.null {
            return t;
        }
        let r = self.links[t].right;
        let rr = self.links[r].right;
        if self.links[rr].level != self.links[t].level {
            return t;
        }
        self.links[t].right = self.links[r].left;
        self.links[r].left = t;
        self.links[r].level += 1;
        r
    }

    /// In-order iteration over `(key, handle, payload)`.
    pub fn iter(&self) -> Iter<'_, T, D> {
        let mut it = Iter {
            tree: self,
            stack: Vec::new(),
        };
        it.push_left(self.root);
        it
    }

    /// Release every attached node through the destructor, children before
    /// parents. Unattached nodes are left in the arena.
    pub fn clear(&mut self) {
        trace!(nodes = self.size, "releasing AA tree nodes");
        let root = mem::replace(&mut self.root, self.null);
        self.release_subtree(root);
        self.size = 0;
    }

    fn release_subtree(&mut self, t: NodeKey) {
        if t == self.null {
            return;
        }
        let (left, right) = {
            let l = &self.links[t];
            (l.left, l.right)
        };
        self.release_subtree(left);
        self.release_subtree(right);
        self.links.remove(t);
        if let Some(payload) = self.payloads.remove(t) {
            drop(self.destructor.release(payload));
        }
    }

    /// Tear the tree down, releasing every attached node.
    pub fn destroy(self) {
        drop(self);
    }
}

impl<T, D> Drop for AaTree<T, D>
where
    D: Destructor<T>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct Iter<'a, T, D>
where
    D: Destructor<T>,
{
    tree: &'a AaTree<T, D>,
    stack: Vec<NodeKey>,
}

impl<T, D> Iter<'_, T, D>
where
    D: Destructor<T>,
{
    fn push_left(&mut self, mut t: NodeKey) {
        while t != self.tree.null {
            self.stack.push(t);
            t = self.tree.links[t].left;
        }
    }
}

impl<'a, T, D> Iterator for Iter<'a, T, D>
where
    D: Destructor<T>,
{
    type Item = (u32, NodeHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.stack.pop()?;
        let tree = self.tree;
        let l = &tree.links[t];
        self.push_left(l.right);
        let payload = tree.payloads.get(t)?;
        Some((l.key, NodeHandle(t), payload))
    }
}

#[cfg(test)]
impl<T, D> AaTree<T, D>
where
    D: Destructor<T>,
{
    /// Check the AA balance law and search order for the whole tree.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let null = &self.links[self.null];
        if null.level != 0 || null.left != self.null || null.right != self.null {
            return Err("sentinel must be level 0 and self-referential".into());
        }
        let count = self.check_subtree(self.root, None, None)?;
        if count != self.size {
            return Err(format!("size {} but {} reachable nodes", self.size, count));
        }
        Ok(())
    }

    fn check_subtree(&self, t: NodeKey, lo: Option<u32>, hi: Option<u32>) -> Result<usize, String> {
        if t == self.null {
            return Ok(0);
        }
        let n = &self.links[t];
        if !n.attached {
            return Err(format!("node {} reachable but not attached", n.key));
        }
        if lo.is_some_and(|lo| n.key <= lo) || hi.is_some_and(|hi| n.key >= hi) {
            return Err(format!("key {} out of order", n.key));
        }
        let left = &self.links[n.left];
        let right = &self.links[n.right];
        let right_right = &self.links[right.right];
        if left.level >= n.level {
            return Err(format!("left child of {} not below its level", n.key));
        }
        if right.level > n.level {
            return Err(format!("right child of {} above its level", n.key));
        }
        if n.right != self.null && right_right.level >= n.level {
            return Err(format!("right-right grandchild of {} on its level", n.key));
        }
        if n.left == self.null && n.right == self.null && n.level != 1 {
            return Err(format!("leaf {} at level {}", n.key, n.level));
        }
        Ok(1 + self.check_subtree(n.left, lo, Some(n.key))?
            + self.check_subtree(n.right, Some(n.key), hi)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destructor::DestroyWith;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tree_with(keys: &[u32]) -> AaTree<u32> {
        let mut t = AaTree::new();
        for &k in keys {
            let n = t.allocate(k * 100);
            t.insert(k, n).unwrap();
            t.check_invariants().unwrap();
        }
        t
    }

    fn keys(t: &AaTree<u32>) -> Vec<u32> {
        t.iter().map(|(k, _, _)| k).collect()
    }

    /// Invariant: the sentinel starts as an empty, level-0 self loop.
    #[test]
    fn empty_tree() {
        let t: AaTree<u32> = AaTree::new();
        t.check_invariants().unwrap();
        assert!(t.is_empty());
        assert_eq!(t.find(1), None);
        assert_eq!(t.first(), None);
        assert_eq!(t.last(), None);
        assert_eq!(t.height(), 0);
    }

    #[test]
    fn single_node_is_level_one_root() {
        let t = tree_with(&[42]);
        let root = t.root;
        assert_eq!(t.links[root].level, 1);
        assert_eq!(t.links[root].left, t.null);
        assert_eq!(t.links[root].right, t.null);
    }

    /// Invariant: ascending inserts are skewed/split into a balanced shape.
    #[test]
    fn ascending_inserts_rebalance() {
        let t = tree_with(&[1, 2, 3]);
        let root = t.root;
        assert_eq!(t.links[root].key, 2);
        assert_eq!(t.links[root].level, 2);
        let t = tree_with(&(1..=1000).collect::<Vec<_>>());
        assert!(t.height() <= 20, "height {}", t.height());
    }

    /// Invariant: the 10,20,5,6,15 scenario finds, orders and removes as expected.
    #[test]
    fn mixed_insert_then_remove_root() {
        let mut t = tree_with(&[10, 20, 5, 6, 15]);
        assert!(t.find(6).is_some());
        assert!(t.find(99).is_none());
        assert_eq!(keys(&t), vec![5, 6, 10, 15, 20]);

        assert_eq!(t.remove(10), Some(1000));
        t.check_invariants().unwrap();
        assert!(t.find(10).is_none());
        assert_eq!(t.len(), 4);
        assert_eq!(keys(&t), vec![5, 6, 15, 20]);
    }

    /// Invariant: handles stay bound to their own key and payload when a
    /// successor moves into a removed node's position.
    #[test]
    fn successor_keeps_identity_after_removal() {
        let mut t = tree_with(&[10, 20, 5, 6, 15]);
        let h15 = t.find(15).unwrap();
        t.remove(10);
        assert_eq!(t.find(15), Some(h15));
        assert_eq!(t.key_of(h15), Some(15));
        assert_eq!(t.get(h15), Some(&1500));
        for (k, h, v) in t.iter() {
            assert_eq!(t.key_of(h), Some(k));
            assert_eq!(*v, k * 100);
        }
    }

    /// Invariant: duplicates are rejected without touching size or structure.
    #[test]
    fn duplicate_insert_rejected() {
        let mut t = tree_with(&[1, 2, 3]);
        let before = keys(&t);
        let n = t.allocate(999);
        assert_eq!(t.insert(2, n), Err(InsertError::DuplicateKey { key: 2 }));
        assert_eq!(t.len(), 3);
        assert_eq!(keys(&t), before);
        assert!(!t.is_attached(n));
        assert_eq!(t.get(t.find(2).unwrap()), Some(&200));
        // The rejected node is reusable under a fresh key.
        t.insert(4, n).unwrap();
        assert_eq!(t.get(t.find(4).unwrap()), Some(&999));
        t.check_invariants().unwrap();
    }

    #[test]
    fn misuse_of_handles_rejected() {
        let mut t = tree_with(&[1]);
        let attached = t.find(1).unwrap();
        assert_eq!(t.insert(5, attached), Err(InsertError::AlreadyAttached));
        assert_eq!(t.free(attached), None);

        let loose = t.allocate(7);
        assert_eq!(t.free(loose), Some(7));
        assert_eq!(t.insert(5, loose), Err(InsertError::StaleHandle));
        assert_eq!(t.insert(5, NodeHandle(t.null)), Err(InsertError::StaleHandle));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn removing_absent_key_is_noop() {
        let mut t = tree_with(&[3, 1, 2]);
        assert_eq!(t.remove(7), None);
        assert_eq!(t.len(), 3);
        t.check_invariants().unwrap();
        let mut empty: AaTree<u32> = AaTree::new();
        assert_eq!(empty.remove(0), None);
    }

    /// Invariant: removing every key in several orders keeps the balance law.
    #[test]
    fn remove_all_in_various_orders() {
        let n = 200u32;
        let orders: Vec<Vec<u32>> = vec![
            (0..n).collect(),
            (0..n).rev().collect(),
            (0..n).map(|i| (i * 77) % n).collect(),
        ];
        for order in orders {
            let mut t = tree_with(&(0..n).collect::<Vec<_>>());
            for (removed, k) in order.iter().enumerate() {
                assert_eq!(t.remove(*k), Some(k * 100));
                t.check_invariants().unwrap();
                assert_eq!(t.len(), n as usize - removed - 1);
                assert!(t.find(*k).is_none());
            }
            assert!(t.is_empty());
            assert_eq!(t.links.len(), 1, "only the sentinel remains");
        }
    }

    #[test]
    fn first_and_last() {
        let t = tree_with(&[8, 3, 12, 1, 9]);
        assert_eq!(t.first().and_then(|h| t.key_of(h)), Some(1));
        assert_eq!(t.last().and_then(|h| t.key_of(h)), Some(12));
    }

    /// Invariant: the destructor runs once per removed node, then once per
    /// remaining attached node at teardown, never for unattached nodes.
    #[test]
    fn destructor_call_accounting() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut t = AaTree::with_destructor(DestroyWith(move |v: u32| sink.borrow_mut().push(v)));
        for k in [4, 2, 6, 1, 3] {
            let n = t.allocate(k);
            t.insert(k, n).unwrap();
        }
        let _loose = t.allocate(99);
        assert_eq!(t.remove(2), None);
        assert_eq!(*log.borrow(), vec![2]);
        t.destroy();
        let mut seen = log.borrow().clone();
        assert_eq!(seen.len(), 5);
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 6]);
    }

    /// Invariant: teardown visits children before their parent.
    #[test]
    fn teardown_is_post_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut t = AaTree::with_destructor(DestroyWith(move |v: u32| sink.borrow_mut().push(v)));
        for k in [1, 2, 3] {
            let n = t.allocate(k);
            t.insert(k, n).unwrap();
        }
        drop(t);
        assert_eq!(*log.borrow(), vec![1, 3, 2]);
    }

    #[test]
    fn get_mut_updates_payload() {
        let mut t = tree_with(&[5]);
        let h = t.find(5).unwrap();
        *t.get_mut(h).unwrap() += 1;
        assert_eq!(t.get(h), Some(&501));
    }
}
