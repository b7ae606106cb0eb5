use core::borrow::Borrow;
use core::cmp::Ordering;
use core::mem;

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{Color, RBNode};

/// The core Red-Black tree implementation backing `RBTreeMap`.
///
/// Nodes are owned by the arena and linked by handles. `root` is `None` for
/// the empty tree; every other absent link is likewise `None`, so there is no
/// sentinel node and no shared scratch state anywhere in the structure.
pub(crate) struct RawRBTreeMap<K, V> {
    /// Arena storing all tree nodes.
    nodes: Arena<RBNode<K, V>>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
}

impl<K, V> RawRBTreeMap<K, V> {
    /// Creates a new, empty tree.
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
        }
    }

    /// Creates a new tree with the specified capacity.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(capacity),
            root: None,
        }
    }

    /// Returns the number of key-value pairs in the tree.
    ///
    /// O(1): the root's cached subtree size covers the whole tree.
    pub(crate) fn len(&self) -> usize {
        self.size_of(self.root)
    }

    /// Returns true if the tree contains no elements.
    pub(crate) const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the capacity of the tree.
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Clears all elements from the tree.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Returns the height of the tree: the number of levels on the longest
    /// root-to-leaf path, 0 for the empty tree.
    ///
    /// Computed by a breadth-first walk, O(n) per call.
    pub(crate) fn height(&self) -> usize {
        let Some(root) = self.root else { return 0 };

        let mut queue = VecDeque::new();
        queue.push_back(root);
        let mut height = 0;

        while !queue.is_empty() {
            height += 1;
            // Drain exactly one level, enqueueing the next.
            for _ in 0..queue.len() {
                let handle = queue.pop_front().expect("`RawRBTreeMap::height()` - level underflow!");
                let node = self.node(handle);
                if let Some(left) = node.left() {
                    queue.push_back(left);
                }
                if let Some(right) = node.right() {
                    queue.push_back(right);
                }
            }
        }

        height
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &RBNode<K, V> {
        self.nodes.get(handle)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, handle: Handle) -> &mut RBNode<K, V> {
        self.nodes.get_mut(handle)
    }

    /// Reads a link's color, treating an absent node as black.
    #[inline]
    fn color_of(&self, handle: Option<Handle>) -> Color {
        handle.map_or(Color::Black, |h| self.node(h).color())
    }

    /// Reads a link's cached subtree size, treating an absent node as empty.
    #[inline]
    fn size_of(&self, handle: Option<Handle>) -> usize {
        handle.map_or(0, |h| self.node(h).size())
    }

    #[inline]
    fn left_of(&self, handle: Handle) -> Option<Handle> {
        self.node(handle).left()
    }

    #[inline]
    fn right_of(&self, handle: Handle) -> Option<Handle> {
        self.node(handle).right()
    }

    #[inline]
    fn parent_of(&self, handle: Handle) -> Option<Handle> {
        self.node(handle).parent()
    }

    /// Returns the handle of the smallest key, if any.
    pub(crate) fn first(&self) -> Option<Handle> {
        self.root.map(|root| self.min_from(root))
    }

    /// Returns the handle of the largest key, if any.
    pub(crate) fn last(&self) -> Option<Handle> {
        self.root.map(|root| self.max_from(root))
    }

    /// Descends left from `handle` to the smallest key in its subtree.
    fn min_from(&self, handle: Handle) -> Handle {
        let mut current = handle;
        while let Some(left) = self.left_of(current) {
            current = left;
        }
        current
    }

    /// Descends right from `handle` to the largest key in its subtree.
    fn max_from(&self, handle: Handle) -> Handle {
        let mut current = handle;
        while let Some(right) = self.right_of(current) {
            current = right;
        }
        current
    }

    /// Returns the handle of the next key in ascending order.
    ///
    /// Either the minimum of the right subtree, or the first ancestor reached
    /// from its left side on the climb back up.
    pub(crate) fn successor(&self, handle: Handle) -> Option<Handle> {
        if let Some(right) = self.right_of(handle) {
            return Some(self.min_from(right));
        }

        let mut child = handle;
        let mut cursor = self.parent_of(handle);
        while let Some(parent) = cursor {
            if self.left_of(parent) == Some(child) {
                return Some(parent);
            }
            child = parent;
            cursor = self.parent_of(parent);
        }
        None
    }

    /// Returns the handle of the previous key in ascending order.
    pub(crate) fn predecessor(&self, handle: Handle) -> Option<Handle> {
        if let Some(left) = self.left_of(handle) {
            return Some(self.max_from(left));
        }

        let mut child = handle;
        let mut cursor = self.parent_of(handle);
        while let Some(parent) = cursor {
            if self.right_of(parent) == Some(child) {
                return Some(parent);
            }
            child = parent;
            cursor = self.parent_of(parent);
        }
        None
    }

    /// Returns the element at the given sorted position, if in bounds.
    ///
    /// O(log n): descends through the cached subtree sizes.
    pub(crate) fn get_by_rank(&self, rank: usize) -> Option<Handle> {
        if rank >= self.len() {
            return None;
        }

        let mut current = self.root.expect("`RawRBTreeMap::get_by_rank()` - rank in bounds on an empty tree!");
        let mut remaining = rank;
        loop {
            let node = self.node(current);
            let left_size = self.size_of(node.left());
            match remaining.cmp(&left_size) {
                Ordering::Less => {
                    current = node.left().expect("`RawRBTreeMap::get_by_rank()` - size fields inconsistent!");
                }
                Ordering::Equal => return Some(current),
                Ordering::Greater => {
                    remaining -= left_size + 1;
                    current = node.right().expect("`RawRBTreeMap::get_by_rank()` - size fields inconsistent!");
                }
            }
        }
    }

    /// Collects all handles in breadth-first (level) order.
    pub(crate) fn level_order(&self) -> Vec<Handle> {
        let mut handles = Vec::with_capacity(self.len());
        let Some(root) = self.root else { return handles };

        let mut queue = VecDeque::new();
        queue.push_back(root);
        while let Some(handle) = queue.pop_front() {
            handles.push(handle);
            let node = self.node(handle);
            if let Some(left) = node.left() {
                queue.push_back(left);
            }
            if let Some(right) = node.right() {
                queue.push_back(right);
            }
        }

        handles
    }

    /// Detaches every element in ascending order, leaving the tree empty.
    ///
    /// O(n): walks the finished tree once instead of rebalancing per removal.
    pub(crate) fn drain_to_vec(&mut self) -> Vec<(K, V)> {
        let mut handles = Vec::with_capacity(self.len());
        let mut cursor = self.first();
        while let Some(handle) = cursor {
            cursor = self.successor(handle);
            handles.push(handle);
        }

        self.root = None;
        handles.into_iter().map(|handle| self.nodes.take(handle).into_parts()).collect()
    }

    /// Removes the smallest key, if any.
    pub(crate) fn pop_first(&mut self) -> Option<(K, V)> {
        let handle = self.first()?;
        Some(self.remove_node(handle))
    }

    /// Removes the largest key, if any.
    pub(crate) fn pop_last(&mut self) -> Option<(K, V)> {
        let handle = self.last()?;
        Some(self.remove_node(handle))
    }

    /// Validates the cached subtree sizes and the parent back-links.
    ///
    /// Offline diagnostic, never invoked by the operations themselves.
    pub(crate) fn sizes_consistent(&self) -> bool {
        if let Some(root) = self.root
            && self.parent_of(root).is_some()
        {
            return false;
        }
        self.check_subtree(self.root).is_some()
    }

    /// Returns the verified size of a subtree, or `None` on any mismatch.
    fn check_subtree(&self, handle: Option<Handle>) -> Option<usize> {
        let Some(handle) = handle else { return Some(0) };
        let node = self.node(handle);

        for child in [node.left(), node.right()].into_iter().flatten() {
            if self.parent_of(child) != Some(handle) {
                return None;
            }
        }

        let total = 1 + self.check_subtree(node.left())? + self.check_subtree(node.right())?;
        (node.size() == total).then_some(total)
    }

    /// Validates the Red-Black coloring invariants: black root, no red node
    /// with a red parent, and an equal black count on every downward path.
    ///
    /// Checked by a recursive black-height computation independent of the
    /// fixup code. Offline diagnostic.
    pub(crate) fn is_red_black(&self) -> bool {
        if self.color_of(self.root) == Color::Red {
            return false;
        }
        self.black_height(self.root).is_some()
    }

    /// Returns the black-height of a subtree, or `None` on any violation.
    fn black_height(&self, handle: Option<Handle>) -> Option<usize> {
        let Some(handle) = handle else { return Some(1) };
        let node = self.node(handle);

        if node.color() == Color::Red
            && (self.color_of(node.left()) == Color::Red || self.color_of(node.right()) == Color::Red)
        {
            return None;
        }

        let left = self.black_height(node.left())?;
        let right = self.black_height(node.right())?;
        (left == right).then(|| left + usize::from(node.color() == Color::Black))
    }

    // ── Structural surgery ───────────────────────────────────────────────────

    /// Replaces the subtree rooted at `u` with the subtree rooted at `v` in
    /// `u`'s parent (or the tree root). `u`'s own links are left untouched.
    fn transplant(&mut self, u: Handle, v: Option<Handle>) {
        let up = self.parent_of(u);
        match up {
            None => self.root = v,
            Some(parent) => {
                if self.left_of(parent) == Some(u) {
                    self.node_mut(parent).set_left(v);
                } else {
                    self.node_mut(parent).set_right(v);
                }
            }
        }
        if let Some(v) = v {
            self.node_mut(v).set_parent(up);
        }
    }

    /// Increments the cached size of every proper ancestor of `handle`.
    fn grow_above(&mut self, handle: Handle) {
        let mut cursor = self.parent_of(handle);
        while let Some(ancestor) = cursor {
            let node = self.node_mut(ancestor);
            node.set_size(node.size() + 1);
            cursor = node.parent();
        }
    }

    /// Decrements the cached size of every proper ancestor of `handle`.
    fn shrink_above(&mut self, handle: Handle) {
        let mut cursor = self.parent_of(handle);
        while let Some(ancestor) = cursor {
            let node = self.node_mut(ancestor);
            node.set_size(node.size() - 1);
            cursor = node.parent();
        }
    }

    /// Rotates the subtree rooted at `handle` to the left, promoting its
    /// right child. Preserves the in-order sequence and all size caches.
    fn rotate_left(&mut self, handle: Handle) {
        let promoted = self.right_of(handle).expect("`RawRBTreeMap::rotate_left()` - no right child to promote!");

        // The promoted node's inner subtree crosses over to the demoted node.
        let inner = self.left_of(promoted);
        self.node_mut(handle).set_right(inner);
        if let Some(inner) = inner {
            self.node_mut(inner).set_parent(Some(handle));
        }

        // Re-point the demoted node's former parent, or the root.
        let parent = self.parent_of(handle);
        self.node_mut(promoted).set_parent(parent);
        match parent {
            None => self.root = Some(promoted),
            Some(parent) => {
                if self.left_of(parent) == Some(handle) {
                    self.node_mut(parent).set_left(Some(promoted));
                } else {
                    self.node_mut(parent).set_right(Some(promoted));
                }
            }
        }

        self.node_mut(promoted).set_left(Some(handle));
        self.node_mut(handle).set_parent(Some(promoted));

        // The promoted node now covers the demoted node's former subtree; the
        // demoted node is recomputed from its new children.
        let covered = self.node(handle).size();
        self.node_mut(promoted).set_size(covered);
        let recomputed = 1 + self.size_of(self.left_of(handle)) + self.size_of(self.right_of(handle));
        self.node_mut(handle).set_size(recomputed);
    }

    /// Rotates the subtree rooted at `handle` to the right, promoting its
    /// left child. Mirror image of [`rotate_left`](Self::rotate_left).
    fn rotate_right(&mut self, handle: Handle) {
        let promoted = self.left_of(handle).expect("`RawRBTreeMap::rotate_right()` - no left child to promote!");

        let inner = self.right_of(promoted);
        self.node_mut(handle).set_left(inner);
        if let Some(inner) = inner {
            self.node_mut(inner).set_parent(Some(handle));
        }

        let parent = self.parent_of(handle);
        self.node_mut(promoted).set_parent(parent);
        match parent {
            None => self.root = Some(promoted),
            Some(parent) => {
                if self.right_of(parent) == Some(handle) {
                    self.node_mut(parent).set_right(Some(promoted));
                } else {
                    self.node_mut(parent).set_left(Some(promoted));
                }
            }
        }

        self.node_mut(promoted).set_right(Some(handle));
        self.node_mut(handle).set_parent(Some(promoted));

        let covered = self.node(handle).size();
        self.node_mut(promoted).set_size(covered);
        let recomputed = 1 + self.size_of(self.left_of(handle)) + self.size_of(self.right_of(handle));
        self.node_mut(handle).set_size(recomputed);
    }

    /// Removes the node at `handle` from the tree and returns its pair.
    ///
    /// Three structural cases: leaf unlink, single-child splice, and the
    /// two-children case, which transplants the in-order successor into the
    /// removed node's position (the successor has no left child by
    /// construction, so its own removal reduces to the first two cases).
    /// If the physically detached position was black, the deletion fixup
    /// repairs the resulting black-height deficiency.
    pub(crate) fn remove_node(&mut self, handle: Handle) -> (K, V) {
        let z = handle;
        let z_left = self.left_of(z);
        let z_right = self.right_of(z);

        let removed_color;
        let x;
        let x_parent;

        match (z_left, z_right) {
            (None, _) => {
                removed_color = self.node(z).color();
                x = z_right;
                x_parent = self.parent_of(z);
                self.shrink_above(z);
                self.transplant(z, z_right);
            }
            (_, None) => {
                removed_color = self.node(z).color();
                x = z_left;
                x_parent = self.parent_of(z);
                self.shrink_above(z);
                self.transplant(z, z_left);
            }
            (Some(z_left), Some(z_right)) => {
                // In-order successor: minimum of the right subtree.
                let y = self.min_from(z_right);
                removed_color = self.node(y).color();
                x = self.right_of(y);

                // Every subtree between the root and the successor's old
                // position loses one element; that includes `z`, whose
                // adjusted size the successor inherits below.
                self.shrink_above(y);

                if self.parent_of(y) == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.parent_of(y);
                    self.transplant(y, x);
                    self.node_mut(y).set_right(Some(z_right));
                    self.node_mut(z_right).set_parent(Some(y));
                }

                self.transplant(z, Some(y));
                self.node_mut(y).set_left(Some(z_left));
                self.node_mut(z_left).set_parent(Some(y));

                let color = self.node(z).color();
                let size = self.node(z).size();
                let successor = self.node_mut(y);
                successor.set_color(color);
                successor.set_size(size);
            }
        }

        if removed_color == Color::Black {
            self.remove_fixup(x, x_parent);
        }

        self.nodes.take(z).into_parts()
    }

    /// Repairs the Red-Black invariants after a red leaf was attached.
    ///
    /// Iterative upward walk bounded by tree height: a red uncle recolors and
    /// climbs; a black uncle converts the inner shape to the outer one and
    /// resolves with a single rotation at the grandparent. The root is forced
    /// black unconditionally afterwards.
    fn insert_fixup(&mut self, handle: Handle) {
        let mut x = handle;

        loop {
            let Some(p) = self.parent_of(x) else { break };
            if self.node(p).color() == Color::Black {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let Some(g) = self.parent_of(p) else { break };

            if self.left_of(g) == Some(p) {
                match self.right_of(g) {
                    Some(uncle) if self.node(uncle).color() == Color::Red => {
                        self.node_mut(p).set_color(Color::Black);
                        self.node_mut(uncle).set_color(Color::Black);
                        self.node_mut(g).set_color(Color::Red);
                        x = g;
                    }
                    _ if self.right_of(p) == Some(x) => {
                        // Inner grandchild: rotate into the outer shape and retry.
                        x = p;
                        self.rotate_left(p);
                    }
                    _ => {
                        self.node_mut(p).set_color(Color::Black);
                        self.node_mut(g).set_color(Color::Red);
                        self.rotate_right(g);
                    }
                }
            } else {
                match self.left_of(g) {
                    Some(uncle) if self.node(uncle).color() == Color::Red => {
                        self.node_mut(p).set_color(Color::Black);
                        self.node_mut(uncle).set_color(Color::Black);
                        self.node_mut(g).set_color(Color::Red);
                        x = g;
                    }
                    _ if self.left_of(p) == Some(x) => {
                        x = p;
                        self.rotate_right(p);
                    }
                    _ => {
                        self.node_mut(p).set_color(Color::Black);
                        self.node_mut(g).set_color(Color::Red);
                        self.rotate_left(g);
                    }
                }
            }
        }

        if let Some(root) = self.root {
            self.node_mut(root).set_color(Color::Black);
        }
    }

    /// Repairs the Red-Black invariants after a black node was detached.
    ///
    /// `x` is the node that replaced the detached position (possibly absent)
    /// and `parent` its parent; the pair stands in for the "double-black"
    /// deficiency. Absent nodes read as black. Iterative walk bounded by tree
    /// height; whatever node carries the deficiency at the end is blackened.
    fn remove_fixup(&mut self, x: Option<Handle>, parent: Option<Handle>) {
        let mut x = x;
        let mut parent = parent;

        loop {
            if x == self.root || self.color_of(x) == Color::Red {
                break;
            }
            let p = parent.expect("`RawRBTreeMap::remove_fixup()` - a non-root node must have a parent!");

            if self.left_of(p) == x {
                let mut sibling = self.expect_right_sibling(p);

                // A red sibling rotates down to expose a black one.
                if self.node(sibling).color() == Color::Red {
                    self.node_mut(sibling).set_color(Color::Black);
                    self.node_mut(p).set_color(Color::Red);
                    self.rotate_left(p);
                    sibling = self.expect_right_sibling(p);
                }

                if self.color_of(self.left_of(sibling)) == Color::Black
                    && self.color_of(self.right_of(sibling)) == Color::Black
                {
                    // Both nephews black: pull the deficiency up one level.
                    self.node_mut(sibling).set_color(Color::Red);
                    x = Some(p);
                    parent = self.parent_of(p);
                } else {
                    if self.color_of(self.right_of(sibling)) == Color::Black {
                        // Near nephew red, far nephew black: convert to the
                        // terminal shape.
                        if let Some(near) = self.left_of(sibling) {
                            self.node_mut(near).set_color(Color::Black);
                        }
                        self.node_mut(sibling).set_color(Color::Red);
                        self.rotate_right(sibling);
                        sibling = self.expect_right_sibling(p);
                    }

                    let parent_color = self.node(p).color();
                    self.node_mut(sibling).set_color(parent_color);
                    self.node_mut(p).set_color(Color::Black);
                    if let Some(far) = self.right_of(sibling) {
                        self.node_mut(far).set_color(Color::Black);
                    }
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut sibling = self.expect_left_sibling(p);

                if self.node(sibling).color() == Color::Red {
                    self.node_mut(sibling).set_color(Color::Black);
                    self.node_mut(p).set_color(Color::Red);
                    self.rotate_right(p);
                    sibling = self.expect_left_sibling(p);
                }

                if self.color_of(self.right_of(sibling)) == Color::Black
                    && self.color_of(self.left_of(sibling)) == Color::Black
                {
                    self.node_mut(sibling).set_color(Color::Red);
                    x = Some(p);
                    parent = self.parent_of(p);
                } else {
                    if self.color_of(self.left_of(sibling)) == Color::Black {
                        if let Some(near) = self.right_of(sibling) {
                            self.node_mut(near).set_color(Color::Black);
                        }
                        self.node_mut(sibling).set_color(Color::Red);
                        self.rotate_left(sibling);
                        sibling = self.expect_left_sibling(p);
                    }

                    let parent_color = self.node(p).color();
                    self.node_mut(sibling).set_color(parent_color);
                    self.node_mut(p).set_color(Color::Black);
                    if let Some(far) = self.left_of(sibling) {
                        self.node_mut(far).set_color(Color::Black);
                    }
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }

        if let Some(handle) = x {
            self.node_mut(handle).set_color(Color::Black);
        }
    }

    /// A doubly-black left child always has a right sibling; its subtree
    /// carries at least one extra black node.
    fn expect_right_sibling(&self, parent: Handle) -> Handle {
        self.right_of(parent).expect("`RawRBTreeMap::remove_fixup()` - a deficient node must have a sibling!")
    }

    /// Mirror of [`expect_right_sibling`](Self::expect_right_sibling).
    fn expect_left_sibling(&self, parent: Handle) -> Handle {
        self.left_of(parent).expect("`RawRBTreeMap::remove_fixup()` - a deficient node must have a sibling!")
    }
}

impl<K: Ord, V> RawRBTreeMap<K, V> {
    /// Searches for a key by iterative descent: left if less, right if
    /// greater. The target key never leaves this stack frame.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            current = match key.cmp(node.key().borrow()) {
                Ordering::Less => node.left(),
                Ordering::Greater => node.right(),
                Ordering::Equal => return Some(handle),
            };
        }
        None
    }

    /// Returns a reference to the value corresponding to the key.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key).map(|handle| self.node(handle).value())
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        Some(self.node_mut(handle).value_mut())
    }

    /// Returns true if the tree contains the specified key.
    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.search(key).is_some()
    }

    /// Inserts a key-value pair into the tree.
    /// Returns the old value if the key was already present.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (_, old) = self.insert_full(key, value);
        old
    }

    /// Inserts a key-value pair, returning the handle of the node that now
    /// holds the key along with any displaced value.
    ///
    /// A fresh node is attached red at the bottom of the descent path, the
    /// size caches along the path grow by one, and the insertion fixup
    /// restores the coloring invariants.
    pub(crate) fn insert_full(&mut self, key: K, value: V) -> (Handle, Option<V>) {
        let Some(root) = self.root else {
            let handle = self.nodes.alloc(RBNode::new(key, value, None, Color::Black));
            self.root = Some(handle);
            return (handle, None);
        };

        let mut current = root;
        loop {
            let ordering = key.cmp(self.node(current).key());
            let next = match ordering {
                Ordering::Less => self.left_of(current),
                Ordering::Greater => self.right_of(current),
                Ordering::Equal => {
                    // Duplicate key: overwrite the value in place.
                    let old = mem::replace(self.node_mut(current).value_mut(), value);
                    return (current, Some(old));
                }
            };

            let Some(child) = next else {
                let handle = self.nodes.alloc(RBNode::new(key, value, Some(current), Color::Red));
                if ordering == Ordering::Less {
                    self.node_mut(current).set_left(Some(handle));
                } else {
                    self.node_mut(current).set_right(Some(handle));
                }
                self.grow_above(handle);
                self.insert_fixup(handle);
                return (handle, None);
            };
            current = child;
        }
    }

    /// Removes a key from the tree, returning the stored pair if present.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let handle = self.search(key)?;
        Some(self.remove_node(handle))
    }

    /// Returns the handle of the largest key not greater than `key`.
    ///
    /// Candidate-remembering descent: every step that goes right marks the
    /// node passed over as the best bound so far; an equal key returns
    /// immediately.
    pub(crate) fn floor<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        let mut candidate = None;
        while let Some(handle) = current {
            let node = self.node(handle);
            current = match key.cmp(node.key().borrow()) {
                Ordering::Less => node.left(),
                Ordering::Greater => {
                    candidate = Some(handle);
                    node.right()
                }
                Ordering::Equal => return Some(handle),
            };
        }
        candidate
    }

    /// Returns the handle of the smallest key not less than `key`.
    /// Mirror of [`floor`](Self::floor).
    pub(crate) fn ceiling<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        let mut candidate = None;
        while let Some(handle) = current {
            let node = self.node(handle);
            current = match key.cmp(node.key().borrow()) {
                Ordering::Greater => node.right(),
                Ordering::Less => {
                    candidate = Some(handle);
                    node.left()
                }
                Ordering::Equal => return Some(handle),
            };
        }
        candidate
    }

    /// Counts the keys strictly less than `key` and reports whether `key`
    /// itself is present.
    ///
    /// Every right turn accounts for the node passed over plus its left
    /// subtree; O(log n) via the cached sizes.
    fn rank_inner<Q>(&self, key: &Q) -> (usize, bool)
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut rank = 0;
        let mut current = self.root;
        while let Some(handle) = current {
            let node = self.node(handle);
            current = match key.cmp(node.key().borrow()) {
                Ordering::Less => node.left(),
                Ordering::Greater => {
                    rank += 1 + self.size_of(node.left());
                    node.right()
                }
                Ordering::Equal => return (rank + self.size_of(node.left()), true),
            };
        }
        (rank, false)
    }

    /// Returns the number of keys strictly less than `key`.
    ///
    /// Total: defined whether or not `key` is present.
    pub(crate) fn rank<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.rank_inner(key).0
    }

    /// Returns the zero-based sorted position of `key`, or `None` if absent.
    pub(crate) fn rank_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (rank, found) = self.rank_inner(key);
        found.then_some(rank)
    }

    /// Validates the search-tree ordering invariant: every key lies strictly
    /// between the bounds inherited from its ancestors.
    ///
    /// Breadth-first walk; offline diagnostic, never invoked automatically.
    pub(crate) fn is_bst(&self) -> bool {
        let Some(root) = self.root else { return true };

        let mut queue: VecDeque<(Handle, Option<&K>, Option<&K>)> = VecDeque::new();
        queue.push_back((root, None, None));
        while let Some((handle, low, high)) = queue.pop_front() {
            let node = self.node(handle);
            if low.is_some_and(|low| node.key() <= low) {
                return false;
            }
            if high.is_some_and(|high| node.key() >= high) {
                return false;
            }
            if let Some(left) = node.left() {
                queue.push_back((left, low, Some(node.key())));
            }
            if let Some(right) = node.right() {
                queue.push_back((right, Some(node.key()), high));
            }
        }

        true
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec;
    use proptest::prelude::*;

    /// Collects the keys in ascending order by the successor walk.
    fn in_order_keys(tree: &RawRBTreeMap<i32, i32>) -> Vec<i32> {
        let mut keys = Vec::new();
        let mut cursor = tree.first();
        while let Some(handle) = cursor {
            keys.push(*tree.node(handle).key());
            cursor = tree.successor(handle);
        }
        keys
    }

    fn assert_invariants(tree: &RawRBTreeMap<i32, i32>) {
        assert!(tree.is_bst(), "ordering invariant violated");
        assert!(tree.is_red_black(), "coloring invariant violated");
        assert!(tree.sizes_consistent(), "size caches inconsistent");
    }

    #[test]
    fn empty_tree() {
        let tree: RawRBTreeMap<i32, i32> = RawRBTreeMap::new();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
        assert_invariants(&tree);
    }

    #[test]
    fn insert_orders_keys() {
        let mut tree = RawRBTreeMap::new();
        for key in [50, 30, 70, 20, 40, 60, 80] {
            tree.insert(key, key * 10);
            assert_invariants(&tree);
        }

        assert_eq!(tree.len(), 7);
        assert_eq!(in_order_keys(&tree), vec![20, 30, 40, 50, 60, 70, 80]);
        assert_eq!(*tree.node(tree.first().unwrap()).key(), 20);
        assert_eq!(*tree.node(tree.last().unwrap()).key(), 80);
    }

    #[test]
    fn insert_overwrites_duplicate() {
        let mut tree = RawRBTreeMap::new();
        assert_eq!(tree.insert(1, 10), None);
        assert_eq!(tree.insert(1, 11), Some(10));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&1), Some(&11));
    }

    #[test]
    fn ascending_insert_stays_balanced() {
        let mut tree = RawRBTreeMap::new();
        for key in 0..1024 {
            tree.insert(key, key);
        }

        assert_invariants(&tree);
        // Red-Black height bound: 2 * log2(n + 1).
        assert!(tree.height() <= 20, "height {} exceeds the Red-Black bound", tree.height());
    }

    #[test]
    fn remove_leaves_at_both_ends() {
        let mut tree = RawRBTreeMap::new();
        for key in [50, 30, 70, 20, 40, 60, 80] {
            tree.insert(key, key);
        }

        assert_eq!(tree.remove_entry(&20), Some((20, 20)));
        assert_invariants(&tree);
        assert_eq!(tree.remove_entry(&80), Some((80, 80)));
        assert_invariants(&tree);

        assert_eq!(in_order_keys(&tree), vec![30, 40, 50, 60, 70]);
    }

    #[test]
    fn remove_single_child_splices() {
        let mut tree = RawRBTreeMap::new();
        for key in [2, 1, 3, 4] {
            tree.insert(key, key);
        }

        // 3 has exactly one (red) child, 4, which splices into its slot.
        assert_eq!(tree.remove_entry(&3), Some((3, 3)));
        assert_invariants(&tree);
        assert_eq!(in_order_keys(&tree), vec![1, 2, 4]);
    }

    #[test]
    fn remove_two_children_transplants_successor() {
        let mut tree = RawRBTreeMap::new();
        for key in [50, 30, 70, 20, 40, 60, 80] {
            tree.insert(key, key);
        }

        // The root has two children; its in-order successor 60 takes its place.
        assert_eq!(tree.remove_entry(&50), Some((50, 50)));
        assert_invariants(&tree);
        assert_eq!(in_order_keys(&tree), vec![20, 30, 40, 60, 70, 80]);
    }

    #[test]
    fn remove_absent_leaves_tree_unchanged() {
        let mut tree = RawRBTreeMap::new();
        for key in [2, 1, 3] {
            tree.insert(key, key);
        }

        assert_eq!(tree.remove_entry(&4), None);
        assert_eq!(tree.len(), 3);
        assert_eq!(in_order_keys(&tree), vec![1, 2, 3]);
        assert_invariants(&tree);
    }

    #[test]
    fn remove_until_empty() {
        let mut tree = RawRBTreeMap::new();
        for key in [2, 1, 3] {
            tree.insert(key, key);
        }

        while let Some(first) = tree.first() {
            tree.remove_node(first);
            assert_invariants(&tree);
        }
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn rank_and_select_agree() {
        let mut tree = RawRBTreeMap::new();
        for key in [50, 30, 70, 20, 40, 60, 80] {
            tree.insert(key, key);
        }

        for (position, key) in in_order_keys(&tree).into_iter().enumerate() {
            assert_eq!(tree.rank_of(&key), Some(position));
            let handle = tree.get_by_rank(position).unwrap();
            assert_eq!(*tree.node(handle).key(), key);
        }

        // Absent keys still have a well-defined rank.
        assert_eq!(tree.rank(&10), 0);
        assert_eq!(tree.rank(&55), 4);
        assert_eq!(tree.rank(&90), 7);
        assert_eq!(tree.rank_of(&55), None);
        assert_eq!(tree.get_by_rank(7), None);
    }

    #[test]
    fn floor_and_ceiling() {
        let mut tree = RawRBTreeMap::new();
        for key in [10, 20, 30] {
            tree.insert(key, key);
        }

        let key_at = |handle: Option<Handle>| handle.map(|h| *tree.node(h).key());

        assert_eq!(key_at(tree.floor(&25)), Some(20));
        assert_eq!(key_at(tree.floor(&20)), Some(20));
        assert_eq!(key_at(tree.floor(&5)), None);
        assert_eq!(key_at(tree.ceiling(&25)), Some(30));
        assert_eq!(key_at(tree.ceiling(&30)), Some(30));
        assert_eq!(key_at(tree.ceiling(&35)), None);
    }

    #[test]
    fn level_order_starts_at_the_root() {
        let mut tree = RawRBTreeMap::new();
        for key in [50, 30, 70, 20, 40, 60, 80] {
            tree.insert(key, key);
        }

        let level_keys: Vec<i32> = tree.level_order().into_iter().map(|h| *tree.node(h).key()).collect();
        assert_eq!(level_keys.len(), 7);
        assert_eq!(level_keys[0], 50);
        // Each level holds keys whose subtrees partition the one above.
        assert_eq!(&level_keys[1..3], &[30, 70]);
    }

    #[test]
    fn drain_yields_ascending_pairs() {
        let mut tree = RawRBTreeMap::new();
        for key in [3, 1, 4, 1, 5, 9, 2, 6] {
            tree.insert(key, key * 100);
        }

        let drained = tree.drain_to_vec();
        let keys: Vec<i32> = drained.iter().map(|&(k, _)| k).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5, 6, 9]);
        assert!(tree.is_empty());
    }

    proptest! {
        /// Random insert/remove interleavings preserve every invariant and
        /// the ascending key sequence of a model `Vec`.
        #[test]
        fn random_ops_preserve_invariants(ops in prop::collection::vec((any::<bool>(), -64i32..64), 0..512)) {
            let mut tree: RawRBTreeMap<i32, i32> = RawRBTreeMap::new();
            let mut model: Vec<i32> = Vec::new();

            for (is_insert, key) in ops {
                if is_insert {
                    if tree.insert(key, key).is_none() {
                        model.push(key);
                        model.sort_unstable();
                    }
                } else {
                    let removed = tree.remove_entry(&key);
                    if removed.is_some() {
                        model.retain(|&k| k != key);
                    }
                }

                prop_assert!(tree.is_bst());
                prop_assert!(tree.is_red_black());
                prop_assert!(tree.sizes_consistent());
                prop_assert_eq!(tree.len(), model.len());
            }

            prop_assert_eq!(in_order_keys(&tree), model);
        }

        /// `pop_first` drains any key set in strictly ascending order.
        #[test]
        fn pop_first_drains_in_order(keys in prop::collection::btree_set(-1000i32..1000, 0..128)) {
            let mut tree: RawRBTreeMap<i32, i32> = RawRBTreeMap::new();
            for &key in &keys {
                tree.insert(key, key);
            }

            let mut drained = Vec::new();
            while let Some((key, _)) = tree.pop_first() {
                drained.push(key);
                prop_assert!(tree.is_red_black());
            }

            let expected: Vec<i32> = keys.into_iter().collect();
            prop_assert_eq!(drained, expected);
            prop_assert!(tree.is_empty());
        }
    }
}
