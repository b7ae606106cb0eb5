use super::handle::Handle;

/// Per-node balance tag.
///
/// New nodes enter the tree red; the insertion and deletion fixups are the
/// only code that recolors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// A single tree node.
///
/// Links are arena handles, not pointers; "no child" and "no parent" are
/// `None`. The parent link is used only for upward walks (iteration,
/// fixups) and rotation bookkeeping. `size` caches the number of nodes in
/// the subtree rooted here, including the node itself.
#[derive(Clone)]
pub(crate) struct RBNode<K, V> {
    key: K,
    value: V,
    parent: Option<Handle>,
    left: Option<Handle>,
    right: Option<Handle>,
    color: Color,
    size: usize,
}

impl<K, V> RBNode<K, V> {
    /// Creates a new childless node of the given color.
    pub(crate) const fn new(key: K, value: V, parent: Option<Handle>, color: Color) -> Self {
        Self {
            key,
            value,
            parent,
            left: None,
            right: None,
            color,
            size: 1,
        }
    }

    #[inline]
    pub(crate) const fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) const fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub(crate) const fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Borrows the key together with a mutable value.
    pub(crate) const fn pair_mut(&mut self) -> (&K, &mut V) {
        (&self.key, &mut self.value)
    }

    /// Consumes the node, returning its key-value pair.
    pub(crate) fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }

    #[inline]
    pub(crate) const fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub(crate) const fn set_parent(&mut self, parent: Option<Handle>) {
        self.parent = parent;
    }

    #[inline]
    pub(crate) const fn left(&self) -> Option<Handle> {
        self.left
    }

    pub(crate) const fn set_left(&mut self, left: Option<Handle>) {
        self.left = left;
    }

    #[inline]
    pub(crate) const fn right(&self) -> Option<Handle> {
        self.right
    }

    pub(crate) const fn set_right(&mut self, right: Option<Handle>) {
        self.right = right;
    }

    #[inline]
    pub(crate) const fn color(&self) -> Color {
        self.color
    }

    pub(crate) const fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Returns the cached size of the subtree rooted at this node.
    #[inline]
    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    pub(crate) const fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_node_is_a_singleton() {
        let node: RBNode<i32, &str> = RBNode::new(1, "one", None, Color::Red);
        assert_eq!(*node.key(), 1);
        assert_eq!(*node.value(), "one");
        assert_eq!(node.parent(), None);
        assert_eq!(node.left(), None);
        assert_eq!(node.right(), None);
        assert_eq!(node.color(), Color::Red);
        assert_eq!(node.size(), 1);
    }

    #[test]
    fn links_and_tags_round_trip() {
        let mut node: RBNode<i32, ()> = RBNode::new(1, (), None, Color::Red);
        let h = Handle::from_index(7);

        node.set_left(Some(h));
        node.set_right(Some(h));
        node.set_parent(Some(h));
        node.set_color(Color::Black);
        node.set_size(3);

        assert_eq!(node.left(), Some(h));
        assert_eq!(node.right(), Some(h));
        assert_eq!(node.parent(), Some(h));
        assert_eq!(node.color(), Color::Black);
        assert_eq!(node.size(), 3);

        let (key, value) = node.into_parts();
        assert_eq!((key, value), (1, ()));
    }
}
