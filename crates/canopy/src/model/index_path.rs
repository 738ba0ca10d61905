//! Index paths for addressing rows in the tree.
//!
//! An `IndexPath` is the route from the root to a row: one sibling position
//! per level. Paths are values. When sibling order shifts, a row receives a
//! new path rather than having its old one patched.

use std::fmt;

/// Root-relative route to a row, one sibling position per level.
///
/// The empty path denotes the root, which has no row of its own.
/// Ordering is lexicographic, which matches pre-order traversal: a parent
/// sorts before its children, and children sort before the parent's next
/// sibling.
///
/// # Example
///
/// ```
/// use canopy::model::IndexPath;
///
/// let parent = IndexPath::from([0]);
/// let child = parent.child(2);
/// assert_eq!(child.as_slice(), &[0, 2]);
/// assert_eq!(child.parent(), Some(parent.clone()));
/// assert!(child.is_descendant_of(&parent));
/// assert!(parent < child);
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath(Vec<usize>);

impl IndexPath {
    /// Returns the empty (root) path.
    #[inline]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Creates a path from its segments.
    #[inline]
    pub fn new(segments: Vec<usize>) -> Self {
        Self(segments)
    }

    /// Returns `true` for the empty (root) path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of segments. Top-level rows have depth 1.
    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns the segments.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Returns the last segment, the position among siblings.
    #[inline]
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Returns the segment at `level`.
    #[inline]
    pub fn get(&self, level: usize) -> Option<usize> {
        self.0.get(level).copied()
    }

    /// Returns the path of the `index`th child.
    pub fn child(&self, index: usize) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(index);
        Self(segments)
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, rest)) => Some(Self(rest.to_vec())),
            None => None,
        }
    }

    /// Returns the first `depth` segments.
    pub fn prefix(&self, depth: usize) -> Self {
        Self(self.0[..depth.min(self.0.len())].to_vec())
    }

    /// Returns this path with its last segment replaced. The root is returned
    /// unchanged.
    pub fn with_last(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        if let Some(last) = segments.last_mut() {
            *last = index;
        }
        Self(segments)
    }

    /// Returns this path with its last segment moved by `delta`.
    ///
    /// Returns `None` for the root or if the segment would become negative.
    pub fn shifted(&self, delta: isize) -> Option<Self> {
        let last = self.last()?.checked_add_signed(delta)?;
        Some(self.with_last(last))
    }

    /// Returns this path re-rooted under `parent`, keeping the last segment.
    pub fn reparented(&self, parent: &IndexPath) -> Self {
        match self.last() {
            Some(last) => parent.child(last),
            None => parent.clone(),
        }
    }

    /// Returns `true` if `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &IndexPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns `true` if this path lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &IndexPath) -> bool {
        self.0.len() > ancestor.0.len() && self.starts_with(ancestor)
    }

    /// Iterates over the segments.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<usize>> for IndexPath {
    fn from(segments: Vec<usize>) -> Self {
        Self(segments)
    }
}

impl<const N: usize> From<[usize; N]> for IndexPath {
    fn from(segments: [usize; N]) -> Self {
        Self(segments.to_vec())
    }
}

impl From<&[usize]> for IndexPath {
    fn from(segments: &[usize]) -> Self {
        Self(segments.to_vec())
    }
}

impl fmt::Debug for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexPath{:?}", self.0)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
