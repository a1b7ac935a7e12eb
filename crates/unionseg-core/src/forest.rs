//! Disjoint-set forests over pixel indices.
//!
//! Elements are plain `usize` indices into a flat arena; element `i` is
//! the pixel at row-major position `i`. Sets only ever merge.
//!
//! Two implementations share the [`DisjointSet`] trait:
//!
//! - [`Forest`]: full path compression and union by rank. Every singleton
//!   starts at rank 1 and a root's rank grows by exactly one, only when
//!   two roots of equal rank merge.
//! - [`BaselineForest`]: no compression and no rank. Same partitions,
//!   linear-depth chains possible. Kept as a reference for correctness and
//!   timing comparisons.
//!
//! Both walk parent links iteratively, so chain depth never touches the
//! call stack.

use serde::{Deserialize, Serialize};

use crate::types::SegmentError;

/// Rank of a freshly created singleton.
pub const INITIAL_RANK: u32 = 1;

/// Selects which union-find implementation backs a segmentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForestKind {
    /// Path compression plus union by rank.
    #[default]
    PathCompressed,
    /// Naive forest: no compression, root of `a` goes under root of `b`.
    Baseline,
}

impl ForestKind {
    /// Create `count` singletons in the selected forest implementation.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Allocation`] if the arena cannot be reserved.
    pub fn make_set(self, count: usize) -> Result<SelectedForest, SegmentError> {
        Ok(match self {
            Self::PathCompressed => SelectedForest::PathCompressed(Forest::make_set(count)?),
            Self::Baseline => SelectedForest::Baseline(BaselineForest::make_set(count)?),
        })
    }

    /// Short human-readable name, used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PathCompressed => "path-compressed",
            Self::Baseline => "baseline",
        }
    }
}

/// Union-find operations over `0..len()`.
pub trait DisjointSet {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Returns `true` if the forest has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Representative of the set containing `element`.
    ///
    /// # Panics
    ///
    /// Panics if `element >= len()`.
    fn find(&mut self, element: usize) -> usize;

    /// Merge the sets containing `a` and `b`.
    ///
    /// Returns `false` if they were already the same set.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    fn union(&mut self, a: usize, b: usize) -> bool;

    /// Representative of every element, in index order.
    fn representatives(&mut self) -> Vec<usize> {
        (0..self.len()).map(|i| self.find(i)).collect()
    }
}

/// One arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    parent: usize,
    rank: u32,
}

/// Path-compressed, rank-balanced disjoint-set forest.
#[derive(Debug, Clone)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    /// Create `count` singleton sets, each its own root with rank 1.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Allocation`] if the arena cannot be reserved.
    pub fn make_set(count: usize) -> Result<Self, SegmentError> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(count)
            .map_err(|_| SegmentError::Allocation {
                what: "forest arena",
                count,
            })?;
        nodes.extend((0..count).map(|i| Node {
            parent: i,
            rank: INITIAL_RANK,
        }));
        Ok(Self { nodes })
    }

    /// Current parent link of `element`.
    #[must_use]
    pub fn parent(&self, element: usize) -> usize {
        self.nodes[element].parent
    }

    /// Current rank of `element`.
    #[must_use]
    pub fn rank(&self, element: usize) -> u32 {
        self.nodes[element].rank
    }

    /// Whether `element` is a root.
    #[must_use]
    pub fn is_root(&self, element: usize) -> bool {
        self.nodes[element].parent == element
    }
}

impl DisjointSet for Forest {
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn find(&mut self, element: usize) -> usize {
        let mut root = element;
        while self.nodes[root].parent != root {
            root = self.nodes[root].parent;
        }

        // Second pass: point every visited node straight at the root.
        let mut current = element;
        while current != root {
            let next = self.nodes[current].parent;
            self.nodes[current].parent = root;
            current = next;
        }

        root
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let u = self.find(a);
        let v = self.find(b);
        if u == v {
            return false;
        }

        let (rank_u, rank_v) = (self.nodes[u].rank, self.nodes[v].rank);
        if rank_u > rank_v {
            self.nodes[v].parent = u;
        } else {
            self.nodes[u].parent = v;
            if rank_u == rank_v {
                self.nodes[v].rank += 1;
            }
        }
        true
    }
}

/// Naive disjoint-set forest without path compression or ranks.
#[derive(Debug, Clone)]
pub struct BaselineForest {
    parent: Vec<usize>,
}

impl BaselineForest {
    /// Create `count` singleton sets.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Allocation`] if the arena cannot be reserved.
    pub fn make_set(count: usize) -> Result<Self, SegmentError> {
        let mut parent = Vec::new();
        parent
            .try_reserve_exact(count)
            .map_err(|_| SegmentError::Allocation {
                what: "baseline forest arena",
                count,
            })?;
        parent.extend(0..count);
        Ok(Self { parent })
    }

    /// Root of `element` without modifying any link.
    #[must_use]
    pub fn root(&self, element: usize) -> usize {
        let mut current = element;
        while self.parent[current] != current {
            current = self.parent[current];
        }
        current
    }

    /// Number of links between `element` and its root.
    #[must_use]
    pub fn depth(&self, element: usize) -> usize {
        let mut current = element;
        let mut depth = 0;
        while self.parent[current] != current {
            current = self.parent[current];
            depth += 1;
        }
        depth
    }
}

impl DisjointSet for BaselineForest {
    fn len(&self) -> usize {
        self.parent.len()
    }

    fn find(&mut self, element: usize) -> usize {
        self.root(element)
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let u = self.root(a);
        let v = self.root(b);
        if u == v {
            return false;
        }
        self.parent[u] = v;
        true
    }
}

/// A forest of the kind chosen by [`ForestKind`].
#[derive(Debug, Clone)]
pub enum SelectedForest {
    /// See [`Forest`].
    PathCompressed(Forest),
    /// See [`BaselineForest`].
    Baseline(BaselineForest),
}

impl DisjointSet for SelectedForest {
    fn len(&self) -> usize {
        match self {
            Self::PathCompressed(f) => f.len(),
            Self::Baseline(f) => f.len(),
        }
    }

    fn find(&mut self, element: usize) -> usize {
        match self {
            Self::PathCompressed(f) => f.find(element),
            Self::Baseline(f) => f.find(element),
        }
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        match self {
            Self::PathCompressed(f) => f.union(a, b),
            Self::Baseline(f) => f.union(a, b),
        }
    }
}
