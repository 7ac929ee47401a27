//! Disjoint-set forest over `0..n` indices.
//!
//! `find` compresses paths; `union` attaches the first root under the second.

/// Disjoint-set structure used by the clusterer.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the root of `x`, pointing every visited node at it.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = x;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    /// Merges the sets of `a` and `b`. Returns `false` when already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        self.parent[root_a] = root_b;
        true
    }

    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Members of every set, ascending, ordered by each set's smallest index.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for index in 0..n {
            let root = self.find(index);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(index),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![index]);
                }
            }
        }
        groups
    }
}
