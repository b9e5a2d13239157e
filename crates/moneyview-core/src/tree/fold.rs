use super::CategoryTree;

/// Expand/collapse state of every node of a [`CategoryTree`], by tree index.
///
/// Only meaningful for the tree it was created for; rebuild it whenever the
/// tree is re-evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeFold {
    expanded: Vec<bool>,
}

impl TreeFold {
    pub fn new(tree: &CategoryTree, expanded: bool) -> Self {
        Self {
            expanded: vec![expanded; tree.len()],
        }
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.get(index).copied().unwrap_or(false)
    }

    pub fn set_expanded(&mut self, index: usize, expanded: bool) {
        if let Some(e) = self.expanded.get_mut(index) {
            *e = expanded;
        }
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(e) = self.expanded.get_mut(index) {
            *e = !*e;
        }
    }

    pub fn expand_all(&mut self) {
        self.expanded.fill(true);
    }

    pub fn collapse_all(&mut self) {
        self.expanded.fill(false);
    }

    /// Indices of the rows to render: a node is shown when none of its
    /// ancestors is collapsed. Collapsed subtrees are skipped via `next`.
    pub fn visible(&self, tree: &CategoryTree) -> Vec<usize> {
        let nodes = tree.nodes();
        let mut rows = Vec::new();
        let mut i = 0;
        while i < nodes.len() {
            rows.push(i);
            i = if self.is_expanded(i) { i + 1 } else { nodes[i].next };
        }
        rows
    }

    /// Rows to render while filtering: every node whose subtree contains a
    /// match is shown (and treated as expanded), everything else is hidden.
    pub fn visible_matching(&self, tree: &CategoryTree, matches: impl Fn(usize) -> bool) -> Vec<usize> {
        let nodes = tree.nodes();
        let mut contains = vec![false; nodes.len()];
        for i in (0..nodes.len()).rev() {
            let hit = matches(i) || tree.children(i).any(|c| contains[c]);
            contains[i] = hit;
        }
        let mut rows = Vec::new();
        let mut i = 0;
        while i < nodes.len() {
            if contains[i] {
                rows.push(i);
                i += 1;
            } else {
                i = nodes[i].next;
            }
        }
        rows
    }
}
