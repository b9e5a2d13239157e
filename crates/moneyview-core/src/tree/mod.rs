//! Hierarchy evaluation for self-referencing rows.
//!
//! A [`CategoryTree`] flattens a parent/child forest into a pre-order list:
//! each node is followed immediately by its whole subtree, and carries the
//! index one past that subtree in `next`. Descendant tests, subtree ranges
//! and sibling iteration all fall out of that one field.
//!
//! Derived from it:
//! - [`PathIndex`]: display path per id (`Food:Groceries`)
//! - [`TreeFold`]: per-node expand/collapse state for rendering

pub mod fold;
pub mod path;

pub use fold::TreeFold;
pub use path::PathIndex;

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::id::ResourceId;
use crate::models::ParentLink;
use crate::utils::cmp_ignore_case;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    pub id: ResourceId,
    /// Number of ancestors; roots are at depth 0.
    pub depth: usize,
    /// Index one past the last node of this node's subtree.
    pub next: usize,
}

/// Pre-order flattening of a forest of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTree {
    order: Vec<TreeNode>,
    /// Parent index of each node, parallel to `order`.
    parents: Vec<Option<usize>>,
    index_by_id: HashMap<ResourceId, usize>,
}

enum Frame {
    Enter {
        rank: usize,
        depth: usize,
        parent: Option<usize>,
    },
    Exit { index: usize },
}

impl CategoryTree {
    /// Build the tree from a flat set of rows.
    ///
    /// Siblings are ordered by name (case-insensitive, exact spelling breaking
    /// ties), then by id, so the result does not depend on the input order.
    /// A row is a root when its parent is void, does not resolve, or is the
    /// row itself. Rows caught in a parent cycle are kept: the lowest-ranked
    /// member of each cycle is promoted to a root. Rows with a void id are
    /// skipped.
    pub fn build<'a, R, I>(rows: I) -> Self
    where
        R: ParentLink + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut sorted: Vec<&R> = rows.into_iter().filter(|row| !row.id().is_void()).collect();
        sorted.sort_by(|a, b| cmp_ignore_case(a.name(), b.name()).then_with(|| a.id().cmp(&b.id())));

        let mut rank_by_id: HashMap<ResourceId, usize> = HashMap::with_capacity(sorted.len());
        sorted.retain(|row| {
            if rank_by_id.contains_key(&row.id()) {
                warn!(id = %row.id(), "Duplicate row id, keeping the first");
                return false;
            }
            rank_by_id.insert(row.id(), rank_by_id.len());
            true
        });

        let mut parent_rank: Vec<Option<usize>> = Vec::with_capacity(sorted.len());
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); sorted.len()];
        let mut roots = Vec::new();
        for (rank, row) in sorted.iter().enumerate() {
            let parent = row.parent_id();
            match rank_by_id.get(&parent) {
                Some(&p) if parent != row.id() => {
                    parent_rank.push(Some(p));
                    children[p].push(rank);
                }
                _ => {
                    if !parent.is_void() && parent != row.id() {
                        debug!(id = %row.id(), parent = %parent, "Unresolved parent, treating as root");
                    }
                    parent_rank.push(None);
                    roots.push(rank);
                }
            }
        }

        let mut tree = Self {
            order: Vec::with_capacity(sorted.len()),
            parents: Vec::with_capacity(sorted.len()),
            index_by_id: HashMap::with_capacity(sorted.len()),
        };
        let mut visited = vec![false; sorted.len()];
        for &root in &roots {
            tree.walk(root, &sorted, &children, &mut visited);
        }

        // Whatever is left hangs off a parent cycle
        for rank in 0..sorted.len() {
            if visited[rank] {
                continue;
            }
            let root = cycle_root(rank, &parent_rank);
            warn!(id = %sorted[root].id(), "Parent cycle detected, promoting to root");
            tree.walk(root, &sorted, &children, &mut visited);
        }

        tree
    }

    fn walk<R: ParentLink>(
        &mut self,
        start: usize,
        sorted: &[&R],
        children: &[Vec<usize>],
        visited: &mut [bool],
    ) {
        let mut stack = vec![Frame::Enter {
            rank: start,
            depth: 0,
            parent: None,
        }];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter {
                    rank,
                    depth,
                    parent,
                } => {
                    if visited[rank] {
                        continue;
                    }
                    visited[rank] = true;
                    let index = self.order.len();
                    let id = sorted[rank].id();
                    self.order.push(TreeNode {
                        id,
                        depth,
                        next: index + 1,
                    });
                    self.parents.push(parent);
                    self.index_by_id.insert(id, index);
                    stack.push(Frame::Exit { index });
                    for &child in children[rank].iter().rev() {
                        stack.push(Frame::Enter {
                            rank: child,
                            depth: depth + 1,
                            parent: Some(index),
                        });
                    }
                }
                Frame::Exit { index } => {
                    self.order[index].next = self.order.len();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in pre-order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.order
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.order.get(index)
    }

    pub fn index_of(&self, id: ResourceId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.index_by_id.contains_key(&id)
    }

    /// Index range covered by the subtree rooted at `index` (the node included).
    pub fn subtree(&self, index: usize) -> Range<usize> {
        match self.order.get(index) {
            Some(node) => index..node.next,
            None => index..index,
        }
    }

    /// True when `candidate` lies in the subtree of `of`, `of` itself included.
    pub fn is_descendant(&self, candidate: usize, of: usize) -> bool {
        self.subtree(of).contains(&candidate)
    }

    pub fn is_descendant_id(&self, candidate: ResourceId, of: ResourceId) -> bool {
        match (self.index_of(candidate), self.index_of(of)) {
            (Some(c), Some(o)) => self.is_descendant(c, o),
            _ => false,
        }
    }

    /// Whether `child` may be moved under `new_parent` without creating a cycle.
    ///
    /// Moving to the top level (void parent) is always allowed. A parent that
    /// is not in the tree is rejected; a child that is not in the tree yet
    /// (a new row) may go under any existing node.
    pub fn can_reparent(&self, child: ResourceId, new_parent: ResourceId) -> bool {
        if new_parent.is_void() {
            return true;
        }
        let Some(parent) = self.index_of(new_parent) else {
            return false;
        };
        match self.index_of(child) {
            Some(child) => !self.is_descendant(parent, child),
            None => true,
        }
    }

    /// Indices of the direct children of `index`, in sibling order.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.siblings_from(index + 1, self.subtree(index).end)
    }

    /// Indices of the top-level nodes.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.siblings_from(0, self.order.len())
    }

    fn siblings_from(&self, first: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(first), move |&i| self.order.get(i).map(|node| node.next))
            .take_while(move |&i| i < end)
    }

    /// Index of the parent of the node at `index`.
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Ancestors of `id`, root first, `id` itself excluded.
    pub fn ancestors(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut chain = Vec::new();
        let mut current = self.index_of(id);
        while let Some(index) = current.and_then(|i| self.parent_index(i)) {
            chain.push(self.order[index].id);
            current = Some(index);
        }
        chain.reverse();
        chain
    }
}

/// Lowest-ranked member of the parent cycle that `start` leads into.
fn cycle_root(start: usize, parent_rank: &[Option<usize>]) -> usize {
    let mut seen_at: HashMap<usize, usize> = HashMap::new();
    let mut chain = Vec::new();
    let mut current = start;
    loop {
        if let Some(&pos) = seen_at.get(&current) {
            return chain[pos..].iter().copied().min().unwrap_or(current);
        }
        seen_at.insert(current, chain.len());
        chain.push(current);
        match parent_rank[current] {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use proptest::prelude::*;

    fn ids(tree: &CategoryTree) -> Vec<i64> {
        tree.nodes().iter().map(|n| n.id.value()).collect()
    }

    fn id(raw: i64) -> ResourceId {
        ResourceId::new(raw)
    }

    #[test]
    fn test_food_and_transport() {
        let rows = vec![
            Category::new(1, "Food", 0),
            Category::new(2, "Groceries", 1),
            Category::new(3, "Transport", 0),
        ];
        let tree = CategoryTree::build(&rows);
        assert_eq!(ids(&tree), vec![1, 2, 3]);
        let next: Vec<usize> = tree.nodes().iter().map(|n| n.next).collect();
        assert_eq!(next, vec![2, 2, 3]);
        assert_eq!(tree.node(1).map(|n| n.depth), Some(1));
        assert_eq!(tree.index_of(id(3)), Some(2));
    }

    #[test]
    fn test_empty() {
        let tree = CategoryTree::build(Vec::<&Category>::new());
        assert!(tree.is_empty());
        assert_eq!(tree.roots().count(), 0);
    }

    #[test]
    fn test_order_does_not_depend_on_input_order() {
        let mut rows = Category::sample_data();
        let forward = CategoryTree::build(&rows);
        rows.reverse();
        let backward = CategoryTree::build(&rows);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_siblings_sorted_by_name_then_id() {
        let rows = vec![
            Category::new(5, "beta", 0),
            Category::new(4, "Alpha", 0),
            Category::new(2, "alpha", 0),
        ];
        let tree = CategoryTree::build(&rows);
        assert_eq!(ids(&tree), vec![4, 2, 5]);
    }

    #[test]
    fn test_unresolved_and_self_parent_become_roots() {
        let rows = vec![
            Category::new(1, "Orphan", 99),
            Category::new(2, "Selfish", 2),
            Category::new(3, "Child", 2),
        ];
        let tree = CategoryTree::build(&rows);
        assert_eq!(ids(&tree), vec![1, 2, 3]);
        assert_eq!(tree.node(0).map(|n| n.depth), Some(0));
        assert_eq!(tree.node(1).map(|n| n.next), Some(3));
        assert_eq!(tree.node(2).map(|n| n.depth), Some(1));
    }

    #[test]
    fn test_cycle_members_are_kept() {
        // 1 -> 2 -> 1 is a cycle; 3 hangs below 2; 4 is a normal root
        let rows = vec![
            Category::new(1, "A", 2),
            Category::new(2, "B", 1),
            Category::new(3, "C", 2),
            Category::new(4, "D", 0),
        ];
        let tree = CategoryTree::build(&rows);
        assert_eq!(tree.len(), 4);
        assert_eq!(ids(&tree), vec![4, 1, 2, 3]);
        let a = tree.index_of(id(1)).unwrap();
        assert_eq!(tree.node(a).map(|n| n.depth), Some(0));
        assert!(tree.is_descendant_id(id(3), id(1)));
        assert!(tree.is_descendant_id(id(2), id(1)));
    }

    #[test]
    fn test_is_descendant() {
        let tree = CategoryTree::build(&Category::sample_data());
        let food = tree.index_of(id(1)).unwrap();
        let groceries = tree.index_of(id(2)).unwrap();
        let fuel = tree.index_of(id(5)).unwrap();
        assert!(tree.is_descendant(food, food));
        assert!(tree.is_descendant(groceries, food));
        assert!(!tree.is_descendant(food, groceries));
        assert!(!tree.is_descendant(fuel, food));
        assert!(!tree.is_descendant(0, tree.len()));
    }

    #[test]
    fn test_can_reparent() {
        let tree = CategoryTree::build(&Category::sample_data());
        assert!(!tree.can_reparent(id(1), id(1)));
        assert!(!tree.can_reparent(id(1), id(2)));
        assert!(tree.can_reparent(id(2), id(4)));
        assert!(tree.can_reparent(id(2), ResourceId::VOID));
        assert!(!tree.can_reparent(id(2), id(99)));
        assert!(tree.can_reparent(id(42), id(1)));
    }

    #[test]
    fn test_children_and_roots() {
        let tree = CategoryTree::build(&Category::sample_data());
        let roots: Vec<ResourceId> = tree.roots().map(|i| tree.nodes()[i].id).collect();
        // Bills, Food, Income, Transport
        assert_eq!(roots, vec![id(7), id(1), id(10), id(4)]);

        let transport = tree.index_of(id(4)).unwrap();
        let children: Vec<ResourceId> = tree.children(transport).map(|i| tree.nodes()[i].id).collect();
        assert_eq!(children, vec![id(5), id(6)]);

        let fuel = tree.index_of(id(5)).unwrap();
        assert_eq!(tree.children(fuel).count(), 0);
    }

    #[test]
    fn test_ancestors() {
        let rows = vec![
            Category::new(1, "Home", 0),
            Category::new(2, "Utilities", 1),
            Category::new(3, "Water", 2),
        ];
        let tree = CategoryTree::build(&rows);
        assert_eq!(tree.ancestors(id(3)), vec![id(1), id(2)]);
        assert!(tree.ancestors(id(1)).is_empty());
        assert!(tree.ancestors(id(9)).is_empty());
        assert_eq!(tree.parent_index(2), Some(1));
    }

    fn forest() -> impl Strategy<Value = Vec<Category>> {
        (1usize..40).prop_flat_map(|n| {
            proptest::collection::vec((0..=n as i64, any::<bool>()), n).prop_map(|links| {
                links
                    .into_iter()
                    .enumerate()
                    .map(|(i, (parent, active))| {
                        let id = i as i64 + 1;
                        let mut row = Category::new(id, &format!("c{}", id % 5), parent);
                        row.active = active;
                        row
                    })
                    .collect()
            })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn every_row_appears_once(rows in forest()) {
            let tree = CategoryTree::build(&rows);
            prop_assert_eq!(tree.len(), rows.len());
            for row in &rows {
                let index = tree.index_of(row.id);
                prop_assert!(index.is_some());
                prop_assert_eq!(tree.nodes()[index.unwrap()].id, row.id);
            }
        }

        #[test]
        fn next_bounds_the_subtree(rows in forest()) {
            let tree = CategoryTree::build(&rows);
            let nodes = tree.nodes();
            for (i, node) in nodes.iter().enumerate() {
                prop_assert!(node.next > i);
                prop_assert!(node.next <= nodes.len());
                for inner in &nodes[i + 1..node.next] {
                    prop_assert!(inner.depth > node.depth);
                }
                if let Some(after) = nodes.get(node.next) {
                    prop_assert!(after.depth <= node.depth);
                }
            }
        }

        #[test]
        fn nested_nodes_sit_under_their_parent(rows in forest()) {
            let tree = CategoryTree::build(&rows);
            for row in &rows {
                let index = tree.index_of(row.id).unwrap();
                if let Some(parent) = tree.parent_index(index) {
                    prop_assert_eq!(tree.nodes()[parent].id, row.parent_id);
                    prop_assert!(tree.is_descendant(index, parent));
                    prop_assert!(!tree.can_reparent(row.parent_id, row.id));
                }
            }
        }
    }
}
