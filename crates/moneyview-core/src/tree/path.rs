use std::collections::HashMap;

use super::CategoryTree;
use crate::id::ResourceId;
use crate::models::Record;
use crate::utils::cmp_ignore_case;

pub const DEFAULT_DELIMITER: &str = ":";

/// Display path of every node in a [`CategoryTree`], e.g. `Food:Groceries`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathIndex {
    delimiter: String,
    paths: HashMap<ResourceId, String>,
}

impl PathIndex {
    /// One pass over the pre-order list, keeping the paths of the current
    /// ancestors on a stack indexed by depth.
    pub fn build<R: Record>(
        tree: &CategoryTree,
        rows: &HashMap<ResourceId, R>,
        delimiter: &str,
    ) -> Self {
        let mut paths = HashMap::with_capacity(tree.len());
        let mut stack: Vec<String> = Vec::new();
        for node in tree.nodes() {
            stack.truncate(node.depth);
            let name = rows.get(&node.id).map(|row| row.name()).unwrap_or_default();
            let path = match stack.last() {
                Some(parent) => format!("{}{}{}", parent, delimiter, name),
                None => name.to_string(),
            };
            paths.insert(node.id, path.clone());
            stack.push(path);
        }
        Self {
            delimiter: delimiter.to_string(),
            paths,
        }
    }

    pub fn get(&self, id: ResourceId) -> Option<&str> {
        self.paths.get(&id).map(String::as_str)
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &str)> {
        self.paths.iter().map(|(id, path)| (*id, path.as_str()))
    }

    /// Ids sorted by path (case-insensitive), then by id.
    pub fn sorted_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.paths.keys().copied().collect();
        ids.sort_by(|a, b| {
            cmp_ignore_case(&self.paths[a], &self.paths[b]).then_with(|| a.cmp(b))
        });
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ParentLink};

    fn by_id(rows: Vec<Category>) -> HashMap<ResourceId, Category> {
        rows.into_iter().map(|c| (c.id, c)).collect()
    }

    fn id(raw: i64) -> ResourceId {
        ResourceId::new(raw)
    }

    #[test]
    fn test_food_and_transport_paths() {
        let rows = by_id(vec![
            Category::new(1, "Food", 0),
            Category::new(2, "Groceries", 1),
            Category::new(3, "Transport", 0),
        ]);
        let tree = CategoryTree::build(rows.values());
        let paths = PathIndex::build(&tree, &rows, DEFAULT_DELIMITER);
        assert_eq!(paths.len(), 3);
        assert_eq!(paths.get(id(1)), Some("Food"));
        assert_eq!(paths.get(id(2)), Some("Food:Groceries"));
        assert_eq!(paths.get(id(3)), Some("Transport"));
    }

    #[test]
    fn test_custom_delimiter_and_depth() {
        let rows = by_id(vec![
            Category::new(1, "Home", 0),
            Category::new(2, "Utilities", 1),
            Category::new(3, "Water", 2),
            Category::new(4, "Rent", 1),
        ]);
        let tree = CategoryTree::build(rows.values());
        let paths = PathIndex::build(&tree, &rows, " / ");
        assert_eq!(paths.get(id(3)), Some("Home / Utilities / Water"));
        assert_eq!(paths.get(id(4)), Some("Home / Rent"));
        assert_eq!(paths.delimiter(), " / ");
    }

    #[test]
    fn test_child_path_extends_parent_path() {
        let rows = by_id(Category::sample_data());
        let tree = CategoryTree::build(rows.values());
        let paths = PathIndex::build(&tree, &rows, ":");
        for row in rows.values() {
            let path = paths.get(row.id).unwrap();
            if row.parent_id().is_void() {
                assert!(!path.contains(':'));
            } else {
                let parent = paths.get(row.parent_id()).unwrap();
                assert_eq!(path, format!("{}:{}", parent, row.name));
            }
        }
    }

    #[test]
    fn test_sorted_ids() {
        let rows = by_id(vec![
            Category::new(1, "food", 0),
            Category::new(2, "Groceries", 1),
            Category::new(3, "Bills", 0),
        ]);
        let tree = CategoryTree::build(rows.values());
        let paths = PathIndex::build(&tree, &rows, ":");
        assert_eq!(paths.sorted_ids(), vec![id(3), id(1), id(2)]);
    }
}
