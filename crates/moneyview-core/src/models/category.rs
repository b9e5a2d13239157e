use serde::{Deserialize, Serialize};

use super::{ParentLink, Record};
use crate::id::ResourceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub parent_id: ResourceId,
}

impl Category {
    pub fn new(id: i64, name: &str, parent_id: i64) -> Self {
        Self {
            id: ResourceId::new(id),
            name: name.to_string(),
            active: true,
            parent_id: ResourceId::new(parent_id),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_void()
    }

    /// A small hierarchy used for seeding and demos.
    pub fn sample_data() -> Vec<Category> {
        let mut rows = vec![
            Category::new(1, "Food", 0),
            Category::new(2, "Groceries", 1),
            Category::new(3, "Dining out", 1),
            Category::new(4, "Transport", 0),
            Category::new(5, "Fuel", 4),
            Category::new(6, "Public transport", 4),
            Category::new(7, "Bills", 0),
            Category::new(8, "Electricity", 7),
            Category::new(9, "Internet", 7),
            Category::new(10, "Income", 0),
            Category::new(11, "Salary", 10),
        ];
        rows[5].active = false;
        rows
    }
}

impl Record for Category {
    const TABLE: &'static str = "category";
    const NAME: &'static str = "Category";

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ParentLink for Category {
    fn parent_id(&self) -> ResourceId {
        self.parent_id
    }
}
