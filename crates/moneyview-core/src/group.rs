//! Grouping of loaded ids into named, collapsible buckets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::ResourceId;

/// How the category list is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroupChoice {
    #[default]
    All,
    Active,
}

/// How the currency list is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyGroupChoice {
    #[default]
    All,
    Used,
}

/// How the account list is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountGroupChoice {
    #[default]
    All,
    Status,
    Favorite,
}

impl CategoryGroupChoice {
    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryGroupChoice::All => "All",
            CategoryGroupChoice::Active => "Active",
        }
    }
}

impl CurrencyGroupChoice {
    pub fn display_name(&self) -> &'static str {
        match self {
            CurrencyGroupChoice::All => "All",
            CurrencyGroupChoice::Used => "Used",
        }
    }
}

impl AccountGroupChoice {
    pub fn display_name(&self) -> &'static str {
        match self {
            AccountGroupChoice::All => "All",
            AccountGroupChoice::Status => "Status",
            AccountGroupChoice::Favorite => "Favorite",
        }
    }
}

impl fmt::Display for CategoryGroupChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CategoryGroupChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(CategoryGroupChoice::All),
            "active" => Ok(CategoryGroupChoice::Active),
            other => Err(format!("unknown category grouping: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupData {
    /// `None` for the single group of an ungrouped list.
    pub name: Option<String>,
    pub ids: Vec<ResourceId>,
    pub is_visible: bool,
    pub is_expanded: bool,
}

/// Ordered set of groups over one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex {
    groups: Vec<GroupData>,
}

impl GroupIndex {
    /// Everything in one unnamed, expanded group.
    pub fn single(ids: Vec<ResourceId>) -> Self {
        Self {
            groups: vec![GroupData {
                name: None,
                ids,
                is_visible: true,
                is_expanded: true,
            }],
        }
    }

    /// One group per name; `bucket` picks the group of each id.
    ///
    /// Ids keep their input order within a group. An out-of-range bucket
    /// lands in the last group.
    pub fn partition(
        ids: impl IntoIterator<Item = ResourceId>,
        names: &[&str],
        bucket: impl Fn(ResourceId) -> usize,
    ) -> Self {
        let mut groups: Vec<GroupData> = names
            .iter()
            .map(|name| GroupData {
                name: Some(name.to_string()),
                ids: Vec::new(),
                is_visible: true,
                is_expanded: false,
            })
            .collect();
        if groups.is_empty() {
            return Self::default();
        }
        let last = groups.len() - 1;
        for id in ids {
            groups[bucket(id).min(last)].ids.push(id);
        }
        Self { groups }
    }

    /// Number of groups.
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    /// Number of ids over all groups.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[GroupData] {
        &self.groups
    }

    pub fn get(&self, g: usize) -> Option<&GroupData> {
        self.groups.get(g)
    }

    pub fn toggle(&mut self, g: usize) {
        if let Some(group) = self.groups.get_mut(g) {
            group.is_expanded = !group.is_expanded;
        }
    }

    pub fn expand_all(&mut self) {
        self.groups.iter_mut().for_each(|g| g.is_expanded = true);
    }

    pub fn collapse_all(&mut self) {
        self.groups.iter_mut().for_each(|g| g.is_expanded = false);
    }

    /// Recompute visibility after the search key changed.
    ///
    /// With no active search every group is visible. Otherwise a group is
    /// visible when one of its ids matches, and visible groups are expanded.
    pub fn apply_search(&mut self, searching: bool, matches: impl Fn(ResourceId) -> bool) {
        for group in &mut self.groups {
            group.is_visible = !searching || group.ids.iter().any(|&id| matches(id));
            if searching && group.is_visible {
                group.is_expanded = true;
            }
        }
    }
}
