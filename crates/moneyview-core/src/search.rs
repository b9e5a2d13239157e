//! Substring search over loaded rows.

use crate::utils::contains_ignore_case;

/// A field a search can look in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchArea {
    Name,
    Path,
}

impl SearchArea {
    pub fn display_name(&self) -> &'static str {
        match self {
            SearchArea::Name => "Name",
            SearchArea::Path => "Path",
        }
    }
}

/// Search key plus the areas it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub key: String,
    areas: Vec<(SearchArea, bool)>,
}

impl Default for Search {
    /// Name selected, path available but off.
    fn default() -> Self {
        Self {
            key: String::new(),
            areas: vec![(SearchArea::Name, true), (SearchArea::Path, false)],
        }
    }
}

impl Search {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    pub fn is_selected(&self, area: SearchArea) -> bool {
        self.areas.iter().any(|&(a, selected)| a == area && selected)
    }

    pub fn select(&mut self, area: SearchArea, selected: bool) {
        for (a, s) in &mut self.areas {
            if *a == area {
                *s = selected;
            }
        }
    }

    pub fn toggle(&mut self, area: SearchArea) {
        let selected = self.is_selected(area);
        self.select(area, !selected);
    }

    /// Placeholder text naming the selected areas, e.g. `Search in Name, Path`.
    pub fn prompt(&self) -> String {
        let names: Vec<&str> = self
            .areas
            .iter()
            .filter(|(_, selected)| *selected)
            .map(|(area, _)| area.display_name())
            .collect();
        format!("Search in {}", names.join(", "))
    }

    /// Case-insensitive match of the key against the selected areas.
    ///
    /// `text` supplies the value of an area for the row being tested, or
    /// `None` when the row has no such value. An empty key matches everything.
    pub fn matches<'a>(&self, text: impl Fn(SearchArea) -> Option<&'a str>) -> bool {
        if self.key.is_empty() {
            return true;
        }
        self.areas
            .iter()
            .filter(|(_, selected)| *selected)
            .filter_map(|&(area, _)| text(area))
            .any(|value| contains_ignore_case(value, &self.key))
    }
}
