use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::Repository;
use crate::error::StoreError;
use crate::models::{Account, Category, Currency, Record};

/// Rows of one table together with the time they were written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub rows: Vec<T>,
    pub saved_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows,
            saved_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.saved_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Clock skew lands here too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Directory of JSON table snapshots, one `<table>.json` file per table.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", table))
    }

    fn load<R: Record + DeserializeOwned>(&self) -> Result<Option<Snapshot<R>>, StoreError> {
        let path = self.snapshot_path(R::TABLE);
        if !path.exists() {
            return Ok(None);
        }
        read_snapshot(&path).map(Some)
    }

    /// Write all rows of a table, replacing the previous snapshot.
    pub fn save<R: Record + Serialize>(&self, rows: &[R]) -> Result<()> {
        let snapshot = Snapshot::new(rows.to_vec());
        let path = self.snapshot_path(R::TABLE);
        let contents = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write snapshot: {}", R::TABLE))?;
        debug!(table = R::TABLE, rows = rows.len(), "Snapshot saved");
        Ok(())
    }

    /// Repository view over one table of this store.
    pub fn table<R: Record + DeserializeOwned>(&self) -> SnapshotTable<R> {
        SnapshotTable {
            path: self.snapshot_path(R::TABLE),
            _row: PhantomData,
        }
    }

    /// Write the bundled sample rows for every table.
    pub fn seed(&self) -> Result<()> {
        self.save(&Category::sample_data())?;
        self.save(&Currency::sample_data())?;
        self.save(&Account::sample_data())?;
        Ok(())
    }

    /// Load a snapshot for its age only, logging errors without failing.
    fn load_age<R: Record + DeserializeOwned>(&self) -> Option<String> {
        match self.load::<R>() {
            Ok(Some(snapshot)) => Some(snapshot.age_display()),
            Ok(None) => None,
            Err(e) => {
                debug!(table = R::TABLE, error = %e, "Failed to load snapshot for age display");
                None
            }
        }
    }

    pub fn ages(&self) -> SnapshotAges {
        SnapshotAges {
            categories: self.load_age::<Category>(),
            currencies: self.load_age::<Currency>(),
            accounts: self.load_age::<Account>(),
        }
    }
}

fn read_snapshot<R: DeserializeOwned>(path: &std::path::Path) -> Result<Snapshot<R>, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// One table of a [`SnapshotStore`]; every query re-reads the file.
pub struct SnapshotTable<R> {
    path: PathBuf,
    _row: PhantomData<fn() -> R>,
}

impl<R: Record + DeserializeOwned> SnapshotTable<R> {
    fn rows(&self) -> Result<Vec<R>, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::MissingTable(R::TABLE.to_string()));
        }
        Ok(read_snapshot::<R>(&self.path)?.rows)
    }
}

impl<R: Record + DeserializeOwned> Repository for SnapshotTable<R> {
    type Row = R;

    fn name(&self) -> &str {
        R::NAME
    }

    fn fetch_all(&self) -> Result<Vec<R>, StoreError> {
        self.rows()
    }
}

#[derive(Debug, Default)]
pub struct SnapshotAges {
    pub categories: Option<String>,
    pub currencies: Option<String>,
    pub accounts: Option<String>,
}

impl SnapshotAges {
    /// Age of the first table that has a snapshot, or "never".
    pub fn last_updated(&self) -> String {
        [&self.categories, &self.currencies, &self.accounts]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ResourceId;
    use chrono::Duration;

    #[test]
    fn test_snapshot_age_display_just_now() {
        let snapshot = Snapshot::new(vec![1, 2, 3]);
        assert_eq!(snapshot.age_display(), "just now");
    }

    #[test]
    fn test_snapshot_age_display_rounding() {
        let mut snapshot = Snapshot::new(vec![1]);
        snapshot.saved_at = Utc::now() - Duration::minutes(5);
        assert_eq!(snapshot.age_display(), "5m ago");
        snapshot.saved_at = Utc::now() - Duration::minutes(95);
        assert_eq!(snapshot.age_display(), "2h ago");
        snapshot.saved_at = Utc::now() - Duration::hours(26);
        assert_eq!(snapshot.age_display(), "1d ago");
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        let table = store.table::<Category>();
        assert!(matches!(table.fetch_all(), Err(StoreError::MissingTable(_))));
    }

    #[test]
    fn test_seed_then_query() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        store.seed().unwrap();

        let categories = store.table::<Category>();
        assert_eq!(categories.name(), "Category");
        assert_eq!(categories.fetch_count().unwrap(), Category::sample_data().len());
        let by_id = categories.fetch_by_id().unwrap();
        assert_eq!(by_id[&ResourceId::new(5)].name, "Fuel");

        let accounts = store.table::<Account>();
        let open = accounts.fetch_filtered_ids(&|a: &Account| a.is_open()).unwrap();
        assert_eq!(open.len(), 3);
    }

    #[test]
    fn test_corrupt_snapshot_is_parse_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        std::fs::write(temp.path().join("currency.json"), "{ not json").unwrap();
        let table = store.table::<Currency>();
        assert!(matches!(table.fetch_all(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_ages() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(temp.path().to_path_buf()).unwrap();
        assert_eq!(store.ages().last_updated(), "never");
        store.save(&Currency::sample_data()).unwrap();
        let ages = store.ages();
        assert!(ages.categories.is_none());
        assert_eq!(ages.last_updated(), "just now");
    }
}
