//! One view session: the slots behind a screen and the repositories that fill them.
//!
//! Each list is a small set of slots loaded in stages: the raw queries run in
//! parallel first, then the values derived from them are evaluated in
//! dependency order (tree from data, paths from tree, ordering from paths).
//! Everything is owned by one [`LoadCoordinator`]; dropping the session drops
//! every cached value and orphans any fetch still running.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::group::{AccountGroupChoice, CategoryGroupChoice, CurrencyGroupChoice, GroupIndex};
use crate::id::ResourceId;
use crate::load::fetch::{self, SharedRepository};
use crate::load::{Load, LoadCoordinator, LoadSlot, SlotControl};
use crate::models::{Account, Category, Currency, Record};
use crate::repository::{MemoryRepository, SnapshotStore};
use crate::search::{Search, SearchArea};
use crate::tree::path::DEFAULT_DELIMITER;
use crate::tree::{CategoryTree, PathIndex};
use crate::utils::cmp_ignore_case;

pub struct CategoryList {
    pub count: LoadSlot<usize>,
    pub data: LoadSlot<HashMap<ResourceId, Category>>,
    pub active: LoadSlot<HashSet<ResourceId>>,
    pub tree: LoadSlot<CategoryTree>,
    pub path: LoadSlot<PathIndex>,
    /// Ids sorted by path.
    pub order: LoadSlot<Vec<ResourceId>>,
}

impl CategoryList {
    fn new() -> Self {
        Self {
            count: LoadSlot::new("Count(Category)"),
            data: LoadSlot::new("Data(Category)"),
            active: LoadSlot::new("Active(Category)"),
            tree: LoadSlot::new("Tree(Category)"),
            path: LoadSlot::new("Path(Category)"),
            order: LoadSlot::new("Order(Category)"),
        }
    }

    fn slots(&self) -> [&dyn SlotControl; 6] {
        [&self.count, &self.data, &self.active, &self.tree, &self.path, &self.order]
    }
}

pub struct CurrencyList {
    pub count: LoadSlot<usize>,
    pub data: LoadSlot<HashMap<ResourceId, Currency>>,
    /// Currencies referenced by at least one account.
    pub used: LoadSlot<HashSet<ResourceId>>,
}

impl CurrencyList {
    fn new() -> Self {
        Self {
            count: LoadSlot::new("Count(Currency)"),
            data: LoadSlot::new("Data(Currency)"),
            used: LoadSlot::new("Used(Currency)"),
        }
    }

    fn slots(&self) -> [&dyn SlotControl; 3] {
        [&self.count, &self.data, &self.used]
    }
}

pub struct AccountList {
    pub count: LoadSlot<usize>,
    pub data: LoadSlot<HashMap<ResourceId, Account>>,
    pub open: LoadSlot<HashSet<ResourceId>>,
}

impl AccountList {
    fn new() -> Self {
        Self {
            count: LoadSlot::new("Count(Account)"),
            data: LoadSlot::new("Data(Account)"),
            open: LoadSlot::new("Open(Account)"),
        }
    }

    fn slots(&self) -> [&dyn SlotControl; 3] {
        [&self.count, &self.data, &self.open]
    }
}

/// Every slot of a view session.
pub struct ViewSlots {
    pub categories: CategoryList,
    pub currencies: CurrencyList,
    pub accounts: AccountList,
}

impl ViewSlots {
    fn new() -> Self {
        Self {
            categories: CategoryList::new(),
            currencies: CurrencyList::new(),
            accounts: AccountList::new(),
        }
    }

    fn all(&self) -> Vec<&dyn SlotControl> {
        let mut slots: Vec<&dyn SlotControl> = Vec::new();
        slots.extend(self.categories.slots());
        slots.extend(self.currencies.slots());
        slots.extend(self.accounts.slots());
        slots
    }
}

/// The tables a session reads from.
#[derive(Clone)]
pub struct Repositories {
    pub categories: SharedRepository<Category>,
    pub currencies: SharedRepository<Currency>,
    pub accounts: SharedRepository<Account>,
}

impl Repositories {
    pub fn from_store(store: &SnapshotStore) -> Self {
        Self {
            categories: Arc::new(store.table::<Category>()),
            currencies: Arc::new(store.table::<Currency>()),
            accounts: Arc::new(store.table::<Account>()),
        }
    }

    /// In-memory tables holding the bundled sample rows.
    pub fn sample() -> Self {
        Self {
            categories: Arc::new(MemoryRepository::new(Category::sample_data())),
            currencies: Arc::new(MemoryRepository::new(Currency::sample_data())),
            accounts: Arc::new(MemoryRepository::new(Account::sample_data())),
        }
    }
}

/// Ids of `rows` sorted by name, then id.
fn sorted_by_name<R: Record>(rows: &HashMap<ResourceId, R>) -> Vec<ResourceId> {
    let mut ids: Vec<ResourceId> = rows.keys().copied().collect();
    ids.sort_by(|a, b| cmp_ignore_case(rows[a].name(), rows[b].name()).then_with(|| a.cmp(b)));
    ids
}

pub struct ViewSession {
    coordinator: LoadCoordinator<ViewSlots>,
    repos: Repositories,
    path_delimiter: String,
    /// Serializes category edits.
    edits: Mutex<()>,
}

impl ViewSession {
    pub fn new(repos: Repositories) -> Self {
        Self {
            coordinator: LoadCoordinator::new("View", ViewSlots::new()),
            repos,
            path_delimiter: DEFAULT_DELIMITER.to_string(),
            edits: Mutex::new(()),
        }
    }

    pub fn with_path_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.path_delimiter = delimiter.into();
        self
    }

    pub fn slots(&self) -> &ViewSlots {
        self.coordinator.slots()
    }

    pub fn path_delimiter(&self) -> &str {
        &self.path_delimiter
    }

    /// Load the category list and everything derived from it.
    ///
    /// Returns true when every category slot is ready. If the rows themselves
    /// cannot be loaded, the derived slots are left idle.
    pub async fn load_categories(&self) -> bool {
        let c = &self.coordinator;
        let repo = &self.repos.categories;
        let fetched = c
            .load_all(vec![
                fetch::count(|s: &ViewSlots| &s.categories.count, repo),
                fetch::by_id(|s: &ViewSlots| &s.categories.data, repo),
                fetch::filtered_ids(
                    |s: &ViewSlots| &s.categories.active,
                    repo,
                    |row: &Category| row.active,
                ),
            ])
            .await;

        let list = &self.slots().categories;
        if !list.data.is_ready() {
            warn!("Category rows not loaded, skipping tree");
            return false;
        }

        let tree = Load::eval(
            |s: &ViewSlots| &s.categories.tree,
            |s: &ViewSlots| &s.categories.data,
            |rows: &HashMap<ResourceId, Category>| CategoryTree::build(rows.values()),
        );
        if !c.load(tree).await {
            return false;
        }

        let delimiter = self.path_delimiter.clone();
        let path = Load::eval2(
            |s: &ViewSlots| &s.categories.path,
            |s: &ViewSlots| &s.categories.tree,
            |s: &ViewSlots| &s.categories.data,
            move |tree: &CategoryTree, rows: &HashMap<ResourceId, Category>| {
                PathIndex::build(tree, rows, &delimiter)
            },
        );
        if !c.load(path).await {
            return false;
        }

        let order = Load::eval(
            |s: &ViewSlots| &s.categories.order,
            |s: &ViewSlots| &s.categories.path,
            PathIndex::sorted_ids,
        );
        let ordered = c.load(order).await;

        if fetched && ordered {
            info!(count = *list.count.current_value(), "Categories ready");
        }
        fetched && ordered
    }

    /// Load the currency list. The used set needs the account rows, which
    /// are loaded alongside (once, shared with [`ViewSession::load_accounts`]).
    pub async fn load_currencies(&self) -> bool {
        let c = &self.coordinator;
        let fetched = c
            .load_all(vec![
                fetch::count(|s: &ViewSlots| &s.currencies.count, &self.repos.currencies),
                fetch::by_id(|s: &ViewSlots| &s.currencies.data, &self.repos.currencies),
                fetch::by_id(|s: &ViewSlots| &s.accounts.data, &self.repos.accounts),
            ])
            .await;

        let used = Load::eval(
            |s: &ViewSlots| &s.currencies.used,
            |s: &ViewSlots| &s.accounts.data,
            |accounts: &HashMap<ResourceId, Account>| {
                accounts.values().map(|a| a.currency_id).collect::<HashSet<_>>()
            },
        );
        let evaluated = c.load(used).await;

        let list = &self.slots().currencies;
        let ok = list.count.is_ready() && list.data.is_ready() && evaluated;
        if ok {
            info!(count = *list.count.current_value(), "Currencies ready");
        } else if !fetched {
            debug!("Currency list partially loaded");
        }
        ok
    }

    pub async fn load_accounts(&self) -> bool {
        let repo = &self.repos.accounts;
        let ok = self
            .coordinator
            .load_all(vec![
                fetch::count(|s: &ViewSlots| &s.accounts.count, repo),
                fetch::by_id(|s: &ViewSlots| &s.accounts.data, repo),
                fetch::filtered_ids(|s: &ViewSlots| &s.accounts.open, repo, Account::is_open),
            ])
            .await;
        if ok {
            info!(count = *self.slots().accounts.count.current_value(), "Accounts ready");
        }
        ok
    }

    /// Load every list concurrently. A failing list does not hold back the others.
    pub async fn load_all(&self) -> bool {
        let (categories, currencies, accounts) = tokio::join!(
            self.load_categories(),
            self.load_currencies(),
            self.load_accounts(),
        );
        categories && currencies && accounts
    }

    /// Drop every cached value and load everything again from the repositories.
    pub async fn refresh(&self) -> bool {
        let slots = self.slots().all();
        self.coordinator.unload_all(&slots).await;
        info!("Refreshing view");
        self.load_all().await
    }

    /// Change the category path delimiter. Paths and their ordering are
    /// invalidated and re-evaluated on the next [`ViewSession::load_categories`].
    pub fn set_path_delimiter(&mut self, delimiter: impl Into<String>) {
        let delimiter = delimiter.into();
        if delimiter == self.path_delimiter {
            return;
        }
        self.path_delimiter = delimiter;
        let list = &self.slots().categories;
        list.path.unload();
        list.order.unload();
        debug!(delimiter = %self.path_delimiter, "Path delimiter changed");
    }

    /// Bring the category list up to date after one row was inserted
    /// (`old` is `None`), updated, or deleted (`new` is `None`).
    ///
    /// The cached rows are patched in place instead of refetched; the count
    /// is refetched when the number of rows changed, and the tree, paths and
    /// ordering are re-evaluated. Edits run one at a time, and a derived
    /// value still being evaluated from the previous rows is waited out and
    /// discarded before the re-evaluation starts.
    pub async fn reload_category(&self, old: Option<&Category>, new: Option<&Category>) -> bool {
        let _edit = self.edits.lock().await;
        let list = &self.slots().categories;

        let patched = list.data.patch(|rows| {
            if let Some(old) = old {
                rows.remove(&old.id);
            }
            if let Some(new) = new {
                rows.insert(new.id, new.clone());
            }
        });
        if !patched {
            debug!("Category rows not loaded, nothing to patch");
            return self.load_categories().await;
        }

        list.active.patch(|ids| {
            if let Some(old) = old {
                ids.remove(&old.id);
            }
            if let Some(new) = new.filter(|c| c.active) {
                ids.insert(new.id);
            }
        });

        let mut stale: Vec<&dyn SlotControl> = vec![&list.tree, &list.path, &list.order];
        if old.is_none() != new.is_none() {
            stale.push(&list.count);
        }
        self.coordinator.unload_all(&stale).await;

        self.load_categories().await
    }

    /// Group the category list, in path order. `None` until the list is loaded.
    pub fn category_group(&self, choice: CategoryGroupChoice) -> Option<GroupIndex> {
        let list = &self.slots().categories;
        let order = list.order.ready_value()?;
        let ids = order.iter().copied();
        Some(match choice {
            CategoryGroupChoice::All => GroupIndex::single(ids.collect()),
            CategoryGroupChoice::Active => {
                let active = list.active.ready_value()?;
                GroupIndex::partition(ids, &["Active", "Other"], |id| {
                    usize::from(!active.contains(&id))
                })
            }
        })
    }

    pub fn currency_group(&self, choice: CurrencyGroupChoice) -> Option<GroupIndex> {
        let list = &self.slots().currencies;
        let ids = sorted_by_name(&*list.data.ready_value()?);
        Some(match choice {
            CurrencyGroupChoice::All => GroupIndex::single(ids),
            CurrencyGroupChoice::Used => {
                let used = list.used.ready_value()?;
                GroupIndex::partition(ids, &["Used", "Other"], |id| usize::from(!used.contains(&id)))
            }
        })
    }

    pub fn account_group(&self, choice: AccountGroupChoice) -> Option<GroupIndex> {
        let list = &self.slots().accounts;
        let data = list.data.ready_value()?;
        let ids = sorted_by_name(&*data);
        Some(match choice {
            AccountGroupChoice::All => GroupIndex::single(ids),
            AccountGroupChoice::Status => {
                let open = list.open.ready_value()?;
                GroupIndex::partition(ids, &["Open", "Closed"], |id| usize::from(!open.contains(&id)))
            }
            AccountGroupChoice::Favorite => GroupIndex::partition(ids, &["Favorite", "Other"], |id| {
                usize::from(!data.get(&id).is_some_and(|a| a.favorite))
            }),
        })
    }

    /// Ids of the categories matched by `search`. Path matching needs the
    /// path index; without it only names are searched.
    pub fn matching_categories(&self, search: &Search) -> HashSet<ResourceId> {
        let list = &self.slots().categories;
        let Some(rows) = list.data.ready_value() else {
            return HashSet::new();
        };
        let paths = list.path.ready_value();
        rows.values()
            .filter(|row| {
                search.matches(|area| match area {
                    SearchArea::Name => Some(row.name.as_str()),
                    SearchArea::Path => paths.as_ref().and_then(|p| p.get(row.id)),
                })
            })
            .map(|row| row.id)
            .collect()
    }

    /// Recompute group visibility for `search`; matching groups are expanded.
    pub fn search_categories(&self, search: &Search, group: &mut GroupIndex) {
        let matches = self.matching_categories(search);
        group.apply_search(!search.is_empty(), |id| matches.contains(&id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::LoadState;

    struct Fixture {
        categories: Arc<MemoryRepository<Category>>,
        currencies: Arc<MemoryRepository<Currency>>,
        accounts: Arc<MemoryRepository<Account>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                categories: Arc::new(MemoryRepository::new(Category::sample_data())),
                currencies: Arc::new(MemoryRepository::new(Currency::sample_data())),
                accounts: Arc::new(MemoryRepository::new(Account::sample_data())),
            }
        }

        fn session(&self) -> ViewSession {
            ViewSession::new(Repositories {
                categories: self.categories.clone(),
                currencies: self.currencies.clone(),
                accounts: self.accounts.clone(),
            })
        }
    }

    fn id(raw: i64) -> ResourceId {
        ResourceId::new(raw)
    }

    #[tokio::test]
    async fn test_load_all_fills_every_list() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_all().await);

        let slots = session.slots();
        assert!(slots.all().iter().all(|s| s.state() == LoadState::Ready));
        assert_eq!(*slots.categories.count.current_value(), 11);
        assert_eq!(slots.categories.tree.current_value().len(), 11);
        let paths = slots.categories.path.current_value();
        assert_eq!(paths.get(id(2)), Some("Food:Groceries"));
        assert_eq!(paths.get(id(6)), Some("Transport:Public transport"));
        assert_eq!(slots.categories.order.current_value().first(), Some(&id(7)));

        let used = slots.currencies.used.current_value();
        assert_eq!(used.len(), 2);
        assert!(!used.contains(&id(3)));
        assert_eq!(slots.accounts.open.current_value().len(), 3);
    }

    #[tokio::test]
    async fn test_second_load_fetches_nothing() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_all().await);
        let before = (
            fixture.categories.query_count(),
            fixture.currencies.query_count(),
            fixture.accounts.query_count(),
        );
        assert!(session.load_all().await);
        let after = (
            fixture.categories.query_count(),
            fixture.currencies.query_count(),
            fixture.accounts.query_count(),
        );
        assert_eq!(before, after);
        assert_eq!(before.0, 3);
    }

    #[tokio::test]
    async fn test_category_failure_leaves_other_lists_ready() {
        let fixture = Fixture::new();
        fixture.categories.set_failing(true);
        let session = fixture.session();
        assert!(!session.load_all().await);

        let slots = session.slots();
        assert!(slots.categories.data.is_error());
        assert_eq!(slots.categories.tree.state(), LoadState::Idle);
        assert!(slots.currencies.data.is_ready());
        assert!(slots.accounts.data.is_ready());
        assert!(session.category_group(CategoryGroupChoice::All).is_none());

        // Retry once the store is back
        fixture.categories.set_failing(false);
        assert!(session.load_categories().await);
        assert!(slots.categories.tree.is_ready());
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_all().await);
        fixture.categories.upsert(Category::new(12, "Snacks", 1));
        assert!(session.refresh().await);
        assert_eq!(*session.slots().categories.count.current_value(), 12);
        assert_eq!(fixture.categories.query_count(), 6);
    }

    #[tokio::test]
    async fn test_set_path_delimiter_reevaluates_paths_only() {
        let fixture = Fixture::new();
        let mut session = fixture.session();
        assert!(session.load_categories().await);

        session.set_path_delimiter(" / ");
        assert_eq!(session.slots().categories.path.state(), LoadState::Idle);
        assert!(session.slots().categories.tree.is_ready());

        assert!(session.load_categories().await);
        let paths = session.slots().categories.path.current_value();
        assert_eq!(paths.get(id(2)), Some("Food / Groceries"));
        assert_eq!(fixture.categories.query_count(), 3);
    }

    #[tokio::test]
    async fn test_reload_category_insert() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_categories().await);

        let snacks = Category::new(12, "Snacks", 1);
        fixture.categories.upsert(snacks.clone());
        assert!(session.reload_category(None, Some(&snacks)).await);

        let list = &session.slots().categories;
        assert_eq!(*list.count.current_value(), 12);
        assert!(list.active.current_value().contains(&id(12)));
        let tree = list.tree.current_value();
        assert!(tree.is_descendant_id(id(12), id(1)));
        assert_eq!(list.path.current_value().get(id(12)), Some("Food:Snacks"));
        // count refetched; rows and active set patched in place
        assert_eq!(fixture.categories.query_count(), 4);
    }

    #[tokio::test]
    async fn test_reload_category_move_and_delete() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_categories().await);
        let list = &session.slots().categories;

        let fuel = list.data.current_value()[&id(5)].clone();
        let mut moved = fuel.clone();
        moved.parent_id = id(7);
        assert!(list.tree.current_value().can_reparent(moved.id, moved.parent_id));
        fixture.categories.upsert(moved.clone());
        assert!(session.reload_category(Some(&fuel), Some(&moved)).await);
        assert_eq!(list.path.current_value().get(id(5)), Some("Bills:Fuel"));
        assert_eq!(fixture.categories.query_count(), 3);

        fixture.categories.remove(id(5));
        assert!(session.reload_category(Some(&moved), None).await);
        assert_eq!(*list.count.current_value(), 10);
        assert!(!list.tree.current_value().contains(id(5)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reload_category_stays_consistent() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_categories().await);
        let list = &session.slots().categories;

        let rows = list.data.current_value();
        let groceries = rows[&id(2)].clone();
        let mut renamed = groceries.clone();
        renamed.name = "Supermarket".to_string();
        let fuel = rows[&id(5)].clone();
        let mut under_food = fuel.clone();
        under_food.parent_id = id(1);
        fixture.categories.upsert(renamed.clone());
        fixture.categories.upsert(under_food.clone());

        let (a, b) = tokio::join!(
            session.reload_category(Some(&groceries), Some(&renamed)),
            session.reload_category(Some(&fuel), Some(&under_food)),
        );
        assert!(a && b);

        let rows = list.data.current_value();
        let tree = list.tree.ready_value().unwrap();
        let paths = list.path.ready_value().unwrap();
        assert_eq!(rows[&id(5)].parent_id, id(1));
        assert!(tree.is_descendant_id(id(5), id(1)));
        assert_eq!(paths.get(id(5)), Some("Food:Fuel"));
        assert_eq!(paths.get(id(2)), Some("Food:Supermarket"));
        assert_eq!(list.order.ready_value().unwrap().len(), rows.len());
    }

    #[tokio::test]
    async fn test_category_groups() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_categories().await);

        let all = session.category_group(CategoryGroupChoice::All).unwrap();
        assert_eq!(all.count(), 1);
        assert_eq!(all.total(), 11);

        let active = session.category_group(CategoryGroupChoice::Active).unwrap();
        assert_eq!(active.count(), 2);
        assert_eq!(active.groups()[0].ids.len(), 10);
        assert_eq!(active.groups()[1].ids, vec![id(6)]);
    }

    #[tokio::test]
    async fn test_currency_and_account_groups() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_all().await);

        let used = session.currency_group(CurrencyGroupChoice::Used).unwrap();
        assert_eq!(used.groups()[0].ids.len(), 2);
        assert_eq!(used.groups()[1].ids, vec![id(3)]);

        let status = session.account_group(AccountGroupChoice::Status).unwrap();
        assert_eq!(status.groups()[0].ids.len(), 3);
        assert_eq!(status.groups()[1].ids.len(), 1);

        let favorite = session.account_group(AccountGroupChoice::Favorite).unwrap();
        assert_eq!(favorite.groups()[0].ids.len(), 1);
    }

    #[tokio::test]
    async fn test_search_categories() {
        let fixture = Fixture::new();
        let session = fixture.session();
        assert!(session.load_categories().await);
        let mut group = session.category_group(CategoryGroupChoice::Active).unwrap();

        let search = Search::new("public");
        assert_eq!(session.matching_categories(&search), HashSet::from([id(6)]));
        session.search_categories(&search, &mut group);
        assert!(!group.groups()[0].is_visible);
        assert!(group.groups()[1].is_visible);
        assert!(group.groups()[1].is_expanded);

        let mut by_path = Search::new("food");
        by_path.toggle(SearchArea::Path);
        assert_eq!(session.matching_categories(&by_path).len(), 3);

        session.search_categories(&Search::default(), &mut group);
        assert!(group.groups().iter().all(|g| g.is_visible));
    }

    #[tokio::test]
    async fn test_dropping_session_with_load_in_flight() {
        let fixture = Fixture::new();
        let session = fixture.session();
        {
            let load = session.load_all();
            let _ = tokio::time::timeout(std::time::Duration::from_millis(1), load).await;
        }
        drop(session);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(fixture.categories.query_count() <= 3);
    }
}
