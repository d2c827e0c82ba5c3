//! The table state store: canonical records, pagination, preferences, and
//! the derived display collection.
//!
//! The store follows the same shape as the other models in this crate: a
//! struct of state, synchronous actions that transition it, and `Cmd`
//! futures for the asynchronous fetches. The bubbletea runtime drives all
//! mutations from a single logical thread, so the only concurrency guard
//! needed is the single-flight check inside [`TableState::load_more_users`].
//!
//! Two collections live here. The raw user list is the source of truth: it
//! only ever grows (replace on fetch, append on load-more) and is what gets
//! persisted. The display collection is a cache derived from it — computed
//! fields plus the active sort — and is rebuilt in full whenever the raw
//! list or the sort configuration changes. It is never persisted and never
//! mutated independently.
//!
//! Completion messages carry the request generation captured when the
//! command was issued. [`TableState::reset_pagination`] bumps the
//! generation, so a fetch that was in flight across a reset is discarded on
//! arrival instead of resurrecting cleared records.
//!
//! # Examples
//!
//! Driving the store outside a running program:
//!
//! ```rust
//! use std::sync::Arc;
//! use bubbletea_usergrid::source::MockDataSource;
//! use bubbletea_usergrid::store::TableState;
//!
//! async fn first_page() {
//!     let mut store = TableState::new(Arc::new(MockDataSource::new()));
//!     let cmd = store.fetch_users(1);
//!     let msg = cmd.await.expect("fetch always resolves to a message");
//!     store.update(&msg);
//!     assert_eq!(store.users().len(), 100);
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use bubbletea_rs::{Cmd, Msg};
use chrono::{DateTime, Utc};

use crate::column::default_column_order;
use crate::sort::{sort_users, SortConfig};
use crate::source::PagedDataSource;
use crate::storage::{PersistedTable, TableCache};
use crate::user::{compute_user_fields, ComputedUser, User};

/// Records fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// The pagination cursor. `page` is 1-based once fetching starts; 0 means
/// nothing has been fetched yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Highest page applied so far.
    pub page: usize,
    /// Records requested per page.
    pub page_size: usize,
    /// Corpus size as last reported by the source.
    pub total_count: usize,
    /// True while the source has pages past `page`.
    pub has_more: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            total_count: 0,
            has_more: true,
        }
    }
}

/// A page fetch completed and should replace the raw records.
#[derive(Debug)]
pub struct UsersFetchedMsg {
    page: usize,
    users: Vec<User>,
    total_count: usize,
    has_more: bool,
    generation: u64,
}

/// A load-more completed and should append to the raw records.
#[derive(Debug)]
pub struct MoreUsersLoadedMsg {
    page: usize,
    users: Vec<User>,
    total_count: usize,
    has_more: bool,
    generation: u64,
}

/// A fetch or load-more failed; carries the user-facing message.
#[derive(Debug)]
pub struct FetchFailedMsg {
    message: String,
    load_more: bool,
    generation: u64,
}

/// Owns the fetched records, the derived display collection, pagination,
/// and the sort / column-order preferences.
pub struct TableState {
    users: Vec<User>,
    display: Vec<ComputedUser>,
    loading: bool,
    loading_more: bool,
    error: Option<String>,
    sort_config: Option<SortConfig>,
    column_order: Vec<String>,
    pagination: Pagination,
    generation: u64,
    source: Arc<dyn PagedDataSource>,
    cache: Option<TableCache>,
    clock: fn() -> DateTime<Utc>,
}

impl fmt::Debug for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableState")
            .field("users", &self.users.len())
            .field("display", &self.display.len())
            .field("loading", &self.loading)
            .field("loading_more", &self.loading_more)
            .field("error", &self.error)
            .field("sort_config", &self.sort_config)
            .field("pagination", &self.pagination)
            .field("generation", &self.generation)
            .finish()
    }
}

impl TableState {
    /// Creates an empty store over the given data source.
    pub fn new(source: Arc<dyn PagedDataSource>) -> Self {
        Self {
            users: Vec::new(),
            display: Vec::new(),
            loading: false,
            loading_more: false,
            error: None,
            sort_config: None,
            column_order: default_column_order(),
            pagination: Pagination::default(),
            generation: 0,
            source,
            cache: None,
            clock: Utc::now,
        }
    }

    /// Attaches a persistence cache and seeds state from it (builder
    /// pattern).
    ///
    /// Seeding restores the raw records, column order, and sort
    /// configuration, then rehydrates the display collection so derived day
    /// counts reflect the current time. The pagination cursor is not
    /// persisted and stays at its initial value.
    pub fn with_cache(mut self, cache: TableCache) -> Self {
        if let Some(persisted) = cache.load() {
            self.users = persisted.users;
            if !persisted.column_order.is_empty() {
                self.column_order = persisted.column_order;
            }
            self.sort_config = persisted.sort_config;
        }
        self.cache = Some(cache);
        if !self.users.is_empty() {
            self.recompute_display();
        }
        self
    }

    /// Overrides the clock used when deriving display fields (builder
    /// pattern). Tests use a fixed clock to make recomputation
    /// reproducible.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// The raw fetched records, in fetch order.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// The derived, sorted collection the table renders.
    pub fn display(&self) -> &[ComputedUser] {
        &self.display
    }

    /// True while an initial or refresh fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True while a load-more is in flight.
    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// The last fetch failure, if it has not been cleared.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The active sort configuration, if any.
    pub fn sort_config(&self) -> Option<&SortConfig> {
        self.sort_config.as_ref()
    }

    /// The stored column order, verbatim and unvalidated.
    pub fn column_order(&self) -> &[String] {
        &self.column_order
    }

    /// The current pagination cursor.
    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Begins a (re)load of the given 1-based page.
    ///
    /// The returned command resolves to a message that this store's
    /// [`update`](Self::update) applies: on success the fetched page
    /// replaces the raw records; on failure the error is recorded and the
    /// records already held are left untouched.
    pub fn fetch_users(&mut self, page: usize) -> Cmd {
        self.loading = true;
        self.error = None;
        self.persist();

        let source = Arc::clone(&self.source);
        let page_size = self.pagination.page_size;
        let generation = self.generation;
        Box::pin(async move {
            let msg: Msg = match source.fetch_page(page, page_size).await {
                Ok(fetched) => Box::new(UsersFetchedMsg {
                    page,
                    users: fetched.users,
                    total_count: fetched.total_count,
                    has_more: fetched.has_more,
                    generation,
                }),
                Err(err) => Box::new(FetchFailedMsg {
                    message: format!("Failed to fetch users: {err}"),
                    load_more: false,
                    generation,
                }),
            };
            Some(msg)
        })
    }

    /// Requests the next page and appends it to the raw records.
    ///
    /// Single-flight: returns `None` while any fetch or load-more is
    /// already in flight, or when the source has no more records. At most
    /// one load-more is ever outstanding.
    pub fn load_more_users(&mut self) -> Option<Cmd> {
        if self.loading || self.loading_more || !self.pagination.has_more {
            return None;
        }
        self.loading_more = true;
        self.error = None;
        self.persist();

        let source = Arc::clone(&self.source);
        let next_page = self.pagination.page + 1;
        let page_size = self.pagination.page_size;
        let generation = self.generation;
        Some(Box::pin(async move {
            let msg: Msg = match source.fetch_page(next_page, page_size).await {
                Ok(fetched) => Box::new(MoreUsersLoadedMsg {
                    page: next_page,
                    users: fetched.users,
                    total_count: fetched.total_count,
                    has_more: fetched.has_more,
                    generation,
                }),
                Err(err) => Box::new(FetchFailedMsg {
                    message: format!("Failed to load more users: {err}"),
                    load_more: true,
                    generation,
                }),
            };
            Some(msg)
        }))
    }

    /// Replaces the sort configuration and rebuilds the display collection.
    pub fn set_sort_config(&mut self, config: Option<SortConfig>) {
        self.sort_config = config;
        self.recompute_display();
        self.persist();
    }

    /// Replaces the column order verbatim. Validation is a render-time
    /// concern; unknown identifiers are kept here and dropped by the view.
    pub fn set_column_order(&mut self, order: Vec<String>) {
        self.column_order = order;
        self.persist();
    }

    /// Clears the error without touching any other field.
    pub fn clear_error(&mut self) {
        self.error = None;
        self.persist();
    }

    /// Recomputes derived fields at the current time and reapplies the
    /// sort. No-op when no records are held. Called after state has been
    /// seeded from storage, where stale day counts must not survive.
    pub fn rehydrate_users(&mut self) {
        if self.users.is_empty() {
            return;
        }
        self.recompute_display();
        self.persist();
    }

    /// Clears records, display collection, and the pagination cursor back
    /// to their initial state. Sort configuration and column order are
    /// kept.
    ///
    /// Bumps the request generation and releases the loading flags: any
    /// fetch still in flight belongs to the old generation and will be
    /// discarded when it completes.
    pub fn reset_pagination(&mut self) {
        self.users.clear();
        self.display.clear();
        self.pagination = Pagination::default();
        self.generation += 1;
        self.loading = false;
        self.loading_more = false;
        self.persist();
    }

    /// Applies a completion message produced by one of this store's
    /// commands. Returns `true` when the message was one of ours (stale
    /// messages included — they are consumed and discarded).
    pub fn update(&mut self, msg: &Msg) -> bool {
        if let Some(fetched) = msg.downcast_ref::<UsersFetchedMsg>() {
            if fetched.generation != self.generation {
                return true;
            }
            self.loading = false;
            self.users = fetched.users.clone();
            self.pagination = Pagination {
                page: fetched.page,
                page_size: self.pagination.page_size,
                total_count: fetched.total_count,
                has_more: fetched.has_more,
            };
            self.recompute_display();
            self.persist();
            true
        } else if let Some(loaded) = msg.downcast_ref::<MoreUsersLoadedMsg>() {
            if loaded.generation != self.generation {
                return true;
            }
            self.loading_more = false;
            self.users.extend(loaded.users.iter().cloned());
            self.pagination = Pagination {
                page: loaded.page,
                page_size: self.pagination.page_size,
                total_count: loaded.total_count,
                has_more: loaded.has_more,
            };
            // The sort must be reapplied over the full accumulated set, not
            // just the new page.
            self.recompute_display();
            self.persist();
            true
        } else if let Some(failed) = msg.downcast_ref::<FetchFailedMsg>() {
            if failed.generation != self.generation {
                return true;
            }
            if failed.load_more {
                self.loading_more = false;
            } else {
                self.loading = false;
            }
            self.error = Some(failed.message.clone());
            self.persist();
            true
        } else {
            false
        }
    }

    fn recompute_display(&mut self) {
        let now = (self.clock)();
        let computed: Vec<ComputedUser> = self
            .users
            .iter()
            .map(|user| compute_user_fields(user, now))
            .collect();
        self.display = sort_users(&computed, self.sort_config.as_ref());
    }

    fn persist(&self) {
        if let Some(cache) = &self.cache {
            cache.save(&PersistedTable {
                users: self.users.clone(),
                column_order: self.column_order.clone(),
                sort_config: self.sort_config,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnId;
    use crate::sort::SortDirection;
    use crate::source::{MockDataSource, TOTAL_USERS};
    use crate::storage::{MemorySlotStore, SlotStore, STORAGE_KEY};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn test_store() -> (Arc<MockDataSource>, TableState) {
        let source = Arc::new(MockDataSource::new());
        let store = TableState::new(source.clone()).with_clock(fixed_now);
        (source, store)
    }

    async fn apply(store: &mut TableState, cmd: Cmd) {
        let msg = cmd.await.expect("command always resolves to a message");
        assert!(store.update(&msg));
    }

    #[tokio::test]
    async fn test_fetch_replaces_records_and_sets_cursor() {
        let (_, mut store) = test_store();
        assert_eq!(store.pagination().page, 0);

        let cmd = store.fetch_users(1);
        assert!(store.is_loading());
        apply(&mut store, cmd).await;

        assert!(!store.is_loading());
        assert_eq!(store.users().len(), 100);
        assert_eq!(store.display().len(), 100);
        assert_eq!(store.pagination().page, 1);
        assert_eq!(store.pagination().total_count, TOTAL_USERS);
        assert!(store.pagination().has_more);
    }

    #[tokio::test]
    async fn test_pagination_accumulates_across_load_mores() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        for _ in 0..3 {
            let cmd = store.load_more_users().expect("load-more should start");
            apply(&mut store, cmd).await;
        }

        assert_eq!(store.users().len(), 400);
        assert_eq!(store.pagination().page, 4);
        assert!(store.pagination().has_more);

        // Prior order is preserved and new records land after old ones.
        assert_eq!(store.users()[0], MockDataSource::generate_user(0));
        assert_eq!(store.users()[399], MockDataSource::generate_user(399));
    }

    #[tokio::test]
    async fn test_exhausting_the_corpus_flips_has_more() {
        let (source, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        while let Some(cmd) = store.load_more_users() {
            apply(&mut store, cmd).await;
        }

        assert_eq!(store.users().len(), TOTAL_USERS);
        assert_eq!(store.pagination().page, 25);
        assert!(!store.pagination().has_more);
        assert_eq!(source.call_count(), 25);

        // The 26th load-more is a no-op.
        assert!(store.load_more_users().is_none());
        assert_eq!(source.call_count(), 25);
    }

    #[tokio::test]
    async fn test_load_more_is_single_flight() {
        let (source, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;
        let calls_after_fetch = source.call_count();

        let first = store.load_more_users();
        let second = store.load_more_users();
        assert!(first.is_some());
        assert!(second.is_none());

        apply(&mut store, first.unwrap()).await;
        assert_eq!(source.call_count(), calls_after_fetch + 1);
        assert_eq!(store.users().len(), 200);
    }

    #[tokio::test]
    async fn test_load_more_blocked_while_fetch_in_flight() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        // Fetch issued but not yet applied: the loading flag guards.
        assert!(store.load_more_users().is_none());
        apply(&mut store, cmd).await;
        assert!(store.load_more_users().is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_preserves_prior_records() {
        let (source, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;
        let display_before = store.display().to_vec();

        source.set_failing(true);
        let cmd = store.fetch_users(2);
        apply(&mut store, cmd).await;

        assert!(!store.is_loading());
        let error = store.error().expect("error should be recorded");
        assert!(!error.is_empty());
        assert_eq!(store.users().len(), 100);
        assert_eq!(store.display(), display_before.as_slice());
        assert_eq!(store.pagination().page, 1);
    }

    #[tokio::test]
    async fn test_failed_load_more_contributes_nothing() {
        let (source, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        source.set_failing(true);
        let cmd = store.load_more_users().unwrap();
        apply(&mut store, cmd).await;

        assert!(!store.is_loading_more());
        assert!(store.error().is_some());
        assert_eq!(store.users().len(), 100);

        // Retry is caller-initiated and identically specified.
        source.set_failing(false);
        let cmd = store.load_more_users().unwrap();
        apply(&mut store, cmd).await;
        assert!(store.error().is_none());
        assert_eq!(store.users().len(), 200);
    }

    #[tokio::test]
    async fn test_clear_error_touches_nothing_else() {
        let (source, mut store) = test_store();
        source.set_failing(true);
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;
        assert!(store.error().is_some());

        store.clear_error();
        assert!(store.error().is_none());
        assert_eq!(store.pagination().page, 0);
        assert!(store.users().is_empty());
    }

    #[tokio::test]
    async fn test_sort_applies_over_full_accumulated_set() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;
        store.set_sort_config(Some(SortConfig::ascending(ColumnId::Email)));

        let cmd = store.load_more_users().unwrap();
        apply(&mut store, cmd).await;

        let emails: Vec<&str> = store
            .display()
            .iter()
            .map(|u| u.user.email.as_str())
            .collect();
        let mut sorted_emails = emails.clone();
        sorted_emails.sort();
        assert_eq!(emails, sorted_emails);
        assert_eq!(store.display().len(), 200);
    }

    #[tokio::test]
    async fn test_set_sort_config_none_restores_insertion_order() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        store.set_sort_config(Some(SortConfig::new(ColumnId::City, SortDirection::Desc)));
        let cities: Vec<&str> = store
            .display()
            .iter()
            .map(|u| u.user.city.as_str())
            .collect();
        let mut desc_cities = cities.clone();
        desc_cities.sort_by(|a, b| b.cmp(a));
        assert_eq!(cities, desc_cities);

        store.set_sort_config(None);
        let ids: Vec<&str> = store.display().iter().map(|u| u.user.id.as_str()).collect();
        let raw_ids: Vec<&str> = store.users().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, raw_ids);
    }

    #[tokio::test]
    async fn test_rehydrate_is_idempotent_under_fixed_clock() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        store.rehydrate_users();
        let first = store.display().to_vec();
        store.rehydrate_users();
        assert_eq!(store.display(), first.as_slice());
    }

    #[test]
    fn test_rehydrate_on_empty_store_is_noop() {
        let (_, mut store) = test_store();
        store.rehydrate_users();
        assert!(store.display().is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_preferences() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;
        store.set_sort_config(Some(SortConfig::ascending(ColumnId::LastName)));
        store.set_column_order(vec!["email".to_string(), "city".to_string()]);

        store.reset_pagination();
        assert!(store.users().is_empty());
        assert!(store.display().is_empty());
        assert_eq!(store.pagination(), Pagination::default());
        assert_eq!(
            store.sort_config(),
            Some(&SortConfig::ascending(ColumnId::LastName))
        );
        assert_eq!(store.column_order(), ["email", "city"]);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded_after_reset() {
        let (_, mut store) = test_store();
        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        let in_flight = store.load_more_users().unwrap();
        store.reset_pagination();

        let msg = in_flight.await.unwrap();
        assert!(store.update(&msg));

        // The stale append never lands.
        assert!(store.users().is_empty());
        assert_eq!(store.pagination().page, 0);
        assert!(!store.is_loading_more());
    }

    #[tokio::test]
    async fn test_every_mutation_writes_through_the_cache() {
        let slot = Arc::new(MemorySlotStore::new());
        let source = Arc::new(MockDataSource::new());
        let mut store = TableState::new(source)
            .with_clock(fixed_now)
            .with_cache(TableCache::new(slot.clone()));

        let cmd = store.fetch_users(1);
        apply(&mut store, cmd).await;

        let raw = slot.raw(STORAGE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["table"]["users"].as_array().unwrap().len(), 100);

        store.set_column_order(vec!["city".to_string()]);
        let raw = slot.raw(STORAGE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["table"]["columnOrder"][0], "city");
    }

    #[tokio::test]
    async fn test_seeding_from_cache_restores_slice_not_cursor() {
        let slot = Arc::new(MemorySlotStore::new());
        let source = Arc::new(MockDataSource::new());
        {
            let mut store = TableState::new(source.clone())
                .with_clock(fixed_now)
                .with_cache(TableCache::new(slot.clone()));
            let cmd = store.fetch_users(1);
            let msg = cmd.await.unwrap();
            store.update(&msg);
            store.set_sort_config(Some(SortConfig::ascending(ColumnId::City)));
        }

        let revived = TableState::new(source)
            .with_clock(fixed_now)
            .with_cache(TableCache::new(slot));

        assert_eq!(revived.users().len(), 100);
        assert_eq!(revived.display().len(), 100);
        assert_eq!(
            revived.sort_config(),
            Some(&SortConfig::ascending(ColumnId::City))
        );
        // Pagination and flags are never round-tripped.
        assert_eq!(revived.pagination(), Pagination::default());
        assert!(!revived.is_loading());
        assert!(revived.error().is_none());

        let cities: Vec<&str> = revived
            .display()
            .iter()
            .map(|u| u.user.city.as_str())
            .collect();
        let mut sorted_cities = cities.clone();
        sorted_cities.sort();
        assert_eq!(cities, sorted_cities);
    }
}
