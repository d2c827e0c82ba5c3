//! The paged data source contract and a deterministic mock backend.
//!
//! A [`PagedDataSource`] produces fixed-size pages of user records together
//! with the total corpus size and a has-more flag. Fetching is fallible and
//! every failure is retryable by re-invoking with the same arguments.
//!
//! [`MockDataSource`] is the reference implementation: a simulated backend
//! of 2,500 users in which the record at absolute index `i` is generated
//! from a seed derived from `i`, so re-requesting any page yields identical
//! records. That determinism is what makes golden-output tests possible.
//!
//! # Examples
//!
//! ```rust
//! use bubbletea_usergrid::source::{MockDataSource, PagedDataSource, SourceError};
//!
//! async fn load_first_page() -> Result<(), SourceError> {
//!     let source = MockDataSource::new();
//!     let page = source.fetch_page(1, 100).await?;
//!     assert_eq!(page.users.len(), 100);
//!     assert_eq!(page.total_count, 2500);
//!     assert!(page.has_more);
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::user::User;

/// Size of the mock corpus.
pub const TOTAL_USERS: usize = 2500;

/// Offset added to a record's absolute index to form its generator seed.
const SEED_BASE: u64 = 1000;

/// Start of the registration window (2020-01-01T00:00:00Z).
static REGISTRATION_WINDOW_START: Lazy<DateTime<Utc>> =
    Lazy::new(|| DateTime::from_timestamp(1_577_836_800, 0).unwrap_or(DateTime::UNIX_EPOCH));

/// Width of the registration window in seconds (four years).
const REGISTRATION_WINDOW_SECS: i64 = 126_230_400;

const FIRST_NAMES: [&str; 24] = [
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "Hedy", "Ivan",
    "John", "Katherine", "Leslie", "Margaret", "Niklaus", "Olga", "Peter", "Radia", "Seymour",
    "Shafi", "Tim", "Ursula", "Vint", "Whitfield",
];

const LAST_NAMES: [&str; 24] = [
    "Allen", "Backus", "Cerf", "Dijkstra", "Engelbart", "Floyd", "Goldwasser", "Hamilton",
    "Hopper", "Iverson", "Kay", "Knuth", "Lamport", "Liskov", "McCarthy", "Naur", "Perlman",
    "Ritchie", "Shannon", "Sutherland", "Thompson", "Torvalds", "Wilkes", "Wirth",
];

const CITIES: [&str; 20] = [
    "Amsterdam", "Austin", "Berlin", "Boston", "Copenhagen", "Dublin", "Edinburgh", "Helsinki",
    "Lisbon", "London", "Madrid", "Melbourne", "Montreal", "Oslo", "Prague", "Seattle",
    "Stockholm", "Toronto", "Vienna", "Zurich",
];

/// One page of users as returned by a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    /// The records of this page, in corpus order.
    pub users: Vec<User>,
    /// Size of the whole corpus, not of this page.
    pub total_count: usize,
    /// True while further pages exist past this one.
    pub has_more: bool,
}

/// Failure modes of a paged fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The fetch could not complete. Retryable: re-invoking with the same
    /// arguments is a fresh, identically specified request.
    #[error("user data source unavailable: {0}")]
    Unavailable(String),
}

/// A backend that serves users in fixed-size pages.
///
/// Implementations must be deterministic for a given `(page, page_size)`:
/// re-requesting the same page yields identical records. `has_more` is true
/// exactly while `page * page_size < total_count`.
#[async_trait]
pub trait PagedDataSource: Send + Sync {
    /// Fetches one page. `page` is 1-based; `page_size` must be positive.
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<UserPage, SourceError>;
}

/// Deterministic in-process data source simulating a remote user API.
///
/// Latency defaults to zero so tests run instantly; demos typically set a
/// few hundred milliseconds to exercise loading states. Failure injection
/// flips every subsequent fetch into [`SourceError::Unavailable`] until
/// cleared, and an atomic call counter records how many fetches were
/// actually issued.
#[derive(Debug)]
pub struct MockDataSource {
    total_count: usize,
    latency: Duration,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MockDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataSource {
    /// Creates a source over the full 2,500-record corpus with no latency.
    pub fn new() -> Self {
        Self {
            total_count: TOTAL_USERS,
            latency: Duration::ZERO,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Overrides the corpus size (builder pattern).
    pub fn with_total_count(mut self, total_count: usize) -> Self {
        self.total_count = total_count;
        self
    }

    /// Sets the simulated per-request latency (builder pattern).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes every subsequent fetch fail (or succeed again) until changed.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches issued against this source so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generates the record at absolute index `index` (0-based).
    ///
    /// The record is a pure function of its index: identity, names, city,
    /// email, and registration timestamp all come from a seeded generator.
    pub fn generate_user(index: usize) -> User {
        let mut rng = StdRng::seed_from_u64(SEED_BASE + index as u64);

        let first = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.random_range(0..LAST_NAMES.len())];
        let city = CITIES[rng.random_range(0..CITIES.len())];

        let id = format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            rng.random::<u32>(),
            rng.random::<u16>(),
            rng.random::<u16>(),
            rng.random::<u16>(),
            rng.random::<u64>() & 0xffff_ffff_ffff,
        );

        let offset = rng.random_range(0..REGISTRATION_WINDOW_SECS);
        let registered = *REGISTRATION_WINDOW_START + chrono::Duration::seconds(offset);

        User {
            id,
            email: format!(
                "{}.{}{}@example.com",
                first.to_lowercase(),
                last.to_lowercase(),
                index,
            ),
            first_name: first.to_string(),
            last_name: last.to_string(),
            city: city.to_string(),
            registered_date: registered.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[async_trait]
impl PagedDataSource for MockDataSource {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<UserPage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("simulated outage".to_string()));
        }

        let start = page.saturating_sub(1) * page_size;
        let end = (start + page_size).min(self.total_count);
        let users = (start..end.max(start)).map(Self::generate_user).collect();

        Ok(UserPage {
            users,
            total_count: self.total_count,
            has_more: page * page_size < self.total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_page_is_deterministic() {
        let source = MockDataSource::new();
        let first = source.fetch_page(3, 100).await.unwrap();
        let second = source.fetch_page(3, 100).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_pages_do_not_overlap() {
        let source = MockDataSource::new();
        let page1 = source.fetch_page(1, 100).await.unwrap();
        let page2 = source.fetch_page(2, 100).await.unwrap();
        assert_eq!(page1.users.len(), 100);
        assert_eq!(page2.users.len(), 100);
        assert_ne!(page1.users[0], page2.users[0]);
        // Record 100 is the first record of page 2 regardless of how it is
        // reached.
        assert_eq!(page2.users[0], MockDataSource::generate_user(100));
    }

    #[tokio::test]
    async fn test_has_more_boundary() {
        let source = MockDataSource::new();
        let page24 = source.fetch_page(24, 100).await.unwrap();
        assert!(page24.has_more);

        let page25 = source.fetch_page(25, 100).await.unwrap();
        assert_eq!(page25.users.len(), 100);
        assert!(!page25.has_more);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let source = MockDataSource::new();
        let page = source.fetch_page(26, 100).await.unwrap();
        assert!(page.users.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total_count, TOTAL_USERS);
    }

    #[tokio::test]
    async fn test_short_final_page() {
        let source = MockDataSource::new().with_total_count(250);
        let page = source.fetch_page(3, 100).await.unwrap();
        assert_eq!(page.users.len(), 50);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_injected_failure_is_retryable() {
        let source = MockDataSource::new();
        source.set_failing(true);
        let err = source.fetch_page(1, 100).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));

        source.set_failing(false);
        let page = source.fetch_page(1, 100).await.unwrap();
        assert_eq!(page.users.len(), 100);
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn test_generated_record_shape() {
        let user = MockDataSource::generate_user(0);
        assert_eq!(user, MockDataSource::generate_user(0));
        assert!(user.email.ends_with("0@example.com"));
        assert!(user.registered_date.ends_with('Z'));
        // The timestamp must parse back as RFC 3339.
        assert!(chrono::DateTime::parse_from_rfc3339(&user.registered_date).is_ok());
    }
}
