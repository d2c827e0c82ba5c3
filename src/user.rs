//! User records and derived display fields.
//!
//! A [`User`] is the raw record as produced by a paged data source; it is
//! immutable once fetched and is the shape that gets persisted. A
//! [`ComputedUser`] wraps a raw record with the two derived fields the table
//! displays: the full name and the number of whole days since registration.
//! Derived fields are never persisted because "now" moves; they are
//! recomputed at render and rehydrate time via [`compute_user_fields`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one day, the divisor for day-count derivation.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// A raw user record.
///
/// `registered_date` is an ISO-8601 / RFC 3339 timestamp string, kept in its
/// wire form so that persisted state round-trips byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque unique identifier.
    pub id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email address.
    pub email: String,
    /// City of residence.
    pub city: String,
    /// Registration timestamp as an RFC 3339 string.
    pub registered_date: String,
}

/// A raw record plus the derived, non-persisted display fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedUser {
    /// The raw record, untouched.
    pub user: User,
    /// `first_name` and `last_name` joined by a single space, untrimmed.
    pub full_name: String,
    /// Whole days elapsed from registration to the supplied evaluation time.
    /// Negative when the registration timestamp lies in the future.
    pub days_since_registered: i64,
}

/// Derives the display fields for a record at the given evaluation time.
///
/// `now` is an explicit parameter rather than an ambient clock read so that
/// re-derivation is reproducible in tests. The day count uses floor
/// semantics over milliseconds: a record registered 30 days ago yields 30,
/// one millisecond short of that yields 29, and a future registration date
/// yields a negative count (deliberately not clamped).
///
/// Records whose timestamp fails to parse are derived against the Unix
/// epoch rather than failing; an unparsable date is a data problem, not a
/// render problem.
///
/// # Examples
///
/// ```rust
/// use bubbletea_usergrid::user::{compute_user_fields, User};
/// use chrono::{DateTime, Utc};
///
/// let user = User {
///     id: "u-1".to_string(),
///     first_name: "Ada".to_string(),
///     last_name: "Lovelace".to_string(),
///     email: "ada@example.com".to_string(),
///     city: "London".to_string(),
///     registered_date: "2024-01-01T00:00:00.000Z".to_string(),
/// };
/// let now: DateTime<Utc> = "2024-01-31T00:00:00Z".parse().unwrap();
///
/// let computed = compute_user_fields(&user, now);
/// assert_eq!(computed.full_name, "Ada Lovelace");
/// assert_eq!(computed.days_since_registered, 30);
/// ```
pub fn compute_user_fields(user: &User, now: DateTime<Utc>) -> ComputedUser {
    let registered = DateTime::parse_from_rfc3339(&user.registered_date)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH);
    let elapsed_ms = now.signed_duration_since(registered).num_milliseconds();

    ComputedUser {
        full_name: format!("{} {}", user.first_name, user.last_name),
        days_since_registered: elapsed_ms.div_euclid(MILLIS_PER_DAY),
        user: user.clone(),
    }
}
