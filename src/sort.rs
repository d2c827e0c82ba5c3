//! Stable single-key ordering of the display collection.
//!
//! At most one sort is active at a time; `None` means insertion order. The
//! engine never mutates its input and relies on the standard library's
//! stable sort, so records with equal keys keep their relative input order
//! across repeated re-sorts.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::user::ComputedUser;

/// Sort direction for the active column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest key first.
    Asc,
    /// Largest key first.
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    pub fn flipped(&self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// The single active sort: a column key plus a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    /// The column whose value is compared.
    pub key: ColumnId,
    /// Which way the comparison runs.
    pub direction: SortDirection,
}

impl SortConfig {
    /// Sort on the given column in the given direction.
    pub fn new(key: ColumnId, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Ascending sort on the given column.
    pub fn ascending(key: ColumnId) -> Self {
        Self::new(key, SortDirection::Asc)
    }
}

fn compare_by_key(a: &ComputedUser, b: &ComputedUser, key: ColumnId) -> Ordering {
    match key {
        ColumnId::Id => a.user.id.cmp(&b.user.id),
        ColumnId::FirstName => a.user.first_name.cmp(&b.user.first_name),
        ColumnId::LastName => a.user.last_name.cmp(&b.user.last_name),
        ColumnId::FullName => a.full_name.cmp(&b.full_name),
        ColumnId::Email => a.user.email.cmp(&b.user.email),
        ColumnId::City => a.user.city.cmp(&b.user.city),
        // RFC 3339 UTC timestamps order chronologically as strings, so the
        // scalar comparison doubles as a date comparison.
        ColumnId::RegisteredDate => a.user.registered_date.cmp(&b.user.registered_date),
        ColumnId::DaysSinceRegistered => {
            a.days_since_registered.cmp(&b.days_since_registered)
        }
    }
}

/// Returns the records ordered by the given configuration.
///
/// With no configuration, or no records, the input order is returned
/// unchanged. The input slice itself is never reordered.
pub fn sort_users(users: &[ComputedUser], config: Option<&SortConfig>) -> Vec<ComputedUser> {
    let mut sorted = users.to_vec();
    let Some(config) = config else {
        return sorted;
    };
    if sorted.is_empty() {
        return sorted;
    }

    sorted.sort_by(|a, b| {
        let ordering = compare_by_key(a, b, config.key);
        match config.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    sorted
}
