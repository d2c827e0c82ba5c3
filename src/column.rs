//! The fixed column identifier set and render-time order validation.
//!
//! Column order is stored and persisted as plain strings, exactly as the
//! host handed it over. Validation happens only when columns are resolved
//! for rendering: unknown identifiers are silently dropped and missing ones
//! are simply omitted, so a stale persisted order can never fail a render.

use serde::{Deserialize, Serialize};

/// Identifier of a renderable column, covering raw and derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnId {
    /// The record identifier.
    Id,
    /// Given name.
    FirstName,
    /// Family name.
    LastName,
    /// Derived: given and family name joined.
    FullName,
    /// Contact email address.
    Email,
    /// City of residence.
    City,
    /// Registration timestamp.
    RegisteredDate,
    /// Derived: whole days since registration.
    DaysSinceRegistered,
}

impl ColumnId {
    /// Every known column, in the default display order.
    pub const ALL: [ColumnId; 8] = [
        ColumnId::Id,
        ColumnId::FirstName,
        ColumnId::LastName,
        ColumnId::FullName,
        ColumnId::Email,
        ColumnId::City,
        ColumnId::RegisteredDate,
        ColumnId::DaysSinceRegistered,
    ];

    /// The wire identifier for this column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnId::Id => "id",
            ColumnId::FirstName => "firstName",
            ColumnId::LastName => "lastName",
            ColumnId::FullName => "fullName",
            ColumnId::Email => "email",
            ColumnId::City => "city",
            ColumnId::RegisteredDate => "registeredDate",
            ColumnId::DaysSinceRegistered => "daysSinceRegistered",
        }
    }

    /// Parses a wire identifier, returning `None` for unknown columns.
    pub fn parse(s: &str) -> Option<ColumnId> {
        ColumnId::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Header title shown for this column.
    pub fn title(&self) -> &'static str {
        match self {
            ColumnId::Id => "ID",
            ColumnId::FirstName => "First Name",
            ColumnId::LastName => "Last Name",
            ColumnId::FullName => "Full Name",
            ColumnId::Email => "Email",
            ColumnId::City => "City",
            ColumnId::RegisteredDate => "Registered",
            ColumnId::DaysSinceRegistered => "DSR",
        }
    }

    /// Rendered cell width in terminal columns.
    pub fn width(&self) -> usize {
        match self {
            ColumnId::Id => 18,
            ColumnId::FirstName => 12,
            ColumnId::LastName => 12,
            ColumnId::FullName => 20,
            ColumnId::Email => 28,
            ColumnId::City => 14,
            ColumnId::RegisteredDate => 13,
            ColumnId::DaysSinceRegistered => 10,
        }
    }
}

/// The default column order as stored identifiers.
pub fn default_column_order() -> Vec<String> {
    ColumnId::ALL.iter().map(|c| c.as_str().to_string()).collect()
}

/// Resolves a stored order into known columns for rendering.
///
/// Unknown identifiers are dropped without error; identifiers absent from
/// the order are not re-inserted.
pub fn resolve_column_order(order: &[String]) -> Vec<ColumnId> {
    order.iter().filter_map(|s| ColumnId::parse(s)).collect()
}
