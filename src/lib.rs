#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/bubbletea-usergrid/")]

//! # bubbletea-usergrid
//!
//! A paginated, sortable, column-reorderable user table for terminal
//! applications built with [bubbletea-rs](https://github.com/joshka/bubbletea-rs).
//!
//! ## Overview
//!
//! The crate is split along the same seams as the application state it
//! manages:
//!
//! - **`source`** — the [`PagedDataSource`](source::PagedDataSource)
//!   contract plus a deterministic 2,500-record mock backend.
//! - **`store`** — the [`TableState`](store::TableState) store: raw
//!   records, pagination cursor, sort and column-order preferences, and the
//!   derived display collection. Fetches run as `Cmd` futures and resolve
//!   to completion messages the store applies in `update`.
//! - **`table`** — the widget: a virtualized window over the display
//!   collection with keyboard-driven sorting, column reordering, and an
//!   automatic load-more once scrolling nears the bottom.
//! - **`storage`** — best-effort persistence of the records and
//!   preferences to a local slot, restored on startup.
//! - **`user`**, **`column`**, **`sort`**, **`key`** — the record types,
//!   column identity, ordering engine, and key bindings the rest builds on.
//!
//! Everything follows the Elm Architecture: state structs, synchronous
//! transitions, and asynchronous work expressed as commands whose results
//! come back through `update`.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use bubbletea_usergrid::prelude::*;
//!
//! async fn demo() {
//!     let source = Arc::new(MockDataSource::new());
//!     let mut table = Model::new(TableState::new(source)).with_size(120, 20);
//!
//!     if let Some(cmd) = table.init_cmd() {
//!         let msg = cmd.await.expect("fetch resolves to a message");
//!         table.update(&msg);
//!     }
//!     assert!(table.view().contains("Showing 100 of 2500 users"));
//! }
//! ```
//!
//! Hosting the widget in a full program only needs the [`bubbletea_rs::Model`]
//! implementation on [`table::Model`], which wires the mock source and the
//! platform-local cache for you.

pub mod column;
pub mod key;
pub mod sort;
pub mod source;
pub mod storage;
pub mod store;
pub mod table;
pub mod user;

/// Convenient re-exports of the types most applications need.
pub mod prelude {
    pub use crate::column::{default_column_order, resolve_column_order, ColumnId};
    pub use crate::key::{new_binding, Binding, KeyMap};
    pub use crate::sort::{sort_users, SortConfig, SortDirection};
    pub use crate::source::{MockDataSource, PagedDataSource, SourceError, UserPage};
    pub use crate::storage::{
        FileSlotStore, MemorySlotStore, PersistedTable, PersistenceError, SlotStore, TableCache,
    };
    pub use crate::store::{Pagination, TableState, DEFAULT_PAGE_SIZE};
    pub use crate::table::{Model, Styles, TableKeyMap};
    pub use crate::user::{compute_user_fields, ComputedUser, User};
}
