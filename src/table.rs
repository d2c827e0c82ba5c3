//! The user table widget: a virtualized, sortable, column-reorderable view
//! over a [`TableState`].
//!
//! Only the rows inside the visible window are ever rendered; scrolling
//! moves the window over the display collection and, past a threshold near
//! the bottom, triggers an automatic load-more. Column order and sorting
//! are keyboard driven: select a header with ←/→, nudge it with `<`/`>`,
//! and cycle its sort with `s` (ascending → descending → unsorted).
//!
//! The widget owns its store and forwards completion messages to it from
//! `update`, in the same way the other models in this crate consume their
//! own tick messages. Hosts that want to wire their own data source or
//! persistence construct the store first and hand it over:
//!
//! ```rust
//! use std::sync::Arc;
//! use bubbletea_usergrid::source::MockDataSource;
//! use bubbletea_usergrid::store::TableState;
//! use bubbletea_usergrid::table::Model;
//!
//! let store = TableState::new(Arc::new(MockDataSource::new()));
//! let table = Model::new(store).with_size(100, 15);
//! assert!(table.view().contains("No data available"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use bubbletea_rs::{Cmd, KeyMsg, Model as BubbleTeaModel, Msg, WindowSizeMsg};
use lipgloss_extras::prelude::*;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::column::{resolve_column_order, ColumnId};
use crate::key::{new_binding, Binding, KeyMap as KeyMapTrait};
use crate::sort::{SortConfig, SortDirection};
use crate::source::MockDataSource;
use crate::storage::{FileSlotStore, TableCache};
use crate::store::TableState;
use crate::user::ComputedUser;

/// Scroll progress past which the next page is requested automatically.
const LOAD_MORE_THRESHOLD: f64 = 0.85;

/// Rows taken by the status line, header, and help line around the window.
const CHROME_ROWS: usize = 4;

const CELL_SEPARATOR: &str = " │ ";

/// Key bindings for the table widget.
#[derive(Debug, Clone)]
pub struct TableKeyMap {
    /// Move the window up one row.
    pub scroll_up: Binding,
    /// Move the window down one row.
    pub scroll_down: Binding,
    /// Move the window up one full height.
    pub page_up: Binding,
    /// Move the window down one full height.
    pub page_down: Binding,
    /// Select the header to the left.
    pub prev_column: Binding,
    /// Select the header to the right.
    pub next_column: Binding,
    /// Swap the selected column with its left neighbor.
    pub move_column_left: Binding,
    /// Swap the selected column with its right neighbor.
    pub move_column_right: Binding,
    /// Cycle the sort on the selected column.
    pub toggle_sort: Binding,
    /// Reset pagination and refetch from the first page.
    pub refresh: Binding,
    /// Request the next page explicitly.
    pub load_more: Binding,
    /// Dismiss the error banner.
    pub clear_error: Binding,
}

impl Default for TableKeyMap {
    fn default() -> Self {
        Self {
            scroll_up: new_binding(&["up", "k"], "↑/k", "scroll up"),
            scroll_down: new_binding(&["down", "j"], "↓/j", "scroll down"),
            page_up: new_binding(&["pgup"], "pgup", "page up"),
            page_down: new_binding(&["pgdown"], "pgdn", "page down"),
            prev_column: new_binding(&["left", "h"], "←/h", "prev column"),
            next_column: new_binding(&["right", "l"], "→/l", "next column"),
            move_column_left: new_binding(&["<"], "<", "move column left"),
            move_column_right: new_binding(&[">"], ">", "move column right"),
            toggle_sort: new_binding(&["s"], "s", "sort column"),
            refresh: new_binding(&["r"], "r", "refresh"),
            load_more: new_binding(&["m"], "m", "load more"),
            clear_error: new_binding(&["c"], "c", "clear error"),
        }
    }
}

impl KeyMapTrait for TableKeyMap {
    fn short_help(&self) -> Vec<&Binding> {
        vec![
            &self.toggle_sort,
            &self.move_column_left,
            &self.move_column_right,
            &self.refresh,
        ]
    }

    fn full_help(&self) -> Vec<Vec<&Binding>> {
        vec![
            vec![
                &self.scroll_up,
                &self.scroll_down,
                &self.page_up,
                &self.page_down,
            ],
            vec![
                &self.prev_column,
                &self.next_column,
                &self.move_column_left,
                &self.move_column_right,
            ],
            vec![
                &self.toggle_sort,
                &self.refresh,
                &self.load_more,
                &self.clear_error,
            ],
        ]
    }
}

/// Styles applied to the rendered table.
#[derive(Debug, Clone)]
pub struct Styles {
    /// Header cells.
    pub header: Style,
    /// The header cell the selection sits on.
    pub selected_header: Style,
    /// The status and help lines.
    pub status: Style,
    /// The error banner.
    pub error: Style,
    /// Placeholder rows during the initial load.
    pub skeleton: Style,
    /// The trailing load-more indicator.
    pub loading: Style,
}

impl Default for Styles {
    fn default() -> Self {
        Self {
            header: Style::new().bold(true),
            selected_header: Style::new().bold(true).foreground(Color::from("212")),
            status: Style::new().faint(true),
            error: Style::new().foreground(Color::from("196")),
            skeleton: Style::new().faint(true),
            loading: Style::new().foreground(Color::from("205")),
        }
    }
}

/// The table widget model.
pub struct Model {
    state: TableState,
    /// Key bindings; replace fields to rebind.
    pub keymap: TableKeyMap,
    /// Rendering styles; replace fields to retheme.
    pub styles: Styles,
    width: usize,
    height: usize,
    y_offset: usize,
    selected_column: usize,
}

impl Model {
    /// Wraps a store in a widget with a default 120x20 window.
    pub fn new(state: TableState) -> Self {
        Self {
            state,
            keymap: TableKeyMap::default(),
            styles: Styles::default(),
            width: 120,
            height: 20,
            y_offset: 0,
            selected_column: 0,
        }
    }

    /// Sets the window size: total width and the number of visible rows
    /// (builder pattern).
    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height.max(1);
        self
    }

    /// The underlying store.
    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// Mutable access to the underlying store.
    pub fn state_mut(&mut self) -> &mut TableState {
        &mut self.state
    }

    /// First visible row of the virtualized window.
    pub fn y_offset(&self) -> usize {
        self.y_offset
    }

    /// Index of the selected header within the resolved column order.
    pub fn selected_column(&self) -> usize {
        self.selected_column
    }

    /// Rehydrates persisted records and starts the initial fetch when the
    /// table is empty. Call once when the hosting program starts.
    pub fn init_cmd(&mut self) -> Option<Cmd> {
        self.state.rehydrate_users();
        if self.state.display().is_empty()
            && !self.state.is_loading()
            && !self.state.is_loading_more()
        {
            Some(self.state.fetch_users(1))
        } else {
            None
        }
    }

    /// Handles store completion messages, window resizes, and key presses.
    pub fn update(&mut self, msg: &Msg) -> Option<Cmd> {
        if self.state.update(msg) {
            self.clamp_view();
            return None;
        }

        if let Some(size) = msg.downcast_ref::<WindowSizeMsg>() {
            self.width = size.width as usize;
            self.height = (size.height as usize).saturating_sub(CHROME_ROWS).max(1);
            self.clamp_view();
            return None;
        }

        if let Some(key_msg) = msg.downcast_ref::<KeyMsg>() {
            return self.handle_key(key_msg);
        }

        None
    }

    fn handle_key(&mut self, key_msg: &KeyMsg) -> Option<Cmd> {
        if self.keymap.scroll_down.matches(key_msg) {
            return self.scroll_by(1);
        }
        if self.keymap.scroll_up.matches(key_msg) {
            return self.scroll_by(-1);
        }
        if self.keymap.page_down.matches(key_msg) {
            return self.scroll_by(self.height as isize);
        }
        if self.keymap.page_up.matches(key_msg) {
            return self.scroll_by(-(self.height as isize));
        }
        if self.keymap.next_column.matches(key_msg) {
            let columns = self.resolved_columns();
            if self.selected_column + 1 < columns.len() {
                self.selected_column += 1;
            }
            return None;
        }
        if self.keymap.prev_column.matches(key_msg) {
            self.selected_column = self.selected_column.saturating_sub(1);
            return None;
        }
        if self.keymap.move_column_right.matches(key_msg) {
            self.move_selected_column(1);
            return None;
        }
        if self.keymap.move_column_left.matches(key_msg) {
            self.move_selected_column(-1);
            return None;
        }
        if self.keymap.toggle_sort.matches(key_msg) {
            self.toggle_sort();
            return None;
        }
        if self.keymap.refresh.matches(key_msg) {
            self.y_offset = 0;
            self.state.reset_pagination();
            return Some(self.state.fetch_users(1));
        }
        if self.keymap.load_more.matches(key_msg) {
            return self.state.load_more_users();
        }
        if self.keymap.clear_error.matches(key_msg) {
            self.state.clear_error();
            return None;
        }
        None
    }

    /// Moves the window and requests the next page when scrolled past the
    /// load-more threshold. An uncleared error suppresses the automatic
    /// request; retry stays caller-initiated.
    fn scroll_by(&mut self, delta: isize) -> Option<Cmd> {
        let len = self.state.display().len();
        let max_offset = len.saturating_sub(self.height);
        let target = self.y_offset as isize + delta;
        self.y_offset = target.clamp(0, max_offset as isize) as usize;
        self.maybe_load_more()
    }

    fn maybe_load_more(&mut self) -> Option<Cmd> {
        let len = self.state.display().len();
        if len == 0 || self.state.error().is_some() {
            return None;
        }
        let visible_bottom = (self.y_offset + self.height).min(len);
        if (visible_bottom as f64) / (len as f64) > LOAD_MORE_THRESHOLD {
            self.state.load_more_users()
        } else {
            None
        }
    }

    /// Cycles the sort on the selected column: ascending, then descending,
    /// then back to unsorted insertion order.
    fn toggle_sort(&mut self) {
        let columns = self.resolved_columns();
        let Some(&column) = columns.get(self.selected_column) else {
            return;
        };
        let next = match self.state.sort_config() {
            Some(config) if config.key == column => match config.direction {
                SortDirection::Asc => Some(SortConfig::new(column, SortDirection::Desc)),
                SortDirection::Desc => None,
            },
            _ => Some(SortConfig::ascending(column)),
        };
        self.state.set_sort_config(next);
    }

    /// Swaps the selected column with its neighbor in the stored order.
    ///
    /// The swap works on the stored identifiers, so unknown entries that a
    /// stale persisted order may carry are left where they are.
    fn move_selected_column(&mut self, delta: isize) {
        let columns = self.resolved_columns();
        let from = self.selected_column;
        let to = from as isize + delta;
        if to < 0 || to as usize >= columns.len() || from >= columns.len() {
            return;
        }
        let to = to as usize;

        let mut order = self.state.column_order().to_vec();
        let from_pos = order.iter().position(|id| id == columns[from].as_str());
        let to_pos = order.iter().position(|id| id == columns[to].as_str());
        if let (Some(from_pos), Some(to_pos)) = (from_pos, to_pos) {
            order.swap(from_pos, to_pos);
            self.state.set_column_order(order);
            self.selected_column = to;
        }
    }

    fn resolved_columns(&self) -> Vec<ColumnId> {
        resolve_column_order(self.state.column_order())
    }

    fn clamp_view(&mut self) {
        let len = self.state.display().len();
        self.y_offset = self.y_offset.min(len.saturating_sub(self.height));
        let columns = self.resolved_columns().len();
        if columns > 0 && self.selected_column >= columns {
            self.selected_column = columns - 1;
        }
    }

    fn table_width(&self, columns: &[ColumnId]) -> usize {
        if columns.is_empty() {
            return 0;
        }
        let cells: usize = columns.iter().map(|c| c.width()).sum();
        cells + (columns.len() - 1) * UnicodeWidthStr::width(CELL_SEPARATOR)
    }

    fn status_line(&self) -> String {
        let pagination = self.state.pagination();
        let mut left = format!(
            "Showing {} of {} users",
            self.state.display().len(),
            pagination.total_count,
        );
        if pagination.has_more {
            left.push_str(" (scroll to load more)");
        }

        let len = self.state.display().len();
        let bottom = (self.y_offset + self.height).min(len);
        let right = if len > 0 {
            format!("rows {}-{}/{}", self.y_offset + 1, bottom, len)
        } else {
            String::new()
        };

        let left = self.styles.status.render(&left);
        let right = self.styles.status.render(&right);
        let used = display_width(&left) + display_width(&right);
        let gap = self.width.saturating_sub(used);
        format!("{}{}{}", left, " ".repeat(gap), right)
    }

    fn header_line(&self, columns: &[ColumnId]) -> String {
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let mut label = column.title().to_string();
                if let Some(config) = self.state.sort_config() {
                    if config.key == *column {
                        label.push_str(match config.direction {
                            SortDirection::Asc => " ↑",
                            SortDirection::Desc => " ↓",
                        });
                    }
                }
                let cell = pad_cell(&label, column.width());
                if i == self.selected_column {
                    self.styles.selected_header.render(&cell)
                } else {
                    self.styles.header.render(&cell)
                }
            })
            .collect();
        cells.join(CELL_SEPARATOR)
    }

    fn row_line(&self, columns: &[ColumnId], user: &ComputedUser) -> String {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| pad_cell(&cell_value(*column, user), column.width()))
            .collect();
        cells.join(CELL_SEPARATOR)
    }

    fn help_line(&self) -> String {
        let entries: Vec<String> = self
            .keymap
            .short_help()
            .into_iter()
            .filter(|binding| binding.enabled())
            .map(|binding| format!("{} {}", binding.help().key, binding.help().desc))
            .collect();
        self.styles.status.render(&entries.join(" · "))
    }

    /// Renders the status line, header, the visible window of rows, and the
    /// help line. Only `height` rows are formatted regardless of how many
    /// records are loaded.
    pub fn view(&self) -> String {
        let columns = self.resolved_columns();
        let mut lines: Vec<String> = vec![self.status_line()];

        if let Some(error) = self.state.error() {
            lines.push(
                self.styles
                    .error
                    .render(&format!("Error loading data: {error}")),
            );
            lines.push(
                self.styles
                    .status
                    .render("press r to retry, c to dismiss"),
            );
            return lines.join("\n");
        }

        let display = self.state.display();
        if self.state.is_loading() && display.is_empty() {
            let width = self.table_width(&columns).max(20);
            for _ in 0..self.height.min(10) {
                lines.push(self.styles.skeleton.render(&"░".repeat(width)));
            }
            return lines.join("\n");
        }

        if display.is_empty() {
            lines.push("No data available. Press r to load data.".to_string());
            return lines.join("\n");
        }

        lines.push(self.header_line(&columns));
        let end = (self.y_offset + self.height).min(display.len());
        for user in &display[self.y_offset..end] {
            lines.push(self.row_line(&columns, user));
        }
        if self.state.is_loading_more() {
            lines.push(self.styles.loading.render("Loading more…"));
        }
        lines.push(self.help_line());
        lines.join("\n")
    }
}

impl BubbleTeaModel for Model {
    fn init() -> (Self, Option<Cmd>) {
        let source = Arc::new(MockDataSource::new().with_latency(Duration::from_millis(400)));
        let cache = TableCache::new(Arc::new(FileSlotStore::in_default_location()));
        let mut model = Model::new(TableState::new(source).with_cache(cache));
        let cmd = model.init_cmd();
        (model, cmd)
    }

    fn update(&mut self, msg: Msg) -> Option<Cmd> {
        self.update(&msg)
    }

    fn view(&self) -> String {
        self.view()
    }
}

fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi_escapes::strip_str(s).as_str())
}

/// Pads or truncates a cell to an exact display width, ending truncated
/// content with an ellipsis.
fn pad_cell(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let text_width = UnicodeWidthStr::width(text);
    if text_width <= width {
        return format!("{}{}", text, " ".repeat(width - text_width));
    }

    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let grapheme_width = UnicodeWidthStr::width(grapheme);
        if used + grapheme_width > width.saturating_sub(1) {
            break;
        }
        out.push_str(grapheme);
        used += grapheme_width;
    }
    out.push('…');
    used += 1;
    format!("{}{}", out, " ".repeat(width.saturating_sub(used)))
}

fn cell_value(column: ColumnId, user: &ComputedUser) -> String {
    match column {
        ColumnId::Id => user.user.id.clone(),
        ColumnId::FirstName => user.user.first_name.clone(),
        ColumnId::LastName => user.user.last_name.clone(),
        ColumnId::FullName => user.full_name.clone(),
        ColumnId::Email => user.user.email.clone(),
        ColumnId::City => user.user.city.clone(),
        ColumnId::RegisteredDate => chrono::DateTime::parse_from_rfc3339(&user.user.registered_date)
            .map(|date| date.format("%b %d, %Y").to_string())
            .unwrap_or_else(|_| user.user.registered_date.clone()),
        ColumnId::DaysSinceRegistered => format!("{} Days", user.days_since_registered),
    }
}
