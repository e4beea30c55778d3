// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::{Link, LinkId, SortDirection};

pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 40, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

pub const TEXT_PLACEHOLDER: &str = "Click to edit...";
pub const CATEGORY_PLACEHOLDER: &str = "cat1, cat2";
pub const TAGS_PLACEHOLDER: &str = "tag1, tag2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkColumn {
    Select,
    Name,
    Url,
    Model,
    Description,
    Category,
    Tags,
    Popular,
    Actions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Selection,
    Text,
    List,
    Toggle,
    Actions,
}

impl LinkColumn {
    pub const ALL: [Self; 9] = [
        Self::Select,
        Self::Name,
        Self::Url,
        Self::Model,
        Self::Description,
        Self::Category,
        Self::Tags,
        Self::Popular,
        Self::Actions,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Name => "name",
            Self::Url => "url",
            Self::Model => "model",
            Self::Description => "description",
            Self::Category => "category",
            Self::Tags => "tags",
            Self::Popular => "isPopular",
            Self::Actions => "actions",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Select => "",
            Self::Name => "Name",
            Self::Url => "URL",
            Self::Model => "Model",
            Self::Description => "Description",
            Self::Category => "Category",
            Self::Tags => "Tags",
            Self::Popular => "Popular",
            Self::Actions => "",
        }
    }

    pub const fn kind(self) -> CellKind {
        match self {
            Self::Select => CellKind::Selection,
            Self::Name | Self::Url | Self::Model | Self::Description => CellKind::Text,
            Self::Category | Self::Tags => CellKind::List,
            Self::Popular => CellKind::Toggle,
            Self::Actions => CellKind::Actions,
        }
    }

    /// Fixed columns can never be hidden.
    pub const fn is_fixed(self) -> bool {
        matches!(self, Self::Select | Self::Actions)
    }

    pub const fn is_sortable(self) -> bool {
        matches!(
            self,
            Self::Name | Self::Url | Self::Model | Self::Description | Self::Popular
        )
    }

    pub const fn is_editable(self) -> bool {
        matches!(self.kind(), CellKind::Text | CellKind::List)
    }

    pub const fn placeholder(self) -> Option<&'static str> {
        match self.kind() {
            CellKind::Text => Some(TEXT_PLACEHOLDER),
            CellKind::List => match self {
                Self::Category => Some(CATEGORY_PLACEHOLDER),
                _ => Some(TAGS_PLACEHOLDER),
            },
            CellKind::Selection | CellKind::Toggle | CellKind::Actions => None,
        }
    }

    /// Committed value of an editable cell as the editor sees it.
    pub fn value_for(self, link: &Link) -> String {
        match self {
            Self::Name => link.name.clone(),
            Self::Url => link.url.clone(),
            Self::Model => link.model.clone(),
            Self::Description => link.description.clone(),
            Self::Category => join_list(&link.category),
            Self::Tags => join_list(&link.tags),
            Self::Popular => (if link.is_popular { "yes" } else { "no" }).to_owned(),
            Self::Select | Self::Actions => String::new(),
        }
    }

    fn compare(self, left: &Link, right: &Link) -> Ordering {
        match self {
            Self::Popular => left.is_popular.cmp(&right.is_popular),
            _ => self
                .value_for(left)
                .to_lowercase()
                .cmp(&self.value_for(right).to_lowercase()),
        }
    }
}

/// One changed column of a link row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFieldUpdate {
    Name(String),
    Url(String),
    Model(String),
    Description(String),
    Category(Vec<String>),
    Tags(Vec<String>),
    Popular(bool),
}

impl LinkFieldUpdate {
    pub fn for_column(column: LinkColumn, raw: &str) -> Option<Self> {
        match column {
            LinkColumn::Name => Some(Self::Name(raw.to_owned())),
            LinkColumn::Url => Some(Self::Url(raw.to_owned())),
            LinkColumn::Model => Some(Self::Model(raw.to_owned())),
            LinkColumn::Description => Some(Self::Description(raw.to_owned())),
            LinkColumn::Category => Some(Self::Category(split_list(raw))),
            LinkColumn::Tags => Some(Self::Tags(split_list(raw))),
            LinkColumn::Select | LinkColumn::Popular | LinkColumn::Actions => None,
        }
    }

    pub const fn column(&self) -> LinkColumn {
        match self {
            Self::Name(_) => LinkColumn::Name,
            Self::Url(_) => LinkColumn::Url,
            Self::Model(_) => LinkColumn::Model,
            Self::Description(_) => LinkColumn::Description,
            Self::Category(_) => LinkColumn::Category,
            Self::Tags(_) => LinkColumn::Tags,
            Self::Popular(_) => LinkColumn::Popular,
        }
    }

    pub fn apply_to(&self, link: &mut Link) {
        match self {
            Self::Name(value) => link.name = value.clone(),
            Self::Url(value) => link.url = value.clone(),
            Self::Model(value) => link.model = value.clone(),
            Self::Description(value) => link.description = value.clone(),
            Self::Category(values) => link.category = values.clone(),
            Self::Tags(values) => link.tags = values.clone(),
            Self::Popular(value) => link.is_popular = *value,
        }
    }
}

/// Split a comma-separated cell into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn join_list(values: &[String]) -> String {
    values.join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    Display,
    Edit,
}

/// Two-mode inline editor for one text or list cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEditor {
    pub link_id: LinkId,
    pub column: LinkColumn,
    committed: String,
    draft: String,
    mode: CellMode,
}

impl CellEditor {
    pub fn new(link: &Link, column: LinkColumn) -> Self {
        let committed = column.value_for(link);
        Self {
            link_id: link.id.clone(),
            column,
            draft: committed.clone(),
            committed,
            mode: CellMode::Display,
        }
    }

    pub fn mode(&self) -> CellMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == CellMode::Edit
    }

    /// Enter edit mode with the input pre-filled from the committed value.
    pub fn begin(&mut self) {
        self.draft = self.committed.clone();
        self.mode = CellMode::Edit;
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, value: impl Into<String>) {
        if self.is_editing() {
            self.draft = value.into();
        }
    }

    pub fn push_char(&mut self, ch: char) {
        if self.is_editing() {
            self.draft.push(ch);
        }
    }

    pub fn pop_char(&mut self) {
        if self.is_editing() {
            self.draft.pop();
        }
    }

    /// Leave edit mode. Returns the update to send only when the value
    /// actually changed.
    pub fn commit(&mut self) -> Option<LinkFieldUpdate> {
        if !self.is_editing() {
            return None;
        }
        self.mode = CellMode::Display;
        let normalized = match self.column.kind() {
            CellKind::List => join_list(&split_list(&self.draft)),
            _ => self.draft.clone(),
        };
        if normalized == self.committed {
            self.draft = self.committed.clone();
            return None;
        }
        let update = LinkFieldUpdate::for_column(self.column, &self.draft)?;
        self.committed = normalized;
        self.draft = self.committed.clone();
        Some(update)
    }

    /// Leave edit mode and restore the last committed value.
    pub fn cancel(&mut self) {
        self.draft = self.committed.clone();
        self.mode = CellMode::Display;
    }

    /// Reset to a refreshed row, e.g. after a failed update.
    pub fn sync(&mut self, link: &Link) {
        self.committed = self.column.value_for(link);
        if !self.is_editing() {
            self.draft = self.committed.clone();
        }
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// What the cell shows in display mode.
    pub fn display_text(&self) -> &str {
        if self.committed.is_empty() {
            self.column.placeholder().unwrap_or("")
        } else {
            &self.committed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTableState {
    pub sort: Option<(LinkColumn, SortDirection)>,
    hidden: BTreeSet<LinkColumn>,
    selected: BTreeSet<LinkId>,
    page_index: usize,
    page_size: usize,
}

impl Default for LinkTableState {
    fn default() -> Self {
        Self {
            sort: None,
            hidden: BTreeSet::from([LinkColumn::Url]),
            selected: BTreeSet::new(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl LinkTableState {
    pub fn with_page_size(page_size: usize) -> Result<Self> {
        let mut state = Self::default();
        state.set_page_size(page_size)?;
        Ok(state)
    }

    /// Single-column sort. Repeating a column flips its direction.
    pub fn toggle_sort(&mut self, column: LinkColumn) -> Result<(LinkColumn, SortDirection)> {
        if !column.is_sortable() {
            bail!("column {} is not sortable", column.as_str());
        }
        let next = match self.sort {
            Some((current, direction)) if current == column => (column, direction.flipped()),
            _ => (column, SortDirection::Asc),
        };
        self.sort = Some(next);
        Ok(next)
    }

    pub fn is_visible(&self, column: LinkColumn) -> bool {
        !self.hidden.contains(&column)
    }

    /// Returns the new visibility.
    pub fn toggle_column(&mut self, column: LinkColumn) -> Result<bool> {
        if column.is_fixed() {
            bail!("column {} cannot be hidden", column.as_str());
        }
        if self.hidden.remove(&column) {
            return Ok(true);
        }
        self.hidden.insert(column);
        Ok(false)
    }

    pub fn visible_columns(&self) -> Vec<LinkColumn> {
        LinkColumn::ALL
            .into_iter()
            .filter(|column| self.is_visible(*column))
            .collect()
    }

    /// Sort already-filtered rows. Ties keep their filtered order.
    pub fn sorted<'a>(&self, mut rows: Vec<&'a Link>) -> Vec<&'a Link> {
        if let Some((column, direction)) = self.sort {
            rows.sort_by(|left, right| {
                let ordering = column.compare(left, right);
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        rows
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if !PAGE_SIZES.contains(&page_size) {
            bail!("page size {page_size} is not supported -- use one of 10, 20, 30, 40, 50");
        }
        self.page_size = page_size;
        self.page_index = 0;
        Ok(())
    }

    pub fn cycle_page_size(&mut self) -> usize {
        let current = PAGE_SIZES
            .iter()
            .position(|size| *size == self.page_size)
            .unwrap_or(0);
        self.page_size = PAGE_SIZES[(current + 1) % PAGE_SIZES.len()];
        self.page_index = 0;
        self.page_size
    }

    pub fn page_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.page_size).max(1)
    }

    pub fn clamp_page(&mut self, total_rows: usize) {
        let last = self.page_count(total_rows) - 1;
        self.page_index = self.page_index.min(last);
    }

    pub fn page_range(&self, total_rows: usize) -> std::ops::Range<usize> {
        let start = (self.page_index * self.page_size).min(total_rows);
        let end = (start + self.page_size).min(total_rows);
        start..end
    }

    pub fn page<'r, 'a>(&self, rows: &'r [&'a Link]) -> &'r [&'a Link] {
        &rows[self.page_range(rows.len())]
    }

    pub fn first_page(&mut self) {
        self.page_index = 0;
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page_index == 0 {
            return false;
        }
        self.page_index -= 1;
        true
    }

    pub fn next_page(&mut self, total_rows: usize) -> bool {
        if self.page_index + 1 >= self.page_count(total_rows) {
            return false;
        }
        self.page_index += 1;
        true
    }

    pub fn last_page(&mut self, total_rows: usize) {
        self.page_index = self.page_count(total_rows) - 1;
    }

    pub fn is_selected(&self, id: &LinkId) -> bool {
        self.selected.contains(id)
    }

    pub fn toggle_row(&mut self, id: &LinkId) -> bool {
        if self.selected.remove(id) {
            return false;
        }
        self.selected.insert(id.clone());
        true
    }

    /// Select every row on the visible page, or clear them when all are
    /// already selected. Rows on other pages are untouched.
    pub fn toggle_page_selection(&mut self, page_rows: &[&Link]) -> bool {
        let all_selected = !page_rows.is_empty()
            && page_rows.iter().all(|link| self.selected.contains(&link.id));
        for link in page_rows {
            if all_selected {
                self.selected.remove(&link.id);
            } else {
                self.selected.insert(link.id.clone());
            }
        }
        !all_selected
    }

    pub fn selected_ids(&self) -> Vec<LinkId> {
        self.selected.iter().cloned().collect()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Drop selections whose rows no longer exist.
    pub fn retain_existing(&mut self, links: &[Link]) {
        let present = links.iter().map(|link| &link.id).collect::<BTreeSet<_>>();
        self.selected.retain(|id| present.contains(id));
    }

    pub fn selection_footer(&self, rows: &[&Link]) -> String {
        let selected = rows
            .iter()
            .filter(|link| self.selected.contains(&link.id))
            .count();
        format!("{selected} of {} row(s) selected", rows.len())
    }

    pub fn page_footer(&self, total_rows: usize) -> String {
        format!(
            "Page {} of {}",
            self.page_index + 1,
            self.page_count(total_rows)
        )
    }
}
