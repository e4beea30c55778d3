// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use llmnav_app::{
    AppCommand, AppEvent, AppMode, AppState, CATEGORY_ALL, CategorySelection, CellEditor,
    CellKind, DEFAULT_PAGE_SIZE, Debouncer, FieldKind, FormFieldSpec, FormKind, FormPayload, Link,
    LinkColumn, LinkFieldUpdate, LinkFilter, LinkFormInput, LinkId, LinkStats, LinkTableState,
    Profile, ProfileFormInput, Prompt, PromptFormInput, PromptId, PromptQuery, PromptStats,
    SortDirection, TabKind, TableFilter, User, form_field_specs, join_list, link_category_options,
    prompt_category_options,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::macros::format_description;

const CURSOR_MARK: &str = ">";
const EDIT_CARET: &str = "▏";
const EMPTY_TEXT_HINT: &str = "(empty)";

/// Snapshot of the signed-in account for rendering and form prefill.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountView {
    pub loading: bool,
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub display_name: Option<String>,
}

impl AccountView {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkDeleteOutcome {
    pub requested: usize,
    pub deleted: usize,
    /// e.g. "Deleted 2 of 3 row(s); Error deleting row ...".
    pub summary: String,
}

/// Startup preferences from `[ui]` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub page_size: usize,
    pub popular_only: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            popular_only: true,
        }
    }
}

pub trait AppRuntime {
    fn account(&mut self) -> AccountView;
    fn load_links(&mut self) -> Result<Vec<Link>>;
    fn refresh_links(&mut self) -> Result<Vec<Link>>;
    fn load_prompts(&mut self, query: &PromptQuery) -> Result<Vec<Prompt>>;
    /// Drop cached prompt lists; the next fetch goes to the store.
    fn invalidate_prompts(&mut self);
    fn submit_form(&mut self, payload: &FormPayload) -> Result<()>;
    fn update_link_field(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link>;
    fn delete_link(&mut self, id: &LinkId) -> Result<()>;
    fn delete_links(&mut self, ids: &[LinkId]) -> Result<BulkDeleteOutcome>;
    fn delete_prompt(&mut self, id: &PromptId) -> Result<()>;
    fn sign_out(&mut self) -> Result<()>;
    fn copy_to_clipboard(&mut self, text: &str) -> Result<()>;
    fn open_url(&mut self, url: &str) -> Result<()>;
    fn spawn_prompt_fetch(
        &mut self,
        request_id: u64,
        query: &PromptQuery,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self
            .load_prompts(query)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::PromptsLoaded { request_id, result })
            .map_err(|_| anyhow!("prompt event channel closed"))?;
        Ok(())
    }

    /// Sees every prompt result as it comes back, stale ones included, so
    /// a runtime can settle whatever it tracks per request.
    fn prompts_arrived(&mut self, _request_id: u64, _result: &Result<Vec<Prompt>, String>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    PromptsLoaded {
        request_id: u64,
        result: Result<Vec<Prompt>, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchTarget {
    Links,
    TableName,
    TableModel,
    Prompts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableCursor {
    row: usize,
    column: LinkColumn,
}

impl Default for TableCursor {
    fn default() -> Self {
        Self {
            row: 0,
            column: LinkColumn::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct PromptsUiState {
    items: Vec<Prompt>,
    query: PromptQuery,
    search_input: String,
    debouncer: Debouncer<String>,
    cursor: usize,
    detail_visible: bool,
    request_id: u64,
    loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    kind: FormKind,
    field_index: usize,
    choice_cursor: usize,
    draft: String,
}

impl FormUiState {
    fn new(kind: FormKind) -> Self {
        Self {
            kind,
            field_index: 0,
            choice_cursor: 0,
            draft: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    account: AccountView,
    links: Vec<Link>,
    link_filter: LinkFilter,
    link_cursor: usize,
    table_filter: TableFilter,
    search: Option<SearchTarget>,
    table: LinkTableState,
    table_cursor: TableCursor,
    cell_editor: Option<CellEditor>,
    prompts: PromptsUiState,
    form: Option<FormUiState>,
    help_visible: bool,
    status_token: u64,
}

fn view_data_with_options(options: ViewOptions) -> Result<ViewData> {
    let mut view_data = ViewData {
        table: LinkTableState::with_page_size(options.page_size)?,
        ..ViewData::default()
    };
    view_data.link_filter.popular_only = options.popular_only;
    Ok(view_data)
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: ViewOptions,
) -> Result<()> {
    let mut view_data = view_data_with_options(options)?;

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(state, runtime, &mut view_data, &internal_tx) {
        state.dispatch(AppCommand::SetStatus(format!("load failed: {error}")));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);
        poll_prompt_search(
            state,
            runtime,
            &mut view_data,
            &internal_tx,
            Instant::now(),
        );

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::PromptsLoaded { request_id, result } => {
                runtime.prompts_arrived(request_id, &result);
                if request_id != view_data.prompts.request_id {
                    continue;
                }
                view_data.prompts.loading = false;
                match result {
                    Ok(prompts) => {
                        view_data.prompts.items = prompts;
                        clamp_cursors(view_data);
                    }
                    Err(error) => emit_status(state, view_data, tx, format!("load failed: {error}")),
                }
            }
        }
    }
}

/// Release a debounced search term once typing has paused.
fn poll_prompt_search<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let Some(term) = view_data.prompts.debouncer.poll(now) else {
        return;
    };
    if view_data.prompts.query.term == term {
        return;
    }
    view_data.prompts.query.term = term;
    request_prompts(state, runtime, view_data, internal_tx);
}

fn issue_prompt_fetch<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> Result<()> {
    view_data.prompts.request_id = view_data.prompts.request_id.saturating_add(1);
    view_data.prompts.loading = true;
    let query = view_data.prompts.query.clone();
    runtime
        .spawn_prompt_fetch(view_data.prompts.request_id, &query, internal_tx.clone())
        .inspect_err(|_| view_data.prompts.loading = false)
}

fn request_prompts<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = issue_prompt_fetch(runtime, view_data, internal_tx) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("load failed: {error}"),
        );
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
            emit_status(state, view_data, internal_tx, "help hidden");
        }
        return false;
    }

    if matches!(state.mode, AppMode::Form(_)) {
        handle_form_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if state.mode == AppMode::Edit {
        handle_cell_edit_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if let Some(target) = view_data.search {
        handle_search_key(view_data, target, key);
        return false;
    }

    if state.active_tab == TabKind::Prompts && view_data.prompts.detail_visible {
        handle_prompt_detail_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }

    match key.code {
        KeyCode::Char('f') => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::NextTab, internal_tx);
            return false;
        }
        KeyCode::Char('b') => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::PrevTab, internal_tx);
            return false;
        }
        KeyCode::Char(digit @ '1'..='4') => {
            let index = digit.to_digit(10).unwrap_or(1) as usize - 1;
            if let Some(tab) = TabKind::ALL.get(index).copied() {
                dispatch_and_refresh(
                    state,
                    runtime,
                    view_data,
                    AppCommand::SetActiveTab(tab),
                    internal_tx,
                );
            }
            return false;
        }
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::Char('/') if state.active_tab != TabKind::Profile => {
            let target = match state.active_tab {
                TabKind::Prompts => SearchTarget::Prompts,
                TabKind::Table => SearchTarget::TableName,
                _ => SearchTarget::Links,
            };
            view_data.search = Some(target);
            emit_status(state, view_data, internal_tx, "search: type to filter");
            return false;
        }
        KeyCode::Char('r') => {
            refresh_active_tab(state, runtime, view_data, internal_tx);
            return false;
        }
        _ => {}
    }

    match state.active_tab {
        TabKind::Links => handle_links_key(state, runtime, view_data, internal_tx, key),
        TabKind::Table => handle_table_key(state, runtime, view_data, internal_tx, key),
        TabKind::Prompts => handle_prompts_key(state, runtime, view_data, internal_tx, key),
        TabKind::Profile => handle_profile_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn is_typing(key: KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            Some(ch)
        }
        _ => None,
    }
}

fn handle_search_key(
    view_data: &mut ViewData,
    target: SearchTarget,
    key: KeyEvent,
) {
    if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
        view_data.search = None;
        return;
    }

    match target {
        SearchTarget::Links => {
            let term = &mut view_data.link_filter.search_term;
            match (key.code, is_typing(key)) {
                (KeyCode::Backspace, _) => {
                    term.pop();
                }
                (_, Some(ch)) => term.push(ch),
                _ => return,
            }
            view_data.table.first_page();
            clamp_cursors(view_data);
        }
        SearchTarget::TableName | SearchTarget::TableModel => {
            let filter = &mut view_data.table_filter;
            let term = if target == SearchTarget::TableName {
                &mut filter.name
            } else {
                &mut filter.model
            };
            match (key.code, is_typing(key)) {
                (KeyCode::Backspace, _) => {
                    term.pop();
                }
                (_, Some(ch)) => term.push(ch),
                _ => return,
            }
            view_data.table.first_page();
            clamp_cursors(view_data);
        }
        SearchTarget::Prompts => {
            let input = &mut view_data.prompts.search_input;
            match (key.code, is_typing(key)) {
                (KeyCode::Backspace, _) => {
                    input.pop();
                }
                (_, Some(ch)) => input.push(ch),
                _ => return,
            }
            let pending = input.clone();
            view_data.prompts.debouncer.push(pending, Instant::now());
        }
    }
}

fn refresh_active_tab<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match state.active_tab {
        TabKind::Links | TabKind::Table => match runtime.refresh_links() {
            Ok(links) => {
                apply_links(view_data, links);
                emit_status(state, view_data, internal_tx, "links refreshed");
            }
            Err(error) => emit_status(
                state,
                view_data,
                internal_tx,
                format!("load failed: {error}"),
            ),
        },
        TabKind::Prompts => {
            emit_status(state, view_data, internal_tx, "Refreshing...");
            runtime.invalidate_prompts();
            request_prompts(state, runtime, view_data, internal_tx);
        }
        TabKind::Profile => {
            view_data.account = runtime.account();
        }
    }
}

fn handle_links_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => move_link_cursor(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_link_cursor(view_data, -1),
        KeyCode::Char('g') => view_data.link_cursor = 0,
        KeyCode::Char('G') => {
            view_data.link_cursor = visible_links(view_data).len().saturating_sub(1);
        }
        KeyCode::Char('c') => {
            let status = cycle_link_category(view_data, 1);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('C') => {
            let status = cycle_link_category(view_data, -1);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('p') => {
            let status = toggle_popular_only(view_data);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Enter | KeyCode::Char('o') => {
            if let Some(link) = current_link(view_data) {
                open_link_url(state, runtime, view_data, internal_tx, &link.url);
            }
        }
        KeyCode::Char('y') => {
            if let Some(link) = current_link(view_data) {
                copy_link_url(state, runtime, view_data, internal_tx, &link.url);
            }
        }
        KeyCode::Char('a') => open_link_form(state, runtime, view_data, internal_tx, None),
        KeyCode::Char('e') => {
            if let Some(link) = current_link(view_data) {
                open_link_form(state, runtime, view_data, internal_tx, Some(&link));
            }
        }
        _ => {}
    }
}

fn move_link_cursor(view_data: &mut ViewData, delta: isize) {
    let len = visible_links(view_data).len();
    if len == 0 {
        view_data.link_cursor = 0;
        return;
    }
    let next = (view_data.link_cursor as isize + delta).clamp(0, len as isize - 1);
    view_data.link_cursor = next as usize;
}

fn link_category_choices(links: &[Link]) -> Vec<CategorySelection> {
    let mut choices = vec![CategorySelection::Popular, CategorySelection::All];
    choices.extend(
        link_category_options(links)
            .into_iter()
            .map(CategorySelection::Named),
    );
    choices
}

fn cycle_link_category(view_data: &mut ViewData, delta: isize) -> String {
    let choices = link_category_choices(&view_data.links);
    let current = choices
        .iter()
        .position(|choice| *choice == view_data.link_filter.category)
        .unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(choices.len() as isize) as usize;
    view_data.link_filter.category = choices[next].clone();
    view_data.link_cursor = 0;
    view_data.table.first_page();
    clamp_cursors(view_data);
    format!("category {}", view_data.link_filter.category.as_str())
}

fn toggle_popular_only(view_data: &mut ViewData) -> String {
    view_data.link_filter.popular_only = !view_data.link_filter.popular_only;
    view_data.table.first_page();
    clamp_cursors(view_data);
    format!(
        "popular only {}",
        on_off(view_data.link_filter.popular_only)
    )
}

fn open_link_url<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    url: &str,
) {
    let status = match runtime.open_url(url) {
        Ok(()) => format!("opened {url}"),
        Err(error) => format!("open failed: {error}"),
    };
    emit_status(state, view_data, internal_tx, status);
}

fn copy_link_url<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    url: &str,
) {
    let status = match runtime.copy_to_clipboard(url) {
        Ok(()) => "URL copied to clipboard".to_owned(),
        Err(error) => format!("copy failed: {error}"),
    };
    emit_status(state, view_data, internal_tx, status);
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => move_table_row(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_table_row(view_data, -1),
        KeyCode::Char('h') | KeyCode::Left => move_table_column(view_data, -1),
        KeyCode::Char('l') | KeyCode::Right => move_table_column(view_data, 1),
        KeyCode::Char('g') => view_data.table_cursor.row = 0,
        KeyCode::Char('G') => view_data.table_cursor.row = page_links(view_data).len().saturating_sub(1),
        KeyCode::Enter | KeyCode::Char('i') => {
            activate_table_cell(state, runtime, view_data, internal_tx);
        }
        KeyCode::Char(' ') => {
            if let Some(link) = current_table_link(view_data) {
                view_data.table.toggle_row(&link.id);
                let status = selection_status(view_data);
                emit_status(state, view_data, internal_tx, status);
            }
        }
        KeyCode::Char('A') => {
            let page = page_links(view_data);
            let refs = page.iter().collect::<Vec<_>>();
            view_data.table.toggle_page_selection(&refs);
            let status = selection_status(view_data);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('D') => bulk_delete_selected(state, runtime, view_data, internal_tx),
        KeyCode::Char('x') => {
            if let Some(link) = current_table_link(view_data) {
                delete_table_row(state, runtime, view_data, internal_tx, &link.id);
            }
        }
        KeyCode::Char('s') => {
            let status = match view_data.table.toggle_sort(view_data.table_cursor.column) {
                Ok((column, direction)) => {
                    format!("sort {} {}", column.as_str(), direction_label(direction))
                }
                Err(error) => error.to_string(),
            };
            clamp_cursors(view_data);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('c') => {
            let column = view_data.table_cursor.column;
            let status = match view_data.table.toggle_column(column) {
                Ok(_) => {
                    clamp_cursors(view_data);
                    format!("hid {}", column.as_str())
                }
                Err(error) => error.to_string(),
            };
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('C') => {
            let hidden = LinkColumn::ALL
                .into_iter()
                .filter(|column| !view_data.table.is_visible(*column))
                .collect::<Vec<_>>();
            for column in &hidden {
                let _ = view_data.table.toggle_column(*column);
            }
            emit_status(state, view_data, internal_tx, "all columns shown");
        }
        KeyCode::Char('n') | KeyCode::PageDown => {
            let total = table_rows(view_data).len();
            if view_data.table.next_page(total) {
                view_data.table_cursor.row = 0;
            }
            let status = view_data.table.page_footer(total);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('N') | KeyCode::PageUp => {
            if view_data.table.previous_page() {
                view_data.table_cursor.row = 0;
            }
            let status = view_data.table.page_footer(table_rows(view_data).len());
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('<') => {
            view_data.table.first_page();
            view_data.table_cursor.row = 0;
            let status = view_data.table.page_footer(table_rows(view_data).len());
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('>') => {
            let total = table_rows(view_data).len();
            view_data.table.last_page(total);
            view_data.table_cursor.row = 0;
            let status = view_data.table.page_footer(total);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('z') => {
            let size = view_data.table.cycle_page_size();
            view_data.table_cursor.row = 0;
            emit_status(state, view_data, internal_tx, format!("{size} rows per page"));
        }
        KeyCode::Char('m') => {
            view_data.search = Some(SearchTarget::TableModel);
            emit_status(state, view_data, internal_tx, "filter by model: type to filter");
        }
        KeyCode::Char('y') => {
            if let Some(link) = current_table_link(view_data) {
                copy_link_url(state, runtime, view_data, internal_tx, &link.url);
            }
        }
        KeyCode::Char('o') => {
            if let Some(link) = current_table_link(view_data) {
                open_link_url(state, runtime, view_data, internal_tx, &link.url);
            }
        }
        KeyCode::Char('a') => open_link_form(state, runtime, view_data, internal_tx, None),
        KeyCode::Char('e') => {
            if let Some(link) = current_table_link(view_data) {
                open_link_form(state, runtime, view_data, internal_tx, Some(&link));
            }
        }
        _ => {}
    }
}

fn move_table_row(view_data: &mut ViewData, delta: isize) {
    let len = page_links(view_data).len();
    if len == 0 {
        view_data.table_cursor.row = 0;
        return;
    }
    let next = (view_data.table_cursor.row as isize + delta).clamp(0, len as isize - 1);
    view_data.table_cursor.row = next as usize;
}

fn move_table_column(view_data: &mut ViewData, delta: isize) {
    let visible = view_data.table.visible_columns();
    if visible.is_empty() {
        return;
    }
    let current = visible
        .iter()
        .position(|column| *column == view_data.table_cursor.column)
        .unwrap_or(0) as isize;
    let next = (current + delta).clamp(0, visible.len() as isize - 1) as usize;
    view_data.table_cursor.column = visible[next];
}

fn activate_table_cell<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(link) = current_table_link(view_data) else {
        emit_status(state, view_data, internal_tx, "no rows -- press a to add a link");
        return;
    };
    let column = view_data.table_cursor.column;
    match column.kind() {
        CellKind::Selection => {
            view_data.table.toggle_row(&link.id);
            let status = selection_status(view_data);
            emit_status(state, view_data, internal_tx, status);
        }
        CellKind::Text | CellKind::List => {
            let mut editor = CellEditor::new(&link, column);
            editor.begin();
            view_data.cell_editor = Some(editor);
            state.dispatch(AppCommand::EnterEditMode);
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("edit {}", column.as_str()),
            );
        }
        CellKind::Toggle => {
            let update = LinkFieldUpdate::Popular(!link.is_popular);
            apply_link_update(state, runtime, view_data, internal_tx, &link.id, &update);
        }
        CellKind::Actions => open_link_url(state, runtime, view_data, internal_tx, &link.url),
    }
}

fn handle_cell_edit_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(editor) = view_data.cell_editor.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };

    match key.code {
        KeyCode::Esc => {
            editor.cancel();
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "edit canceled");
        }
        KeyCode::Enter => commit_cell_edit(state, runtime, view_data, internal_tx),
        KeyCode::Up | KeyCode::BackTab => {
            commit_cell_edit(state, runtime, view_data, internal_tx);
            move_table_row(view_data, -1);
        }
        KeyCode::Down => {
            commit_cell_edit(state, runtime, view_data, internal_tx);
            move_table_row(view_data, 1);
        }
        KeyCode::Tab => {
            commit_cell_edit(state, runtime, view_data, internal_tx);
            move_table_column(view_data, 1);
        }
        KeyCode::Backspace => editor.pop_char(),
        _ => {
            if let Some(ch) = is_typing(key) {
                editor.push_char(ch);
            }
        }
    }
}

/// Leave edit mode and send the change, if any.
fn commit_cell_edit<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    state.dispatch(AppCommand::ExitToNav);
    let Some(editor) = view_data.cell_editor.as_mut() else {
        return;
    };
    let link_id = editor.link_id.clone();
    if let Some(update) = editor.commit() {
        apply_link_update(state, runtime, view_data, internal_tx, &link_id, &update);
    }
}

fn apply_link_update<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    id: &LinkId,
    update: &LinkFieldUpdate,
) {
    match runtime.update_link_field(id, update) {
        Ok(updated) => {
            if let Some(link) = view_data.links.iter_mut().find(|link| &link.id == id) {
                *link = updated;
            }
            reload_links(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, "Row updated successfully");
        }
        Err(error) => {
            if let Some(link) = view_data.links.iter().find(|link| &link.id == id)
                && let Some(editor) = view_data.cell_editor.as_mut()
                && &editor.link_id == id
            {
                editor.sync(link);
            }
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("Update failed: {error}"),
            );
        }
    }
}

fn delete_table_row<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    id: &LinkId,
) {
    match runtime.delete_link(id) {
        Ok(()) => {
            reload_links(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, "Row deleted successfully");
        }
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("Error deleting row: {error}"),
        ),
    }
}

fn bulk_delete_selected<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    // Only selected rows that pass the table filter, matching the footer.
    let ids = table_rows(view_data)
        .into_iter()
        .filter(|link| view_data.table.is_selected(&link.id))
        .map(|link| link.id.clone())
        .collect::<Vec<_>>();
    if ids.is_empty() {
        emit_status(
            state,
            view_data,
            internal_tx,
            "no rows selected -- press space to select rows",
        );
        return;
    }
    let result = runtime.delete_links(&ids);
    view_data.table.clear_selection();
    match result {
        Ok(outcome) => {
            if outcome.deleted > 0 {
                reload_links(state, runtime, view_data, internal_tx);
            }
            emit_status(state, view_data, internal_tx, outcome.summary);
        }
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("Error deleting row: {error}"),
        ),
    }
}

fn reload_links<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match runtime.load_links() {
        Ok(links) => apply_links(view_data, links),
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("load failed: {error}"),
        ),
    }
}

fn apply_links(view_data: &mut ViewData, links: Vec<Link>) {
    view_data.links = links;
    view_data.table.retain_existing(&view_data.links);
    if let Some(editor) = &view_data.cell_editor
        && !editor.is_editing()
    {
        view_data.cell_editor = None;
    }
    clamp_cursors(view_data);
}

fn handle_prompts_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => move_prompt_cursor(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_prompt_cursor(view_data, -1),
        KeyCode::Char('g') => view_data.prompts.cursor = 0,
        KeyCode::Char('G') => {
            view_data.prompts.cursor = view_data.prompts.items.len().saturating_sub(1);
        }
        KeyCode::Enter => {
            if current_prompt(view_data).is_some() {
                view_data.prompts.detail_visible = true;
            }
        }
        KeyCode::Char('c') => cycle_prompt_category(state, runtime, view_data, internal_tx, 1),
        KeyCode::Char('C') => cycle_prompt_category(state, runtime, view_data, internal_tx, -1),
        KeyCode::Char('y') => copy_prompt(state, runtime, view_data, internal_tx),
        KeyCode::Char('a') => {
            let payload =
                FormPayload::Prompt(PromptFormInput::blank_with_seen(&view_data.prompts.items));
            open_form(state, runtime, view_data, internal_tx, payload);
        }
        KeyCode::Char('e') => {
            if let Some(prompt) = current_prompt(view_data) {
                let mut input = PromptFormInput::for_prompt(&prompt);
                for seen in &view_data.prompts.items {
                    input.category.extend_candidates(seen.category.iter().cloned());
                    input.tags.extend_candidates(seen.tags.iter().cloned());
                }
                open_form(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    FormPayload::Prompt(input),
                );
            }
        }
        KeyCode::Char('d') => {
            let Some(prompt) = current_prompt(view_data) else {
                return;
            };
            match runtime.delete_prompt(&prompt.id) {
                Ok(()) => {
                    request_prompts(state, runtime, view_data, internal_tx);
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        "Prompt deleted successfully",
                    );
                }
                Err(error) => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("Failed to delete prompt: {error}"),
                ),
            }
        }
        _ => {}
    }
}

fn handle_prompt_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => view_data.prompts.detail_visible = false,
        KeyCode::Char('y') => copy_prompt(state, runtime, view_data, internal_tx),
        _ => {}
    }
}

fn move_prompt_cursor(view_data: &mut ViewData, delta: isize) {
    let len = view_data.prompts.items.len();
    if len == 0 {
        view_data.prompts.cursor = 0;
        return;
    }
    let next = (view_data.prompts.cursor as isize + delta).clamp(0, len as isize - 1);
    view_data.prompts.cursor = next as usize;
}

/// `all` followed by the categories present in the loaded list.
fn prompt_category_pills(prompts: &[Prompt]) -> Vec<String> {
    let mut pills = vec![CATEGORY_ALL.to_owned()];
    pills.extend(prompt_category_options(prompts));
    pills
}

fn cycle_prompt_category<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let pills = prompt_category_pills(&view_data.prompts.items);
    let active = view_data
        .prompts
        .query
        .category
        .clone()
        .unwrap_or_else(|| CATEGORY_ALL.to_owned());
    let current = pills.iter().position(|pill| *pill == active).unwrap_or(0) as isize;
    let next = pills[(current + delta).rem_euclid(pills.len() as isize) as usize].clone();
    view_data.prompts.query.category = (next != CATEGORY_ALL).then(|| next.clone());
    view_data.prompts.cursor = 0;
    request_prompts(state, runtime, view_data, internal_tx);
    emit_status(state, view_data, internal_tx, format!("category {next}"));
}

fn copy_prompt<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(prompt) = current_prompt(view_data) else {
        return;
    };
    let status = match runtime.copy_to_clipboard(&prompt.prompt_text) {
        Ok(()) => "Prompt copied to clipboard".to_owned(),
        Err(error) => format!("copy failed: {error}"),
    };
    emit_status(state, view_data, internal_tx, status);
}

fn handle_profile_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let signed_in = view_data.account.is_signed_in();
    match key.code {
        KeyCode::Char('i') if !signed_in => {
            open_form(
                state,
                runtime,
                view_data,
                internal_tx,
                FormPayload::SignIn(Default::default()),
            );
        }
        KeyCode::Char('u') if !signed_in => {
            open_form(
                state,
                runtime,
                view_data,
                internal_tx,
                FormPayload::SignUp(Default::default()),
            );
        }
        KeyCode::Char('e') if signed_in => {
            let input = ProfileFormInput::for_profile(view_data.account.profile.as_ref());
            open_form(
                state,
                runtime,
                view_data,
                internal_tx,
                FormPayload::Profile(input),
            );
        }
        KeyCode::Char('o') if signed_in => match runtime.sign_out() {
            Ok(()) => {
                view_data.table.clear_selection();
                view_data.cell_editor = None;
                if let Err(error) = refresh_view_data(state, runtime, view_data, internal_tx) {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("load failed: {error}"),
                    );
                    return;
                }
                emit_status(state, view_data, internal_tx, "Signed out");
            }
            Err(error) => emit_status(
                state,
                view_data,
                internal_tx,
                format!("sign out failed: {error}"),
            ),
        },
        _ => {}
    }
}

fn open_link_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    link: Option<&Link>,
) {
    let mut input = match link {
        Some(link) => LinkFormInput::for_link(link),
        None => LinkFormInput::blank(),
    };
    input
        .category
        .extend_candidates(link_category_options(&view_data.links));
    input.tags.extend_candidates(
        view_data
            .links
            .iter()
            .flat_map(|link| link.tags.iter().cloned()),
    );
    open_form(state, runtime, view_data, internal_tx, FormPayload::Link(input));
}

fn open_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    payload: FormPayload,
) {
    let kind = payload.kind();
    let is_edit = payload.is_edit();
    view_data.search = None;
    dispatch_and_refresh(
        state,
        runtime,
        view_data,
        AppCommand::OpenForm(kind),
        internal_tx,
    );
    dispatch_and_refresh(
        state,
        runtime,
        view_data,
        AppCommand::SetFormPayload(payload),
        internal_tx,
    );
    view_data.form = Some(FormUiState::new(kind));
    if is_edit {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("edit {}", kind.label()),
        );
    }
}

fn sync_form_ui_state(state: &AppState, view_data: &mut ViewData) {
    let AppMode::Form(kind) = state.mode else {
        view_data.form = None;
        return;
    };

    let max_index = form_field_specs(kind).len().saturating_sub(1);
    match view_data.form.as_mut() {
        Some(form) if form.kind == kind => form.field_index = form.field_index.min(max_index),
        _ => view_data.form = Some(FormUiState::new(kind)),
    }
}

fn move_form_field_cursor(state: &AppState, view_data: &mut ViewData, delta: isize) -> String {
    sync_form_ui_state(state, view_data);
    let Some(form) = view_data.form.as_mut() else {
        return "form unavailable".to_owned();
    };
    let fields = form_field_specs(form.kind);
    if fields.is_empty() {
        return "form has no fields".to_owned();
    }

    let len = fields.len() as isize;
    form.field_index = (form.field_index as isize + delta).rem_euclid(len) as usize;
    form.choice_cursor = 0;
    form.draft.clear();
    format_form_field_status(form.kind, form.field_index)
}

fn format_form_field_status(kind: FormKind, index: usize) -> String {
    let fields = form_field_specs(kind);
    if fields.is_empty() {
        return "form has no fields".to_owned();
    }
    let field = fields[index.min(fields.len().saturating_sub(1))];
    format!("field {} ({}/{})", field.label, index + 1, fields.len())
}

fn current_field_spec(view_data: &ViewData) -> Option<FormFieldSpec> {
    let form = view_data.form.as_ref()?;
    form_field_specs(form.kind).get(form.field_index).copied()
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    sync_form_ui_state(state, view_data);
    match key.code {
        KeyCode::Esc => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::CloseForm, internal_tx);
            emit_status(state, view_data, internal_tx, "form canceled");
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            submit_form(state, runtime, view_data, internal_tx);
        }
        KeyCode::Tab => {
            let status = move_form_field_cursor(state, view_data, 1);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::BackTab => {
            let status = move_form_field_cursor(state, view_data, -1);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Enter if !enter_edits_field(view_data) => {
            submit_form(state, runtime, view_data, internal_tx);
        }
        _ => match edit_form_field(state, view_data, key) {
            Ok(Some(status)) => emit_status(state, view_data, internal_tx, status),
            Ok(None) => {}
            Err(error) => emit_status(state, view_data, internal_tx, error.to_string()),
        },
    }
}

/// Enter adds a line in multiline fields and creates a typed choice.
fn enter_edits_field(view_data: &ViewData) -> bool {
    let Some(spec) = current_field_spec(view_data) else {
        return false;
    };
    match spec.kind {
        FieldKind::Multiline => true,
        FieldKind::Choice => view_data
            .form
            .as_ref()
            .is_some_and(|form| !form.draft.trim().is_empty()),
        FieldKind::Text | FieldKind::Secret | FieldKind::Toggle => false,
    }
}

fn edit_form_field(
    state: &mut AppState,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Result<Option<String>> {
    let Some(spec) = current_field_spec(view_data) else {
        return Ok(None);
    };
    let Some(form) = view_data.form.as_mut() else {
        return Ok(None);
    };
    let Some(mut payload) = state.form_payload.clone() else {
        return Err(anyhow!("form payload missing -- reopen the form"));
    };

    let status = match spec.kind {
        FieldKind::Text | FieldKind::Secret | FieldKind::Multiline => {
            let value = payload.text_field_mut(spec.key)?;
            match (key.code, is_typing(key)) {
                (KeyCode::Backspace, _) => {
                    value.pop();
                }
                (KeyCode::Enter, _) if spec.kind == FieldKind::Multiline => value.push('\n'),
                (_, Some(ch)) => value.push(ch),
                _ => return Ok(None),
            }
            None
        }
        FieldKind::Toggle => match key.code {
            KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => {
                let value = payload.toggle_field(spec.key)?;
                Some(format!("{} {}", spec.label, if value { "yes" } else { "no" }))
            }
            _ => return Ok(None),
        },
        FieldKind::Choice => {
            let selector = payload.selector_mut(spec.key)?;
            let last = selector.candidates().len().saturating_sub(1);
            match (key.code, is_typing(key)) {
                (KeyCode::Left, _) => {
                    form.choice_cursor = form.choice_cursor.saturating_sub(1);
                    return Ok(None);
                }
                (KeyCode::Right, _) => {
                    form.choice_cursor = (form.choice_cursor + 1).min(last);
                    return Ok(None);
                }
                (KeyCode::Enter, _) => {
                    let value = form.draft.trim().to_owned();
                    let created = selector.create(&value)?;
                    form.draft.clear();
                    form.choice_cursor = selector
                        .candidates()
                        .iter()
                        .position(|candidate| *candidate == value)
                        .unwrap_or(form.choice_cursor);
                    Some(if created {
                        format!("added {value}")
                    } else {
                        format!("selected {value}")
                    })
                }
                (KeyCode::Backspace, _) => {
                    form.draft.pop();
                    return Ok(None);
                }
                (_, Some(' ')) if form.draft.is_empty() => {
                    let selected = selector.toggle_index(form.choice_cursor)?;
                    Some(choice_status(selector.candidates(), form.choice_cursor, selected))
                }
                (_, Some(digit @ '1'..='9')) if form.draft.is_empty() => {
                    let index = digit.to_digit(10).unwrap_or(1) as usize - 1;
                    let selected = selector.toggle_index(index)?;
                    form.choice_cursor = index;
                    Some(choice_status(selector.candidates(), index, selected))
                }
                (_, Some(ch)) => {
                    form.draft.push(ch);
                    return Ok(None);
                }
                _ => return Ok(None),
            }
        }
    };

    state.dispatch(AppCommand::SetFormPayload(payload));
    Ok(status)
}

fn choice_status(candidates: &[String], index: usize, selected: bool) -> String {
    let value = candidates.get(index).map(String::as_str).unwrap_or_default();
    if selected {
        format!("selected {value}")
    } else {
        format!("removed {value}")
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let payload = match state.validated_form_payload() {
        Ok(payload) => payload,
        Err(error) => {
            emit_status(state, view_data, internal_tx, error.to_string());
            return;
        }
    };
    let kind = payload.kind();
    let is_edit = payload.is_edit();
    let signed_in = view_data.account.is_signed_in();

    if let Err(error) = runtime.submit_form(&payload) {
        emit_status(
            state,
            view_data,
            internal_tx,
            submit_failure_status(kind, is_edit, signed_in, &error),
        );
        return;
    }

    dispatch_and_refresh(state, runtime, view_data, AppCommand::CloseForm, internal_tx);
    if matches!(kind, FormKind::SignIn | FormKind::SignUp) {
        view_data.table.clear_selection();
        view_data.link_cursor = 0;
        view_data.prompts.cursor = 0;
    }
    if let Err(error) = refresh_view_data(state, runtime, view_data, internal_tx) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("load failed: {error}"),
        );
        return;
    }
    let status = submit_success_status(kind, is_edit, view_data.account.is_signed_in());
    emit_status(state, view_data, internal_tx, status);
}

fn submit_success_status(kind: FormKind, is_edit: bool, signed_in: bool) -> &'static str {
    match (kind, is_edit) {
        (FormKind::Link, false) => "Link created successfully",
        (FormKind::Link, true) => "Link updated successfully",
        (FormKind::Prompt, false) => "Prompt created successfully",
        (FormKind::Prompt, true) => "Prompt updated successfully",
        (FormKind::Profile, _) => "Profile updated",
        (FormKind::SignIn, _) => "Welcome back!",
        (FormKind::SignUp, _) if signed_in => "Account created",
        (FormKind::SignUp, _) => "Check your email",
    }
}

/// Signed-out and auth failures already read as user-facing sentences.
fn submit_failure_status(
    kind: FormKind,
    is_edit: bool,
    signed_in: bool,
    error: &anyhow::Error,
) -> String {
    if !signed_in {
        return error.to_string();
    }
    match (kind, is_edit) {
        (FormKind::Link, false) => format!("Failed to create link: {error}"),
        (FormKind::Link, true) => format!("Failed to update link: {error}"),
        (FormKind::Prompt, _) => format!("Failed to save prompt: {error}"),
        (FormKind::Profile | FormKind::SignIn | FormKind::SignUp, _) => error.to_string(),
    }
}

fn visible_links(view_data: &ViewData) -> Vec<&Link> {
    view_data.link_filter.apply(&view_data.links)
}

fn table_rows(view_data: &ViewData) -> Vec<&Link> {
    view_data
        .table
        .sorted(view_data.table_filter.apply(&view_data.links))
}

fn page_links(view_data: &ViewData) -> Vec<Link> {
    let rows = table_rows(view_data);
    view_data
        .table
        .page(&rows)
        .iter()
        .map(|link| (*link).clone())
        .collect()
}

fn current_link(view_data: &ViewData) -> Option<Link> {
    visible_links(view_data)
        .get(view_data.link_cursor)
        .map(|link| (*link).clone())
}

fn current_table_link(view_data: &ViewData) -> Option<Link> {
    page_links(view_data)
        .into_iter()
        .nth(view_data.table_cursor.row)
}

fn current_prompt(view_data: &ViewData) -> Option<Prompt> {
    view_data
        .prompts
        .items
        .get(view_data.prompts.cursor)
        .cloned()
}

fn selection_status(view_data: &ViewData) -> String {
    let rows = table_rows(view_data);
    view_data.table.selection_footer(&rows)
}

fn clamp_cursors(view_data: &mut ViewData) {
    let link_count = visible_links(view_data).len();
    view_data.link_cursor = view_data.link_cursor.min(link_count.saturating_sub(1));

    let total = table_rows(view_data).len();
    view_data.table.clamp_page(total);
    let page_len = view_data.table.page_range(total).len();
    view_data.table_cursor.row = view_data.table_cursor.row.min(page_len.saturating_sub(1));

    let visible = view_data.table.visible_columns();
    if !visible.contains(&view_data.table_cursor.column) {
        let cursor = view_data.table_cursor.column;
        view_data.table_cursor.column = visible
            .iter()
            .copied()
            .find(|column| *column >= cursor)
            .or_else(|| visible.last().copied())
            .unwrap_or(LinkColumn::Select);
    }

    let prompt_count = view_data.prompts.items.len();
    view_data.prompts.cursor = view_data.prompts.cursor.min(prompt_count.saturating_sub(1));
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    command: AppCommand,
    internal_tx: &Sender<InternalEvent>,
) {
    let events = state.dispatch(command);
    if should_refresh_view(&events)
        && let Err(error) = refresh_view_data(state, runtime, view_data, internal_tx)
    {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("load failed: {error}"),
        );
    }
    sync_form_ui_state(state, view_data);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn should_refresh_view(events: &[AppEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, AppEvent::TabChanged(_)))
}

fn refresh_view_data<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> Result<()> {
    sync_form_ui_state(state, view_data);
    view_data.prompts.detail_visible = false;
    view_data.account = runtime.account();
    let links = runtime.load_links()?;
    apply_links(view_data, links);
    issue_prompt_fetch(runtime, view_data, internal_tx)
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn direction_label(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = TabKind::ALL
        .iter()
        .map(|tab| tab.label())
        .collect::<Vec<_>>();
    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .title(header_title(view_data))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_tab {
        TabKind::Links => {
            let body = Paragraph::new(render_links_text(view_data))
                .block(Block::default().borders(Borders::ALL).title("links"));
            frame.render_widget(body, layout[1]);
        }
        TabKind::Table => render_table(frame, layout[1], state, view_data),
        TabKind::Prompts => {
            let body = Paragraph::new(render_prompts_text(view_data))
                .block(Block::default().borders(Borders::ALL).title("prompts"));
            frame.render_widget(body, layout[1]);
        }
        TabKind::Profile => {
            let body = Paragraph::new(render_profile_text(&view_data.account))
                .block(Block::default().borders(Borders::ALL).title("profile"));
            frame.render_widget(body, layout[1]);
        }
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if state.active_tab == TabKind::Prompts
        && view_data.prompts.detail_visible
        && let Some(prompt) = current_prompt(view_data)
    {
        let area = centered_rect(72, 64, frame.area());
        frame.render_widget(Clear, area);
        let detail = Paragraph::new(render_prompt_detail_text(&prompt))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(prompt.title.as_str())
                    .borders(Borders::ALL),
            );
        frame.render_widget(detail, area);
    }

    if let AppMode::Form(kind) = state.mode {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let form = Paragraph::new(render_form_text(state, view_data))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(form_title(kind, state))
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Cyan)),
            );
        frame.render_widget(form, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 72, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_title(view_data: &ViewData) -> String {
    match &view_data.account.display_name {
        Some(name) => format!("llmnav | {name}"),
        None if view_data.account.loading => "llmnav | loading".to_owned(),
        None => "llmnav | signed out".to_owned(),
    }
}

fn form_title(kind: FormKind, state: &AppState) -> String {
    let editing = state
        .form_payload
        .as_ref()
        .is_some_and(FormPayload::is_edit);
    match kind {
        FormKind::Link | FormKind::Prompt if editing => format!("edit {}", kind.label()),
        FormKind::Link | FormKind::Prompt => format!("new {}", kind.label()),
        FormKind::Profile => "edit profile".to_owned(),
        FormKind::SignIn | FormKind::SignUp => kind.label().to_owned(),
    }
}

fn render_links_text(view_data: &ViewData) -> String {
    if !view_data.account.is_signed_in() {
        return "not signed in -- press 4 for the profile tab, then i to sign in".to_owned();
    }

    let stats = LinkStats::from_links(&view_data.links);
    let filter = &view_data.link_filter;
    let mut lines = vec![
        format!(
            "{} links | {} popular | {} categories",
            stats.total, stats.popular, stats.categories
        ),
        format!(
            "search: {} | category: {} | popular only: {}",
            search_label(&filter.search_term, view_data.search == Some(SearchTarget::Links)),
            filter.category.as_str(),
            on_off(filter.popular_only)
        ),
        String::new(),
    ];

    let links = visible_links(view_data);
    if links.is_empty() {
        lines.push("no links match -- press p to include all links or c to change category".to_owned());
        return lines.join("\n");
    }

    for (index, link) in links.iter().enumerate() {
        let marker = if index == view_data.link_cursor {
            CURSOR_MARK
        } else {
            " "
        };
        let popular = if link.is_popular { " *" } else { "" };
        lines.push(format!("{marker} {} [{}]{popular}", link.name, link.model));
        if !link.description.is_empty() {
            lines.push(format!("    {}", link.description));
        }
        lines.push(format!(
            "    categories: {} | tags: {}",
            list_or_dash(&link.category),
            list_or_dash(&link.tags)
        ));
    }
    lines.join("\n")
}

fn search_label(term: &str, active: bool) -> String {
    match (term.is_empty(), active) {
        (true, true) => EDIT_CARET.to_owned(),
        (true, false) => "-".to_owned(),
        (false, true) => format!("{term}{EDIT_CARET}"),
        (false, false) => term.to_owned(),
    }
}

fn list_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_owned()
    } else {
        join_list(values)
    }
}

fn render_prompts_text(view_data: &ViewData) -> String {
    if !view_data.account.is_signed_in() {
        return "not signed in -- press 4 for the profile tab, then i to sign in".to_owned();
    }

    let prompts = &view_data.prompts;
    let stats = PromptStats::from_prompts(&prompts.items);
    let loading = if prompts.loading { " | loading" } else { "" };
    let pending = if prompts.debouncer.pending().is_some() {
        " (pending)"
    } else {
        ""
    };
    let active = prompts
        .query
        .category
        .as_deref()
        .unwrap_or(CATEGORY_ALL);
    let pills = prompt_category_pills(&prompts.items)
        .into_iter()
        .map(|pill| {
            if pill == active {
                format!("[{pill}]")
            } else {
                pill
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut lines = vec![
        format!(
            "{} prompts | {} categories{loading}",
            stats.total, stats.categories
        ),
        format!(
            "search: {}{pending}",
            search_label(
                &prompts.search_input,
                view_data.search == Some(SearchTarget::Prompts)
            )
        ),
        format!("categories: {pills}"),
        String::new(),
    ];

    if prompts.items.is_empty() {
        lines.push("no prompts -- press a to add one".to_owned());
        return lines.join("\n");
    }

    for (index, prompt) in prompts.items.iter().enumerate() {
        let marker = if index == prompts.cursor {
            CURSOR_MARK
        } else {
            " "
        };
        lines.push(format!("{marker} {}", prompt.title));
        if let Some(description) = prompt.description.as_deref().filter(|text| !text.is_empty()) {
            lines.push(format!("    {description}"));
        }
        lines.push(format!(
            "    {} | tags: {}",
            list_or_dash(&prompt.category),
            list_or_dash(&prompt.tags)
        ));
    }
    lines.join("\n")
}

fn render_prompt_detail_text(prompt: &Prompt) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    let updated = prompt.updated_at.format(format).unwrap_or_default();
    let mut lines = vec![
        format!("categories: {}", list_or_dash(&prompt.category)),
        format!("tags: {}", list_or_dash(&prompt.tags)),
        format!("updated: {updated}"),
    ];
    if let Some(description) = prompt.description.as_deref().filter(|text| !text.is_empty()) {
        lines.push(String::new());
        lines.push(description.to_owned());
    }
    lines.push(String::new());
    lines.push(prompt.prompt_text.clone());
    lines.push(String::new());
    lines.push("y copy | esc close".to_owned());
    lines.join("\n")
}

fn render_profile_text(account: &AccountView) -> String {
    let Some(user) = &account.user else {
        if account.loading {
            return "loading session...".to_owned();
        }
        return "not signed in\n\ni sign in | u sign up".to_owned();
    };

    let mut lines = Vec::new();
    match &account.profile {
        Some(profile) => {
            lines.push(format!("[{}] {}", profile.initials(), profile.username));
            lines.push(format!(
                "avatar: {}",
                profile.avatar_url.as_deref().unwrap_or("-")
            ));
        }
        None => {
            let name = account
                .display_name
                .clone()
                .unwrap_or_else(|| user.email.clone());
            lines.push(name);
            lines.push("no profile yet -- press e to set a username".to_owned());
        }
    }
    lines.push(format!("email: {}", user.email));
    lines.push(String::new());
    lines.push("e edit profile | o sign out".to_owned());
    lines.join("\n")
}

fn render_form_text(state: &AppState, view_data: &ViewData) -> String {
    let (Some(payload), Some(form)) = (&state.form_payload, &view_data.form) else {
        return String::new();
    };

    let mut lines = Vec::new();
    for (index, spec) in form_field_specs(form.kind).iter().enumerate() {
        let focused = index == form.field_index;
        let marker = if focused { CURSOR_MARK } else { " " };
        let mut value = payload.field_display(spec).replace('\n', " / ");
        if focused && matches!(spec.kind, FieldKind::Text | FieldKind::Secret | FieldKind::Multiline) {
            value.push_str(EDIT_CARET);
        }
        if value.is_empty() {
            value = "-".to_owned();
        }
        lines.push(format!("{marker} {}: {value}", spec.label));

        if focused
            && spec.kind == FieldKind::Choice
            && let Some(selector) = payload.selector(spec.key)
        {
            for (choice_index, candidate) in selector.candidates().iter().enumerate() {
                let pointer = if choice_index == form.choice_cursor {
                    CURSOR_MARK
                } else {
                    " "
                };
                let check = if selector.is_selected(candidate) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let number = if choice_index < 9 {
                    format!("{}.", choice_index + 1)
                } else {
                    "  ".to_owned()
                };
                lines.push(format!("    {pointer} {number} {check} {candidate}"));
            }
            lines.push(format!("    new: {}{EDIT_CARET}", form.draft));
        }
    }
    lines.push(String::new());
    lines.push(form_hint(current_field_spec(view_data).map(|spec| spec.kind)).to_owned());
    lines.join("\n")
}

fn form_hint(kind: Option<FieldKind>) -> &'static str {
    match kind {
        Some(FieldKind::Choice) => {
            "left/right move | space or 1-9 toggle | type + enter add | tab next | ctrl+s save | esc cancel"
        }
        Some(FieldKind::Multiline) => "enter newline | tab next | ctrl+s save | esc cancel",
        Some(FieldKind::Toggle) => "space toggle | tab next | enter save | esc cancel",
        _ => "tab/shift+tab field | enter or ctrl+s save | esc cancel",
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help | f/b next/prev tab | 1-4 jump to tab | r refresh | / search\n\
links: j/k move | c/C category | p popular only | enter/o open | y copy url | a add | e edit\n\
table: j/k/h/l move | enter/i edit cell or toggle | space select row | A select page\n\
table: D delete selected | x delete row | s sort | c hide col | C show cols\n\
table: n/N next/prev page | </> first/last page | z page size | y copy | o open\n\
table: / filter by name | m filter by model\n\
cell edit: type | enter save | esc cancel | arrows/tab save and move\n\
prompts: j/k move | enter details | c/C category | y copy | a add | e edit | d delete\n\
profile: i sign in | u sign up | e edit profile | o sign out\n\
form: tab/shift+tab field | enter or ctrl+s save | esc cancel | space/1-9 choose"
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let rows = table_rows(view_data);
    let page = view_data.table.page(&rows);
    let columns = view_data.table.visible_columns();
    let widths = columns
        .iter()
        .map(|column| column_width(*column))
        .collect::<Vec<_>>();

    let header = Row::new(columns.iter().map(|column| {
        Cell::from(header_label(*column, &view_data.table)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let body = page.iter().enumerate().map(|(row_index, link)| {
        let cursor_row = row_index == view_data.table_cursor.row;
        let cells = columns
            .iter()
            .map(|column| {
                let cursor_cell = cursor_row && *column == view_data.table_cursor.column;
                let mut style = Style::default();
                if cursor_row {
                    style = style.bg(Color::DarkGray);
                }
                if cursor_cell {
                    style = if state.mode == AppMode::Edit {
                        Style::default().fg(Color::Black).bg(Color::Yellow)
                    } else {
                        Style::default()
                            .fg(Color::Black)
                            .bg(Color::Cyan)
                            .add_modifier(Modifier::BOLD)
                    };
                }
                Cell::from(table_cell_text(view_data, link, *column, cursor_cell)).style(style)
            })
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(view_data, &rows))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn column_width(column: LinkColumn) -> Constraint {
    match column.kind() {
        CellKind::Selection => Constraint::Length(3),
        CellKind::Toggle => Constraint::Length(7),
        CellKind::Actions => Constraint::Length(5),
        CellKind::Text | CellKind::List => Constraint::Min(8),
    }
}

fn header_label(column: LinkColumn, table: &LinkTableState) -> String {
    match table.sort {
        Some((sorted, SortDirection::Asc)) if sorted == column => format!("{} ↑", column.label()),
        Some((sorted, SortDirection::Desc)) if sorted == column => format!("{} ↓", column.label()),
        _ => column.label().to_owned(),
    }
}

fn table_cell_text(
    view_data: &ViewData,
    link: &Link,
    column: LinkColumn,
    cursor_cell: bool,
) -> String {
    if cursor_cell
        && let Some(editor) = &view_data.cell_editor
        && editor.is_editing()
        && editor.link_id == link.id
        && editor.column == column
    {
        return format!("{}{EDIT_CARET}", editor.draft());
    }

    match column.kind() {
        CellKind::Selection => checkbox(view_data.table.is_selected(&link.id)).to_owned(),
        CellKind::Toggle => checkbox(link.is_popular).to_owned(),
        CellKind::Actions => "y o x".to_owned(),
        CellKind::Text | CellKind::List => {
            let value = column.value_for(link);
            if !value.is_empty() {
                return value;
            }
            match column.kind() {
                CellKind::Text => EMPTY_TEXT_HINT.to_owned(),
                _ => column.placeholder().unwrap_or_default().to_owned(),
            }
        }
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn table_title(view_data: &ViewData, rows: &[&Link]) -> String {
    let mut title = format!(
        "links | {} | {} | {}/page",
        view_data.table.selection_footer(rows),
        view_data.table.page_footer(rows.len()),
        view_data.table.page_size()
    );
    if let Some((column, direction)) = view_data.table.sort {
        title.push_str(&format!(
            " | sort {} {}",
            column.as_str(),
            direction_label(direction)
        ));
    }
    let filter = &view_data.table_filter;
    let name_active = view_data.search == Some(SearchTarget::TableName);
    let model_active = view_data.search == Some(SearchTarget::TableModel);
    if !filter.name.is_empty() || name_active {
        title.push_str(&format!(" | name {}", search_label(&filter.name, name_active)));
    }
    if !filter.model.is_empty() || model_active {
        title.push_str(&format!(" | model {}", search_label(&filter.model, model_active)));
    }
    title
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let mode = match state.mode {
        AppMode::Nav => "NAV",
        AppMode::Edit => "EDIT",
        AppMode::Form(_) => "FORM",
    };
    let mut hints = key_hints(state, view_data).to_owned();
    if matches!(state.mode, AppMode::Form(_))
        && let Some(form) = &view_data.form
    {
        hints = format!(
            "{} | {hints}",
            format_form_field_status(form.kind, form.field_index)
        );
    }
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn key_hints(state: &AppState, view_data: &ViewData) -> &'static str {
    if matches!(state.mode, AppMode::Form(_)) {
        return "tab field | ctrl+s save | esc cancel";
    }
    if state.mode == AppMode::Edit {
        return "enter save | esc cancel | arrows save and move";
    }
    if view_data.search.is_some() {
        return "type to search | enter/esc done";
    }
    match state.active_tab {
        TabKind::Links => "j/k | / search | c category | p popular | enter open | y copy | a add | e edit | ? help",
        TabKind::Table => "j/k/h/l | enter edit | space select | A page | D delete | s sort | c/C cols | / name | m model | ? help",
        TabKind::Prompts if view_data.prompts.detail_visible => "y copy | esc close",
        TabKind::Prompts => "j/k | / search | c category | enter details | y copy | a add | e edit | d delete | r refresh",
        TabKind::Profile if view_data.account.is_signed_in() => "e edit profile | o sign out | ? help",
        TabKind::Profile => "i sign in | u sign up | ? help",
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AccountView, AppRuntime, BulkDeleteOutcome, InternalEvent, SearchTarget, ViewData,
        ViewOptions, format_form_field_status, handle_key_event, help_overlay_text,
        poll_prompt_search, refresh_view_data, render_links_text, render_prompts_text,
        status_text, table_rows, view_data_with_options, visible_links,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use llmnav_app::{
        AppMode, AppState, FormKind, FormPayload, Link, LinkColumn, LinkFieldUpdate, LinkId,
        Prompt, PromptId, PromptQuery, TabKind, User, UserId,
    };
    use llmnav_testkit::{RowFaker, fixture_user};
    use std::collections::BTreeSet;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use time::OffsetDateTime;

    #[derive(Debug, Default)]
    struct TestRuntime {
        account: AccountView,
        links: Vec<Link>,
        prompts: Vec<Prompt>,
        submitted: Vec<FormPayload>,
        submit_error: Option<String>,
        field_updates: Vec<(LinkId, LinkFieldUpdate)>,
        update_error: Option<String>,
        failing_deletes: BTreeSet<LinkId>,
        prompt_queries: Vec<PromptQuery>,
        arrived_prompt_requests: Vec<u64>,
        prompt_invalidations: usize,
        copied: Vec<String>,
        opened: Vec<String>,
        sign_out_count: usize,
        next_id: usize,
    }

    impl TestRuntime {
        fn signed_in() -> Self {
            Self {
                account: signed_in_account(),
                ..Self::default()
            }
        }

        fn with_links(mut self, links: Vec<Link>) -> Self {
            self.links = links;
            self
        }

        fn with_prompts(mut self, prompts: Vec<Prompt>) -> Self {
            self.prompts = prompts;
            self
        }
    }

    impl AppRuntime for TestRuntime {
        fn account(&mut self) -> AccountView {
            self.account.clone()
        }

        fn load_links(&mut self) -> Result<Vec<Link>> {
            Ok(self.links.clone())
        }

        fn refresh_links(&mut self) -> Result<Vec<Link>> {
            self.load_links()
        }

        fn load_prompts(&mut self, query: &PromptQuery) -> Result<Vec<Prompt>> {
            self.prompt_queries.push(query.clone());
            let term = query.trimmed_term().map(str::to_lowercase);
            Ok(self
                .prompts
                .iter()
                .filter(|prompt| {
                    query
                        .category_filter()
                        .is_none_or(|category| prompt.category.iter().any(|c| c == category))
                })
                .filter(|prompt| {
                    term.as_deref()
                        .is_none_or(|term| prompt.title.to_lowercase().contains(term))
                })
                .cloned()
                .collect())
        }

        fn invalidate_prompts(&mut self) {
            self.prompt_invalidations += 1;
        }

        fn prompts_arrived(&mut self, request_id: u64, _result: &Result<Vec<Prompt>, String>) {
            self.arrived_prompt_requests.push(request_id);
        }

        fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
            self.submitted.push(payload.clone());
            if let Some(message) = &self.submit_error {
                return Err(anyhow!(message.clone()));
            }
            match payload {
                FormPayload::Link(input) => {
                    let owner = self
                        .account
                        .user
                        .as_ref()
                        .map(|user| user.id.clone())
                        .ok_or_else(|| anyhow!("Not authenticated"))?;
                    let new_link = input.to_new_link(&owner)?;
                    self.next_id += 1;
                    self.links.insert(
                        0,
                        Link {
                            id: LinkId::new(format!("new-{}", self.next_id)),
                            name: new_link.name,
                            url: new_link.url,
                            model: new_link.model,
                            description: new_link.description,
                            category: new_link.category,
                            tags: new_link.tags,
                            is_popular: new_link.is_popular,
                            created_at: OffsetDateTime::UNIX_EPOCH,
                            user_id: Some(owner),
                        },
                    );
                }
                FormPayload::SignIn(input) => {
                    if input.username != "ada" || input.password != "secret" {
                        return Err(anyhow!("Invalid username or password"));
                    }
                    self.account = signed_in_account();
                }
                FormPayload::Prompt(_)
                | FormPayload::Profile(_)
                | FormPayload::SignUp(_) => {}
            }
            Ok(())
        }

        fn update_link_field(&mut self, id: &LinkId, update: &LinkFieldUpdate) -> Result<Link> {
            self.field_updates.push((id.clone(), update.clone()));
            if let Some(message) = &self.update_error {
                return Err(anyhow!(message.clone()));
            }
            let link = self
                .links
                .iter_mut()
                .find(|link| &link.id == id)
                .ok_or_else(|| anyhow!("row not found"))?;
            update.apply_to(link);
            Ok(link.clone())
        }

        fn delete_link(&mut self, id: &LinkId) -> Result<()> {
            if self.failing_deletes.contains(id) {
                return Err(anyhow!("permission denied"));
            }
            self.links.retain(|link| &link.id != id);
            Ok(())
        }

        fn delete_links(&mut self, ids: &[LinkId]) -> Result<BulkDeleteOutcome> {
            let mut deleted = 0;
            let mut failures = Vec::new();
            for id in ids {
                match self.delete_link(id) {
                    Ok(()) => deleted += 1,
                    Err(error) => failures.push(format!("Error deleting row {id}: {error}")),
                }
            }
            let mut summary = format!("Deleted {deleted} of {} row(s)", ids.len());
            for failure in failures {
                summary.push_str("; ");
                summary.push_str(&failure);
            }
            Ok(BulkDeleteOutcome {
                requested: ids.len(),
                deleted,
                summary,
            })
        }

        fn delete_prompt(&mut self, id: &PromptId) -> Result<()> {
            self.prompts.retain(|prompt| &prompt.id != id);
            Ok(())
        }

        fn sign_out(&mut self) -> Result<()> {
            self.sign_out_count += 1;
            self.account = AccountView::default();
            Ok(())
        }

        fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
            self.copied.push(text.to_owned());
            Ok(())
        }

        fn open_url(&mut self, url: &str) -> Result<()> {
            self.opened.push(url.to_owned());
            Ok(())
        }
    }

    fn signed_in_account() -> AccountView {
        AccountView {
            loading: false,
            user: Some(User {
                id: fixture_user(),
                email: "ada@example.com".to_owned(),
                username: Some("ada".to_owned()),
            }),
            profile: None,
            display_name: Some("ada".to_owned()),
        }
    }

    fn sample_link(id: &str, name: &str, popular: bool) -> Link {
        Link {
            id: LinkId::new(id),
            name: name.to_owned(),
            url: format!("https://chat.example/{id}"),
            model: "GPT-4".to_owned(),
            description: String::new(),
            category: vec!["English Expert".to_owned()],
            tags: Vec::new(),
            is_popular: popular,
            created_at: OffsetDateTime::UNIX_EPOCH,
            user_id: Some(fixture_user()),
        }
    }

    fn popular_links(count: usize) -> Vec<Link> {
        (0..count)
            .map(|index| sample_link(&format!("l{index:02}"), &format!("Link {index:02}"), true))
            .collect()
    }

    fn sample_prompts() -> Vec<Prompt> {
        let owner = UserId::new("00000000-0000-4000-8000-000000000001");
        let mut faker = RowFaker::new(11);
        faker.prompts(4, Some(&owner))
    }

    fn view_data_for_test() -> ViewData {
        ViewData::default()
    }

    fn internal_channel() -> (
        mpsc::Sender<InternalEvent>,
        mpsc::Receiver<InternalEvent>,
    ) {
        mpsc::channel()
    }

    fn pump_internal(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
    ) {
        super::process_internal_events(state, runtime, view_data, tx, rx);
    }

    fn run_key_script(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
        keys: &[KeyEvent],
    ) {
        for key in keys {
            let _ = handle_key_event(state, runtime, view_data, tx, *key);
            pump_internal(state, runtime, view_data, tx, rx);
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn typed(text: &str) -> Vec<KeyEvent> {
        text.chars().map(|ch| key(KeyCode::Char(ch))).collect()
    }

    /// Initial load, the same way `run_app` starts.
    fn loaded(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
    ) -> ViewData {
        let mut view_data = view_data_for_test();
        refresh_view_data(state, runtime, &mut view_data, tx).expect("initial load");
        pump_internal(state, runtime, &mut view_data, tx, rx);
        view_data
    }

    #[test]
    fn f_and_b_cycle_tabs() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let should_quit = handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('f')),
        );
        assert!(!should_quit);
        assert_eq!(state.active_tab, TabKind::Table);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('b')), key(KeyCode::Char('b'))],
        );
        assert_eq!(state.active_tab, TabKind::Profile);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('3'))],
        );
        assert_eq!(state.active_tab, TabKind::Prompts);
    }

    #[test]
    fn ctrl_q_quits_from_any_mode() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::signed_in();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('a'))],
        );
        assert!(matches!(state.mode, AppMode::Form(FormKind::Link)));

        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            ctrl('q'),
        ));
    }

    #[test]
    fn view_options_seed_page_size_and_popular_filter() -> Result<()> {
        let view_data = view_data_with_options(ViewOptions {
            page_size: 20,
            popular_only: false,
        })?;
        assert_eq!(view_data.table.page_size(), 20);
        assert!(!view_data.link_filter.popular_only);

        let error = view_data_with_options(ViewOptions {
            page_size: 15,
            popular_only: true,
        })
        .expect_err("unsupported page size");
        assert!(error.to_string().contains("use one of 10, 20, 30, 40, 50"));
        Ok(())
    }

    #[test]
    fn new_non_popular_link_is_hidden_until_popular_filter_is_off() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::signed_in();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(typed("https://x.ai"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("X"));
        keys.push(key(KeyCode::Tab));
        keys.push(key(KeyCode::Char('1')));
        keys.push(ctrl('s'));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(state.status_line.as_deref(), Some("Link created successfully"));
        assert_eq!(runtime.links.len(), 1);
        assert_eq!(view_data.links.len(), 1);
        assert!(visible_links(&view_data).is_empty());
        assert!(render_links_text(&view_data).contains("no links match"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('p'))],
        );
        let visible = visible_links(&view_data);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "X");
        assert_eq!(visible[0].url, "https://x.ai");
    }

    #[test]
    fn link_form_without_model_is_rejected_locally() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::signed_in();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(typed("https://x.ai"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("X"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(runtime.submitted.is_empty());
        assert!(matches!(state.mode, AppMode::Form(FormKind::Link)));
        assert_eq!(state.status_line.as_deref(), Some("Model is required"));
    }

    #[test]
    fn category_cycle_narrows_links() {
        let mut state = AppState::default();
        let mut other = sample_link("l2", "Coder", true);
        other.category = vec!["Programming".to_owned()];
        let mut runtime = TestRuntime::signed_in()
            .with_links(vec![sample_link("l1", "Grammar", true), other]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        assert_eq!(visible_links(&view_data).len(), 2);

        // popular -> all -> English Expert
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('c')), key(KeyCode::Char('c'))],
        );
        assert_eq!(
            state.status_line.as_deref(),
            Some("category English Expert")
        );
        let visible = visible_links(&view_data);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Grammar");
    }

    #[test]
    fn link_search_filters_as_you_type() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::signed_in().with_links(vec![
            sample_link("l1", "Grammar Fixer", true),
            sample_link("l2", "SQL Helper", true),
        ]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('/'))];
        keys.extend(typed("sql"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(view_data.search, None);
        assert_eq!(view_data.link_filter.search_term, "sql");
        let visible = visible_links(&view_data);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "SQL Helper");
    }

    #[test]
    fn open_and_copy_use_the_link_url() {
        let mut state = AppState::default();
        let mut runtime =
            TestRuntime::signed_in().with_links(vec![sample_link("l1", "Grammar", true)]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter), key(KeyCode::Char('y'))],
        );
        assert_eq!(runtime.opened, vec!["https://chat.example/l1".to_owned()]);
        assert_eq!(runtime.copied, vec!["https://chat.example/l1".to_owned()]);
        assert_eq!(state.status_line.as_deref(), Some("URL copied to clipboard"));
    }

    #[test]
    fn escape_cancels_cell_edit_without_update() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime =
            TestRuntime::signed_in().with_links(vec![sample_link("l1", "Grammar", true)]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed(" Pro"));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Edit);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(runtime.field_updates.is_empty());
        assert_eq!(view_data.links[0].name, "Grammar");
        assert_eq!(state.status_line.as_deref(), Some("edit canceled"));
    }

    #[test]
    fn enter_commits_one_cell_update() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime =
            TestRuntime::signed_in().with_links(vec![sample_link("l1", "Grammar", true)]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed(" Pro"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(
            runtime.field_updates,
            vec![(
                LinkId::new("l1"),
                LinkFieldUpdate::Name("Grammar Pro".to_owned())
            )]
        );
        assert_eq!(view_data.links[0].name, "Grammar Pro");
        assert_eq!(state.status_line.as_deref(), Some("Row updated successfully"));
    }

    #[test]
    fn unchanged_commit_sends_nothing() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime =
            TestRuntime::signed_in().with_links(vec![sample_link("l1", "Grammar", true)]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter), key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(runtime.field_updates.is_empty());
    }

    #[test]
    fn moving_away_commits_list_cell() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(vec![
            sample_link("l1", "Grammar", true),
            sample_link("l2", "Coder", true),
        ]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        view_data.table_cursor.column = LinkColumn::Tags;

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("AI, , Writing "));
        keys.push(key(KeyCode::Down));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(
            runtime.field_updates,
            vec![(
                LinkId::new("l1"),
                LinkFieldUpdate::Tags(vec!["AI".to_owned(), "Writing".to_owned()])
            )]
        );
        assert_eq!(view_data.table_cursor.row, 1);
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn failed_update_keeps_committed_value() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime =
            TestRuntime::signed_in().with_links(vec![sample_link("l1", "Grammar", true)]);
        runtime.update_error = Some("permission denied".to_owned());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("!"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(runtime.field_updates.len(), 1);
        assert_eq!(view_data.links[0].name, "Grammar");
        assert_eq!(
            state.status_line.as_deref(),
            Some("Update failed: permission denied")
        );
        let editor = view_data.cell_editor.as_ref().expect("editor kept");
        assert_eq!(editor.committed(), "Grammar");
    }

    #[test]
    fn popular_toggle_commits_immediately() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime =
            TestRuntime::signed_in().with_links(vec![sample_link("l1", "Grammar", true)]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        // name -> model -> description -> category -> tags -> popular
        let mut keys = vec![key(KeyCode::Char('l')); 5];
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(view_data.table_cursor.column, LinkColumn::Popular);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(
            runtime.field_updates,
            vec![(LinkId::new("l1"), LinkFieldUpdate::Popular(false))]
        );
        assert!(!view_data.links[0].is_popular);
        assert_eq!(table_rows(&view_data).len(), 1);
    }

    #[test]
    fn select_page_only_touches_current_page() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(popular_links(12));
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('A'))],
        );
        assert_eq!(view_data.table.selected_ids().len(), 10);
        assert_eq!(
            state.status_line.as_deref(),
            Some("10 of 12 row(s) selected")
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('n')), key(KeyCode::Char('A'))],
        );
        assert_eq!(view_data.table.page_index(), 1);
        assert_eq!(view_data.table.selected_ids().len(), 12);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('A'))],
        );
        assert_eq!(view_data.table.selected_ids().len(), 10);
    }

    #[test]
    fn bulk_delete_reports_partial_failure() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(popular_links(3));
        runtime.failing_deletes.insert(LinkId::new("l01"));
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[
                key(KeyCode::Char(' ')),
                key(KeyCode::Char('j')),
                key(KeyCode::Char(' ')),
                key(KeyCode::Char('j')),
                key(KeyCode::Char(' ')),
                key(KeyCode::Char('D')),
            ],
        );

        assert_eq!(
            state.status_line.as_deref(),
            Some("Deleted 2 of 3 row(s); Error deleting row l01: permission denied")
        );
        assert_eq!(view_data.links.len(), 1);
        assert_eq!(view_data.links[0].id, LinkId::new("l01"));
        assert!(view_data.table.selected_ids().is_empty());
    }

    #[test]
    fn table_shows_unpopular_rows_on_first_load() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(vec![
            sample_link("l1", "Popular", true),
            sample_link("l2", "Niche", false),
        ]);
        let (tx, rx) = internal_channel();
        let view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let names = table_rows(&view_data)
            .iter()
            .map(|link| link.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Popular", "Niche"]);
        assert!(view_data.link_filter.popular_only);
    }

    #[test]
    fn table_filters_by_name_and_model() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut coder = sample_link("l2", "Coder", false);
        coder.model = "Claude 3 Opus".to_owned();
        let mut runtime = TestRuntime::signed_in().with_links(vec![
            sample_link("l1", "Grammar", true),
            coder,
            sample_link("l3", "Grammar Lite", false),
        ]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('/'))];
        keys.extend(typed("gram"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(view_data.table_filter.name, "gram");
        assert!(view_data.link_filter.search_term.is_empty());
        assert_eq!(table_rows(&view_data).len(), 2);

        let mut keys = vec![key(KeyCode::Char('/'))];
        keys.extend(vec![key(KeyCode::Backspace); 4]);
        keys.push(key(KeyCode::Enter));
        keys.push(key(KeyCode::Char('m')));
        keys.extend(typed("claude"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(view_data.search, None);
        let names = table_rows(&view_data)
            .iter()
            .map(|link| link.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Coder"]);
    }

    #[test]
    fn bulk_delete_skips_selected_rows_hidden_by_filter() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(vec![
            sample_link("l1", "Grammar", true),
            sample_link("l2", "Coder", false),
        ]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('A')), key(KeyCode::Char('/'))];
        keys.extend(typed("gram"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(view_data.table.selected_ids().len(), 2);
        let rows = table_rows(&view_data);
        assert_eq!(
            view_data.table.selection_footer(&rows),
            "1 of 1 row(s) selected"
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('D'))],
        );
        assert_eq!(state.status_line.as_deref(), Some("Deleted 1 of 1 row(s)"));
        assert_eq!(
            runtime.links.iter().map(|link| link.id.clone()).collect::<Vec<_>>(),
            vec![LinkId::new("l2")]
        );
        assert!(view_data.table.selected_ids().is_empty());
    }

    #[test]
    fn bulk_delete_without_selection_hints() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(popular_links(2));
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('D'))],
        );
        assert_eq!(
            state.status_line.as_deref(),
            Some("no rows selected -- press space to select rows")
        );
        assert_eq!(runtime.links.len(), 2);
    }

    #[test]
    fn fixed_column_cannot_be_hidden() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(popular_links(1));
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('h')), key(KeyCode::Char('c'))],
        );
        assert_eq!(view_data.table_cursor.column, LinkColumn::Select);
        assert_eq!(
            state.status_line.as_deref(),
            Some("column select cannot be hidden")
        );
        assert!(view_data.table.is_visible(LinkColumn::Select));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('l')), key(KeyCode::Char('c'))],
        );
        assert!(!view_data.table.is_visible(LinkColumn::Name));
        assert_ne!(view_data.table_cursor.column, LinkColumn::Name);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('C'))],
        );
        assert_eq!(view_data.table.visible_columns(), LinkColumn::ALL.to_vec());
    }

    #[test]
    fn sort_key_orders_rows() {
        let mut state = AppState::with_tab(TabKind::Table);
        let mut runtime = TestRuntime::signed_in().with_links(vec![
            sample_link("l1", "beta", true),
            sample_link("l2", "Alpha", true),
        ]);
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('s'))],
        );
        let names = table_rows(&view_data)
            .iter()
            .map(|link| link.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert_eq!(state.status_line.as_deref(), Some("sort name asc"));
    }

    #[test]
    fn prompt_form_without_category_is_not_submitted() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(typed("Fix my email"));
        keys.push(ctrl('s'));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(runtime.submitted.is_empty());
        assert!(matches!(state.mode, AppMode::Form(FormKind::Prompt)));
        assert_eq!(
            state.status_line.as_deref(),
            Some("At least one category is required")
        );
    }

    #[test]
    fn prompt_form_creates_inline_category_and_submits() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(typed("Fix my email"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("Mail"));
        keys.push(key(KeyCode::Enter));
        keys.push(key(KeyCode::Tab));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("Rewrite this email politely."));
        keys.push(ctrl('s'));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(runtime.submitted.len(), 1);
        let FormPayload::Prompt(input) = &runtime.submitted[0] else {
            panic!("expected prompt payload");
        };
        assert_eq!(input.category.selected(), ["Mail".to_owned()]);
        assert_eq!(input.prompt_text, "Rewrite this email politely.");
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(
            state.status_line.as_deref(),
            Some("Prompt created successfully")
        );
    }

    #[test]
    fn submit_failure_is_prefixed_when_signed_in() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::signed_in();
        runtime.submit_error = Some("duplicate key".to_owned());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(typed("https://x.ai"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("X"));
        keys.push(key(KeyCode::Tab));
        keys.push(key(KeyCode::Char('1')));
        keys.push(ctrl('s'));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(matches!(state.mode, AppMode::Form(FormKind::Link)));
        assert_eq!(
            state.status_line.as_deref(),
            Some("Failed to create link: duplicate key")
        );
    }

    #[test]
    fn prompt_search_is_debounced() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        let initial_fetches = runtime.prompt_queries.len();
        let target_title = view_data.prompts.items[0].title.to_lowercase();

        let mut keys = vec![key(KeyCode::Char('/'))];
        keys.extend(typed(&target_title));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(view_data.search, Some(SearchTarget::Prompts));
        assert_eq!(runtime.prompt_queries.len(), initial_fetches);
        assert!(render_prompts_text(&view_data).contains("(pending)"));

        poll_prompt_search(&mut state, &mut runtime, &mut view_data, &tx, Instant::now());
        assert_eq!(runtime.prompt_queries.len(), initial_fetches);

        let later = Instant::now() + Duration::from_millis(400);
        poll_prompt_search(&mut state, &mut runtime, &mut view_data, &tx, later);
        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);

        assert_eq!(runtime.prompt_queries.len(), initial_fetches + 1);
        assert_eq!(view_data.prompts.query.term, target_title);
        assert!(!view_data.prompts.items.is_empty());
        assert!(
            view_data
                .prompts
                .items
                .iter()
                .all(|prompt| prompt.title.to_lowercase().contains(&target_title))
        );
    }

    #[test]
    fn stale_prompt_results_are_discarded() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        let current = view_data.prompts.items.clone();
        assert_eq!(current.len(), 4);

        tx.send(InternalEvent::PromptsLoaded {
            request_id: view_data.prompts.request_id - 1,
            result: Ok(Vec::new()),
        })
        .expect("send stale");
        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(view_data.prompts.items, current);

        tx.send(InternalEvent::PromptsLoaded {
            request_id: view_data.prompts.request_id,
            result: Err("timeout".to_owned()),
        })
        .expect("send failure");
        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(view_data.prompts.items, current);
        assert_eq!(state.status_line.as_deref(), Some("load failed: timeout"));
        assert!(!view_data.prompts.loading);

        let latest = view_data.prompts.request_id;
        assert_eq!(
            runtime.arrived_prompt_requests[runtime.arrived_prompt_requests.len() - 2..],
            [latest - 1, latest]
        );
    }

    #[test]
    fn prompts_stay_loading_until_the_result_arrives() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        assert!(!view_data.prompts.loading);

        let _ = handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('c')),
        );
        assert!(view_data.prompts.loading);
        assert!(render_prompts_text(&view_data).contains("| loading"));

        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert!(!view_data.prompts.loading);
        assert_eq!(
            runtime.arrived_prompt_requests.last(),
            Some(&view_data.prompts.request_id)
        );
    }

    #[test]
    fn prompt_refresh_invalidates_then_refetches_in_the_background() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        let fetches = runtime.prompt_queries.len();

        let _ = handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('r')),
        );
        assert_eq!(runtime.prompt_invalidations, 1);
        assert_eq!(runtime.prompt_queries.len(), fetches + 1);
        assert!(view_data.prompts.loading);

        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert!(!view_data.prompts.loading);
        assert_eq!(view_data.prompts.items.len(), 4);
    }

    #[test]
    fn prompt_category_pill_refetches() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('c'))],
        );
        let chosen = view_data
            .prompts
            .query
            .category
            .clone()
            .expect("category chosen");
        assert_eq!(
            runtime.prompt_queries.last().and_then(|q| q.category.clone()),
            Some(chosen.clone())
        );
        assert!(
            view_data
                .prompts
                .items
                .iter()
                .all(|prompt| prompt.category.contains(&chosen))
        );
    }

    #[test]
    fn copy_prompt_text() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        let expected = view_data.prompts.items[0].prompt_text.clone();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter), key(KeyCode::Char('y'))],
        );
        assert!(view_data.prompts.detail_visible);
        assert_eq!(runtime.copied, vec![expected]);
        assert_eq!(
            state.status_line.as_deref(),
            Some("Prompt copied to clipboard")
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc)],
        );
        assert!(!view_data.prompts.detail_visible);
    }

    #[test]
    fn delete_prompt_reloads_list() {
        let mut state = AppState::with_tab(TabKind::Prompts);
        let mut runtime = TestRuntime::signed_in().with_prompts(sample_prompts());
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('d'))],
        );
        assert_eq!(view_data.prompts.items.len(), 3);
        assert_eq!(
            state.status_line.as_deref(),
            Some("Prompt deleted successfully")
        );
    }

    #[test]
    fn sign_in_success_welcomes_user() {
        let mut state = AppState::with_tab(TabKind::Profile);
        let mut runtime = TestRuntime::default();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        assert!(!view_data.account.is_signed_in());

        let mut keys = vec![key(KeyCode::Char('i'))];
        keys.extend(typed("ada"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("secret"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.account.is_signed_in());
        assert_eq!(state.status_line.as_deref(), Some("Welcome back!"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('o'))],
        );
        assert_eq!(runtime.sign_out_count, 1);
        assert!(!view_data.account.is_signed_in());
        assert_eq!(state.status_line.as_deref(), Some("Signed out"));
    }

    #[test]
    fn sign_in_failure_keeps_form_open() {
        let mut state = AppState::with_tab(TabKind::Profile);
        let mut runtime = TestRuntime::default();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        let mut keys = vec![key(KeyCode::Char('i'))];
        keys.extend(typed("ghost"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("wrong"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(matches!(state.mode, AppMode::Form(FormKind::SignIn)));
        assert!(!view_data.account.is_signed_in());
        assert_eq!(
            state.status_line.as_deref(),
            Some("Invalid username or password")
        );
    }

    #[test]
    fn form_field_cursor_wraps() {
        let mut state = AppState::with_tab(TabKind::Profile);
        let mut runtime = TestRuntime::default();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('i')), key(KeyCode::BackTab)],
        );
        assert_eq!(
            state.status_line.as_deref(),
            Some("field Password (2/2)")
        );
        assert_eq!(
            format_form_field_status(FormKind::SignUp, 3),
            "field Confirm password (4/4)"
        );
        assert!(status_text(&state, &view_data).starts_with("FORM | "));
    }

    #[test]
    fn status_clear_respects_latest_token() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        super::emit_status(&mut state, &mut view_data, &tx, "first");
        let stale = view_data.status_token;
        super::emit_status(&mut state, &mut view_data, &tx, "second");

        tx.send(InternalEvent::ClearStatus { token: stale })
            .expect("send stale clear");
        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line.as_deref(), Some("second"));

        tx.send(InternalEvent::ClearStatus {
            token: view_data.status_token,
        })
        .expect("send clear");
        pump_internal(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line, None);
    }

    #[test]
    fn help_overlay_opens_and_closes() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let (tx, rx) = internal_channel();
        let mut view_data = loaded(&mut state, &mut runtime, &tx, &rx);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('?'))],
        );
        assert!(view_data.help_visible);
        assert!(help_overlay_text().contains("ctrl+q quit"));
        assert_eq!(status_text(&state, &view_data), "");

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('f')), key(KeyCode::Esc)],
        );
        assert!(!view_data.help_visible);
        assert_eq!(state.active_tab, TabKind::Links);
    }

    #[test]
    fn signed_out_lists_prompt_to_sign_in() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let (tx, rx) = internal_channel();
        let view_data = loaded(&mut state, &mut runtime, &tx, &rx);
        assert!(render_links_text(&view_data).starts_with("not signed in"));
        assert!(render_prompts_text(&view_data).starts_with("not signed in"));
    }
}
