//! In-memory user-management application.
//!
//! [`MockDocument`] implements [`DocumentDriver`] over a small simulated
//! page: a three-field form, a users table with per-row edit/delete
//! buttons, an inline message, and alert dialogs for validation and
//! duplicate-email errors.
//!
//! Rendering is asynchronous the way a real single-page app is: server
//! round-trips (save, delete) land only after a configurable number of
//! document queries (`with_render_delay`). Every table render replaces the
//! row nodes, so handles captured before a render go stale.

use crate::dialog::{Dialog, DialogLog};
use crate::driver::{DocumentDriver, ElementHandle, ReadyState};
use crate::locator::{Locator, Selector};
use crate::record::UserRecord;
use crate::result::{EsperarError, EsperarResult};
use crate::users::{ADD_LABEL, UPDATE_LABEL};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Title the application sets on its document
pub const APP_TITLE: &str = "DevOps Assignment 2";

/// Alert shown when any form field is empty
pub const ALERT_MISSING_FIELDS: &str = "Please fill in all fields";

/// Alert shown when the email is already taken
pub const ALERT_DUPLICATE_EMAIL: &str = "Email already exists";

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// =============================================================================
// APPLICATION STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Email,
    Age,
}

impl Field {
    const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Age => "age",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    None,
    Input(Field),
    Submit,
    Edit(u32),
    Delete(u32),
}

#[derive(Debug, Clone)]
struct StoredUser {
    id: u32,
    record: UserRecord,
}

#[derive(Debug, Clone, Default)]
struct FormState {
    name: String,
    email: String,
    age: String,
}

impl FormState {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Age => &mut self.age,
        }
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Age => &self.age,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
enum Effect {
    Save {
        editing: Option<u32>,
        record: UserRecord,
    },
    Delete(u32),
    ExternalInsert(UserRecord),
}

#[derive(Debug, Default)]
struct AppState {
    url: String,
    users: Vec<StoredUser>,
    next_id: u32,
    form: FormState,
    editing: Option<u32>,
    message: Option<(MessageKind, String)>,
    pending: VecDeque<(u64, Effect)>,
    dialog: Option<Dialog>,
    server_error: Option<String>,
    malformed_rows: usize,
    queries: u64,
    ready_calls: u32,
    interactable_checks: u32,
    page_gen: u64,
    table_gen: u64,
    message_gen: u64,
    session_lost: bool,
    closed: bool,
    history: Vec<String>,
}

impl AppState {
    fn insert(&mut self, record: UserRecord) {
        self.next_id += 1;
        self.users.push(StoredUser {
            id: self.next_id,
            record,
        });
        self.table_gen += 1;
    }

    fn set_message(&mut self, kind: MessageKind, text: impl Into<String>) {
        self.message = Some((kind, text.into()));
        self.message_gen += 1;
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Save { editing, record } => {
                if let Some(error) = self.server_error.take() {
                    self.set_message(MessageKind::Error, format!("Error: {error}"));
                    return;
                }
                let taken = self
                    .users
                    .iter()
                    .any(|u| u.record.email == record.email && Some(u.id) != editing);
                if taken {
                    debug!(email = %record.email, "duplicate email rejected");
                    self.dialog = Some(Dialog::alert(ALERT_DUPLICATE_EMAIL));
                    return;
                }
                let verb = match editing.and_then(|id| self.users.iter_mut().find(|u| u.id == id)) {
                    Some(existing) => {
                        existing.record = record;
                        self.table_gen += 1;
                        "updated"
                    }
                    None => {
                        self.insert(record);
                        "added"
                    }
                };
                self.form = FormState::default();
                self.editing = None;
                self.set_message(MessageKind::Success, format!("User {verb} successfully"));
            }
            Effect::Delete(id) => {
                let before = self.users.len();
                self.users.retain(|u| u.id != id);
                if self.users.len() != before {
                    self.table_gen += 1;
                    self.set_message(MessageKind::Success, "User deleted successfully");
                }
            }
            Effect::ExternalInsert(record) => self.insert(record),
        }
    }

    /// Count one document query and land every effect that is due.
    fn tick(&mut self) {
        self.queries += 1;
        while self
            .pending
            .front()
            .is_some_and(|(due, _)| *due <= self.queries)
        {
            if let Some((_, effect)) = self.pending.pop_front() {
                self.apply(effect);
            }
        }
    }

    fn schedule(&mut self, delay: u64, effect: Effect) {
        if delay == 0 {
            self.apply(effect);
        } else {
            self.pending.push_back((self.queries + delay, effect));
        }
    }

    fn submit(&mut self, delay: u64) {
        let form = &self.form;
        if form.name.is_empty() || form.email.is_empty() || form.age.is_empty() {
            self.dialog = Some(Dialog::alert(ALERT_MISSING_FIELDS));
            return;
        }
        let Ok(age) = form.age.parse::<u32>() else {
            self.dialog = Some(Dialog::alert(ALERT_MISSING_FIELDS));
            return;
        };
        let record = UserRecord::new(form.name.clone(), form.email.clone(), age);
        let editing = self.editing;
        self.schedule(delay, Effect::Save { editing, record });
    }

    fn start_edit(&mut self, id: u32) {
        if let Some(user) = self.users.iter().find(|u| u.id == id) {
            self.form = FormState {
                name: user.record.name.clone(),
                email: user.record.email.clone(),
                age: user.record.age.to_string(),
            };
            self.editing = Some(id);
        }
    }

    fn reload(&mut self) {
        self.page_gen += 1;
        self.ready_calls = 0;
        self.form = FormState::default();
        self.editing = None;
        self.message = None;
    }
}

// =============================================================================
// RENDERED TREE
// =============================================================================

#[derive(Debug, Clone)]
struct Node {
    key: String,
    tag: &'static str,
    classes: Vec<&'static str>,
    attrs: Vec<(&'static str, String)>,
    text: String,
    parent: Option<usize>,
    control: Control,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn push(
        &mut self,
        parent: Option<usize>,
        key: String,
        tag: &'static str,
        classes: &[&'static str],
        text: impl Into<String>,
    ) -> usize {
        self.nodes.push(Node {
            key,
            tag,
            classes: classes.to_vec(),
            attrs: Vec::new(),
            text: text.into(),
            parent,
            control: Control::None,
        });
        self.nodes.len() - 1
    }

    fn attr(&mut self, node: usize, name: &'static str, value: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.attrs.push((name, value.into()));
        }
    }

    fn control(&mut self, node: usize, control: Control) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.control = control;
        }
    }

    fn render(state: &AppState) -> Self {
        let mut t = Self::default();
        let pg = state.page_gen;
        let k = |name: &str| format!("p{pg}:{name}");

        let app = t.push(None, k("app"), "div", &["container"], "");
        t.push(Some(app), k("h1"), "h1", &[], "User Management");

        let form = t.push(Some(app), k("form"), "form", &["user-form"], "");
        for (field, input_type, placeholder) in [
            (Field::Name, "text", "Name"),
            (Field::Email, "email", "Email"),
            (Field::Age, "number", "Age"),
        ] {
            let input = t.push(Some(form), k(&format!("input-{}", field.name())), "input", &[], "");
            t.attr(input, "name", field.name());
            t.attr(input, "type", input_type);
            t.attr(input, "placeholder", placeholder);
            t.attr(input, "value", state.form.field(field));
            t.control(input, Control::Input(field));
        }
        let label = if state.editing.is_some() {
            UPDATE_LABEL
        } else {
            ADD_LABEL
        };
        let submit = t.push(Some(form), k("submit"), "button", &["submit_btn"], label);
        t.attr(submit, "type", "submit");
        t.control(submit, Control::Submit);

        if let Some((kind, text)) = &state.message {
            let class = match kind {
                MessageKind::Success => "success-message",
                MessageKind::Error => "error-message",
            };
            let key = k(&format!("m{}", state.message_gen));
            t.push(Some(app), key, "div", &["message", class], text.clone());
        }

        let table = t.push(Some(app), k("table"), "table", &["table"], "");
        let thead = t.push(Some(table), k("thead"), "thead", &[], "");
        let head_row = t.push(Some(thead), k("head-row"), "tr", &[], "");
        for (i, heading) in ["ID", "Name", "Email", "Age", "Actions"].iter().enumerate() {
            t.push(Some(head_row), k(&format!("th{i}")), "th", &[], *heading);
        }

        let tbody = t.push(Some(table), k("tbody"), "tbody", &[], "");
        let tg = state.table_gen;
        for user in &state.users {
            let rk = |part: &str| k(&format!("t{tg}:r{}:{part}", user.id));
            let row = t.push(Some(tbody), rk("tr"), "tr", &[], "");
            let cells = [
                user.id.to_string(),
                user.record.name.clone(),
                user.record.email.clone(),
                user.record.age_label(),
            ];
            for (j, cell) in cells.into_iter().enumerate() {
                t.push(Some(row), rk(&format!("c{j}")), "td", &[], cell);
            }
            let actions = t.push(Some(row), rk("c4"), "td", &[], "");
            let edit = t.push(Some(actions), rk("edit"), "button", &["edit_btn"], "Edit");
            t.control(edit, Control::Edit(user.id));
            let delete = t.push(Some(actions), rk("delete"), "button", &["delete_btn"], "Delete");
            t.control(delete, Control::Delete(user.id));
        }
        for i in 0..state.malformed_rows {
            let row = t.push(Some(tbody), k(&format!("t{tg}:bad{i}:tr")), "tr", &[], "");
            t.push(Some(row), k(&format!("t{tg}:bad{i}:c0")), "td", &[], "?");
            t.push(Some(row), k(&format!("t{tg}:bad{i}:c1")), "td", &[], "loading...");
        }
        t
    }

    fn index_of(&self, element: &ElementHandle) -> EsperarResult<usize> {
        self.nodes
            .iter()
            .position(|n| n.key == element.id().as_str())
            .ok_or_else(|| element.stale())
    }

    fn handle(&self, index: usize) -> Option<ElementHandle> {
        self.nodes
            .get(index)
            .map(|n| ElementHandle::new(n.key.clone(), n.tag))
    }

    fn is_descendant(&self, mut index: usize, ancestor: usize) -> bool {
        while let Some(parent) = self.nodes.get(index).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            index = parent;
        }
        false
    }

    fn text(&self, index: usize) -> String {
        let mut parts = Vec::new();
        self.collect_text(index, &mut parts);
        parts.join(" ")
    }

    fn collect_text(&self, index: usize, parts: &mut Vec<String>) {
        if let Some(node) = self.nodes.get(index) {
            if !node.text.is_empty() {
                parts.push(node.text.clone());
            }
        }
        for (child, node) in self.nodes.iter().enumerate() {
            if node.parent == Some(index) {
                self.collect_text(child, parts);
            }
        }
    }

    fn query(&self, selector: &[Compound], scope: Option<usize>) -> Vec<ElementHandle> {
        (0..self.nodes.len())
            .filter(|&i| scope.map_or(true, |s| self.is_descendant(i, s)))
            .filter(|&i| self.matches(i, selector))
            .filter_map(|i| self.handle(i))
            .collect()
    }

    fn matches(&self, index: usize, selector: &[Compound]) -> bool {
        let Some((last, ancestors)) = selector.split_last() else {
            return false;
        };
        if !self.nodes.get(index).is_some_and(|n| last.matches(n)) {
            return false;
        }
        let mut remaining = ancestors.iter().rev().peekable();
        let mut cursor = self.nodes.get(index).and_then(|n| n.parent);
        while let Some(compound) = remaining.peek() {
            let Some(i) = cursor else {
                return false;
            };
            let node = &self.nodes[i];
            if compound.matches(node) {
                remaining.next();
            }
            cursor = node.parent;
        }
        true
    }
}

// =============================================================================
// CSS SUBSET
// =============================================================================

/// One compound selector: `tag.class#id[attr='v']`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    id: Option<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        self.tag.as_deref().map_or(true, |t| t == "*" || t == node.tag)
            && self.classes.iter().all(|c| node.classes.contains(&c.as_str()))
            && self.id.as_deref().map_or(true, |id| {
                node.attrs.iter().any(|(k, v)| *k == "id" && v == id)
            })
            && self.attrs.iter().all(|(name, expected)| {
                node.attrs
                    .iter()
                    .find(|(k, _)| *k == name.as_str())
                    .is_some_and(|(_, v)| expected.as_ref().map_or(true, |e| e == v))
            })
    }
}

fn unsupported(selector: &str) -> EsperarError {
    EsperarError::UnsupportedSelector {
        selector: selector.to_string(),
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Parse the descendant-combinator CSS subset the page uses.
fn parse_css(selector: &str) -> EsperarResult<Vec<Compound>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in selector.trim().chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c.is_whitespace() && depth == 0 {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    if parts.is_empty() {
        return Err(unsupported(selector));
    }
    parts
        .iter()
        .map(|p| parse_compound(p).ok_or_else(|| unsupported(selector)))
        .collect()
}

fn parse_compound(text: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut chars = text.chars().peekable();

    let tag: String = std::iter::from_fn(|| chars.next_if(|c| is_ident(*c) || *c == '*')).collect();
    if !tag.is_empty() {
        compound.tag = Some(tag.to_ascii_lowercase());
    }

    while let Some(c) = chars.next() {
        match c {
            '.' | '#' => {
                let ident: String = std::iter::from_fn(|| chars.next_if(|c| is_ident(*c))).collect();
                if ident.is_empty() {
                    return None;
                }
                if c == '.' {
                    compound.classes.push(ident);
                } else {
                    compound.id = Some(ident);
                }
            }
            '[' => {
                let body: String = std::iter::from_fn(|| chars.next_if(|c| *c != ']')).collect();
                chars.next()?;
                let (name, value) = match body.split_once('=') {
                    Some((n, v)) => {
                        let v = v.trim();
                        let unquoted = v
                            .strip_prefix('\'')
                            .and_then(|s| s.strip_suffix('\''))
                            .or_else(|| v.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
                            .unwrap_or(v);
                        (n.trim().to_string(), Some(unquoted.to_string()))
                    }
                    None => (body.trim().to_string(), None),
                };
                if name.is_empty() || !name.chars().all(is_ident) {
                    return None;
                }
                compound.attrs.push((name, value));
            }
            _ => return None,
        }
    }
    Some(compound)
}

fn compile(locator: &Locator) -> EsperarResult<Vec<Compound>> {
    match locator.selector() {
        Selector::XPath(x) => Err(unsupported(x)),
        other => {
            let css = other.to_css().ok_or_else(|| unsupported(other.value()))?;
            parse_css(&css)
        }
    }
}

// =============================================================================
// MOCK DOCUMENT
// =============================================================================

/// In-memory application under test.
#[derive(Debug)]
pub struct MockDocument {
    state: Mutex<AppState>,
    dialogs: DialogLog,
    render_delay: u64,
    ready_after: u32,
    clickable_after: u32,
    hang_queries: bool,
}

impl Default for MockDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocument {
    /// Empty application, effects land immediately
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState {
                url: "about:blank".to_string(),
                ..AppState::default()
            }),
            dialogs: DialogLog::new(),
            render_delay: 0,
            ready_after: 0,
            clickable_after: 0,
            hang_queries: false,
        }
    }

    /// Seed the server with users
    #[must_use]
    pub fn with_users(mut self, users: Vec<UserRecord>) -> Self {
        if let Ok(state) = self.state.get_mut() {
            for record in users {
                state.insert(record);
            }
        }
        self
    }

    /// Server round-trips land after this many document queries
    #[must_use]
    pub const fn with_render_delay(mut self, queries: u64) -> Self {
        self.render_delay = queries;
        self
    }

    /// `readyState` reports `loading` for this many calls after each load
    #[must_use]
    pub const fn with_ready_after(mut self, calls: u32) -> Self {
        self.ready_after = calls;
        self
    }

    /// Every element reports non-interactable for the first `checks` calls
    #[must_use]
    pub const fn with_clickable_after(mut self, checks: u32) -> Self {
        self.clickable_after = checks;
        self
    }

    /// Element lookups never resolve
    #[must_use]
    pub const fn with_hanging_queries(mut self) -> Self {
        self.hang_queries = true;
        self
    }

    fn state(&self) -> EsperarResult<MutexGuard<'_, AppState>> {
        self.state
            .lock()
            .map_err(|_| EsperarError::driver("mock document state poisoned"))
    }

    /// Lock state for a page command: session alive, no dialog open.
    fn page(&self, call: &str) -> EsperarResult<MutexGuard<'_, AppState>> {
        let mut state = self.session(call)?;
        if let Some(dialog) = &state.dialog {
            return Err(EsperarError::DialogOpen {
                message: dialog.message().to_string(),
            });
        }
        state.history.push(call.to_string());
        Ok(state)
    }

    /// Lock state for any command: session alive.
    fn session(&self, call: &str) -> EsperarResult<MutexGuard<'_, AppState>> {
        let state = self.state()?;
        if state.closed {
            return Err(EsperarError::session_unavailable(format!(
                "{call}: session closed"
            )));
        }
        if state.session_lost {
            return Err(EsperarError::session_unavailable(format!(
                "{call}: browser crashed"
            )));
        }
        Ok(state)
    }

    /// Simulate a browser crash
    pub fn lose_session(&self) {
        if let Ok(mut state) = self.state() {
            state.session_lost = true;
        }
    }

    /// Another client inserts a user; lands after the render delay
    pub fn schedule_insert(&self, record: UserRecord) {
        if let Ok(mut state) = self.state() {
            state.schedule(self.render_delay, Effect::ExternalInsert(record));
        }
    }

    /// The next save fails server-side with this message
    pub fn fail_next_save(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state() {
            state.server_error = Some(message.into());
        }
    }

    /// Render a half-drawn row with too few cells
    pub fn add_malformed_row(&self) {
        if let Ok(mut state) = self.state() {
            state.malformed_rows += 1;
            state.table_gen += 1;
        }
    }

    /// Open a dialog as if page script had called `alert`
    pub fn open_dialog(&self, dialog: Dialog) {
        if let Ok(mut state) = self.state() {
            state.dialog = Some(dialog);
        }
    }

    /// Users currently stored server-side
    #[must_use]
    pub fn users(&self) -> Vec<UserRecord> {
        self.state()
            .map(|s| s.users.iter().map(|u| u.record.clone()).collect())
            .unwrap_or_default()
    }

    /// Dialogs accepted so far
    #[must_use]
    pub fn dialog_log(&self) -> DialogLog {
        self.dialogs.clone()
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().map(|s| s.closed).unwrap_or(false)
    }

    /// Element lookups served so far
    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.state().map(|s| s.queries).unwrap_or(0)
    }

    /// `is_interactable` calls served so far
    #[must_use]
    pub fn interactable_checks(&self) -> u32 {
        self.state().map(|s| s.interactable_checks).unwrap_or(0)
    }

    /// Call history for verification
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().map(|s| s.history.clone()).unwrap_or_default()
    }

    /// Check if a driver method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .map(|s| s.history.iter().any(|c| c.starts_with(method)))
            .unwrap_or(false)
    }

    fn node<R>(
        &self,
        call: &str,
        element: &ElementHandle,
        f: impl FnOnce(&mut AppState, &Tree, usize) -> EsperarResult<R>,
    ) -> EsperarResult<R> {
        let mut state = self.page(call)?;
        let tree = Tree::render(&state);
        let index = tree.index_of(element)?;
        f(&mut state, &tree, index)
    }
}

#[async_trait]
impl DocumentDriver for MockDocument {
    async fn navigate(&self, url: &str) -> EsperarResult<()> {
        let mut state = self.page(&format!("navigate:{url}"))?;
        state.url = url.to_string();
        state.reload();
        Ok(())
    }

    async fn refresh(&self) -> EsperarResult<()> {
        self.page("refresh")?.reload();
        Ok(())
    }

    async fn current_url(&self) -> EsperarResult<String> {
        Ok(self.page("current_url")?.url.clone())
    }

    async fn title(&self) -> EsperarResult<String> {
        let _state = self.page("title")?;
        Ok(APP_TITLE.to_string())
    }

    async fn ready_state(&self) -> EsperarResult<ReadyState> {
        let mut state = self.page("ready_state")?;
        state.ready_calls = state.ready_calls.saturating_add(1);
        Ok(if state.ready_calls > self.ready_after {
            ReadyState::Complete
        } else {
            ReadyState::Loading
        })
    }

    async fn evaluate(&self, script: &str) -> EsperarResult<serde_json::Value> {
        let script = script.trim().trim_start_matches("return ").trim_end_matches(';');
        match script {
            "document.readyState" => Ok(serde_json::Value::String(
                self.ready_state().await?.to_string(),
            )),
            "document.title" => Ok(serde_json::Value::String(self.title().await?)),
            other => Err(EsperarError::driver(format!(
                "mock document cannot evaluate '{other}'"
            ))),
        }
    }

    async fn find_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>> {
        let selector = compile(locator)?;
        {
            let mut state = self.page(&format!("find_all:{locator}"))?;
            if !self.hang_queries {
                state.tick();
                return Ok(Tree::render(&state).query(&selector, None));
            }
        }
        futures::future::pending().await
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> EsperarResult<Vec<ElementHandle>> {
        let selector = compile(locator)?;
        {
            let mut state = self.page(&format!("find_within:{locator}"))?;
            if !self.hang_queries {
                state.tick();
                let tree = Tree::render(&state);
                let scope = tree.index_of(parent)?;
                return Ok(tree.query(&selector, Some(scope)));
            }
        }
        futures::future::pending().await
    }

    async fn text(&self, element: &ElementHandle) -> EsperarResult<String> {
        self.node("text", element, |_, tree, i| {
            Ok(match tree.nodes[i].control {
                Control::Input(_) => String::new(),
                _ => tree.text(i),
            })
        })
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> EsperarResult<Option<String>> {
        self.node("attribute", element, |_, tree, i| {
            let node = &tree.nodes[i];
            if name == "class" {
                return Ok(Some(node.classes.join(" ")));
            }
            Ok(node
                .attrs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone()))
        })
    }

    async fn is_displayed(&self, element: &ElementHandle) -> EsperarResult<bool> {
        self.node("is_displayed", element, |_, _, _| Ok(true))
    }

    async fn is_interactable(&self, element: &ElementHandle) -> EsperarResult<bool> {
        let gate = self.clickable_after;
        self.node("is_interactable", element, |state, _, _| {
            state.interactable_checks = state.interactable_checks.saturating_add(1);
            Ok(state.interactable_checks > gate)
        })
    }

    async fn click(&self, element: &ElementHandle) -> EsperarResult<()> {
        let delay = self.render_delay;
        self.node("click", element, |state, tree, i| {
            match tree.nodes[i].control {
                Control::Submit => state.submit(delay),
                Control::Edit(id) => state.start_edit(id),
                Control::Delete(id) => state.schedule(delay, Effect::Delete(id)),
                Control::Input(_) | Control::None => {}
            }
            Ok(())
        })
    }

    async fn clear(&self, element: &ElementHandle) -> EsperarResult<()> {
        self.node("clear", element, |state, tree, i| match tree.nodes[i].control {
            Control::Input(field) => {
                state.form.field_mut(field).clear();
                Ok(())
            }
            _ => Err(EsperarError::driver("invalid element state: not an input")),
        })
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> EsperarResult<()> {
        self.node("send_keys", element, |state, tree, i| match tree.nodes[i].control {
            Control::Input(Field::Age) => {
                state
                    .form
                    .age
                    .extend(text.chars().filter(char::is_ascii_digit));
                Ok(())
            }
            Control::Input(field) => {
                state.form.field_mut(field).push_str(text);
                Ok(())
            }
            _ => Err(EsperarError::driver("element not interactable")),
        })
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> EsperarResult<()> {
        self.node("scroll_into_view", element, |_, _, _| Ok(()))
    }

    async fn pending_dialog(&self) -> EsperarResult<Option<Dialog>> {
        let mut state = self.session("pending_dialog")?;
        state.tick();
        Ok(state.dialog.clone())
    }

    async fn accept_dialog(&self) -> EsperarResult<()> {
        let mut state = self.session("accept_dialog")?;
        let dialog = state
            .dialog
            .take()
            .ok_or_else(|| EsperarError::driver("no such alert"))?;
        state.history.push(format!("accept_dialog:{}", dialog.message()));
        self.dialogs.record(dialog);
        Ok(())
    }

    async fn screenshot(&self) -> EsperarResult<Vec<u8>> {
        let _state = self.page("screenshot")?;
        Ok(PNG_SIGNATURE.to_vec())
    }

    async fn close(&self) -> EsperarResult<()> {
        let mut state = self.state()?;
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}
