//! In-memory portal and fetcher used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use syllabus_core::config::{Config, Credentials, TimingConfig};
use syllabus_core::portal::{
    ElementHandle, Locator, OptionChoice, PortalSession, SelectOption, PASSWORD_FIELD,
    USERNAME_FIELD,
};
use syllabus_core::{Error, Result};
use syllabus_harvest::FileFetcher;

pub const LOGIN_URL: &str = "https://portal.example.edu/syllabus/portal";
pub const LANDING_URL: &str = "https://portal.example.edu/syllabus/home";
pub const TOOL_URL: &str = "https://portal.example.edu/syllabus/tools/CourseCompletion";
pub const ERROR_URL: &str = "https://portal.example.edu/syllabus/error";
pub const PLACEHOLDER: &str = "-- Select Semester --";

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.portal.login_url = LOGIN_URL.to_string();
    config.portal.tool_url = TOOL_URL.to_string();
    config.credentials = Credentials {
        username: "chair".to_string(),
        password: "s3cret".to_string(),
    };
    config.timing = TimingConfig::immediate();
    config
}

pub fn file_url(name: &str) -> String {
    format!("https://files.example.edu/files/{}", name)
}

#[derive(Debug, Clone)]
pub struct FakeRow {
    pub cells: Vec<String>,
    pub href: Option<String>,
}

impl FakeRow {
    pub fn course(name: &str, href: &str, uploaded: &str) -> Self {
        Self {
            cells: vec![
                format!("  {}  ", name),
                "Download".to_string(),
                "3".to_string(),
                "Dr. Smith".to_string(),
                format!(" {} ", uploaded),
            ],
            href: Some(href.to_string()),
        }
    }

    /// `<th>` header row: no `<td>` cells at all.
    pub fn header() -> Self {
        Self {
            cells: Vec::new(),
            href: None,
        }
    }

    pub fn without_link(name: &str, uploaded: &str) -> Self {
        Self {
            href: None,
            ..Self::course(name, "", uploaded)
        }
    }

    pub fn short(name: &str) -> Self {
        Self {
            cells: vec![name.to_string(), "Download".to_string(), "3".to_string()],
            href: Some(file_url("short.pdf")),
        }
    }

    fn name(&self) -> String {
        self.cells.first().map(|c| c.trim().to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct FakeCategory {
    pub name: String,
    pub rows: Vec<FakeRow>,
}

impl FakeCategory {
    /// A category table with a header row followed by `rows`.
    pub fn new(name: &str, rows: Vec<FakeRow>) -> Self {
        let mut all = vec![FakeRow::header()];
        all.extend(rows);
        Self {
            name: name.to_string(),
            rows: all,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeSemester {
    pub label: String,
    pub categories: Vec<FakeCategory>,
}

impl FakeSemester {
    pub fn new(label: &str, categories: Vec<FakeCategory>) -> Self {
        Self {
            label: label.to_string(),
            categories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Blank,
    Login,
    Landing,
    Tool,
    Elsewhere(String),
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Field(&'static str),
    EntryLink,
    Select,
    Heading(usize),
    Table(usize),
    Row(usize, usize),
    Cell(usize, usize, usize),
    Link(usize, usize),
}

pub struct FakePortal {
    username: String,
    password: String,
    select_id: String,
    entry_text: String,
    pub semesters: Vec<FakeSemester>,
    pub page: Page,
    pub logged_in: bool,
    return_to: Option<Page>,
    /// Option index; 0 is the placeholder.
    selected: usize,
    generation: u64,
    nodes: HashMap<u64, Node>,
    next_id: u64,
    history: Vec<Page>,
    typed: HashMap<&'static str, String>,

    pub entry_link_present: bool,
    pub tool_has_select: bool,
    /// Courses whose download link goes stale the first time it is looked up.
    pub stale_links: HashSet<String>,
    /// Courses whose href read coincides with the page redirecting elsewhere.
    pub redirect_on_href: HashSet<String>,
    /// Rows whose cell lookup fails once, without the page changing.
    pub unreadable_rows: HashSet<String>,
    /// Courses whose href read is answered, then the session times out.
    pub expire_after_href: HashSet<String>,

    pub logins: usize,
    pub selections: Vec<String>,
    pub backs: usize,
}

impl FakePortal {
    pub fn new(config: &Config, semesters: Vec<FakeSemester>) -> Self {
        Self {
            username: config.credentials.username.clone(),
            password: config.credentials.password.clone(),
            select_id: config.portal.semester_select_id.clone(),
            entry_text: "Download Course Syllabi (PDF)".to_string(),
            semesters,
            page: Page::Blank,
            logged_in: false,
            return_to: None,
            selected: 0,
            generation: 1,
            nodes: HashMap::new(),
            next_id: 1,
            history: Vec::new(),
            typed: HashMap::new(),
            entry_link_present: true,
            tool_has_select: true,
            stale_links: HashSet::new(),
            redirect_on_href: HashSet::new(),
            unreadable_rows: HashSet::new(),
            expire_after_href: HashSet::new(),
            logins: 0,
            selections: Vec::new(),
            backs: 0,
        }
    }

    /// Logged in and parked on the tool page, as after the entry step.
    pub fn on_tool_page(mut self) -> Self {
        self.logged_in = true;
        self.page = Page::Tool;
        self
    }

    /// Drop the server-side session and bounce to the login form.
    pub fn expire_session(&mut self) {
        self.logged_in = false;
        self.return_to = Some(self.page.clone());
        self.page = Page::Login;
        self.bump();
    }

    fn bump(&mut self) {
        self.generation += 1;
        self.nodes.clear();
    }

    fn go(&mut self, page: Page) {
        let previous = std::mem::replace(&mut self.page, page);
        self.history.push(previous);
        self.bump();
    }

    fn handle(&mut self, node: Node) -> ElementHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        ElementHandle::new(id, self.generation)
    }

    fn resolve(&self, element: &ElementHandle) -> Result<Node> {
        element.check(self.generation)?;
        self.nodes
            .get(&element.id())
            .copied()
            .ok_or_else(|| Error::NotFound(format!("element {}", element.id())))
    }

    fn shown(&self) -> &[FakeCategory] {
        if self.page != Page::Tool || self.selected == 0 {
            return &[];
        }
        self.semesters
            .get(self.selected - 1)
            .map(|s| s.categories.as_slice())
            .unwrap_or(&[])
    }

    fn row(&self, category: usize, row: usize) -> Option<&FakeRow> {
        self.shown().get(category).and_then(|c| c.rows.get(row))
    }

    fn labels(&self) -> Vec<String> {
        std::iter::once(PLACEHOLDER.to_string())
            .chain(self.semesters.iter().map(|s| s.label.clone()))
            .collect()
    }

    fn select_matches(&self, locator: &Locator) -> bool {
        self.page == Page::Tool
            && self.tool_has_select
            && *locator == Locator::id(&self.select_id)
    }
}

#[async_trait]
impl PortalSession for FakePortal {
    fn generation(&self) -> u64 {
        self.generation
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let page = if url == TOOL_URL {
            if self.logged_in {
                Page::Tool
            } else {
                self.return_to = Some(Page::Tool);
                Page::Login
            }
        } else if url == LOGIN_URL {
            if self.logged_in {
                Page::Landing
            } else {
                self.return_to = None;
                Page::Login
            }
        } else {
            Page::Elsewhere(url.to_string())
        };
        self.go(page);
        Ok(())
    }

    async fn back(&mut self) -> Result<()> {
        self.backs += 1;
        if let Some(previous) = self.history.pop() {
            self.page = previous;
        }
        self.bump();
        Ok(())
    }

    async fn current_location(&mut self) -> Result<String> {
        Ok(match &self.page {
            Page::Blank => "about:blank".to_string(),
            Page::Login => LOGIN_URL.to_string(),
            Page::Landing => LANDING_URL.to_string(),
            Page::Tool => TOOL_URL.to_string(),
            Page::Elsewhere(url) => url.clone(),
        })
    }

    async fn find_all(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let scope = match scope {
            Some(h) => Some(self.resolve(h)?),
            None => None,
        };

        let nodes: Vec<Node> = match (scope, locator) {
            (None, Locator::Name(name)) if self.page == Page::Login => {
                if name == USERNAME_FIELD {
                    vec![Node::Field(USERNAME_FIELD)]
                } else if name == PASSWORD_FIELD {
                    vec![Node::Field(PASSWORD_FIELD)]
                } else {
                    Vec::new()
                }
            }
            (None, Locator::PartialLinkText(text)) => {
                if self.page == Page::Landing
                    && self.entry_link_present
                    && self.entry_text.contains(text.as_str())
                {
                    vec![Node::EntryLink]
                } else {
                    Vec::new()
                }
            }
            (None, loc) if self.select_matches(loc) => vec![Node::Select],
            (None, Locator::Css(css)) if css == "h3.table-title" => {
                (0..self.shown().len()).map(Node::Heading).collect()
            }
            (None, Locator::XPath(xp)) if xp == "//table/tbody/tr" => self
                .shown()
                .iter()
                .enumerate()
                .flat_map(|(c, cat)| (0..cat.rows.len()).map(move |r| Node::Row(c, r)))
                .collect(),
            (Some(Node::Heading(c)), Locator::XPath(xp))
                if xp == "following-sibling::table[1]" =>
            {
                vec![Node::Table(c)]
            }
            (Some(Node::Table(c)), Locator::Tag(tag)) if tag == "tr" => {
                let rows = self.shown().get(c).map(|cat| cat.rows.len()).unwrap_or(0);
                (0..rows).map(|r| Node::Row(c, r)).collect()
            }
            (Some(Node::Row(c, r)), Locator::Tag(tag)) if tag == "td" => {
                let Some(row) = self.row(c, r).cloned() else {
                    return Ok(Vec::new());
                };
                if self.unreadable_rows.remove(&row.name()) {
                    return Err(Error::Browser(format!("cells of {} not rendered", row.name())));
                }
                (0..row.cells.len()).map(|k| Node::Cell(c, r, k)).collect()
            }
            (Some(Node::Cell(c, r, 1)), Locator::Tag(tag)) if tag == "a" => {
                let Some(row) = self.row(c, r).cloned() else {
                    return Ok(Vec::new());
                };
                if row.href.is_none() {
                    Vec::new()
                } else if self.stale_links.remove(&row.name()) {
                    let handle = self.generation;
                    self.bump();
                    return Err(Error::StaleReference {
                        handle,
                        current: self.generation,
                    });
                } else {
                    vec![Node::Link(c, r)]
                }
            }
            _ => Vec::new(),
        };

        Ok(nodes.into_iter().map(|n| self.handle(n)).collect())
    }

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String> {
        Ok(match self.resolve(element)? {
            Node::Heading(c) => self
                .shown()
                .get(c)
                .map(|cat| format!("\n  {}\n", cat.name))
                .unwrap_or_default(),
            Node::Cell(c, r, k) => self
                .row(c, r)
                .and_then(|row| row.cells.get(k).cloned())
                .unwrap_or_default(),
            Node::EntryLink => self.entry_text.clone(),
            _ => String::new(),
        })
    }

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        let Node::Link(c, r) = self.resolve(element)? else {
            return Ok(None);
        };
        if name != "href" {
            return Ok(None);
        }
        let Some(row) = self.row(c, r).cloned() else {
            return Ok(None);
        };
        if self.redirect_on_href.remove(&row.name()) {
            self.go(Page::Elsewhere(ERROR_URL.to_string()));
            return Err(Error::Browser("page navigated while reading link".to_string()));
        }
        if self.expire_after_href.remove(&row.name()) {
            self.expire_session();
        }
        Ok(row.href)
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        match self.resolve(element)? {
            Node::Field(name) => {
                self.typed.insert(name, text.to_string());
                Ok(())
            }
            _ => Err(Error::Browser("element is not typeable".to_string())),
        }
    }

    async fn press_enter(&mut self, element: &ElementHandle) -> Result<()> {
        if let Node::Field(_) = self.resolve(element)? {
            let ok = self.typed.get(USERNAME_FIELD) == Some(&self.username)
                && self.typed.get(PASSWORD_FIELD) == Some(&self.password);
            self.typed.clear();
            if ok {
                self.logged_in = true;
                self.logins += 1;
                let next = self.return_to.take().unwrap_or(Page::Landing);
                self.go(next);
            } else {
                self.bump();
            }
        }
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        if let Node::EntryLink = self.resolve(element)? {
            self.go(Page::Tool);
        }
        Ok(())
    }

    async fn list_options(&mut self, select: &Locator) -> Result<Vec<SelectOption>> {
        if !self.select_matches(select) {
            return Err(Error::NotFound(format!("select {}", select)));
        }
        Ok(self
            .labels()
            .into_iter()
            .enumerate()
            .map(|(index, label)| SelectOption { index, label })
            .collect())
    }

    async fn select_option(&mut self, select: &Locator, choice: &OptionChoice) -> Result<()> {
        if !self.select_matches(select) {
            return Err(Error::NotFound(format!("select {}", select)));
        }
        let labels = self.labels();
        let index = match choice {
            OptionChoice::Index(i) if *i < labels.len() => *i,
            OptionChoice::Label(l) => labels
                .iter()
                .position(|x| x == l)
                .ok_or_else(|| Error::NotFound(format!("option {}", choice)))?,
            _ => return Err(Error::NotFound(format!("option {}", choice))),
        };
        self.selected = index;
        self.selections.push(labels[index].clone());
        self.bump();
        Ok(())
    }
}

/// Fetcher that fails a configured number of times per URL, then writes a
/// small body to the destination.
pub struct ScriptedFetcher {
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(self, url: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), times);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl FileFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        self.calls.lock().unwrap().push(url.to_string());
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(url) {
                if *left > 0 {
                    *left -= 1;
                    return Err(Error::Fetch(format!("HTTP 503 Service Unavailable for {}", url)));
                }
            }
        }
        let body = format!("%PDF-1.4 syllabus from {}", url);
        std::fs::write(dest, body.as_bytes())?;
        Ok(body.len() as u64)
    }
}
