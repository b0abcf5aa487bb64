//! The Portal Session capability: everything the harvester needs from a
//! browser, and nothing more.
//!
//! Element handles are scoped to a page generation. Any action that may
//! replace page content (navigation, back, selecting a semester, submitting a
//! form) advances the generation, and a handle from an earlier generation is
//! rejected with [`Error::StaleReference`] instead of silently pointing at a
//! node that no longer exists.

use async_trait::async_trait;
use std::fmt;

use crate::error::{Error, Result};

/// Login form field names used by the portal.
pub const USERNAME_FIELD: &str = "username";
pub const PASSWORD_FIELD: &str = "password";

/// How to find elements, either in the whole page or under a scope handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
    Tag(String),
    /// Anchor whose visible text contains the given string.
    PartialLinkText(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::XPath(s.into())
    }

    pub fn id(s: impl Into<String>) -> Self {
        Locator::Id(s.into())
    }

    pub fn name(s: impl Into<String>) -> Self {
        Locator::Name(s.into())
    }

    pub fn tag(s: impl Into<String>) -> Self {
        Locator::Tag(s.into())
    }

    pub fn partial_link_text(s: impl Into<String>) -> Self {
        Locator::PartialLinkText(s.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
            Locator::Id(s) => write!(f, "id={}", s),
            Locator::Name(s) => write!(f, "name={}", s),
            Locator::Tag(s) => write!(f, "tag={}", s),
            Locator::PartialLinkText(s) => write!(f, "link*={}", s),
        }
    }
}

/// Opaque reference to an element, valid only within its page generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: u64,
    generation: u64,
}

impl ElementHandle {
    pub fn new(id: u64, generation: u64) -> Self {
        Self { id, generation }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reject the handle if the session has moved to a newer page.
    pub fn check(&self, current: u64) -> Result<()> {
        if self.generation == current {
            Ok(())
        } else {
            Err(Error::StaleReference {
                handle: self.generation,
                current,
            })
        }
    }
}

/// One entry of a `<select>` control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub index: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChoice {
    Index(usize),
    Label(String),
}

impl fmt::Display for OptionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionChoice::Index(i) => write!(f, "#{}", i),
            OptionChoice::Label(l) => write!(f, "'{}'", l),
        }
    }
}

#[async_trait]
pub trait PortalSession: Send {
    /// Current page generation. Handles from other generations are stale.
    fn generation(&self) -> u64;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Go back one entry in the session history.
    async fn back(&mut self) -> Result<()>;

    async fn current_location(&mut self) -> Result<String>;

    /// Find elements under `scope` (or the whole document when `None`).
    async fn find_all(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>>;

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String>;

    async fn read_attribute(&mut self, element: &ElementHandle, name: &str)
        -> Result<Option<String>>;

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()>;

    /// Press Enter in the element. May submit a form and replace the page.
    async fn press_enter(&mut self, element: &ElementHandle) -> Result<()>;

    async fn click(&mut self, element: &ElementHandle) -> Result<()>;

    /// Options of the `<select>` found by `select`. Errors if it is absent.
    async fn list_options(&mut self, select: &Locator) -> Result<Vec<SelectOption>>;

    async fn select_option(&mut self, select: &Locator, choice: &OptionChoice) -> Result<()>;

    async fn find_first(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>> {
        Ok(self.find_all(scope, locator).await?.into_iter().next())
    }

    async fn exists(&mut self, locator: &Locator) -> Result<bool> {
        Ok(!self.find_all(None, locator).await?.is_empty())
    }

    /// Fill the login form and submit it with Enter on the password field.
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let user = self
            .find_first(None, &Locator::name(USERNAME_FIELD))
            .await?
            .ok_or_else(|| Error::NotFound(format!("login field '{}'", USERNAME_FIELD)))?;
        self.type_text(&user, username).await?;

        let pass = self
            .find_first(None, &Locator::name(PASSWORD_FIELD))
            .await?
            .ok_or_else(|| Error::NotFound(format!("login field '{}'", PASSWORD_FIELD)))?;
        self.type_text(&pass, password).await?;
        self.press_enter(&pass).await
    }
}
