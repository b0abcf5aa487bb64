//! [`PortalSession`] over a CDP-driven page.
//!
//! Elements found by `find_all` are parked in a page-side registry
//! (`window.__syllabi`) stamped with a token derived from the current page
//! generation. The Rust side hands out indices into that registry. A missing
//! registry or a token mismatch means the page was replaced, and a detached
//! node means the element was re-rendered; both surface as
//! [`Error::StaleReference`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use syllabus_core::portal::{ElementHandle, Locator, OptionChoice, PortalSession, SelectOption};
use syllabus_core::{Error, Result};
use tracing::{debug, warn};

use crate::cdp::CdpClient;
use crate::launcher::BrowserProcess;

const FIND_PRELUDE: &str = r#"
  function __find(root, kind, arg) {
    switch (kind) {
      case 'css': return Array.from(root.querySelectorAll(arg));
      case 'xpath': {
        var snap = document.evaluate(arg, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        var out = [];
        for (var i = 0; i < snap.snapshotLength; i++) {
          var n = snap.snapshotItem(i);
          if (n.nodeType === 1) out.push(n);
        }
        return out;
      }
      case 'id': return Array.from(root.querySelectorAll('#' + CSS.escape(arg)));
      case 'name': return Array.from(root.querySelectorAll('[name="' + CSS.escape(arg) + '"]'));
      case 'tag': return Array.from(root.getElementsByTagName(arg));
      case 'link': return Array.from(root.querySelectorAll('a')).filter(function (a) {
        return (a.innerText || a.textContent || '').indexOf(arg) !== -1;
      });
    }
    return [];
  }
"#;

pub struct CdpPortal {
    browser: BrowserProcess,
    generation: u64,
    nonce: u64,
    registry_installed: bool,
    page_load_timeout: Duration,
}

impl CdpPortal {
    pub fn new(browser: BrowserProcess, page_load_timeout: Duration) -> Self {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            browser,
            generation: 0,
            nonce,
            registry_installed: false,
            page_load_timeout,
        }
    }

    pub async fn shutdown(self) {
        self.browser.shutdown().await;
    }

    fn cdp(&self) -> &CdpClient {
        &self.browser.cdp
    }

    fn token(&self) -> String {
        format!("{:x}-{}", self.nonce, self.generation)
    }

    fn advance(&mut self) {
        self.generation += 1;
        self.registry_installed = false;
    }

    /// Make sure the page-side registry exists for the current generation.
    async fn ensure_registry(&mut self) -> Result<()> {
        let token = js_str(&self.token());
        let probe = format!(
            "!!(window.__syllabi && window.__syllabi.token === {})",
            token
        );
        let present = self.cdp().evaluate(&probe).await.map_err(cdp_err)?;
        if present.as_bool() == Some(true) {
            return Ok(());
        }
        if self.registry_installed {
            warn!(
                generation = self.generation,
                "Page was replaced outside the session, invalidating handles"
            );
            self.advance();
        }
        let install = format!(
            "(function () {{ window.__syllabi = {{ token: {}, els: [] }}; return true; }})()",
            js_str(&self.token())
        );
        self.cdp().evaluate(&install).await.map_err(cdp_err)?;
        self.registry_installed = true;
        Ok(())
    }

    /// Turn a page-side `{stale: ...}` marker into an error.
    fn check_stale(&mut self, value: &Value, handle_generation: u64) -> Result<()> {
        match value.get("stale").and_then(|v| v.as_str()) {
            Some("page") => {
                self.advance();
                Err(Error::StaleReference {
                    handle: handle_generation,
                    current: self.generation,
                })
            }
            Some(_) => Err(Error::StaleReference {
                handle: handle_generation,
                current: self.generation,
            }),
            None => Ok(()),
        }
    }

    /// Run `body` with `el` bound to the handle's element.
    async fn with_element(&mut self, element: &ElementHandle, body: &str) -> Result<Value> {
        element.check(self.generation)?;
        let script = element_script(&self.token(), element.id(), body);
        let value = self.cdp().evaluate(&script).await.map_err(cdp_err)?;
        self.check_stale(&value, element.generation())?;
        Ok(value.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn focus(&mut self, element: &ElementHandle) -> Result<()> {
        self.with_element(
            element,
            "el.scrollIntoView({block: 'center'}); el.focus(); return { value: true };",
        )
        .await?;
        Ok(())
    }

    async fn wait_for_load(&self, mut loaded: tokio::sync::mpsc::Receiver<Value>) {
        if tokio::time::timeout(self.page_load_timeout, loaded.recv())
            .await
            .is_err()
        {
            debug!(
                timeout_ms = self.page_load_timeout.as_millis() as u64,
                "No load event before timeout"
            );
        }
    }

    async fn run_select_script(&mut self, select: &Locator, body: &str) -> Result<Value> {
        let script = select_script(select, body);
        let value = self.cdp().evaluate(&script).await.map_err(cdp_err)?;
        if value.get("missing").and_then(|v| v.as_bool()) == Some(true) {
            return Err(Error::NotFound(format!("select control {}", select)));
        }
        Ok(value)
    }
}

#[async_trait]
impl PortalSession for CdpPortal {
    fn generation(&self) -> u64 {
        self.generation
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let loaded = self.cdp().subscribe_event("Page.loadEventFired").await;
        self.cdp().navigate(url).await.map_err(cdp_err)?;
        self.advance();
        self.wait_for_load(loaded).await;
        debug!(url = url, generation = self.generation, "Navigated");
        Ok(())
    }

    async fn back(&mut self) -> Result<()> {
        let (current, entries) = self.cdp().navigation_history().await.map_err(cdp_err)?;
        let previous = current
            .checked_sub(1)
            .and_then(|i| entries.get(i).copied())
            .ok_or_else(|| Error::Browser("no previous history entry".into()))?;
        let loaded = self.cdp().subscribe_event("Page.loadEventFired").await;
        self.cdp()
            .navigate_to_history_entry(previous)
            .await
            .map_err(cdp_err)?;
        self.advance();
        self.wait_for_load(loaded).await;
        Ok(())
    }

    async fn current_location(&mut self) -> Result<String> {
        let value = self
            .cdp()
            .evaluate("window.location.href")
            .await
            .map_err(cdp_err)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Browser("location.href is not a string".into()))
    }

    async fn find_all(
        &mut self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        if let Some(scope) = scope {
            scope.check(self.generation)?;
        }
        self.ensure_registry().await?;

        let script = find_script(&self.token(), scope.map(|s| s.id()), locator);
        let value = self.cdp().evaluate(&script).await.map_err(cdp_err)?;
        let handle_generation = scope.map(|s| s.generation()).unwrap_or(self.generation);
        self.check_stale(&value, handle_generation)?;

        let generation = self.generation;
        Ok(value
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_u64())
                    .map(|id| ElementHandle::new(id, generation))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String> {
        let value = self
            .with_element(
                element,
                "return { value: (el.innerText !== undefined ? el.innerText : el.textContent) || '' };",
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        // Prefer the DOM property so `href` comes back absolute.
        let body = format!(
            "var n = {}; var v = (n in el && typeof el[n] === 'string') ? el[n] : el.getAttribute(n); return {{ value: v }};",
            js_str(name)
        );
        let value = self.with_element(element, &body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.focus(element).await?;
        self.cdp().insert_text(text).await.map_err(cdp_err)?;
        self.with_element(
            element,
            "el.dispatchEvent(new Event('input', {bubbles: true})); return { value: true };",
        )
        .await?;
        Ok(())
    }

    async fn press_enter(&mut self, element: &ElementHandle) -> Result<()> {
        self.focus(element).await?;
        self.cdp().press_enter().await.map_err(cdp_err)?;
        self.advance();
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.with_element(
            element,
            "el.scrollIntoView({block: 'center'}); el.click(); return { value: true };",
        )
        .await?;
        self.advance();
        Ok(())
    }

    async fn list_options(&mut self, select: &Locator) -> Result<Vec<SelectOption>> {
        let value = self
            .run_select_script(
                select,
                "return { options: Array.from(sel.options).map(function (o, i) { return { index: i, label: (o.text || '').trim() }; }) };",
            )
            .await?;
        Ok(value
            .get("options")
            .and_then(|v| v.as_array())
            .map(|opts| {
                opts.iter()
                    .filter_map(|o| {
                        Some(SelectOption {
                            index: o.get("index")?.as_u64()? as usize,
                            label: o.get("label")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn select_option(&mut self, select: &Locator, choice: &OptionChoice) -> Result<()> {
        let pick = match choice {
            OptionChoice::Index(i) => format!("var i = {};", i),
            OptionChoice::Label(label) => format!(
                "var want = {}.trim(); var i = Array.from(sel.options).findIndex(function (o) {{ return (o.text || '').trim() === want; }});",
                js_str(label)
            ),
        };
        let body = format!(
            "{} if (i < 0 || i >= sel.options.length) return {{ noOption: true }}; sel.selectedIndex = i; sel.dispatchEvent(new Event('input', {{bubbles: true}})); sel.dispatchEvent(new Event('change', {{bubbles: true}})); return {{ ok: true }};",
            pick
        );
        let value = self.run_select_script(select, &body).await?;
        if value.get("noOption").and_then(|v| v.as_bool()) == Some(true) {
            return Err(Error::NotFound(format!("option {} in {}", choice, select)));
        }
        self.advance();
        Ok(())
    }
}

fn cdp_err(e: String) -> Error {
    Error::Browser(format!("CDP: {}", e))
}

/// Encode a string as a JS string literal.
fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn locator_parts(locator: &Locator) -> (&'static str, &str) {
    match locator {
        Locator::Css(s) => ("css", s),
        Locator::XPath(s) => ("xpath", s),
        Locator::Id(s) => ("id", s),
        Locator::Name(s) => ("name", s),
        Locator::Tag(s) => ("tag", s),
        Locator::PartialLinkText(s) => ("link", s),
    }
}

fn find_script(token: &str, scope: Option<u64>, locator: &Locator) -> String {
    let (kind, arg) = locator_parts(locator);
    let scope = scope.map(|s| s.to_string()).unwrap_or_else(|| "null".into());
    format!(
        r#"(function () {{
{prelude}
  var r = window.__syllabi;
  if (!r || r.token !== {token}) return {{ stale: 'page' }};
  var root = document;
  var scope = {scope};
  if (scope !== null) {{
    root = r.els[scope];
    if (!root || !root.isConnected) return {{ stale: 'node' }};
  }}
  var found = __find(root, {kind}, {arg});
  var ids = [];
  for (var i = 0; i < found.length; i++) {{ ids.push(r.els.length); r.els.push(found[i]); }}
  return {{ ids: ids }};
}})()"#,
        prelude = FIND_PRELUDE,
        token = js_str(token),
        scope = scope,
        kind = js_str(kind),
        arg = js_str(arg),
    )
}

fn element_script(token: &str, id: u64, body: &str) -> String {
    format!(
        r#"(function () {{
  var r = window.__syllabi;
  if (!r || r.token !== {token}) return {{ stale: 'page' }};
  var el = r.els[{id}];
  if (!el || !el.isConnected) return {{ stale: 'node' }};
  {body}
}})()"#,
        token = js_str(token),
        id = id,
        body = body,
    )
}

fn select_script(select: &Locator, body: &str) -> String {
    let (kind, arg) = locator_parts(select);
    format!(
        r#"(function () {{
{prelude}
  var sel = __find(document, {kind}, {arg})[0];
  if (!sel || !sel.options) return {{ missing: true }};
  {body}
}})()"#,
        prelude = FIND_PRELUDE,
        kind = js_str(kind),
        arg = js_str(arg),
        body = body,
    )
}
