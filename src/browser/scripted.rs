//! Deterministic in-memory browser driver for tests.
//!
//! A [`ScriptedApp`] is a small model of a server-rendered application:
//! pages keyed by normalized URL, redirects, form routes, and injectable
//! navigation failures. Sessions interpret clicks and submissions with the
//! same DOM logic as the HTTP driver, so engine behavior exercised against
//! a scripted app transfers to real targets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::error_handling::BrowserError;
use crate::identity::normalize_url;

use super::dom::{self, FormMethod, InteractionPlan, SelectPlan};
use super::{BrowserDriver, BrowserSession, PageView};

/// Scripted outcome of a form submission.
#[derive(Debug, Clone)]
pub struct FormRoute {
    /// Field values that must all be present for the submission to match.
    pub expect: Vec<(String, String)>,
    /// URL served when all expected fields match.
    pub on_match: String,
    /// URL served otherwise.
    pub on_mismatch: String,
}

/// In-memory model of a target application.
pub struct ScriptedApp {
    base: Url,
    pages: HashMap<String, (String, String)>, // normalized -> (raw url, html)
    redirects: HashMap<String, String>,
    forms: HashMap<String, FormRoute>,
    flaky: Mutex<HashMap<String, usize>>,
}

impl ScriptedApp {
    /// Creates an empty app rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        let base = Url::parse(base_url).expect("scripted app base url must be absolute");
        ScriptedApp {
            base,
            pages: HashMap::new(),
            redirects: HashMap::new(),
            forms: HashMap::new(),
            flaky: Mutex::new(HashMap::new()),
        }
    }

    fn absolute(&self, url_or_path: &str) -> String {
        self.base
            .join(url_or_path)
            .expect("scripted url must resolve")
            .to_string()
    }

    fn key(&self, url_or_path: &str) -> String {
        let absolute = self.absolute(url_or_path);
        normalize_url(&absolute).expect("scripted url must normalize")
    }

    /// Registers a page under a URL or path.
    pub fn page(mut self, url_or_path: &str, html: &str) -> Self {
        let raw = self.absolute(url_or_path);
        let key = self.key(url_or_path);
        self.pages.insert(key, (raw, html.to_string()));
        self
    }

    /// Registers a redirect.
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        let key = self.key(from);
        let to = self.absolute(to);
        self.redirects.insert(key, to);
        self
    }

    /// Registers a form route for submissions to `action`.
    pub fn form(mut self, action: &str, route: FormRoute) -> Self {
        let key = self.key(action);
        self.forms.insert(key, route);
        self
    }

    /// Makes the first `failures` navigations to a URL fail.
    pub fn fail_first(self, url_or_path: &str, failures: usize) -> Self {
        let key = self.key(url_or_path);
        self.flaky
            .lock()
            .expect("flaky lock poisoned")
            .insert(key, failures);
        self
    }

    fn fetch(&self, requested: &str) -> Result<PageView, BrowserError> {
        let requested_abs = self.absolute(requested);
        let mut key = normalize_url(&requested_abs)
            .ok_or_else(|| BrowserError::Navigation(format!("unparseable url {requested}")))?;

        {
            let mut flaky = self.flaky.lock().expect("flaky lock poisoned");
            if let Some(remaining) = flaky.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BrowserError::Navigation(format!(
                        "injected navigation failure for {requested_abs}"
                    )));
                }
            }
        }

        let mut hops = 0;
        while let Some(target) = self.redirects.get(&key) {
            hops += 1;
            if hops > 5 {
                return Err(BrowserError::Navigation(format!(
                    "redirect loop at {requested_abs}"
                )));
            }
            key = normalize_url(target)
                .ok_or_else(|| BrowserError::Navigation(format!("bad redirect target {target}")))?;
        }

        match self.pages.get(&key) {
            Some((raw, html)) => Ok(PageView {
                requested_url: requested_abs,
                final_url: raw.clone(),
                html: html.clone(),
            }),
            None => Err(BrowserError::Navigation(format!(
                "no scripted page for {requested_abs}"
            ))),
        }
    }

    fn submit(
        &self,
        method: FormMethod,
        action: &str,
        fields: &[(String, String)],
    ) -> Result<PageView, BrowserError> {
        let action_key = normalize_url(&self.absolute(action))
            .ok_or_else(|| BrowserError::Navigation(format!("bad form action {action}")))?;

        if let Some(route) = self.forms.get(&action_key) {
            let matched = route.expect.iter().all(|(name, value)| {
                fields
                    .iter()
                    .any(|(fname, fvalue)| fname == name && fvalue == value)
            });
            let target = if matched {
                &route.on_match
            } else {
                &route.on_mismatch
            };
            return self.fetch(target);
        }

        match method {
            FormMethod::Get => {
                let url = dom::get_form_url(&self.absolute(action), fields)?;
                self.fetch(&url)
            }
            FormMethod::Post => Err(BrowserError::Navigation(format!(
                "no scripted form route for POST {action}"
            ))),
        }
    }
}

/// Driver over a shared [`ScriptedApp`].
pub struct ScriptedBrowser {
    app: Arc<ScriptedApp>,
}

impl ScriptedBrowser {
    /// Wraps an app in a driver.
    pub fn new(app: ScriptedApp) -> Self {
        ScriptedBrowser { app: Arc::new(app) }
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Ok(Box::new(ScriptedSession {
            app: Arc::clone(&self.app),
            current: None,
            staged: HashMap::new(),
        }))
    }
}

struct ScriptedSession {
    app: Arc<ScriptedApp>,
    current: Option<PageView>,
    staged: HashMap<String, String>,
}

impl ScriptedSession {
    fn current_url(&self) -> Result<Url, BrowserError> {
        let view = self.current.as_ref().ok_or(BrowserError::NoCurrentPage)?;
        Url::parse(&view.final_url)
            .map_err(|e| BrowserError::Navigation(format!("bad current url: {e}")))
    }

    fn apply(&mut self, view: PageView) -> PageView {
        self.current = Some(view.clone());
        self.staged.clear();
        view
    }

    fn execute(&mut self, plan: InteractionPlan) -> Result<PageView, BrowserError> {
        let view = match plan {
            InteractionPlan::FollowLink(url) => self.app.fetch(&url)?,
            InteractionPlan::SubmitForm {
                method,
                action,
                fields,
            } => self.app.submit(method, &action, &fields)?,
        };
        Ok(self.apply(view))
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<PageView, BrowserError> {
        let view = self.app.fetch(url)?;
        Ok(self.apply(view))
    }

    async fn click(&mut self, selector: &str) -> Result<PageView, BrowserError> {
        let view = self.current()?;
        let base = self.current_url()?;
        let plan = dom::plan_click(&view.html, &base, selector, &self.staged)?;
        self.execute(plan)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let view = self.current()?;
        let key = dom::plan_fill(&view.html, selector)?;
        self.staged.insert(key, value.to_string());
        Ok(())
    }

    async fn select(
        &mut self,
        selector: &str,
        option_label: &str,
    ) -> Result<PageView, BrowserError> {
        let view = self.current()?;
        let base = self.current_url()?;
        match dom::plan_select(&view.html, &base, selector, option_label, &self.staged)? {
            SelectPlan::StageAndSubmit { key, value, plan } => {
                self.staged.insert(key, value);
                self.execute(plan)
            }
            SelectPlan::Follow(url) => {
                let view = self.app.fetch(&url)?;
                Ok(self.apply(view))
            }
        }
    }

    async fn submit(&mut self, selector: &str) -> Result<PageView, BrowserError> {
        let view = self.current()?;
        let base = self.current_url()?;
        let plan = dom::plan_submit(&view.html, &base, selector, &self.staged)?;
        self.execute(plan)
    }

    fn current(&self) -> Result<PageView, BrowserError> {
        self.current.clone().ok_or(BrowserError::NoCurrentPage)
    }

    async fn screenshot(&mut self) -> Result<Option<String>, BrowserError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_app() -> ScriptedApp {
        ScriptedApp::new("https://app.test/")
            .page(
                "/items",
                r#"<html><body>
                <table><tbody><tr><td><a href="/items/1">Alpha</a></td></tr></tbody></table>
                <nav class="pagination"><a rel="next" href="/items?page=2">Next</a></nav>
                </body></html>"#,
            )
            .page(
                "/items?page=2",
                r#"<html><body>
                <table><tbody><tr><td>Gamma</td></tr></tbody></table>
                </body></html>"#,
            )
            .page("/items/1", "<html><body><h1>Alpha</h1></body></html>")
    }

    #[tokio::test]
    async fn navigate_and_click_follow_scripted_pages() {
        let driver = ScriptedBrowser::new(two_page_app());
        let mut session = driver.open_session().await.expect("session");

        let view = session.navigate("https://app.test/items").await.expect("navigate");
        assert!(view.html.contains("Alpha"));

        let view = session.click("a[rel=next]").await.expect("click next");
        assert!(view.html.contains("Gamma"));
        assert_eq!(view.final_url, "https://app.test/items?page=2");
    }

    #[tokio::test]
    async fn redirects_collapse_to_target_page() {
        let app = two_page_app().redirect("/home", "/items");
        let driver = ScriptedBrowser::new(app);
        let mut session = driver.open_session().await.expect("session");

        let view = session.navigate("https://app.test/home").await.expect("navigate");
        assert_eq!(view.requested_url, "https://app.test/home");
        assert_eq!(view.final_url, "https://app.test/items");
    }

    #[tokio::test]
    async fn injected_failures_expire() {
        let app = two_page_app().fail_first("/items/1", 1);
        let driver = ScriptedBrowser::new(app);
        let mut session = driver.open_session().await.expect("session");

        let err = session.navigate("https://app.test/items/1").await;
        assert!(err.is_err());
        let view = session.navigate("https://app.test/items/1").await.expect("second try");
        assert!(view.html.contains("Alpha"));
    }

    #[tokio::test]
    async fn form_route_distinguishes_credentials() {
        let app = ScriptedApp::new("https://app.test/")
            .page(
                "/login",
                r#"<form action="/login" method="post">
                   <input type="text" name="username">
                   <input type="password" name="password">
                   <button type="submit">Sign in</button></form>"#,
            )
            .page("/dashboard", "<html><body>Welcome</body></html>")
            .page("/login-failed", "<html><body>Invalid credentials</body></html>")
            .form(
                "/login",
                FormRoute {
                    expect: vec![
                        ("username".to_string(), "qa".to_string()),
                        ("password".to_string(), "secret".to_string()),
                    ],
                    on_match: "/dashboard".to_string(),
                    on_mismatch: "/login-failed".to_string(),
                },
            );
        let driver = ScriptedBrowser::new(app);
        let mut session = driver.open_session().await.expect("session");

        session.navigate("https://app.test/login").await.expect("login page");
        session.fill("input[name=username]", "qa").await.expect("fill user");
        session.fill("input[name=password]", "secret").await.expect("fill pass");
        let view = session.click("button[type=submit]").await.expect("submit");
        assert_eq!(view.final_url, "https://app.test/dashboard");
    }
}
