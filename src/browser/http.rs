//! HTTP-backed browser driver for server-rendered applications.
//!
//! Sessions share one cookie store, so a login performed by the crawl
//! session authenticates the validation sessions too. Scripted widgets this
//! driver cannot execute surface as [`BrowserError::NotActionable`], which
//! checks record as failures rather than aborting anything.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::config::constants::NAVIGATION_TIMEOUT;
use crate::error_handling::BrowserError;

use super::dom::{self, FormMethod, InteractionPlan, SelectPlan};
use super::{BrowserDriver, BrowserSession, PageView};

/// Driver that navigates with a shared-cookie HTTP client.
pub struct HttpBrowser {
    client: reqwest::Client,
}

impl HttpBrowser {
    /// Builds a driver with a cookie-holding client.
    pub fn new(user_agent: &str) -> Result<Self, BrowserError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(NAVIGATION_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| BrowserError::Navigation(format!("client construction failed: {e}")))?;
        Ok(HttpBrowser { client })
    }
}

#[async_trait]
impl BrowserDriver for HttpBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        // Cloned clients share the connection pool and cookie store.
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            current: None,
            staged: HashMap::new(),
        }))
    }
}

struct HttpSession {
    client: reqwest::Client,
    current: Option<PageView>,
    staged: HashMap<String, String>,
}

impl HttpSession {
    fn current_url(&self) -> Result<Url, BrowserError> {
        let view = self.current.as_ref().ok_or(BrowserError::NoCurrentPage)?;
        Url::parse(&view.final_url)
            .map_err(|e| BrowserError::Navigation(format!("bad current url: {e}")))
    }

    fn map_reqwest(e: reqwest::Error) -> BrowserError {
        if e.is_timeout() {
            BrowserError::NavTimeout(NAVIGATION_TIMEOUT)
        } else {
            BrowserError::Navigation(e.to_string())
        }
    }

    async fn fetch(&mut self, requested: &str) -> Result<PageView, BrowserError> {
        let response = self
            .client
            .get(requested)
            .send()
            .await
            .map_err(Self::map_reqwest)?;
        let final_url = response.url().to_string();
        let html = response.text().await.map_err(Self::map_reqwest)?;
        let view = PageView {
            requested_url: requested.to_string(),
            final_url,
            html,
        };
        self.current = Some(view.clone());
        self.staged.clear();
        Ok(view)
    }

    async fn execute(&mut self, plan: InteractionPlan) -> Result<PageView, BrowserError> {
        match plan {
            InteractionPlan::FollowLink(url) => self.fetch(&url).await,
            InteractionPlan::SubmitForm {
                method: FormMethod::Get,
                action,
                fields,
            } => {
                let url = dom::get_form_url(&action, &fields)?;
                self.fetch(&url).await
            }
            InteractionPlan::SubmitForm {
                method: FormMethod::Post,
                action,
                fields,
            } => {
                let response = self
                    .client
                    .post(&action)
                    .form(&fields)
                    .send()
                    .await
                    .map_err(Self::map_reqwest)?;
                let final_url = response.url().to_string();
                let html = response.text().await.map_err(Self::map_reqwest)?;
                let view = PageView {
                    requested_url: action,
                    final_url,
                    html,
                };
                self.current = Some(view.clone());
                self.staged.clear();
                Ok(view)
            }
        }
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<PageView, BrowserError> {
        self.fetch(url).await
    }

    async fn click(&mut self, selector: &str) -> Result<PageView, BrowserError> {
        let view = self.current()?;
        let base = self.current_url()?;
        let plan = dom::plan_click(&view.html, &base, selector, &self.staged)?;
        self.execute(plan).await
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
                self.execute(plan).await
            }
            SelectPlan::Follow(url) => self.fetch(&url).await,
        }
    }

    async fn submit(&mut self, selector: &str) -> Result<PageView, BrowserError> {
        let view = self.current()?;
        let base = self.current_url()?;
        let plan = dom::plan_submit(&view.html, &base, selector, &self.staged)?;
        self.execute(plan).await
    }

    fn current(&self) -> Result<PageView, BrowserError> {
        self.current.clone().ok_or(BrowserError::NoCurrentPage)
    }

    async fn screenshot(&mut self) -> Result<Option<String>, BrowserError> {
        // The HTTP driver has no rendering surface.
        Ok(None)
    }
}
