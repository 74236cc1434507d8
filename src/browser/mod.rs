//! Browser-automation seam.
//!
//! The engine never talks to a concrete browser; it drives a
//! [`BrowserSession`] obtained from a [`BrowserDriver`]. Two drivers ship
//! with the crate: an HTTP-backed one for server-rendered applications
//! ([`HttpBrowser`]) and a deterministic in-memory one for tests
//! ([`ScriptedBrowser`]).
//!
//! A session is single-owner and sequential; concurrency comes from opening
//! multiple sessions, which the validator bounds with a semaphore.

pub(crate) mod dom;
mod http;
mod scripted;

use async_trait::async_trait;

use crate::error_handling::BrowserError;

pub use http::HttpBrowser;
pub use scripted::{FormRoute, ScriptedApp, ScriptedBrowser};

/// The page a session currently displays.
#[derive(Debug, Clone)]
pub struct PageView {
    /// URL that was requested.
    pub requested_url: String,
    /// URL actually reached, after any redirects.
    pub final_url: String,
    /// Captured DOM.
    pub html: String,
}

impl PageView {
    /// Whether the navigation was redirected.
    pub fn was_redirected(&self) -> bool {
        self.requested_url != self.final_url
    }
}

/// One sequential browser context (tab).
///
/// All selectors are CSS. Interactions that navigate return the resulting
/// page; `fill` only stages a value, which the next submit or click on the
/// same form picks up.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates to an absolute URL.
    async fn navigate(&mut self, url: &str) -> Result<PageView, BrowserError>;

    /// Clicks the first element matching the selector (follows links,
    /// submits form buttons).
    async fn click(&mut self, selector: &str) -> Result<PageView, BrowserError>;

    /// Stages a value into the input matching the selector.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Chooses an option by label in the select or menu matching the
    /// selector, submitting the enclosing form or following the menu link.
    async fn select(&mut self, selector: &str, option_label: &str)
        -> Result<PageView, BrowserError>;

    /// Submits the form enclosing the element matched by the selector,
    /// including any staged values.
    async fn submit(&mut self, selector: &str) -> Result<PageView, BrowserError>;

    /// The current page.
    fn current(&self) -> Result<PageView, BrowserError>;

    /// Captures a screenshot reference, when the driver supports it.
    async fn screenshot(&mut self) -> Result<Option<String>, BrowserError>;
}

/// Opens independent browser sessions sharing authentication state.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Opens a fresh session.
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
