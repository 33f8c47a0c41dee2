/// Page handle abstractions consumed by the extraction pipeline
///
/// The pipeline never talks to a renderer directly. It is handed page handles
/// through a [`PageFactory`] and drives them through the [`PageHandle`] and
/// [`ElementHandle`] traits. Adapters live in the submodules.

pub mod snapshot;

#[cfg(feature = "browser")]
pub mod chromium;

pub use snapshot::{SnapshotPage, SnapshotPageFactory};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumPage, ChromiumPageFactory};

use crate::error::PageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// A structural query understood by page handles (CSS selector syntax)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorSpec(String);

impl SelectorSpec {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SelectorSpec {
    fn from(selector: &str) -> Self {
        Self::new(selector)
    }
}

/// Identity of an element within one page, stable for the element's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// A live, queryable rendered page
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Load `url`, failing if the load does not finish within `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> PageResult<()>;

    /// URL the page ended up on after redirects
    async fn current_url(&self) -> PageResult<String>;

    /// All elements matching `selector`, in document order
    async fn query(&self, selector: &SelectorSpec) -> PageResult<Vec<Box<dyn ElementHandle>>>;

    async fn measure_content_height(&self) -> PageResult<u64>;

    async fn scroll_to_bottom(&self) -> PageResult<()>;

    async fn close(&self) -> PageResult<()>;
}

/// One element of a [`PageHandle`]
#[async_trait]
pub trait ElementHandle: Send + Sync {
    fn id(&self) -> ElementId;

    async fn text_content(&self) -> PageResult<String>;

    async fn is_visible(&self) -> PageResult<bool>;

    async fn scroll_into_view(&self) -> PageResult<()>;

    /// Deliver a genuine pointer click, not a framework-level call
    async fn dispatch_click(&self) -> PageResult<()>;

    /// Nearest strict ancestor matching `selector`
    async fn closest_ancestor(
        &self,
        selector: &SelectorSpec,
    ) -> PageResult<Option<Box<dyn ElementHandle>>>;

    /// Descendants of this element matching `selector`, in document order
    async fn query(&self, selector: &SelectorSpec) -> PageResult<Vec<Box<dyn ElementHandle>>>;
}

/// Hands out a fresh, isolated page handle per consensus run
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn new_page(&self) -> PageResult<Box<dyn PageHandle>>;
}

/// Owns a page for the duration of one run and guarantees it gets closed.
///
/// `close` should be awaited on every normal exit path. If the guard is
/// dropped with the page still open (the run was aborted), the close is
/// handed to the runtime instead.
pub struct PageGuard {
    page: Option<Box<dyn PageHandle>>,
}

impl PageGuard {
    pub fn new(page: Box<dyn PageHandle>) -> Self {
        Self { page: Some(page) }
    }

    pub fn page(&self) -> Option<&dyn PageHandle> {
        self.page.as_deref()
    }

    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Closing abandoned page in the background");
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!("Failed to close abandoned page: {}", e);
                    }
                });
            }
            Err(_) => warn!("Page dropped outside a runtime; it could not be closed"),
        }
    }
}
