/// Page handles backed by a headless Chromium over the DevTools protocol
use super::{ElementHandle, ElementId, PageFactory, PageHandle, SelectorSpec};
use crate::config::BrowserSettings;
use crate::error::{PageError, PageResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Attribute used to hand an ancestor found in page script back to the protocol side
const MARKER_ATTRIBUTE: &str = "data-course-duration-ref";

const VISIBILITY_FN: &str = "function() {
    const style = window.getComputedStyle(this);
    const rect = this.getBoundingClientRect();
    return style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0);
}";

const TEXT_FN: &str = "function() { return this.textContent || ''; }";

fn protocol_error(e: impl std::fmt::Display) -> PageError {
    PageError::Protocol(e.to_string())
}

/// One shared browser; every run gets its own tab
pub struct ChromiumPageFactory {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumPageFactory {
    pub async fn launch(settings: &BrowserSettings) -> PageResult<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .args(settings.args.clone());

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }

        let config = builder.build().map_err(PageError::Protocol)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(protocol_error)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        info!("🌐 Browser launched (headless: {})", settings.headless);
        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }

    /// Close the browser and stop its event loop
    pub async fn shutdown(self) {
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl PageFactory for ChromiumPageFactory {
    async fn new_page(&self) -> PageResult<Box<dyn PageHandle>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(protocol_error)?;
        Ok(Box::new(ChromiumPage::new(page)))
    }
}

/// A browser tab
#[derive(Clone)]
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    fn wrap(&self, elements: Vec<Element>) -> Vec<Box<dyn ElementHandle>> {
        elements
            .into_iter()
            .map(|element| {
                Box::new(ChromiumElement {
                    page: self.page.clone(),
                    element,
                }) as Box<dyn ElementHandle>
            })
            .collect()
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> PageResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(PageError::Navigation(e.to_string())),
            Err(_) => Err(PageError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn current_url(&self) -> PageResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(protocol_error)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn query(&self, selector: &SelectorSpec) -> PageResult<Vec<Box<dyn ElementHandle>>> {
        let elements = self
            .page
            .find_elements(selector.as_str())
            .await
            .map_err(protocol_error)?;
        Ok(self.wrap(elements))
    }

    async fn measure_content_height(&self) -> PageResult<u64> {
        self.page
            .evaluate("document.body ? document.body.scrollHeight : 0")
            .await
            .map_err(protocol_error)?
            .into_value::<u64>()
            .map_err(protocol_error)
    }

    async fn scroll_to_bottom(&self) -> PageResult<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body ? document.body.scrollHeight : 0)")
            .await
            .map_err(protocol_error)?;
        Ok(())
    }

    async fn close(&self) -> PageResult<()> {
        self.page.clone().close().await.map_err(protocol_error)
    }
}

struct ChromiumElement {
    page: Page,
    element: Element,
}

impl ChromiumElement {
    async fn call_returning<T: serde::de::DeserializeOwned>(&self, function: &str) -> PageResult<Option<T>> {
        let returned = self
            .element
            .call_js_fn(function, false)
            .await
            .map_err(|_| PageError::StaleElement)?;

        match returned.result.value {
            Some(value) => serde_json::from_value(value).map(Some).map_err(protocol_error),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    fn id(&self) -> ElementId {
        ElementId(*self.element.backend_node_id.inner() as u64)
    }

    async fn text_content(&self) -> PageResult<String> {
        Ok(self.call_returning::<String>(TEXT_FN).await?.unwrap_or_default())
    }

    async fn is_visible(&self) -> PageResult<bool> {
        Ok(self.call_returning::<bool>(VISIBILITY_FN).await?.unwrap_or(false))
    }

    async fn scroll_into_view(&self) -> PageResult<()> {
        self.element
            .scroll_into_view()
            .await
            .map_err(|_| PageError::StaleElement)?;
        Ok(())
    }

    async fn dispatch_click(&self) -> PageResult<()> {
        // Pointer events through the input domain, not a scripted `.click()`
        self.element
            .click()
            .await
            .map_err(|_| PageError::StaleElement)?;
        Ok(())
    }

    async fn closest_ancestor(
        &self,
        selector: &SelectorSpec,
    ) -> PageResult<Option<Box<dyn ElementHandle>>> {
        static NEXT_REF: AtomicU64 = AtomicU64::new(1);

        let reference = format!("ref-{}", NEXT_REF.fetch_add(1, Ordering::Relaxed));
        let quoted_selector = serde_json::to_string(selector.as_str()).map_err(protocol_error)?;
        let function = format!(
            "function() {{
                const parent = this.parentElement;
                const found = parent ? parent.closest({selector}) : null;
                if (!found) return false;
                found.setAttribute('{attr}', '{reference}');
                return true;
            }}",
            selector = quoted_selector,
            attr = MARKER_ATTRIBUTE,
            reference = reference,
        );

        if !self.call_returning::<bool>(&function).await?.unwrap_or(false) {
            return Ok(None);
        }

        let marker = format!("[{}='{}']", MARKER_ATTRIBUTE, reference);
        let ancestor = self
            .page
            .find_element(marker.as_str())
            .await
            .map_err(|_| PageError::StaleElement)?;

        Ok(Some(Box::new(ChromiumElement {
            page: self.page.clone(),
            element: ancestor,
        })))
    }

    async fn query(&self, selector: &SelectorSpec) -> PageResult<Vec<Box<dyn ElementHandle>>> {
        let elements = self
            .element
            .find_elements(selector.as_str())
            .await
            .map_err(protocol_error)?;

        Ok(elements
            .into_iter()
            .map(|element| {
                Box::new(ChromiumElement {
                    page: self.page.clone(),
                    element,
                }) as Box<dyn ElementHandle>
            })
            .collect())
    }
}
