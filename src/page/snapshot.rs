/// Page handles over static HTML snapshots
///
/// A snapshot page holds one or more HTML frames. Clicking an element of the
/// current frame advances the page to the next frame, which is how a reveal
/// affordance ("Show more") is modeled without a renderer.
use super::{ElementHandle, ElementId, PageFactory, PageHandle, SelectorSpec};
use crate::error::{PageError, PageResult};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Approximate pixel height contributed by each element of a frame
const ELEMENT_HEIGHT_PX: u64 = 24;

const EMPTY_DOCUMENT: &str = "<html><head></head><body></body></html>";

/// Tags that never render
const NON_RENDERED_TAGS: [&str; 5] = ["head", "script", "style", "template", "noscript"];

#[derive(Debug)]
struct SnapshotState {
    frames: Vec<String>,
    current: usize,
    url: Option<String>,
    closed: bool,
    clicks: usize,
    scrolls: usize,
}

/// A page handle backed by parsed HTML frames
#[derive(Debug, Clone)]
pub struct SnapshotPage {
    state: Arc<Mutex<SnapshotState>>,
    redirect_to: Option<String>,
}

impl SnapshotPage {
    /// Create a page that steps through `frames` as its reveal affordances are clicked
    pub fn new(frames: Vec<String>) -> Self {
        let frames = if frames.is_empty() {
            vec![EMPTY_DOCUMENT.to_string()]
        } else {
            frames
        };

        Self {
            state: Arc::new(Mutex::new(SnapshotState {
                frames,
                current: 0,
                url: None,
                closed: false,
                clicks: 0,
                scrolls: 0,
            })),
            redirect_to: None,
        }
    }

    /// Single static frame
    pub fn from_html(html: impl Into<String>) -> Self {
        Self::new(vec![html.into()])
    }

    /// Land on `url` regardless of the navigation target
    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_to = Some(url.into());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(true)
    }

    /// Index of the frame currently shown
    pub fn current_frame(&self) -> usize {
        self.lock().map(|state| state.current).unwrap_or(0)
    }

    pub fn click_count(&self) -> usize {
        self.lock().map(|state| state.clicks).unwrap_or(0)
    }

    pub fn scroll_count(&self) -> usize {
        self.lock().map(|state| state.scrolls).unwrap_or(0)
    }

    fn lock(&self) -> PageResult<MutexGuard<'_, SnapshotState>> {
        self.state
            .lock()
            .map_err(|_| PageError::Protocol("snapshot state poisoned".to_string()))
    }

    fn open_state(&self) -> PageResult<MutexGuard<'_, SnapshotState>> {
        let state = self.lock()?;
        if state.closed {
            return Err(PageError::Closed);
        }
        Ok(state)
    }

    fn element(&self, frame: usize, index: usize) -> Box<dyn ElementHandle> {
        Box::new(SnapshotElement {
            page: self.clone(),
            frame,
            index,
        })
    }

    fn query_frame(&self, selector: &SelectorSpec) -> PageResult<(usize, Vec<usize>)> {
        let selector = parse_selector(selector)?;
        let state = self.open_state()?;
        let document = Html::parse_document(&state.frames[state.current]);
        let order = element_order(&document);

        let indices = document
            .select(&selector)
            .filter_map(|element| position_of(&order, &element))
            .collect();

        Ok((state.current, indices))
    }

    fn frame_height(&self) -> PageResult<u64> {
        let state = self.open_state()?;
        let document = Html::parse_document(&state.frames[state.current]);
        Ok(element_order(&document).len() as u64 * ELEMENT_HEIGHT_PX)
    }
}

#[async_trait]
impl PageHandle for SnapshotPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> PageResult<()> {
        let mut state = self.open_state()?;
        let landed = self.redirect_to.clone().unwrap_or_else(|| url.to_string());
        debug!("Snapshot navigation: {} -> {}", url, landed);
        state.url = Some(landed);
        Ok(())
    }

    async fn current_url(&self) -> PageResult<String> {
        let state = self.open_state()?;
        Ok(state.url.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn query(&self, selector: &SelectorSpec) -> PageResult<Vec<Box<dyn ElementHandle>>> {
        let (frame, indices) = self.query_frame(selector)?;
        Ok(indices
            .into_iter()
            .map(|index| self.element(frame, index))
            .collect())
    }

    async fn measure_content_height(&self) -> PageResult<u64> {
        self.frame_height()
    }

    async fn scroll_to_bottom(&self) -> PageResult<()> {
        let mut state = self.open_state()?;
        state.scrolls += 1;
        Ok(())
    }

    async fn close(&self) -> PageResult<()> {
        let mut state = self.lock()?;
        state.closed = true;
        Ok(())
    }
}

/// An element of a [`SnapshotPage`], addressed by its frame and document position
struct SnapshotElement {
    page: SnapshotPage,
    frame: usize,
    index: usize,
}

impl SnapshotElement {
    /// Run `f` against this element, provided its frame is still the one shown
    fn with_element<T>(
        &self,
        f: impl for<'a> FnOnce(ElementRef<'a>, &[ElementRef<'a>]) -> T,
    ) -> PageResult<T> {
        let state = self.page.open_state()?;
        if state.current != self.frame {
            return Err(PageError::StaleElement);
        }

        let document = Html::parse_document(&state.frames[self.frame]);
        let order = element_order(&document);
        let element = *order.get(self.index).ok_or(PageError::StaleElement)?;

        Ok(f(element, &order))
    }
}

#[async_trait]
impl ElementHandle for SnapshotElement {
    fn id(&self) -> ElementId {
        ElementId(((self.frame as u64) << 32) | self.index as u64)
    }

    async fn text_content(&self) -> PageResult<String> {
        self.with_element(|element, _| element.text().collect::<String>())
    }

    async fn is_visible(&self) -> PageResult<bool> {
        self.with_element(|element, _| {
            !is_hidden(element)
                && element
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .all(|ancestor| !is_hidden(ancestor))
        })
    }

    async fn scroll_into_view(&self) -> PageResult<()> {
        self.with_element(|_, _| ())
    }

    async fn dispatch_click(&self) -> PageResult<()> {
        self.with_element(|_, _| ())?;

        let mut state = self.page.open_state()?;
        state.clicks += 1;
        if state.current + 1 < state.frames.len() {
            state.current += 1;
            debug!("Snapshot advanced to frame {}", state.current);
        }
        Ok(())
    }

    async fn closest_ancestor(
        &self,
        selector: &SelectorSpec,
    ) -> PageResult<Option<Box<dyn ElementHandle>>> {
        let selector = parse_selector(selector)?;
        let index = self.with_element(|element, order| {
            element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|ancestor| selector.matches(ancestor))
                .and_then(|ancestor| position_of(order, &ancestor))
        })?;

        Ok(index.map(|index| self.page.element(self.frame, index)))
    }

    async fn query(&self, selector: &SelectorSpec) -> PageResult<Vec<Box<dyn ElementHandle>>> {
        let selector = parse_selector(selector)?;
        let own_id = self.index;
        let indices = self.with_element(|element, order| {
            element
                .select(&selector)
                .filter_map(|found| position_of(order, &found))
                .filter(|index| *index != own_id)
                .collect::<Vec<_>>()
        })?;

        Ok(indices
            .into_iter()
            .map(|index| self.page.element(self.frame, index))
            .collect())
    }
}

fn parse_selector(selector: &SelectorSpec) -> PageResult<Selector> {
    Selector::parse(selector.as_str()).map_err(|e| PageError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Every element node in document order
fn element_order(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn position_of<'a>(order: &[ElementRef<'a>], element: &ElementRef<'a>) -> Option<usize> {
    order.iter().position(|candidate| candidate == element)
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();

    if NON_RENDERED_TAGS.contains(&value.name()) || value.attr("hidden").is_some() {
        return true;
    }

    if value
        .attr("aria-hidden")
        .map_or(false, |hidden| hidden.eq_ignore_ascii_case("true"))
    {
        return true;
    }

    value.attr("style").map_or(false, |style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none") || compact.contains("visibility:hidden")
    })
}

/// Hands out snapshot pages, optionally a different frame set per run
pub struct SnapshotPageFactory {
    runs: Vec<Vec<String>>,
    next: AtomicUsize,
    redirect_to: Option<String>,
    issued: Mutex<Vec<SnapshotPage>>,
}

impl SnapshotPageFactory {
    /// Every page gets the same frames
    pub fn new(frames: Vec<String>) -> Self {
        Self::per_run(vec![frames])
    }

    /// Page `i` gets `runs[i % runs.len()]`
    pub fn per_run(runs: Vec<Vec<String>>) -> Self {
        Self {
            runs,
            next: AtomicUsize::new(0),
            redirect_to: None,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_to = Some(url.into());
        self
    }

    /// Pages handed out so far, in creation order
    pub fn pages(&self) -> Vec<SnapshotPage> {
        self.issued
            .lock()
            .map(|issued| issued.clone())
            .unwrap_or_default()
    }

    pub fn last_page(&self) -> Option<SnapshotPage> {
        self.pages().pop()
    }
}

#[async_trait]
impl PageFactory for SnapshotPageFactory {
    async fn new_page(&self) -> PageResult<Box<dyn PageHandle>> {
        if self.runs.is_empty() {
            return Err(PageError::Navigation("no snapshot frames configured".to_string()));
        }

        let slot = self.next.fetch_add(1, Ordering::SeqCst) % self.runs.len();
        let mut page = SnapshotPage::new(self.runs[slot].clone());
        if let Some(redirect) = &self.redirect_to {
            page = page.with_redirect(redirect.clone());
        }

        self.issued
            .lock()
            .map_err(|_| PageError::Protocol("snapshot factory poisoned".to_string()))?
            .push(page.clone());

        Ok(Box::new(page))
    }
}
