use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::Options;
use crate::value::Value;
use crate::dict;
use super::event::caps;
use super::{classify, Dispatcher, EventBuilder, Session};

/// Scroll depths, in percent, reported as `scroll_milestone` events.
pub const SCROLL_MILESTONES: [u32; 4] = [25, 50, 75, 90];

/// The page a visitor is looking at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInfo {
    /// The URL path, such as `/tin-tuc/bao-hiem-xe.html`.
    pub path: String,
    pub title: String,
    /// The full URL, including any query.
    pub url: String,
    pub referrer: Option<String>,
    /// The content of the `keywords` meta tag.
    pub meta_keywords: Option<String>,
    /// The text of the page's top-level headings.
    pub headings: Vec<String>,
    /// `(width, height)` of the browser viewport.
    pub viewport: Option<(u32, u32)>,
    /// `(width, height)` of the screen.
    pub screen: Option<(u32, u32)>,
}

/// The element a visitor clicked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickInfo {
    /// The element's tag name, such as `a` or `BUTTON`.
    pub tag: String,
    pub id: Option<String>,
    /// The element's `class` attribute.
    pub class: Option<String>,
    pub text: Option<String>,
    pub x: i32,
    pub y: i32,
    /// Whether the element has an `onclick` attribute.
    pub has_onclick: bool,
}

impl ClickInfo {
    /// Links, buttons, `.btn` elements, and elements with click handlers.
    pub fn is_important(&self) -> bool {
        let tag = self.tag.to_ascii_lowercase();
        let btn_class = self.class.as_deref()
            .is_some_and(|class| class.split_whitespace().any(|c| c == "btn"));

        tag == "a" || tag == "button" || btn_class || self.has_onclick
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    FormSubmission,
    UrlParameter,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::FormSubmission => "form_submission",
            SearchKind::UrlParameter => "url_parameter",
        }
    }
}

/// Something that happened in the visitor's browser.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    PageView(PageInfo),
    Click(ClickInfo),
    /// The page was scrolled to `percent` of its scrollable height.
    Scroll { percent: u32 },
    Search { term: String, kind: SearchKind },
    /// The page was hidden, as when switching tabs.
    Hidden,
    Visible,
    /// Any other input: key presses, mouse movement, touches.
    Activity,
    /// The page is being unloaded.
    Unload,
}

/// A snapshot of the session's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: Arc<str>,
    pub user_id: Arc<str>,
    #[serde(rename = "session_duration")]
    pub session_duration_ms: u64,
    pub pages_viewed: usize,
    pub current_page: Option<String>,
    pub total_interactions: usize,
    pub is_active: bool,
}

/// Turns browser events into analytics events for one session.
///
/// Events can be handed to [`Tracker::handle()`] directly, or sent through a
/// [`Subscription`], which also drives the heartbeat.
///
/// ```rust
/// use gazette::Options;
/// use gazette::analytics::{BrowserEvent, Dispatcher, PageInfo, Session, Tracker};
/// # use gazette::analytics::{Batch, Transport};
/// # #[derive(Debug)] struct Nowhere;
/// # #[gazette::async_trait] impl Transport for Nowhere {
/// #     async fn send(&self, _: &Batch) -> gazette::Result<()> { Ok(()) }
/// # }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gazette::Result<()> {
/// let dispatcher = Dispatcher::new(Nowhere, Options::default())?;
/// let tracker = Tracker::new(dispatcher, Session::new(None));
///
/// let subscription = tracker.subscribe();
/// subscription.emit(BrowserEvent::PageView(PageInfo {
///     path: "/tin-tuc".into(),
///     url: "https://baohiembaovietdanang.vn/tin-tuc".into(),
///     ..PageInfo::default()
/// }));
///
/// subscription.unsubscribe().await;
/// assert_eq!(tracker.summary().pages_viewed, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    dispatcher: Dispatcher,
    session: Session,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    enabled: bool,
    active: bool,
    last_activity: Instant,
    visit_recorded: bool,
    current: Option<Page>,
    pages_finished: usize,
    finished_interactions: usize,
}

#[derive(Debug)]
struct Page {
    path: String,
    started: Instant,
    scroll_depth: u32,
    last_milestone: u32,
    clicks: u32,
    interactions: usize,
}

impl Page {
    fn new(path: &str) -> Self {
        Page {
            path: crate::util::cap_chars(path, caps::PAGE).into(),
            started: Instant::now(),
            scroll_depth: 0,
            last_milestone: 0,
            clicks: 0,
            interactions: 0,
        }
    }

    fn time_spent_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Tracker {
    pub fn new(dispatcher: Dispatcher, session: Session) -> Self {
        let state = State {
            enabled: true,
            active: true,
            last_activity: Instant::now(),
            visit_recorded: false,
            current: None,
            pages_finished: 0,
            finished_interactions: 0,
        };

        Tracker { inner: Arc::new(Inner { dispatcher, session, state: Mutex::new(state) }) }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    fn options(&self) -> &Options {
        self.inner.dispatcher.options()
    }

    /// Resumes emitting events.
    pub fn enable(&self) {
        self.inner.state.lock().enabled = true;
        tracing::debug!(session = %self.inner.session.session_id, "analytics tracking enabled");
    }

    /// Stops emitting events, heartbeats included. Browser events are still
    /// used to follow the session.
    pub fn disable(&self) {
        self.inner.state.lock().enabled = false;
        tracing::debug!(session = %self.inner.session.session_id, "analytics tracking disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    /// Whether the visitor is looking at the page and has done something
    /// within the idle timeout.
    pub fn is_active(&self) -> bool {
        let state = self.inner.state.lock();
        self.active(&state)
    }

    fn active(&self, state: &State) -> bool {
        state.active && state.last_activity.elapsed() <= self.options().idle_timeout()
    }

    /// Starts consuming browser events on the dispatcher's runtime, along
    /// with a heartbeat every `heartbeat_interval_ms`. A zero interval
    /// disables the heartbeat.
    pub fn subscribe(&self) -> Subscription {
        let runtime = self.inner.dispatcher.runtime();
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let tracker = self.clone();
        let consumer = runtime.spawn(async move {
            while let Some(event) = receiver.recv().await {
                tracker.handle(event).await;
            }
        });

        let period = self.options().heartbeat_interval();
        let heartbeat = (!period.is_zero()).then(|| {
            let tracker = self.clone();
            runtime.spawn(async move {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                loop {
                    interval.tick().await;
                    tracker.heartbeat();
                }
            })
        });

        Subscription { sender, consumer: Some(consumer), heartbeat }
    }

    /// Records `event`, emitting any analytics events it causes.
    pub async fn handle(&self, event: BrowserEvent) {
        let unload = matches!(event, BrowserEvent::Unload);
        self.apply(event);
        if unload {
            self.inner.dispatcher.shutdown().await;
        }
    }

    fn apply(&self, event: BrowserEvent) {
        let mut state = self.inner.state.lock();
        match event {
            BrowserEvent::PageView(page) => self.page_view(&mut state, page),
            BrowserEvent::Click(click) => {
                self.touch(&mut state);
                self.click(&mut state, click);
            }
            BrowserEvent::Scroll { percent } => {
                self.touch(&mut state);
                self.scroll(&mut state, percent.min(100));
            }
            BrowserEvent::Search { term, kind } => self.search(&state, &term, kind),
            BrowserEvent::Hidden => {
                state.active = false;
                self.end_page(&mut state);
            }
            BrowserEvent::Visible | BrowserEvent::Activity => self.touch(&mut state),
            BrowserEvent::Unload => self.end_page(&mut state),
        }
    }

    /// Emits a `heartbeat` for the current page, if the visitor is active.
    pub fn heartbeat(&self) {
        let state = self.inner.state.lock();
        let Some(page) = state.current.as_ref().filter(|_| self.active(&state)) else {
            return;
        };

        let event = self.inner.session.event("heartbeat")
            .field("page", page.path.as_str())
            .field("time_spent", page.time_spent_ms())
            .field("scroll_depth", page.scroll_depth)
            .field("clicks", page.clicks);

        self.send(&state, event);
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.inner.state.lock();
        let session = &self.inner.session;
        let current = state.current.as_ref();
        let interactions = state.finished_interactions + current.map_or(0, |page| page.interactions);

        SessionSummary {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            session_duration_ms: session.started.elapsed().as_millis() as u64,
            pages_viewed: state.pages_finished + current.map_or(0, |_| 1),
            current_page: current.map(|page| page.path.clone()),
            total_interactions: interactions,
            is_active: self.active(&state),
        }
    }

    fn send(&self, state: &State, event: EventBuilder) {
        if state.enabled {
            self.inner.dispatcher.track(event.build());
        }
    }

    fn touch(&self, state: &mut State) {
        state.active = true;
        state.last_activity = Instant::now();
    }

    fn page_view(&self, state: &mut State, info: PageInfo) {
        self.touch(state);
        self.end_page(state);
        state.current = Some(Page::new(&info.path));
        tracing::debug!(page = %info.path, "page view");

        let page_view = self.page_data(self.inner.session.event("page_view"), &info);
        self.send(state, page_view);

        for term in classify::search_terms(&info.url) {
            self.search(state, &term, SearchKind::UrlParameter);
        }

        if !std::mem::replace(&mut state.visit_recorded, true) {
            let visit = match &self.inner.session.first_visit {
                Some(first) => self.inner.session.event("returning_visit")
                    .field("first_visit", first.clone()),
                None => self.inner.session.event("first_visit"),
            };

            self.send(state, self.page_data(visit, &info));
        }
    }

    fn page_data(&self, event: EventBuilder, info: &PageInfo) -> EventBuilder {
        let size = |size: Option<(u32, u32)>| match size {
            Some((width, height)) => Value::from(dict! { "width" => width, "height" => height }),
            None => Value::Null,
        };

        let user_agent = self.inner.session.user_agent.as_deref().unwrap_or("");
        let keywords = classify::extract_keywords(
            info.meta_keywords.as_deref(),
            &info.title,
            &info.path,
            &info.headings,
        );

        let category = classify::page_category(&info.path);
        let referrer = info.referrer.as_deref().filter(|r| !r.is_empty());
        let source = classify::traffic_source(referrer, Some(&info.url));

        event.text("page", &info.path, caps::PAGE)
            .text("title", &info.title, caps::TITLE)
            .text("url", &info.url, caps::URL)
            .text("referrer", referrer.unwrap_or(""), caps::REFERRER)
            .field("viewport", size(info.viewport))
            .field("screen", size(info.screen))
            .field("device", classify::device_info(user_agent))
            .field("keywords", keywords)
            .text("category", category, caps::CATEGORY)
            .field("traffic_source", source)
    }

    fn end_page(&self, state: &mut State) {
        let Some(page) = state.current.take() else {
            return;
        };

        let event = self.inner.session.event("page_end")
            .field("page", page.path.as_str())
            .field("time_spent", page.time_spent_ms())
            .field("scroll_depth", page.scroll_depth)
            .field("clicks", page.clicks)
            .field("interactions_count", page.interactions);

        self.send(state, event);
        state.pages_finished += 1;
        state.finished_interactions += page.interactions;
    }

    fn click(&self, state: &mut State, click: ClickInfo) {
        let Some(page) = state.current.as_mut() else {
            return;
        };

        page.clicks += 1;
        page.interactions += 1;
        if !click.is_important() {
            return;
        }

        let event = self.inner.session.event("important_click")
            .text("page", &page.path, caps::PAGE)
            .text("element_type", &click.tag.to_ascii_lowercase(), caps::ELEMENT_TYPE)
            .optional_text("element_id", click.id.as_deref(), caps::ELEMENT_ID)
            .optional_text("element_class", click.class.as_deref(), caps::ELEMENT_CLASS)
            .optional_text("element_text", click.text.as_deref().map(str::trim), caps::ELEMENT_TEXT)
            .field("position", dict! { "x" => click.x, "y" => click.y });

        self.send(state, event);
    }

    /// Deepens the current page's scroll depth, emitting each milestone
    /// passed for the first time on this page.
    fn scroll(&self, state: &mut State, percent: u32) {
        let Some(page) = state.current.as_mut() else {
            return;
        };

        page.scroll_depth = page.scroll_depth.max(percent);
        let passed: Vec<u32> = SCROLL_MILESTONES.into_iter()
            .filter(|m| *m > page.last_milestone && percent >= *m)
            .collect();

        let path = page.path.clone();
        if let Some(last) = passed.last() {
            page.last_milestone = *last;
        }

        for milestone in passed {
            let event = self.inner.session.event("scroll_milestone")
                .field("page", path.as_str())
                .field("scroll_percent", milestone);

            self.send(state, event);
        }
    }

    fn search(&self, state: &State, term: &str, kind: SearchKind) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }

        let page = state.current.as_ref().map_or("", |page| page.path.as_str());
        let event = self.inner.session.event("search")
            .text("page", page, caps::PAGE)
            .text("search_term", term, caps::SEARCH_TERM)
            .field("search_type", kind.as_str());

        self.send(state, event);
    }
}

/// A live feed of browser events into a [`Tracker`].
///
/// Dropping a subscription stops its heartbeat at once. Events already
/// queued are still handled; use [`Subscription::unsubscribe()`] to wait
/// for them.
#[derive(Debug)]
pub struct Subscription {
    sender: mpsc::UnboundedSender<BrowserEvent>,
    consumer: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Queues `event` for the tracker. Returns `false` if the tracker is no
    /// longer consuming events.
    pub fn emit(&self, event: BrowserEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Stops the heartbeat, then waits for every queued event to be handled.
    pub async fn unsubscribe(mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
            let _ = heartbeat.await;
        }

        // Dropping `self` closes the channel, ending the consumer's loop.
        let consumer = self.consumer.take();
        drop(self);
        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                tracing::warn!(error = %e, "analytics event consumer failed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::analytics::{AnalyticsEvent, Batch, Transport};
    use crate::error::Result;

    #[derive(Debug, Default)]
    struct Collector {
        events: Mutex<Vec<AnalyticsEvent>>,
    }

    #[async_trait::async_trait]
    impl Transport for Collector {
        async fn send(&self, batch: &Batch) -> Result<()> {
            self.events.lock().extend(batch.events.iter().cloned());
            Ok(())
        }
    }

    struct Harness {
        tracker: Tracker,
        collector: Arc<Collector>,
    }

    impl Harness {
        fn new(session: Session) -> Self {
            let collector = Arc::new(Collector::default());
            let options = Options { batch_size: 1000, max_buffer_size: 1000, ..Options::default() };
            let dispatcher = Dispatcher::with_transport(collector.clone(), options).unwrap();
            Harness { tracker: Tracker::new(dispatcher, session), collector }
        }

        /// Every event emitted so far, oldest first.
        async fn events(&self) -> Vec<AnalyticsEvent> {
            self.tracker.dispatcher().flush().await;
            self.collector.events.lock().clone()
        }

        async fn kinds(&self) -> Vec<String> {
            self.events().await.into_iter().map(|e| e.event_type).collect()
        }

        async fn last(&self, kind: &str) -> AnalyticsEvent {
            self.events().await.into_iter().rev()
                .find(|e| e.event_type == kind)
                .unwrap_or_else(|| panic!("no {kind} event"))
        }
    }

    fn page(path: &str) -> BrowserEvent {
        BrowserEvent::PageView(PageInfo {
            path: path.into(),
            title: "Bảo hiểm sức khỏe cho gia đình".into(),
            url: format!("https://baohiembaovietdanang.vn{path}"),
            viewport: Some((1280, 720)),
            ..PageInfo::default()
        })
    }

    fn button() -> BrowserEvent {
        BrowserEvent::Click(ClickInfo {
            tag: "BUTTON".into(),
            class: Some("cta btn".into()),
            text: Some("  Đăng ký  ".into()),
            ..ClickInfo::default()
        })
    }

    fn field(event: &AnalyticsEvent, name: &str) -> String {
        event.get(name).map(ToString::to_string).unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn page_lifecycle() {
        let harness = Harness::new(Session::new(None).with_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0"));
        let tracker = &harness.tracker;

        tracker.handle(page("/intercare")).await;
        sleep(Duration::from_secs(3)).await;
        tracker.handle(BrowserEvent::Scroll { percent: 60 }).await;
        tracker.handle(button()).await;
        tracker.handle(BrowserEvent::Click(ClickInfo { tag: "div".into(), ..ClickInfo::default() })).await;
        tracker.handle(page("/tin-tuc")).await;

        assert_eq!(harness.kinds().await, [
            "page_view", "first_visit", "scroll_milestone", "scroll_milestone",
            "important_click", "page_end", "page_view",
        ]);

        let view = harness.last("page_view").await;
        assert_eq!(field(&view, "category"), "Tin tức");
        assert_eq!(view.get("viewport").and_then(|v| v.lookup("width")), Some(&Value::from(1280u32)));
        assert_eq!(view.get("device").and_then(|v| v.lookup("os")).and_then(Value::as_str), Some("Linux"));
        assert_eq!(view.get("traffic_source").and_then(|v| v.lookup("source")).and_then(Value::as_str), Some("direct"));

        let end = harness.last("page_end").await;
        assert_eq!(field(&end, "page"), "/intercare");
        assert_eq!(field(&end, "time_spent"), "3000");
        assert_eq!(field(&end, "scroll_depth"), "60");
        assert_eq!(field(&end, "clicks"), "2");
        assert_eq!(field(&end, "interactions_count"), "2");

        let click = harness.last("important_click").await;
        assert_eq!(field(&click, "element_type"), "button");
        assert_eq!(field(&click, "element_text"), "Đăng ký");
        assert!(click.get("element_id").unwrap().is_null());

        let summary = tracker.summary();
        assert_eq!(summary.pages_viewed, 2);
        assert_eq!(summary.current_page.as_deref(), Some("/tin-tuc"));
        assert_eq!(summary.total_interactions, 2);
        assert_eq!(summary.session_duration_ms, 3000);
        assert!(summary.is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_milestones_increase_per_page() {
        let harness = Harness::new(Session::new(None));
        let tracker = &harness.tracker;

        tracker.handle(page("/a")).await;
        for percent in [10, 25, 30, 20, 95, 100] {
            tracker.handle(BrowserEvent::Scroll { percent }).await;
        }

        tracker.handle(page("/b")).await;
        tracker.handle(BrowserEvent::Scroll { percent: 50 }).await;

        let milestones: Vec<_> = harness.events().await.into_iter()
            .filter(|e| e.event_type == "scroll_milestone")
            .map(|e| (field(&e, "page"), field(&e, "scroll_percent")))
            .collect();

        let expected = [("/a", "25"), ("/a", "50"), ("/a", "75"), ("/a", "90"), ("/b", "25"), ("/b", "50")];
        assert_eq!(milestones, expected.map(|(p, m)| (p.to_string(), m.to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn returning_visitors_and_searches() {
        let session = Session::new(Some("user_1_abc")).with_first_visit("2024-01-02T03:04:05.000Z");
        let harness = Harness::new(session);
        let tracker = &harness.tracker;

        tracker.handle(BrowserEvent::PageView(PageInfo {
            path: "/tim-kiem".into(),
            url: "https://baohiembaovietdanang.vn/tim-kiem?q=xe%20m%C3%A1y".into(),
            referrer: Some("https://www.google.com/".into()),
            ..PageInfo::default()
        })).await;

        tracker.handle(BrowserEvent::Search { term: " ô tô ".into(), kind: SearchKind::FormSubmission }).await;
        tracker.handle(BrowserEvent::Search { term: "  ".into(), kind: SearchKind::FormSubmission }).await;

        assert_eq!(harness.kinds().await, ["page_view", "search", "returning_visit", "search"]);

        let visit = harness.last("returning_visit").await;
        assert_eq!(field(&visit, "first_visit"), "2024-01-02T03:04:05.000Z");
        assert_eq!(visit.get("traffic_source").and_then(|v| v.lookup("medium")).and_then(Value::as_str), Some("organic"));

        let searches: Vec<_> = harness.events().await.into_iter()
            .filter(|e| e.event_type == "search")
            .map(|e| (field(&e, "search_term"), field(&e, "search_type")))
            .collect();

        assert_eq!(searches, [
            ("xe máy".to_string(), "url_parameter".to_string()),
            ("ô tô".to_string(), "form_submission".to_string()),
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_pages_end_and_go_idle() {
        let harness = Harness::new(Session::new(None));
        let tracker = &harness.tracker;

        tracker.handle(page("/")).await;
        tracker.handle(BrowserEvent::Hidden).await;
        assert_eq!(harness.kinds().await, ["page_view", "first_visit", "page_end"]);

        let summary = tracker.summary();
        assert_eq!(summary.current_page, None);
        assert_eq!(summary.pages_viewed, 1);
        assert!(!summary.is_active);

        tracker.handle(BrowserEvent::Visible).await;
        assert!(tracker.is_active());
        sleep(Duration::from_secs(301)).await;
        assert!(!tracker.is_active());
        tracker.handle(BrowserEvent::Activity).await;
        assert!(tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_tracker_emits_nothing() {
        let harness = Harness::new(Session::new(None));
        let tracker = &harness.tracker;

        tracker.disable();
        tracker.handle(page("/a")).await;
        tracker.handle(button()).await;
        assert!(harness.kinds().await.is_empty());
        assert_eq!(tracker.summary().pages_viewed, 1);

        tracker.enable();
        tracker.handle(page("/b")).await;
        assert_eq!(harness.kinds().await, ["page_end", "page_view"]);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_while_active() {
        let harness = Harness::new(Session::new(None));
        let subscription = harness.tracker.subscribe();

        assert!(subscription.emit(page("/bao-hiem-xe")));
        sleep(Duration::from_secs(61)).await;
        let heartbeats = harness.events().await.into_iter()
            .filter(|e| e.event_type == "heartbeat")
            .collect::<Vec<_>>();

        assert_eq!(heartbeats.len(), 2);
        assert_eq!(field(&heartbeats[1], "time_spent"), "60000");

        // Idle after five minutes without activity.
        sleep(Duration::from_secs(400)).await;
        let count = |events: Vec<AnalyticsEvent>| events.iter().filter(|e| e.event_type == "heartbeat").count();
        assert_eq!(count(harness.events().await), 10);

        subscription.unsubscribe().await;
        assert_eq!(harness.tracker.summary().current_page.as_deref(), Some("/bao-hiem-xe"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_subscription_stops_heartbeat() {
        let harness = Harness::new(Session::new(None));
        let subscription = harness.tracker.subscribe();

        subscription.emit(page("/tin-tuc"));
        sleep(Duration::from_secs(1)).await;
        drop(subscription);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(harness.kinds().await, ["page_view", "first_visit"]);
        assert_eq!(Arc::strong_count(&harness.tracker.inner), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unload_ends_page_and_flushes() {
        let harness = Harness::new(Session::new(None));
        let subscription = harness.tracker.subscribe();

        subscription.emit(page("/a"));
        subscription.emit(BrowserEvent::Unload);
        subscription.unsubscribe().await;

        assert_eq!(harness.tracker.dispatcher().buffered(), 0);
        let kinds: Vec<_> = harness.collector.events.lock().iter().map(|e| e.event_type.clone()).collect();
        assert_eq!(kinds, ["page_view", "first_visit", "page_end"]);
    }

    #[test]
    fn important_clicks() {
        let click = |tag: &str, class: Option<&str>, has_onclick| ClickInfo {
            tag: tag.into(),
            class: class.map(Into::into),
            has_onclick,
            ..ClickInfo::default()
        };

        assert!(click("A", None, false).is_important());
        assert!(click("span", Some("btn btn-primary"), false).is_important());
        assert!(click("div", None, true).is_important());
        assert!(!click("div", Some("btn-primary"), false).is_important());
    }

    static_assertions::assert_impl_all!(Tracker: Send, Sync, Clone);
}
