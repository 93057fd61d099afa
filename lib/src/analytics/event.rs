use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::time::Instant;

use crate::util::cap_chars;
use crate::value::{Dict, Value};

/// Maximum lengths, in characters, of string fields in an event.
pub mod caps {
    pub const DEFAULT: usize = 500;
    pub const PAGE: usize = 200;
    pub const TITLE: usize = 200;
    pub const URL: usize = 500;
    pub const REFERRER: usize = 500;
    pub const CATEGORY: usize = 100;
    pub const SEARCH_TERM: usize = 200;
    pub const ELEMENT_TYPE: usize = 50;
    pub const ELEMENT_ID: usize = 100;
    pub const ELEMENT_CLASS: usize = 200;
    pub const ELEMENT_TEXT: usize = 100;
}

/// Keys owned by the event envelope. Fields with these names are not
/// flattened into the serialized event.
const RESERVED: &[&str] = &[
    "event_type", "session_id", "user_id", "timestamp",
    "user_agent", "ip_address", "page_data",
];

/// The identity shared by every event of one visit.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Arc<str>,
    pub user_id: Arc<str>,
    pub user_agent: Option<Arc<str>>,
    /// When the visitor first visited, if this isn't their first visit.
    pub first_visit: Option<Arc<str>>,
    pub started: Instant,
}

impl Session {
    /// A new session for `user_id`, or for a freshly generated user.
    pub fn new(user_id: Option<&str>) -> Self {
        Session {
            session_id: generate_id("session").into(),
            user_id: user_id.map_or_else(|| generate_id("user"), str::to_owned).into(),
            user_agent: None,
            first_visit: None,
            started: Instant::now(),
        }
    }

    pub fn with_user_agent<S: Into<Arc<str>>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_first_visit<S: Into<Arc<str>>>(mut self, first_visit: S) -> Self {
        self.first_visit = Some(first_visit.into());
        self
    }

    /// Starts building an event of type `event_type` in this session.
    pub fn event<S: Into<String>>(&self, event_type: S) -> EventBuilder {
        EventBuilder {
            event: AnalyticsEvent {
                event_type: event_type.into(),
                session_id: self.session_id.clone(),
                user_id: self.user_id.clone(),
                timestamp: now_iso(),
                user_agent: self.user_agent.as_deref().map(|ua| cap_chars(ua, caps::DEFAULT).into()),
                data: Arc::new(Dict::new()),
            },
            data: Dict::new(),
        }
    }
}

/// `{prefix}_{epoch millis}_{9 random characters}`.
///
/// ```rust
/// let id = gazette::analytics::generate_id("session");
/// let parts: Vec<_> = id.split('_').collect();
/// assert_eq!(parts[0], "session");
/// assert!(parts[1].parse::<u64>().is_ok());
/// assert_eq!(parts[2].len(), 9);
/// ```
pub fn generate_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{millis}_{}", &random[..9])
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// One tracked action, as delivered to the collector.
///
/// Serializes as the envelope fields, `ip_address: null` (filled in by the
/// collector), the event's data under `page_data`, and the same data again
/// flattened into the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub event_type: String,
    pub session_id: Arc<str>,
    pub user_id: Arc<str>,
    /// ISO 8601, UTC.
    pub timestamp: String,
    pub user_agent: Option<String>,
    pub data: Arc<Dict>,
}

impl AnalyticsEvent {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

impl Serialize for AnalyticsEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("event_type", &self.event_type)?;
        map.serialize_entry("session_id", &self.session_id)?;
        map.serialize_entry("user_id", &self.user_id)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("user_agent", &self.user_agent)?;
        map.serialize_entry("ip_address", &None::<String>)?;
        map.serialize_entry("page_data", &self.data)?;
        for (key, value) in self.data.iter() {
            map.serialize_entry(key, value)?;
        }

        map.end()
    }
}

/// Builds an [`AnalyticsEvent`]. Created by [`Session::event()`].
#[derive(Debug)]
pub struct EventBuilder {
    event: AnalyticsEvent,
    data: Dict,
}

impl EventBuilder {
    /// Sets `key` to `value`. Reserved envelope keys are ignored.
    pub fn field<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        if RESERVED.contains(&key) {
            tracing::debug!(key, "ignoring reserved analytics field");
            return self;
        }

        self.data.insert(key.into(), value.into());
        self
    }

    /// Sets `key` to the first `max` characters of `text`.
    pub fn text(self, key: &str, text: &str, max: usize) -> Self {
        self.field(key, cap_chars(text, max))
    }

    /// Sets `key` to the capped `text`, or to `null` if `text` is empty.
    pub fn optional_text(self, key: &str, text: Option<&str>, max: usize) -> Self {
        match text.filter(|t| !t.is_empty()) {
            Some(text) => self.text(key, text, max),
            None => self.field(key, Value::Null),
        }
    }

    pub fn build(mut self) -> AnalyticsEvent {
        self.event.data = Arc::new(self.data);
        self.event
    }
}
