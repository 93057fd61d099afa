use std::fmt::Debug;

use serde::Serialize;

use crate::error::Result;
use super::AnalyticsEvent;

/// The payload delivered to the collector: `{"events": [...], "batch_size": n}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub events: Vec<AnalyticsEvent>,
    pub batch_size: usize,
}

impl Batch {
    pub fn new(events: Vec<AnalyticsEvent>) -> Self {
        Batch { batch_size: events.len(), events }
    }

    pub fn into_events(self) -> Vec<AnalyticsEvent> {
        self.events
    }
}

/// Delivers batches of events somewhere.
///
/// A returned error is treated as transient: the batch is re-queued and
/// retried until the dispatcher's retry limit is reached.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, batch: &Batch) -> Result<()>;
}

/// Supplies the key used to authorize requests to the collector.
#[async_trait::async_trait]
pub trait KeyProvider: Send + Sync + Debug {
    /// The current key, or `None` if no key is available yet.
    async fn key(&self) -> Result<Option<String>>;
}

/// A [`KeyProvider`] that always returns the same key.
#[derive(Debug, Clone)]
pub struct StaticKey(Option<String>);

impl StaticKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        StaticKey(Some(key.into()))
    }

    pub fn none() -> Self {
        StaticKey(None)
    }
}

#[async_trait::async_trait]
impl KeyProvider for StaticKey {
    async fn key(&self) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::sync::Arc;

    use reqwest::Client;
    use url::Url;

    use crate::error::{Chainable, ErrorKind, Result};
    use super::{Batch, KeyProvider, Transport};

    /// The collector function that receives event batches.
    pub const DEFAULT_FUNCTION: &str = "track-user-behavior";

    /// Posts batches as JSON to `{base}/functions/v1/{function}`.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
        endpoint: Url,
        keys: Arc<dyn KeyProvider>,
    }

    impl HttpTransport {
        /// A transport posting to the default collector function at `base`.
        ///
        /// ```rust
        /// use gazette::analytics::{HttpTransport, StaticKey};
        ///
        /// let transport = HttpTransport::new("https://db.example.com/", StaticKey::new("k")).unwrap();
        /// assert_eq!(transport.endpoint().as_str(), "https://db.example.com/functions/v1/track-user-behavior");
        /// ```
        pub fn new<K: KeyProvider + 'static>(base: &str, keys: K) -> Result<Self> {
            Self::with_function(base, DEFAULT_FUNCTION, Arc::new(keys))
        }

        pub fn with_function(base: &str, function: &str, keys: Arc<dyn KeyProvider>) -> Result<Self> {
            let base = format!("{}/", base.trim_end_matches('/'));
            let endpoint = Url::parse(&base)
                .and_then(|base| base.join(&format!("functions/v1/{function}")))
                .chain_with(|| error!("invalid analytics endpoint", "base" => base.clone()))
                .map_err(|e| e.with_kind(ErrorKind::Config))?;

            Ok(HttpTransport { client: Client::new(), endpoint, keys })
        }

        pub fn endpoint(&self) -> &Url {
            &self.endpoint
        }
    }

    #[async_trait::async_trait]
    impl Transport for HttpTransport {
        async fn send(&self, batch: &Batch) -> Result<()> {
            let transport_error = |e: crate::Error| e.with_kind(ErrorKind::Transport);
            let Some(key) = self.keys.key().await.map_err(transport_error)? else {
                let error: crate::Error = error!("no collector key available");
                return Err(transport_error(error));
            };

            tracing::debug!(endpoint = %self.endpoint, events = batch.batch_size, "sending analytics batch");
            let response = self.client.post(self.endpoint.clone())
                .bearer_auth(&key)
                .header("apikey", &key)
                .json(batch)
                .send()
                .await
                .chain(error!("analytics request failed"))
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let error: crate::Error = error!(
                    "collector rejected analytics batch",
                    "status" => status,
                    "events" => batch.batch_size,
                );

                return Err(transport_error(error));
            }

            Ok(())
        }
    }
}
