//! Visitor analytics: event capture, buffering, and batched delivery.
//!
//! A [`Tracker`] turns [`BrowserEvent`]s into [`AnalyticsEvent`]s for one
//! [`Session`] and hands them to a [`Dispatcher`], which buffers them and
//! delivers them in [`Batch`]es through a [`Transport`].

mod buffer;
mod classify;
mod dispatcher;
mod event;
mod tracker;
mod transport;

pub use buffer::EventBuffer;
pub use classify::*;
pub use dispatcher::{Dispatcher, FlushOutcome};
pub use event::{caps, generate_id, AnalyticsEvent, EventBuilder, Session};
pub use tracker::*;
pub use transport::{Batch, KeyProvider, StaticKey, Transport};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
