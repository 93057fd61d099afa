use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::Options;
use crate::error::{Chainable, Error, Result};
use super::{AnalyticsEvent, Batch, EventBuffer, Transport};

/// What a call to [`Dispatcher::flush()`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The buffer was empty.
    Empty,
    /// A batch of this many events was delivered.
    Sent(usize),
    /// Another flush was sending. The buffer will be flushed again when it
    /// completes.
    InFlight,
    /// The batch failed and was re-queued; retry number `attempt` runs after
    /// `delay`.
    Retrying { attempt: u32, delay: Duration },
    /// The batch failed after the last retry and was discarded.
    Dropped(usize),
}

/// Buffers analytics events and delivers them in batches.
///
/// A flush happens when the buffer reaches `batch_size` events, or
/// `flush_debounce_ms` after the last tracked event, whichever comes first.
/// Only one flush sends at a time. A failed batch is put back at the front of
/// the buffer and retried after `retry_base_delay_ms * n` for the `n`th
/// consecutive failure, until `max_retries` is exceeded and the batch is
/// dropped.
///
/// ```rust,no_run
/// use gazette::Options;
/// use gazette::analytics::{Dispatcher, HttpTransport, Session, StaticKey};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> gazette::Result<()> {
/// let transport = HttpTransport::new("https://db.example.com", StaticKey::new("anon"))?;
/// let dispatcher = Dispatcher::new(transport, Options::default())?;
///
/// let session = Session::new(None);
/// dispatcher.track(session.event("page_view").text("page", "/", 200).build());
/// dispatcher.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

#[derive(derive_more::Debug)]
struct Inner {
    transport: Arc<dyn Transport>,
    options: Options,
    #[debug(ignore)]
    runtime: Handle,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    buffer: EventBuffer,
    debounce: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
    retry_count: u32,
    in_flight: bool,
    /// A flush was requested while another was sending.
    pending: bool,
}

impl Dispatcher {
    /// A dispatcher on the current tokio runtime.
    pub fn new<T: Transport + 'static>(transport: T, options: Options) -> Result<Self> {
        Self::with_transport(Arc::new(transport), options)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, options: Options) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(Error::from_std)
            .chain(error!("analytics dispatcher must be created inside a tokio runtime"))?;

        Ok(Self::with_handle(transport, options, runtime))
    }

    /// A dispatcher whose timers and background flushes run on `runtime`.
    pub fn with_handle(transport: Arc<dyn Transport>, options: Options, runtime: Handle) -> Self {
        let state = State {
            buffer: EventBuffer::new(options.max_buffer_size),
            debounce: None,
            retry: None,
            retry_count: 0,
            in_flight: false,
            pending: false,
        };

        Dispatcher {
            inner: Arc::new(Inner { transport, options, runtime, state: Mutex::new(state) })
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// Buffers `event`, then either starts a flush, if the buffer holds a
    /// full batch, or restarts the debounce timer.
    pub fn track(&self, event: AnalyticsEvent) {
        tracing::trace!(event = %event.event_type, "tracking analytics event");
        let mut state = self.inner.state.lock();
        state.buffer.push(event);
        if state.buffer.len() >= self.inner.options.batch_size {
            if let Some(timer) = state.debounce.take() {
                timer.abort();
            }

            drop(state);
            self.spawn_flush();
        } else {
            let timer = self.flush_after(self.inner.options.flush_debounce());
            if let Some(previous) = state.debounce.replace(timer) {
                previous.abort();
            }
        }
    }

    /// Sends everything buffered as one batch. Taking the buffer cancels the
    /// debounce timer.
    pub async fn flush(&self) -> FlushOutcome {
        let events = {
            let mut state = self.inner.state.lock();
            if state.in_flight {
                state.pending = true;
                return FlushOutcome::InFlight;
            }

            if state.buffer.is_empty() {
                return FlushOutcome::Empty;
            }

            if let Some(timer) = state.debounce.take() {
                timer.abort();
            }

            state.in_flight = true;
            state.buffer.take_all()
        };

        let batch = Batch::new(events);
        let result = self.inner.transport.send(&batch).await;

        let (outcome, again) = {
            let mut state = self.inner.state.lock();
            state.in_flight = false;
            self.settle(&mut state, batch, result)
        };

        if again {
            self.spawn_flush();
        }

        outcome
    }

    /// Records the result of sending `batch`. Returns the outcome and whether
    /// another flush should follow.
    fn settle(&self, state: &mut State, batch: Batch, result: Result<()>) -> (FlushOutcome, bool) {
        let size = batch.batch_size;
        let max_retries = self.inner.options.max_retries;
        match result {
            Ok(()) => {
                tracing::debug!(events = size, "analytics batch sent");
                state.retry_count = 0;
                if let Some(timer) = state.retry.take() {
                    timer.abort();
                }

                let again = std::mem::take(&mut state.pending) && !state.buffer.is_empty();
                (FlushOutcome::Sent(size), again)
            }
            Err(e) if state.retry_count < max_retries => {
                state.retry_count += 1;
                let attempt = state.retry_count;
                let delay = self.inner.options.retry_delay(attempt);
                tracing::warn!(
                    error = %e.message(),
                    events = size,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "failed to send analytics batch, retrying"
                );

                state.buffer.requeue_front(batch.into_events());
                state.pending = false;
                let timer = self.flush_after(delay);
                if let Some(previous) = state.retry.replace(timer) {
                    previous.abort();
                }

                (FlushOutcome::Retrying { attempt, delay }, false)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e.message(),
                    events = size,
                    max_retries,
                    "max retries reached, dropping analytics batch"
                );

                state.retry_count = 0;
                let again = std::mem::take(&mut state.pending) && !state.buffer.is_empty();
                (FlushOutcome::Dropped(size), again)
            }
        }
    }

    /// Cancels pending timers and makes one last attempt to send whatever is
    /// buffered.
    pub async fn shutdown(&self) -> FlushOutcome {
        {
            let mut state = self.inner.state.lock();
            let timers = state.debounce.take().into_iter().chain(state.retry.take());
            timers.for_each(|timer| timer.abort());
        }

        self.flush().await
    }

    /// The number of buffered events.
    pub fn buffered(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// The number of consecutive failed sends of the current batch.
    pub fn retry_count(&self) -> u32 {
        self.inner.state.lock().retry_count
    }

    /// A copy of the buffered events, oldest first.
    pub fn snapshot(&self) -> Vec<AnalyticsEvent> {
        self.inner.state.lock().buffer.iter().cloned().collect()
    }

    fn spawn_flush(&self) {
        let dispatcher = self.clone();
        self.inner.runtime.spawn(async move {
            dispatcher.flush().await;
        });
    }

    /// Starts a timer that spawns a flush after `delay`. Aborting the timer
    /// never interrupts a flush it already started.
    fn flush_after(&self, delay: Duration) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                Dispatcher { inner }.spawn_flush();
            }
        })
    }
}
