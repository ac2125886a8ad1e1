//! Remote request channel: GETs against the help server where a newer request
//! on the same named channel supersedes the previous one.
//!
//! Failures never reach callers as errors. A non-200 answer, a transport error
//! or a superseded request all resolve to `None`, leaving the UI in its prior
//! state.
use crate::{config::ViewerConfig, error::HelpError};
use futures::future::{abortable, AbortHandle, Aborted};
use parking_lot::Mutex;
use std::{collections::HashMap, future::Future, rc::Rc, sync::Arc};
use url::Url;

/// Channel used by the type-ahead pipeline.
pub const TYPE_AHEAD_CHANNEL: &str = "t";
/// Channel used by the full-search pipeline.
pub const FULL_SEARCH_CHANNEL: &str = "f";

/// Transport seam. Implementations must answer `Err(HelpError::Status(_))`
/// for any response other than 200.
pub trait Fetcher {
    fn get(&self, url: Url) -> impl Future<Output = Result<String, HelpError>>;
}

impl<T: Fetcher> Fetcher for Rc<T> {
    fn get(&self, url: Url) -> impl Future<Output = Result<String, HelpError>> {
        self.as_ref().get(url)
    }
}

impl<T: Fetcher> Fetcher for Arc<T> {
    fn get(&self, url: Url) -> impl Future<Output = Result<String, HelpError>> {
        self.as_ref().get(url)
    }
}

/// reqwest-backed transport. On wasm32 reqwest delegates to the browser's
/// `fetch`, so the same type serves both targets.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher {
            client: reqwest::Client::new(),
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn get(&self, url: Url) -> Result<String, HelpError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(HelpError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Identity of one request on a channel. Only the ticket carrying the
/// channel's latest generation is current.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub channel: String,
    pub generation: u64,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    abort: Option<AbortHandle>,
}

pub struct RequestChannels<F> {
    fetcher: F,
    base: Url,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<F: Fetcher> RequestChannels<F> {
    pub fn new(fetcher: F, config: &ViewerConfig) -> Result<Self, HelpError> {
        Ok(RequestChannels {
            fetcher,
            base: config.base()?,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Issue a GET for `relative` (resolved against the base url). With a
    /// channel, any request still pending on that channel is aborted first.
    pub async fn request(&self, relative: &str, channel: Option<&str>) -> Option<String> {
        let url = match self.base.join(relative) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("[Channel] Cannot resolve '{}': {}", relative, e);
                return None;
            }
        };
        let Some(channel) = channel else {
            return Self::settle(self.fetcher.get(url).await, relative);
        };

        let (fut, handle) = abortable(self.fetcher.get(url));
        let ticket = self.begin(channel, handle);
        tracing::debug!(
            "[Channel] '{}' gen {} -> {}",
            ticket.channel,
            ticket.generation,
            relative
        );
        let outcome = fut.await;
        let current = self.finish(&ticket);
        match outcome {
            Err(Aborted) => {
                tracing::debug!(
                    "[Channel] '{}' gen {} aborted",
                    ticket.channel,
                    ticket.generation
                );
                None
            }
            Ok(_) if !current => {
                tracing::debug!(
                    "[Channel] '{}' gen {} superseded, dropping response",
                    ticket.channel,
                    ticket.generation
                );
                None
            }
            Ok(result) => Self::settle(result, relative),
        }
    }

    /// Whether a request is still outstanding on `channel`.
    pub fn is_pending(&self, channel: &str) -> bool {
        self.slots
            .lock()
            .get(channel)
            .map(|slot| slot.abort.is_some())
            .unwrap_or(false)
    }

    /// Abort whatever is pending on `channel` without issuing a new request.
    pub fn cancel(&self, channel: &str) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(channel) {
            slot.generation += 1;
            if let Some(handle) = slot.abort.take() {
                handle.abort();
            }
        }
    }

    fn begin(&self, channel: &str, handle: AbortHandle) -> RequestTicket {
        let mut slots = self.slots.lock();
        let slot = slots.entry(channel.to_string()).or_default();
        if let Some(previous) = slot.abort.replace(handle) {
            previous.abort();
        }
        slot.generation += 1;
        RequestTicket {
            channel: channel.to_string(),
            generation: slot.generation,
        }
    }

    fn finish(&self, ticket: &RequestTicket) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&ticket.channel) {
            Some(slot) if slot.generation == ticket.generation => {
                slot.abort = None;
                true
            }
            _ => false,
        }
    }

    fn settle(result: Result<String, HelpError>, relative: &str) -> Option<String> {
        match result {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!("[Channel] Dropping response for '{}': {}", relative, e);
                None
            }
        }
    }
}
