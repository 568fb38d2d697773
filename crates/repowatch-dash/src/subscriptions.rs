//! Outbound half of the watcher protocol: which repositories the user
//! is subscribed to, and the subscribe/unsubscribe requests that
//! declare or withdraw that interest.

use repowatch_core::wire::{encode_request, ClientRequest};
use repowatch_core::WatchInterval;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("the interval must be numeric and at most 999")]
    InvalidInterval,
    #[error("the repository can't be empty")]
    EmptyRepository,
}

/// Owns the subscription set and the outbound request channel.
///
/// Requests are fire-and-forget: a send that fails or gets dropped is
/// not retried here, the transport layer owns reconnection. The sender
/// is injected so tests can drive the manager with a plain channel.
pub struct SubscriptionManager {
    subscriptions: HashMap<String, WatchInterval>,
    outbound: mpsc::Sender<String>,
}

impl SubscriptionManager {
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            subscriptions: HashMap::new(),
            outbound,
        }
    }

    /// Validates and emits a subscribe request.
    ///
    /// The interval must be 1-3 decimal digits; the repository must be
    /// non-empty after trimming. Validation failures never reach the
    /// wire. Subscribing to an already-subscribed repository at the
    /// same interval is a suppressed duplicate; at a different interval
    /// it re-emits the request as an interval change.
    pub fn request_subscribe(
        &mut self,
        repository: &str,
        interval: &str,
    ) -> Result<(), SubscribeError> {
        let interval: WatchInterval = interval
            .parse()
            .map_err(|_| SubscribeError::InvalidInterval)?;
        let repository = repository.trim();
        if repository.is_empty() {
            return Err(SubscribeError::EmptyRepository);
        }

        if self.subscriptions.get(repository) == Some(&interval) {
            debug!(event = "duplicate_subscribe", repository = repository);
            return Ok(());
        }

        self.send(&ClientRequest::Subscribe {
            repository: repository.to_string(),
            interval,
        });
        self.subscriptions.insert(repository.to_string(), interval);
        info!(
            event = "subscribe_requested",
            repository = repository,
            interval = %interval
        );
        Ok(())
    }

    /// Emits an unsubscribe request and forgets the key.
    ///
    /// No validation: the UI only offers unsubscribe on rows that
    /// exist. Local row removal is the caller's job and happens
    /// immediately, without waiting for the watcher.
    pub fn request_unsubscribe(&mut self, repository: &str) {
        self.subscriptions.remove(repository);
        self.send(&ClientRequest::Unsubscribe {
            repository: repository.to_string(),
        });
        info!(event = "unsubscribe_requested", repository = repository);
    }

    pub fn is_subscribed(&self, repository: &str) -> bool {
        self.subscriptions.contains_key(repository)
    }

    pub fn interval_for(&self, repository: &str) -> Option<WatchInterval> {
        self.subscriptions.get(repository).copied()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Connection-loss reset: every key back to unsubscribed.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    fn send(&self, request: &ClientRequest) {
        let frame = match encode_request(request) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(event = "request_encode_error", error = %err);
                return;
            }
        };
        if let Err(err) = self.outbound.try_send(frame) {
            warn!(event = "request_dropped", error = %err);
        }
    }
}
