//! Typed publish/subscribe used by the physics world and the animation runtime.
//!
//! Handlers run synchronously inside `publish`, in subscription order. A handler
//! that returns an error or panics is reported on the bus error channel and the
//! remaining handlers still run. Published events are also queued until the
//! host drains them.

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;

/// Capacity of the handler error channel; further reports are dropped and logged.
const ERROR_CHANNEL_CAPACITY: usize = 64;

/// An event with a stable wire name.
///
/// The serialized form is a flat record `{"event": <name>, ...fields}`.
pub trait NamedEvent: Serialize {
    fn name(&self) -> &'static str;

    fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Handler callback. Returning `Err` reports the failure without stopping other handlers.
pub type EventHandler<E> = Box<dyn FnMut(&E) -> anyhow::Result<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

/// Failure raised by a single handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler {subscription:?} failed on `{event}`: {error:#}")]
    Failed {
        event: &'static str,
        subscription: SubscriptionId,
        error: anyhow::Error,
    },
    #[error("handler {subscription:?} panicked on `{event}`: {message}")]
    Panicked {
        event: &'static str,
        subscription: SubscriptionId,
        message: String,
    },
}

pub struct EventBus<E> {
    handlers: Vec<(SubscriptionId, EventHandler<E>)>,
    next_id: u32,
    pending: Vec<E>,
    retain: bool,
    error_tx: Sender<HandlerError>,
    error_rx: Receiver<HandlerError>,
}

impl<E: NamedEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: NamedEvent> EventBus<E> {
    pub fn new() -> Self {
        let (error_tx, error_rx) = crossbeam_channel::bounded(ERROR_CHANNEL_CAPACITY);
        Self {
            handlers: Vec::new(),
            next_id: 1,
            pending: Vec::new(),
            retain: true,
            error_tx,
            error_rx,
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) -> anyhow::Result<()> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _)| *sub != id);
        self.handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Keep published events for [`EventBus::drain`]. On by default.
    pub fn set_retain(&mut self, retain: bool) {
        self.retain = retain;
        if !retain {
            self.pending.clear();
        }
    }

    pub fn publish(&mut self, event: E) {
        let name = event.name();
        for (subscription, handler) in self.handlers.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            let report = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => HandlerError::Failed {
                    event: name,
                    subscription: *subscription,
                    error,
                },
                Err(payload) => HandlerError::Panicked {
                    event: name,
                    subscription: *subscription,
                    message: panic_message(payload.as_ref()),
                },
            };
            log::error!("{report}");
            if let Err(TrySendError::Full(dropped)) = self.error_tx.try_send(report) {
                log::warn!("event error channel full, dropping: {dropped}");
            }
        }

        if self.retain {
            self.pending.push(event);
        }
    }

    /// Take every event published since the last drain.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    /// Receiving end of the handler error channel.
    pub fn errors(&self) -> Receiver<HandlerError> {
        self.error_rx.clone()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
