// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Routes inbound panel messages to waiting callers and persistent subscribers

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, trace, warn};

use crate::error::{ParadoxError, Result};
use crate::family::Message;

/// Which inbound message completes a pending request.
#[derive(Clone)]
pub enum ReplyExpected {
    /// Any message whose command nibble is in the list.
    Commands(&'static [u8]),
    Predicate(Arc<dyn Fn(&Message) -> bool + Send + Sync>),
}

impl std::fmt::Debug for ReplyExpected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commands(c) => f.debug_tuple("Commands").field(c).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl ReplyExpected {
    pub fn predicate(f: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Panel error messages answer every pending request.
    pub fn matches(&self, msg: &Message) -> bool {
        if msg.is_error() {
            return true;
        }
        match self {
            Self::Commands(commands) => commands.contains(&msg.command),
            Self::Predicate(f) => f(msg),
        }
    }
}

pub type HandlerId = u64;

struct FutureHandler {
    id: HandlerId,
    expected: ReplyExpected,
    tx: oneshot::Sender<Message>,
}

struct PersistentHandler {
    id: HandlerId,
    name: &'static str,
    filter: fn(&Message) -> bool,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct Handlers {
    next_id: HandlerId,
    futures: Vec<FutureHandler>,
    persistent: Vec<PersistentHandler>,
    raw: Vec<(HandlerId, mpsc::UnboundedSender<Vec<u8>>)>,
    ignore_if_no_handlers: bool,
}

impl Handlers {
    fn next_id(&mut self) -> HandlerId {
        self.next_id += 1;
        self.next_id
    }
}

/// Registry shared by the inbound dispatcher and every caller.
///
/// One-shot handlers complete a `send_wait`; persistent handlers receive
/// every matching message (live events, panel errors); raw handlers receive
/// every frame before decoding.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<Mutex<Handlers>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress the "no handler" diagnostic (pass-through mode).
    pub async fn set_ignore_if_no_handlers(&self, ignore: bool) {
        self.inner.lock().await.ignore_if_no_handlers = ignore;
    }

    /// Register a one-shot handler; the receiver completes with the first match.
    pub async fn register_future(&self, expected: ReplyExpected) -> (HandlerId, oneshot::Receiver<Message>) {
        let (tx, rx) = oneshot::channel();
        let mut handlers = self.inner.lock().await;
        let id = handlers.next_id();
        handlers.futures.push(FutureHandler { id, expected, tx });
        (id, rx)
    }

    pub async fn register_persistent(
        &self,
        name: &'static str,
        filter: fn(&Message) -> bool,
    ) -> (HandlerId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handlers = self.inner.lock().await;
        let id = handlers.next_id();
        handlers.persistent.push(PersistentHandler { id, name, filter, tx });
        (id, rx)
    }

    pub async fn register_raw(&self) -> (HandlerId, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handlers = self.inner.lock().await;
        let id = handlers.next_id();
        handlers.raw.push((id, tx));
        (id, rx)
    }

    /// Remove a handler of any kind.
    pub async fn remove(&self, id: HandlerId) {
        let mut handlers = self.inner.lock().await;
        handlers.futures.retain(|h| h.id != id);
        handlers.persistent.retain(|h| h.id != id);
        handlers.raw.retain(|(h, _)| *h != id);
    }

    /// Register a one-shot handler and wait for it; the handler is gone afterwards either way.
    pub async fn wait_until_complete(&self, expected: ReplyExpected, wait: Duration) -> Result<Message> {
        let (id, rx) = self.register_future(expected.clone()).await;
        match timeout(wait, rx).await {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(_)) => {
                self.remove(id).await;
                Err(ParadoxError::ChannelClosed)
            }
            Err(_) => {
                self.remove(id).await;
                Err(ParadoxError::Timeout {
                    request: format!("{:?}", expected),
                })
            }
        }
    }

    /// Hand one decoded message to every matching handler.
    ///
    /// Returns how many handlers took it.
    pub async fn dispatch(&self, msg: &Message) -> usize {
        let mut handlers = self.inner.lock().await;
        let mut handled = 0;

        let (matched, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut handlers.futures)
            .into_iter()
            .partition(|h| h.expected.matches(msg));
        handlers.futures = pending;
        for handler in matched {
            if handler.tx.send(msg.clone()).is_ok() {
                handled += 1;
            } else {
                debug!("{}: {} dropped", ParadoxError::AlreadyHandled, msg.name());
            }
        }

        handlers.persistent.retain(|h| {
            if !(h.filter)(msg) {
                return true;
            }
            match h.tx.send(msg.clone()) {
                Ok(()) => {
                    handled += 1;
                    true
                }
                Err(_) => {
                    trace!("Persistent handler {} closed", h.name);
                    false
                }
            }
        });

        if handled == 0 && !handlers.ignore_if_no_handlers {
            warn!("No handler for message {}: {:?}", msg.name(), msg.body);
        }
        handled
    }

    /// Hand one undecoded frame to every raw handler.
    pub async fn dispatch_raw(&self, frame: &[u8]) {
        let mut handlers = self.inner.lock().await;
        handlers.raw.retain(|(_, tx)| tx.send(frame.to_vec()).is_ok());
    }

    /// Fail every pending one-shot handler (transport closed).
    pub async fn cancel_pending(&self) {
        let mut handlers = self.inner.lock().await;
        let dropped = handlers.futures.len();
        handlers.futures.clear();
        if dropped > 0 {
            debug!("Cancelled {} pending handler(s)", dropped);
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.futures.len()
    }
}
