//! In-process publish/subscribe bus keyed by topic name.
//!
//! Delivery is synchronous, in registration order, on the publishing task.
//! The bus holds no history and applies no back-pressure: subscribers only
//! see payloads published while they are registered, and a failing handler
//! never blocks delivery to the rest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Topic carrying raw inbound webhook payloads.
pub const TOPIC_INBOUND: &str = "inbound";

/// Topic carrying command outcomes for push subscribers.
pub const TOPIC_OUTBOUND: &str = "outbound";

/// Subscriber callback. A returned `Err` is logged and delivery continues
/// with the remaining subscribers.
pub type Handler = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// Identifies one subscription for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

struct Subscriber {
    token: SubscriptionToken,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_token: u64,
    topics: HashMap<String, Vec<Subscriber>>,
}

/// Clonable handle to the shared topic registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every subscriber currently on `topic`, in
    /// registration order. The subscriber list is snapshotted up front, so
    /// handlers registered during delivery do not receive this payload.
    /// Publishing to a topic nobody listens on is a silent no-op.
    pub fn publish(&self, topic: &str, payload: &str) {
        let handlers: Vec<(SubscriptionToken, Handler)> = {
            let registry = self.registry.lock().unwrap();
            match registry.topics.get(topic) {
                Some(subs) => subs
                    .iter()
                    .map(|s| (s.token, Arc::clone(&s.handler)))
                    .collect(),
                None => return,
            }
        };
        for (token, handler) in handlers {
            if let Err(e) = handler(payload) {
                warn!(topic, token = token.0, "subscriber failed: {e:#}");
            }
        }
    }

    /// Register `handler` on `topic`. Returns a token for [`unsubscribe`].
    ///
    /// [`unsubscribe`]: EventBus::unsubscribe
    pub fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionToken {
        self.add(topic, handler, false)
    }

    /// Register `handler` after removing every existing subscriber of
    /// `topic`. The outbound push channel uses this so exactly one observer
    /// connection consumes command outcomes at a time, even when a previous
    /// connection's teardown never arrived.
    pub fn subscribe_replacing(&self, topic: &str, handler: Handler) -> SubscriptionToken {
        self.add(topic, handler, true)
    }

    fn add(&self, topic: &str, handler: Handler, replace: bool) -> SubscriptionToken {
        let mut registry = self.registry.lock().unwrap();
        registry.next_token += 1;
        let token = SubscriptionToken(registry.next_token);
        let subs = registry.topics.entry(topic.to_string()).or_default();
        if replace && !subs.is_empty() {
            debug!(topic, dropped = subs.len(), "replacing existing subscribers");
            subs.clear();
        }
        subs.push(Subscriber { token, handler });
        token
    }

    /// Remove a subscription. Unknown tokens are ignored.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        let mut registry = self.registry.lock().unwrap();
        for subs in registry.topics.values_mut() {
            subs.retain(|s| s.token != token);
        }
    }
}
