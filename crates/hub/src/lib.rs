// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub with per-subscriber bounded queues.
//!
//! Supervisors and the orchestrator publish into a single ingress channel; a
//! lone dispatcher task assigns sequence numbers and fans out to
//! subscribers. Slow consumers lose their oldest events (reported through a
//! coalesced `hub.overflow`), never the dispatcher's time. The subscriber
//! registry lock is held only for register/unregister/update — dispatch
//! walks a snapshot.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod queue;

use parking_lot::Mutex;
use queue::SubscriberQueue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_core::{Channel, Clock, Envelope, Event, ServerName, SubscriptionId};
use tracing::debug;

/// Default bound for each subscriber's queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hub construction knobs.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Ingress channel bound shared by all publishers
    pub ingress_capacity: usize,
    /// Default per-subscriber queue bound
    pub queue_capacity: usize,
    pub heartbeat_interval: std::time::Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: 1024,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            heartbeat_interval: std::time::Duration::from_secs(30),
        }
    }
}

/// Per-subscription delivery rules.
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    pub channels: HashSet<Channel>,
    /// When set, only events about these servers are delivered
    pub filter: Option<HashSet<ServerName>>,
    /// Queue bound override; `None` uses the hub default
    pub capacity: Option<usize>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            channels: HashSet::from([Channel::Servers, Channel::Health]),
            filter: None,
            capacity: None,
        }
    }
}

struct SubscriberEntry {
    channels: Mutex<HashSet<Channel>>,
    filter: Option<HashSet<ServerName>>,
    queue: Arc<SubscriberQueue>,
}

impl SubscriberEntry {
    fn wants(&self, event: &Event) -> bool {
        if let Some(channel) = event.channel() {
            if !self.channels.lock().contains(&channel) {
                return false;
            }
        }
        if let (Some(filter), Some(name)) = (&self.filter, event.server_name()) {
            if !filter.contains(name) {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct Registry {
    subscribers: Mutex<HashMap<SubscriptionId, Arc<SubscriberEntry>>>,
}

/// Handle for publishing into and subscribing to the hub.
#[derive(Clone)]
pub struct EventHub {
    ingress: mpsc::Sender<Event>,
    registry: Arc<Registry>,
    default_capacity: usize,
}

impl EventHub {
    /// Spawn the dispatcher task; the hub stops when `cancel` fires or
    /// every publisher handle is dropped.
    pub fn spawn<C: Clock>(
        config: HubConfig,
        clock: C,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (ingress_tx, ingress_rx) = mpsc::channel(config.ingress_capacity);
        let registry = Arc::new(Registry::default());
        let hub = Self {
            ingress: ingress_tx,
            registry: Arc::clone(&registry),
            default_capacity: config.queue_capacity,
        };
        let heartbeat = config.heartbeat_interval;
        let task = tokio::spawn(dispatch_loop(ingress_rx, registry, clock, heartbeat, cancel));
        (hub, task)
    }

    /// Publish, waiting for ingress space. Orchestrator-side relay.
    pub async fn publish(&self, event: Event) -> bool {
        self.ingress.send(event).await.is_ok()
    }

    /// Publish without waiting. Supervisor-side emission (never blocks the
    /// runner); `false` means the ingress was saturated or closed.
    pub fn try_publish(&self, event: Event) -> bool {
        self.ingress.try_send(event).is_ok()
    }

    /// Register a subscription and return its receiving handle.
    pub fn subscribe(&self, options: SubscribeOptions) -> Subscriber {
        let id = SubscriptionId::new();
        let queue = SubscriberQueue::new(options.capacity.unwrap_or(self.default_capacity));
        let entry = Arc::new(SubscriberEntry {
            channels: Mutex::new(options.channels),
            filter: options.filter,
            queue: Arc::clone(&queue),
        });
        self.registry.subscribers.lock().insert(id.clone(), entry);
        debug!(subscription = %id, "hub subscription registered");
        Subscriber { id, queue, registry: Arc::clone(&self.registry) }
    }

    /// Replace a subscription's channel set (the SUBSCRIBE frame).
    pub fn set_channels(&self, id: &SubscriptionId, channels: HashSet<Channel>) -> bool {
        let subscribers = self.registry.subscribers.lock();
        match subscribers.get(id.as_str()) {
            Some(entry) => {
                *entry.channels.lock() = channels;
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }
}

/// Receiving side of one subscription.
pub struct Subscriber {
    id: SubscriptionId,
    queue: Arc<SubscriberQueue>,
    registry: Arc<Registry>,
}

impl Subscriber {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Next envelope in `seq` order; `None` after unsubscribe/shutdown.
    pub async fn recv(&self) -> Option<Envelope> {
        self.queue.recv().await
    }

    /// Non-blocking receive, for drains and tests.
    pub fn try_recv(&self) -> Option<Envelope> {
        self.queue.try_recv()
    }

    /// Events dropped from this subscription's queue so far.
    pub fn dropped_total(&self) -> u64 {
        self.queue.dropped_total()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.registry.subscribers.lock().remove(self.id.as_str());
        self.queue.close();
    }
}

async fn dispatch_loop<C: Clock>(
    mut ingress: mpsc::Receiver<Event>,
    registry: Arc<Registry>,
    clock: C,
    heartbeat_interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut next_seq: u64 = 0;
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // the first tick completes immediately; swallow it
    heartbeat.tick().await;

    loop {
        let event = tokio::select! {
            maybe = ingress.recv() => match maybe {
                Some(event) => event,
                None => break,
            },
            _ = heartbeat.tick() => Event::Heartbeat { at: clock.epoch_ms() },
            _ = cancel.cancelled() => break,
        };
        fan_out(&registry, &mut next_seq, event);
    }

    // Wake pending receivers so gateway writers observe shutdown.
    let subscribers: Vec<_> = registry.subscribers.lock().values().cloned().collect();
    for entry in subscribers {
        entry.queue.close();
    }
}

fn fan_out(registry: &Registry, next_seq: &mut u64, event: Event) {
    *next_seq += 1;
    let envelope = Envelope { seq: *next_seq, event };

    // Snapshot under the lock; deliver outside it.
    let subscribers: Vec<_> = registry.subscribers.lock().values().cloned().collect();
    let mut reserve = || {
        *next_seq += 1;
        *next_seq
    };
    for entry in subscribers {
        if entry.wants(&envelope.event) {
            entry.queue.push(envelope.clone(), &mut reserve);
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
