// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slow consumer: a subscriber that stops draining keeps only the newest
//! events and learns how many it lost.

use super::prelude::*;
use std::collections::HashSet;
use tower_core::{Channel, LogStream};

#[tokio::test]
async fn overflow_is_counted_and_coalesced() {
    let cancel = CancellationToken::new();
    let (hub, _task) = EventHub::spawn(HubConfig::default(), SystemClock, cancel.child_token());

    let subscriber = hub.subscribe(SubscribeOptions {
        channels: HashSet::from([Channel::Logs]),
        filter: None,
        capacity: Some(4),
    });

    for i in 0..20 {
        hub.publish(Event::Log {
            name: server_name("chatty"),
            stream: LogStream::Stdout,
            message: format!("line {i}"),
            at: i,
        })
        .await;
    }

    // Wait for the dispatcher to drain the ingress.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while subscriber.dropped_total() < 16 {
        assert!(tokio::time::Instant::now() < deadline, "drops never reached 16");
        tokio::task::yield_now().await;
    }

    // The subscriber finally drains: exactly 4 delivered events plus one
    // hub.overflow with droppedCount 16, in strictly increasing seq order.
    let mut delivered = Vec::new();
    while let Some(envelope) = subscriber.try_recv() {
        delivered.push(envelope);
    }
    assert_eq!(delivered.len(), 5);
    assert!(delivered.windows(2).all(|w| w[0].seq < w[1].seq));

    let logs: Vec<&str> = delivered[..4]
        .iter()
        .filter_map(|e| match &e.event {
            Event::Log { message, .. } => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(logs, vec!["line 16", "line 17", "line 18", "line 19"]);

    match &delivered[4].event {
        Event::Overflow { dropped_count, .. } => assert_eq!(*dropped_count, 16),
        other => panic!("expected hub.overflow, got {other:?}"),
    }

    cancel.cancel();
}
