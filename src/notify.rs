// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Events pushed to the presentation layer.
//!
//! Only upgrades are announced; a tier drop (trades aging out of the
//! window, or a lazy recompute on read) changes state without an event.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::tier::Tier;
use crate::types::{Energy, SessionId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    LevelUp {
        user: UserId,
        from: Tier,
        to: Tier,
    },
    Refund {
        user: UserId,
        session: SessionId,
        amount: Energy,
    },
    RoundsExhausted {
        user: UserId,
        session: SessionId,
        max_rounds: u32,
    },
}

/// Delivery transport. Called only after every ledger and session lock
/// has been released.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs each event and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(?notification, "notification");
    }
}

/// Buffers events until drained; used by tests and the wasm facade.
#[derive(Debug, Default)]
pub struct BufferedSink {
    events: Mutex<Vec<Notification>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl NotificationSink for BufferedSink {
    fn notify(&self, notification: Notification) {
        self.events.lock().push(notification);
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_sink_drains_in_order() {
        let sink = BufferedSink::new();
        sink.notify(Notification::LevelUp {
            user: UserId::from("u"),
            from: Tier::Bronze,
            to: Tier::Silver,
        });
        sink.notify(Notification::Refund {
            user: UserId::from("u"),
            session: SessionId(1),
            amount: Energy::from_units(10),
        });
        assert_eq!(sink.len(), 2);
        let drained = sink.drain();
        assert!(matches!(drained[0], Notification::LevelUp { .. }));
        assert!(matches!(drained[1], Notification::Refund { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn serializes_with_type_tag() {
        let n = Notification::RoundsExhausted {
            user: UserId::from("u"),
            session: SessionId(3),
            max_rounds: 10,
        };
        let json = serde_json::to_value(&n).expect("test: serialize");
        assert_eq!(json["type"], "rounds_exhausted");
        assert_eq!(json["max_rounds"], 10);
    }
}
