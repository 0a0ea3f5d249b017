// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Seams to the outside world: time, responder matching, message
//! delivery and timeout scheduling. None of these are called while a
//! ledger or session lock is held.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{ResponderId, SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock. Not available on wasm32, where JS supplies time through a
/// [`ManualClock`].
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp(secs)
    }
}

/// Externally driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { secs: AtomicU64::new(start.0) }
    }

    pub fn set(&self, t: Timestamp) {
        self.secs.store(t.0, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) -> Timestamp {
        Timestamp(self.secs.fetch_add(secs, Ordering::SeqCst) + secs)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// A responder's preview answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderAnswer {
    pub responder: ResponderId,
    pub preview: String,
}

impl ResponderAnswer {
    pub fn new(responder: impl Into<ResponderId>, preview: impl Into<String>) -> Self {
        Self {
            responder: responder.into(),
            preview: preview.into(),
        }
    }
}

/// Produces candidate responders for a question.
pub trait ResponderMatcher: Send + Sync {
    fn candidates(&self, question: &str) -> Vec<ResponderAnswer>;
}

/// Fixed candidate list, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticMatcher {
    pub answers: Vec<ResponderAnswer>,
}

impl ResponderMatcher for StaticMatcher {
    fn candidates(&self, _question: &str) -> Vec<ResponderAnswer> {
        self.answers.clone()
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

pub trait MessageTransport: Send + Sync {
    fn deliver(&self, session: SessionId, responder: Option<&ResponderId>, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl MessageTransport for NullTransport {
    fn deliver(&self, session: SessionId, responder: Option<&ResponderId>, _message: &str) {
        tracing::trace!(%session, ?responder, "message dropped by null transport");
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// External timer service. When a deadline fires, the owner calls
/// [`Economy::timeout`](crate::economy::Economy::timeout).
pub trait TimeoutScheduler: Send + Sync {
    fn schedule(&self, session: SessionId, deadline: Timestamp);
    fn cancel(&self, session: SessionId);
}

/// For deployments that rely on [`Economy::expire_overdue`](crate::economy::Economy::expire_overdue) sweeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepOnlyScheduler;

impl TimeoutScheduler for SweepOnlyScheduler {
    fn schedule(&self, _session: SessionId, _deadline: Timestamp) {}
    fn cancel(&self, _session: SessionId) {}
}
