// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Consultation session state machine.
//!
//! ```text
//! idle -> asking -> waiting -> selecting -> chatting <-> rounds_exhausted
//!           |  ^                  |            |
//!           |  +----- skip -------+            v
//!           +----- responder hint -------> chatting -> rating -> completed
//!
//! waiting | chatting | rounds_exhausted  -> timed_out   (unlock)
//! any pre-rating phase                   -> cancelled   (unlock)
//! ```
//!
//! This module only moves phases and counters. Ledger effects (lock on
//! submit, spend on completion, unlock on skip/cancel/timeout) are applied
//! by [`Economy`](crate::economy::Economy) inside the same critical section.
//! Operations on a terminal session are reported as [`Gate::Stale`] rather
//! than as errors, so duplicate deliveries are harmless.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collaborators::ResponderAnswer;
use crate::config::SessionPolicy;
use crate::ledger::LedgerError;
use crate::tier::{SessionCapability, Tier};
use crate::types::{Energy, ResponderId, SessionId, Timestamp, UserId, VoucherId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("insufficient energy: requested {requested}, available {available}")]
    InsufficientEnergy { requested: Energy, available: Energy },

    #[error("invalid amount: {0}")]
    InvalidAmount(Energy),

    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("responder {responder} has not answered session {session}")]
    ResponderNotFound { session: SessionId, responder: ResponderId },

    #[error("cannot {action} session {session} while {phase}")]
    InvalidTransition {
        session: SessionId,
        phase: Phase,
        action: Action,
    },

    #[error("session {session} used all {max_rounds} rounds")]
    RoundsExhausted { session: SessionId, max_rounds: u32 },

    #[error("rating {0} outside 1..=5")]
    InvalidRating(u8),

    #[error("{0} has no unused trial voucher")]
    VoucherUnavailable(UserId),

    #[error("{tier} tier cannot open {capability} sessions")]
    CapabilityLocked { tier: Tier, capability: SessionCapability },

    #[error("question must not be empty")]
    EmptyQuestion,
}

impl From<LedgerError> for SessionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientEnergy { requested, available } => {
                SessionError::InsufficientEnergy { requested, available }
            }
            LedgerError::InvalidAmount(d) => SessionError::InvalidAmount(Energy(d)),
        }
    }
}

impl SessionError {
    pub fn is_insufficient_energy(&self) -> bool {
        matches!(self, SessionError::InsufficientEnergy { .. })
    }
}

// ---------------------------------------------------------------------------
// Phase / Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Drafted but not yet submitted; a session leaves it in the same call
    /// that created it unless payment fails.
    Idle,
    Asking,
    Waiting,
    Selecting,
    Chatting,
    /// Chatting with no rounds left; needs an extension or completion.
    RoundsExhausted,
    Rating,
    Completed,
    Cancelled,
    TimedOut,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::TimedOut)
    }

    pub fn is_chatting(&self) -> bool {
        matches!(self, Self::Chatting | Self::RoundsExhausted)
    }

    /// Whether a timeout signal may close a session in this phase.
    pub fn accepts_timeout(&self) -> bool {
        matches!(self, Self::Waiting | Self::Chatting | Self::RoundsExhausted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Asking => "asking",
            Self::Waiting => "waiting",
            Self::Selecting => "selecting",
            Self::Chatting => "chatting",
            Self::RoundsExhausted => "rounds exhausted",
            Self::Rating => "rating",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Submit,
    Answer,
    Select,
    Skip,
    Message,
    Extend,
    Finish,
    Rate,
    Timeout,
    Cancel,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submit => "submit",
            Self::Answer => "answer",
            Self::Select => "select a responder for",
            Self::Skip => "skip",
            Self::Message => "message",
            Self::Extend => "extend",
            Self::Finish => "finish",
            Self::Rate => "rate",
            Self::Timeout => "time out",
            Self::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Result of checking an action against the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    /// Session already terminal; treat the request as a duplicate.
    Stale,
}

/// What a caller observes from a transition that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Applied,
    /// Request arrived for a terminal session and was dropped.
    Stale,
    /// Request was valid but had nothing to do (e.g. select in direct mode).
    Ignored,
}

/// Effect of one responder answer on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// First answer; the session moved to `selecting`.
    Opened,
    Added,
    /// Repeat responder, or the session already chats.
    Ignored,
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChoice {
    #[default]
    Energy,
    Voucher,
}

/// How the session's base cost is covered. A voucher session never touches
/// the ledger for its base cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Energy,
    Voucher(VoucherId),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Presentation-layer request to open a consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user: UserId,
    pub question: String,
    pub cost: Energy,
    #[serde(default = "default_kind")]
    pub kind: SessionCapability,
    #[serde(default)]
    pub responder_hint: Option<ResponderId>,
    #[serde(default)]
    pub payment: PaymentChoice,
}

fn default_kind() -> SessionCapability {
    SessionCapability::ResearcherChat
}

impl SessionRequest {
    pub fn new(user: impl Into<UserId>, question: impl Into<String>, cost: Energy) -> Self {
        Self {
            user: user.into(),
            question: question.into(),
            cost,
            kind: default_kind(),
            responder_hint: None,
            payment: PaymentChoice::Energy,
        }
    }

    pub fn with_responder(mut self, responder: impl Into<ResponderId>) -> Self {
        self.responder_hint = Some(responder.into());
        self
    }

    pub fn with_voucher(mut self) -> Self {
        self.payment = PaymentChoice::Voucher;
        self
    }

    pub fn with_kind(mut self, kind: SessionCapability) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user: UserId,
    pub question: String,
    pub kind: SessionCapability,
    pub phase: Phase,
    pub payment: PaymentMethod,
    /// Base cost charged per submission.
    pub cost: Energy,
    /// Energy currently held in escrow for this session.
    pub locked_energy: Energy,
    pub candidates: Vec<ResponderAnswer>,
    pub selected_responder: Option<ResponderId>,
    pub rounds_used: u32,
    pub max_rounds: u32,
    pub extensions: u32,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    /// When the current phase times out, if it can.
    pub deadline: Option<Timestamp>,
    pub rating: Option<Rating>,
}

/// Round accounting after a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReceipt {
    pub rounds_used: u32,
    pub max_rounds: u32,
    /// This message consumed the last round.
    pub exhausted: bool,
}

impl Session {
    /// A new session in `asking`, before any energy moved.
    pub fn draft(id: SessionId, req: &SessionRequest, payment: PaymentMethod, policy: &SessionPolicy, now: Timestamp) -> Self {
        Self {
            id,
            user: req.user.clone(),
            question: req.question.clone(),
            kind: req.kind,
            phase: Phase::Idle,
            payment,
            cost: req.cost,
            locked_energy: Energy::ZERO,
            candidates: Vec::new(),
            selected_responder: req.responder_hint.clone(),
            rounds_used: 0,
            max_rounds: policy.default_max_rounds,
            extensions: 0,
            created_at: now,
            closed_at: None,
            deadline: None,
            rating: None,
        }
    }

    fn invalid(&self, action: Action) -> SessionError {
        SessionError::InvalidTransition {
            session: self.id,
            phase: self.phase,
            action,
        }
    }

    /// Phase check shared by every operation.
    pub fn gate(&self, action: Action) -> Result<Gate, SessionError> {
        if self.phase.is_terminal() {
            return Ok(Gate::Stale);
        }
        let ok = match action {
            Action::Submit => matches!(self.phase, Phase::Idle | Phase::Asking),
            Action::Answer => matches!(self.phase, Phase::Waiting | Phase::Selecting) || self.phase.is_chatting(),
            Action::Select => self.phase == Phase::Selecting || self.phase.is_chatting(),
            Action::Skip => self.phase == Phase::Selecting,
            Action::Message | Action::Extend | Action::Finish => self.phase.is_chatting(),
            Action::Rate => self.phase == Phase::Rating || self.phase.is_chatting(),
            Action::Timeout => self.phase.accepts_timeout(),
            Action::Cancel => matches!(
                self.phase,
                Phase::Idle | Phase::Asking | Phase::Waiting | Phase::Selecting
            ) || self.phase.is_chatting(),
        };
        if ok {
            Ok(Gate::Proceed)
        } else {
            Err(self.invalid(action))
        }
    }

    /// `asking -> waiting`, or straight to `chatting` when a responder was
    /// pre-selected. The caller has already secured `escrow`.
    pub fn submit(&mut self, escrow: Energy, policy: &SessionPolicy, now: Timestamp) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Idle | Phase::Asking) {
            return Err(self.invalid(Action::Submit));
        }
        self.locked_energy = escrow;
        if self.selected_responder.is_some() {
            self.enter_chat(policy, now);
        } else {
            self.phase = Phase::Waiting;
            self.deadline = Some(now.plus(policy.answer_timeout_secs));
        }
        Ok(())
    }

    fn enter_chat(&mut self, policy: &SessionPolicy, now: Timestamp) {
        self.phase = Phase::Chatting;
        self.rounds_used = 0;
        self.deadline = Some(now.plus(policy.chat_idle_timeout_secs));
    }

    /// Collect a responder's preview. Repeat answers from the same
    /// responder and late answers after a responder was chosen are ignored.
    pub fn record_answer(&mut self, answer: ResponderAnswer) -> Result<AnswerOutcome, SessionError> {
        match self.phase {
            Phase::Waiting | Phase::Selecting => {
                if self.candidates.iter().any(|c| c.responder == answer.responder) {
                    return Ok(AnswerOutcome::Ignored);
                }
                self.candidates.push(answer);
                if self.phase == Phase::Waiting {
                    self.phase = Phase::Selecting;
                    self.deadline = None;
                    return Ok(AnswerOutcome::Opened);
                }
                Ok(AnswerOutcome::Added)
            }
            p if p.is_chatting() => Ok(AnswerOutcome::Ignored),
            _ => Err(self.invalid(Action::Answer)),
        }
    }

    /// `selecting -> chatting`. In direct mode (already chatting) this is a
    /// no-op and returns `Transition::Ignored`.
    pub fn select(&mut self, responder: &ResponderId, policy: &SessionPolicy, now: Timestamp) -> Result<Transition, SessionError> {
        if self.phase.is_chatting() {
            return Ok(Transition::Ignored);
        }
        if self.phase != Phase::Selecting {
            return Err(self.invalid(Action::Select));
        }
        if !self.candidates.iter().any(|c| &c.responder == responder) {
            return Err(SessionError::ResponderNotFound {
                session: self.id,
                responder: responder.clone(),
            });
        }
        self.selected_responder = Some(responder.clone());
        self.enter_chat(policy, now);
        Ok(Transition::Applied)
    }

    /// `selecting -> asking`. Returns the escrow the caller must unlock.
    pub fn skip(&mut self) -> Result<Energy, SessionError> {
        if self.phase != Phase::Selecting {
            return Err(self.invalid(Action::Skip));
        }
        let refund = std::mem::take(&mut self.locked_energy);
        self.phase = Phase::Asking;
        self.candidates.clear();
        self.selected_responder = None;
        self.deadline = None;
        Ok(refund)
    }

    /// Count one user message.
    pub fn advance_round(&mut self, policy: &SessionPolicy, now: Timestamp) -> Result<RoundReceipt, SessionError> {
        match self.phase {
            Phase::Chatting => {}
            Phase::RoundsExhausted => {
                return Err(SessionError::RoundsExhausted {
                    session: self.id,
                    max_rounds: self.max_rounds,
                })
            }
            _ => return Err(self.invalid(Action::Message)),
        }
        self.rounds_used += 1;
        self.deadline = Some(now.plus(policy.chat_idle_timeout_secs));
        let exhausted = self.rounds_used >= self.max_rounds;
        if exhausted {
            self.phase = Phase::RoundsExhausted;
        }
        Ok(RoundReceipt {
            rounds_used: self.rounds_used,
            max_rounds: self.max_rounds,
            exhausted,
        })
    }

    /// Add `extra_rounds` after the caller locked `cost` into escrow.
    pub fn extend(&mut self, cost: Energy, extra_rounds: u32, policy: &SessionPolicy, now: Timestamp) -> Result<(), SessionError> {
        if !self.phase.is_chatting() {
            return Err(self.invalid(Action::Extend));
        }
        self.locked_energy += cost;
        self.max_rounds += extra_rounds;
        self.extensions += 1;
        self.phase = if self.rounds_used >= self.max_rounds {
            Phase::RoundsExhausted
        } else {
            Phase::Chatting
        };
        self.deadline = Some(now.plus(policy.chat_idle_timeout_secs));
        Ok(())
    }

    /// `chatting -> rating`.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        if !self.phase.is_chatting() {
            return Err(self.invalid(Action::Finish));
        }
        self.phase = Phase::Rating;
        self.deadline = None;
        Ok(())
    }

    /// `rating -> completed`. Returns the escrow the caller must spend.
    pub fn complete(&mut self, rating: Rating, now: Timestamp) -> Result<Energy, SessionError> {
        if !(1..=5).contains(&rating.score) {
            return Err(SessionError::InvalidRating(rating.score));
        }
        if self.phase != Phase::Rating {
            return Err(self.invalid(Action::Rate));
        }
        let escrow = std::mem::take(&mut self.locked_energy);
        self.rating = Some(rating);
        self.close(Phase::Completed, now);
        Ok(escrow)
    }

    /// `waiting | chatting -> timed_out`. Returns the escrow to unlock.
    pub fn time_out(&mut self, now: Timestamp) -> Result<Energy, SessionError> {
        if !self.phase.accepts_timeout() {
            return Err(self.invalid(Action::Timeout));
        }
        let escrow = std::mem::take(&mut self.locked_energy);
        self.close(Phase::TimedOut, now);
        Ok(escrow)
    }

    /// Abandon before rating. Returns the escrow to unlock.
    pub fn cancel(&mut self, now: Timestamp) -> Result<Energy, SessionError> {
        if self.gate(Action::Cancel)? == Gate::Stale {
            return Ok(Energy::ZERO);
        }
        let escrow = std::mem::take(&mut self.locked_energy);
        self.close(Phase::Cancelled, now);
        Ok(escrow)
    }

    fn close(&mut self, phase: Phase, now: Timestamp) {
        self.phase = phase;
        self.closed_at = Some(now);
        self.deadline = None;
    }

    pub fn voucher(&self) -> Option<VoucherId> {
        match self.payment {
            PaymentMethod::Voucher(v) => Some(v),
            PaymentMethod::Energy => None,
        }
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.phase.accepts_timeout() && self.deadline.map_or(false, |d| now >= d)
    }

    pub fn related_id(&self) -> String {
        self.id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
