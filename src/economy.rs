// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! The service the presentation layer talks to.
//!
//! [`Economy`] owns the ledger registry, the session store and the voucher
//! book, and wires them to the injected collaborators. Lock order is always
//! session, then user ledger, then voucher book. Collaborators (sink,
//! matcher, transport, scheduler) are only called after every lock has been
//! released.

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::collaborators::{
    Clock, MessageTransport, NullTransport, ResponderAnswer, ResponderMatcher, StaticMatcher,
    SweepOnlyScheduler, TimeoutScheduler,
};
use crate::config::{ConfigError, EconomyConfig};
use crate::conservation::{AuditError, ConservationMonitor};
use crate::fee_window::TierChange;
use crate::ledger::{BalanceView, HistoryPage, LedgerError, TradeReceipt};
use crate::notify::{LogSink, Notification, NotificationSink};
use crate::registry::{LedgerRegistry, SweepReport};
use crate::session::{
    Action, AnswerOutcome, Gate, PaymentChoice, PaymentMethod, Rating, RoundReceipt, Session, SessionError,
    SessionRequest, Transition,
};
use crate::types::{Energy, ResponderId, SessionId, Timestamp, TxId, UserId, VoucherId};
use crate::voucher::VoucherBook;

type SessionHandle = Arc<Mutex<Session>>;

pub struct Economy {
    config: Arc<EconomyConfig>,
    ledgers: LedgerRegistry,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    vouchers: Mutex<VoucherBook>,
    next_session: AtomicU64,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    matcher: Arc<dyn ResponderMatcher>,
    transport: Arc<dyn MessageTransport>,
    scheduler: Arc<dyn TimeoutScheduler>,
}

impl Economy {
    /// Validates `config`; collaborators default to logging, an empty
    /// matcher, a null transport and sweep-driven timeouts.
    pub fn new(config: EconomyConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            ledgers: LedgerRegistry::new(Arc::clone(&config)),
            config,
            sessions: RwLock::new(HashMap::new()),
            vouchers: Mutex::new(VoucherBook::new()),
            next_session: AtomicU64::new(1),
            clock,
            sink: Arc::new(LogSink),
            matcher: Arc::new(StaticMatcher::default()),
            transport: Arc::new(NullTransport),
            scheduler: Arc::new(SweepOnlyScheduler),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn ResponderMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn MessageTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn ledgers(&self) -> &LedgerRegistry {
        &self.ledgers
    }

    fn emit(&self, notifications: impl IntoIterator<Item = Notification>) {
        for n in notifications {
            self.sink.notify(n);
        }
    }

    // -----------------------------------------------------------------------
    // Ledger operations
    // -----------------------------------------------------------------------

    /// Feed one trade from the fee stream. `traded_at` defaults to now.
    /// Emits `LevelUp` when the trade raises the tier.
    pub fn record_trade(
        &self,
        user: &UserId,
        volume: Decimal,
        fee_rate: Decimal,
        traded_at: Option<Timestamp>,
    ) -> Result<TradeReceipt, LedgerError> {
        let now = self.clock.now();
        let traded_at = traded_at.unwrap_or(now);
        let receipt = self
            .ledgers
            .with_ledger(user, now, |l, cfg| l.record_trade(volume, fee_rate, traded_at, cfg, now))?;
        tracing::info!(%user, fee = %receipt.fee, minted = %receipt.minted, fees_30d = %receipt.fees_30d, "trade recorded");
        if let TierChange::Upgraded { from, to } = receipt.tier_change {
            self.emit([Notification::LevelUp {
                user: user.clone(),
                from,
                to,
            }]);
        }
        Ok(receipt)
    }

    pub fn set_holdings(&self, user: &UserId, soso_holding: Decimal, ssi_staked: Decimal) {
        let now = self.clock.now();
        self.ledgers
            .with_ledger(user, now, |l, _| l.set_holdings(soso_holding, ssi_staked));
    }

    /// Balance snapshot. Recomputes the tier from the rolling window, so
    /// a drop from aged-out trades shows here without any notification.
    pub fn balance(&self, user: &UserId) -> BalanceView {
        let now = self.clock.now();
        self.ledgers.with_ledger(user, now, |l, cfg| l.view(cfg, now))
    }

    pub fn history(&self, user: &UserId, before: Option<TxId>, limit: usize) -> HistoryPage {
        let now = self.clock.now();
        self.ledgers.with_ledger(user, now, |l, _| l.history(before, limit))
    }

    pub fn grant_voucher(&self, user: &UserId) -> VoucherId {
        let now = self.clock.now();
        self.vouchers.lock().grant(user.clone(), now)
    }

    pub fn vouchers_available(&self, user: &UserId) -> usize {
        self.vouchers.lock().available_for(user)
    }

    pub fn sweep_decay(&self) -> SweepReport {
        self.ledgers.sweep_decay(self.clock.now())
    }

    pub fn audit_all(&self, monitor: &mut ConservationMonitor) -> Vec<AuditError> {
        self.ledgers.audit_all(monitor)
    }

    // -----------------------------------------------------------------------
    // Session plumbing
    // -----------------------------------------------------------------------

    fn session_handle(&self, id: SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .get(&id)
            .map(Arc::clone)
            .ok_or(SessionError::NotFound(id))
    }

    fn stale(&self, id: SessionId, action: Action) -> Transition {
        tracing::warn!(session = %id, %action, "request for closed session dropped");
        Transition::Stale
    }

    fn reschedule(&self, id: SessionId, deadline: Option<Timestamp>) {
        match deadline {
            Some(d) => self.scheduler.schedule(id, d),
            None => self.scheduler.cancel(id),
        }
    }

    fn release_voucher(&self, voucher: VoucherId, id: SessionId) {
        if !self.vouchers.lock().release(voucher, id) {
            tracing::warn!(session = %id, %voucher, "voucher was not reserved by this session");
        }
    }

    fn consume_voucher(&self, voucher: VoucherId, id: SessionId) {
        if !self.vouchers.lock().consume(voucher, id) {
            tracing::warn!(session = %id, %voucher, "voucher was not reserved by this session");
        }
    }

    /// Secure the base cost for a submission: lock energy, or reserve a
    /// voucher. Returns the escrowed energy and the payment used.
    fn secure_payment(
        &self,
        choice: PaymentChoice,
        user: &UserId,
        cost: Energy,
        id: SessionId,
        ledger: &mut crate::ledger::UserLedger,
        now: Timestamp,
    ) -> Result<(Energy, PaymentMethod), SessionError> {
        match choice {
            PaymentChoice::Energy => {
                if let Err(err) = ledger.lock(cost, now, Some(id.to_string())) {
                    tracing::warn!(%user, session = %id, error = %err, "lock rejected");
                    return Err(err.into());
                }
                Ok((cost, PaymentMethod::Energy))
            }
            PaymentChoice::Voucher => {
                let voucher = self
                    .vouchers
                    .lock()
                    .reserve(user, id)
                    .ok_or_else(|| SessionError::VoucherUnavailable(user.clone()))?;
                Ok((Energy::ZERO, PaymentMethod::Voucher(voucher)))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Session operations
    // -----------------------------------------------------------------------

    /// `asking -> waiting | chatting`. Nothing is stored when the lock or
    /// voucher reservation fails.
    pub fn create_session(&self, mut req: SessionRequest) -> Result<SessionId, SessionError> {
        req.cost = req.cost.quantize();
        if req.question.trim().is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        if req.cost.is_negative() {
            return Err(SessionError::InvalidAmount(req.cost));
        }
        let now = self.clock.now();
        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));

        let session = self.ledgers.with_ledger(&req.user, now, |ledger, cfg| {
            let tier = ledger.refresh_tier(&cfg.tiers, now).current();
            if !cfg.tiers.get(tier).allows_session(req.kind) {
                return Err(SessionError::CapabilityLocked {
                    tier,
                    capability: req.kind,
                });
            }
            let (escrow, payment) = self.secure_payment(req.payment, &req.user, req.cost, id, ledger, now)?;
            let mut session = Session::draft(id, &req, payment, &cfg.sessions, now);
            session.submit(escrow, &cfg.sessions, now)?;
            Ok(session)
        })?;

        let deadline = session.deadline;
        tracing::info!(session = %id, user = %session.user, phase = %session.phase, cost = %req.cost, "session created");
        self.sessions.write().insert(id, Arc::new(Mutex::new(session)));
        self.reschedule(id, deadline);
        Ok(id)
    }

    /// Re-open a skipped session: `asking -> waiting`, locking the base
    /// cost again (or reserving a voucher for voucher sessions).
    pub fn resubmit(&self, id: SessionId) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        let deadline = {
            let mut s = handle.lock();
            if s.gate(Action::Submit)? == Gate::Stale {
                return Ok(self.stale(id, Action::Submit));
            }
            let user = s.user.clone();
            let now = self.clock.now();
            self.ledgers.with_ledger(&user, now, |ledger, cfg| {
                let choice = match s.payment {
                    PaymentMethod::Energy => PaymentChoice::Energy,
                    PaymentMethod::Voucher(_) => PaymentChoice::Voucher,
                };
                let (escrow, payment) = self.secure_payment(choice, &user, s.cost, id, ledger, now)?;
                s.payment = payment;
                s.submit(escrow, &cfg.sessions, now)
            })?;
            tracing::info!(session = %id, "session resubmitted");
            s.deadline
        };
        self.reschedule(id, deadline);
        Ok(Transition::Applied)
    }

    /// Feed a responder's preview answer into the session.
    pub fn record_answer(&self, id: SessionId, answer: ResponderAnswer) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        let responder = answer.responder.clone();
        let outcome = {
            let mut s = handle.lock();
            if s.gate(Action::Answer)? == Gate::Stale {
                return Ok(self.stale(id, Action::Answer));
            }
            s.record_answer(answer)?
        };
        match outcome {
            AnswerOutcome::Opened => {
                tracing::info!(session = %id, %responder, "first answer received");
                self.scheduler.cancel(id);
                Ok(Transition::Applied)
            }
            AnswerOutcome::Added => Ok(Transition::Applied),
            AnswerOutcome::Ignored => {
                tracing::debug!(session = %id, %responder, "answer ignored");
                Ok(Transition::Ignored)
            }
        }
    }

    /// Ask the matcher for candidates, outside any lock, and feed them in.
    /// Returns how many answers the session accepted.
    pub fn match_responders(&self, id: SessionId) -> Result<usize, SessionError> {
        let question = {
            let handle = self.session_handle(id)?;
            let s = handle.lock();
            if s.phase.is_terminal() {
                return Ok(0);
            }
            s.question.clone()
        };
        let mut accepted = 0;
        for answer in self.matcher.candidates(&question) {
            match self.record_answer(id, answer)? {
                Transition::Applied => accepted += 1,
                Transition::Ignored => {}
                Transition::Stale => break,
            }
        }
        Ok(accepted)
    }

    /// `selecting -> chatting`. A no-op when the session already chats.
    pub fn select_responder(&self, id: SessionId, responder: &ResponderId) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        let (transition, deadline) = {
            let mut s = handle.lock();
            if s.gate(Action::Select)? == Gate::Stale {
                return Ok(self.stale(id, Action::Select));
            }
            let t = s.select(responder, &self.config.sessions, self.clock.now())?;
            (t, s.deadline)
        };
        if transition == Transition::Applied {
            tracing::info!(session = %id, %responder, "responder selected");
            self.reschedule(id, deadline);
        }
        Ok(transition)
    }

    /// `selecting -> asking`: unlock the escrow and release any voucher.
    pub fn skip(&self, id: SessionId) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        {
            let mut s = handle.lock();
            if s.gate(Action::Skip)? == Gate::Stale {
                return Ok(self.stale(id, Action::Skip));
            }
            let user = s.user.clone();
            let now = self.clock.now();
            let refunded = self.ledgers.with_ledger(&user, now, |ledger, _| {
                let escrow = s.skip()?;
                let refunded = ledger.unlock(escrow, now, Some(id.to_string()));
                if let Some(v) = s.voucher() {
                    self.release_voucher(v, id);
                }
                Ok::<_, SessionError>(refunded)
            })?;
            tracing::info!(session = %id, %refunded, "session skipped");
        }
        self.scheduler.cancel(id);
        Ok(Transition::Applied)
    }

    /// Count one user message and hand it to the transport. Returns `None`
    /// for a closed session. Hitting the limit emits `RoundsExhausted`.
    pub fn advance_round(&self, id: SessionId, message: &str) -> Result<Option<RoundReceipt>, SessionError> {
        let handle = self.session_handle(id)?;
        let (receipt, user, responder, deadline) = {
            let mut s = handle.lock();
            if s.gate(Action::Message)? == Gate::Stale {
                self.stale(id, Action::Message);
                return Ok(None);
            }
            let receipt = s.advance_round(&self.config.sessions, self.clock.now())?;
            (receipt, s.user.clone(), s.selected_responder.clone(), s.deadline)
        };
        self.transport.deliver(id, responder.as_ref(), message);
        self.reschedule(id, deadline);
        if receipt.exhausted {
            tracing::info!(session = %id, max_rounds = receipt.max_rounds, "rounds exhausted");
            self.emit([Notification::RoundsExhausted {
                user,
                session: id,
                max_rounds: receipt.max_rounds,
            }]);
        }
        Ok(Some(receipt))
    }

    /// Lock `additional_cost` into the escrow and grant more rounds. On
    /// `InsufficientEnergy` the session is left as it was.
    pub fn extend_rounds(&self, id: SessionId, additional_cost: Energy) -> Result<Transition, SessionError> {
        if additional_cost.is_negative() {
            return Err(SessionError::InvalidAmount(additional_cost));
        }
        let additional_cost = additional_cost.quantize();
        let handle = self.session_handle(id)?;
        let deadline = {
            let mut s = handle.lock();
            if s.gate(Action::Extend)? == Gate::Stale {
                return Ok(self.stale(id, Action::Extend));
            }
            let user = s.user.clone();
            let now = self.clock.now();
            self.ledgers.with_ledger(&user, now, |ledger, cfg| {
                if let Err(err) = ledger.lock(additional_cost, now, Some(id.to_string())) {
                    tracing::warn!(%user, session = %id, error = %err, "extension rejected");
                    return Err(SessionError::from(err));
                }
                s.extend(additional_cost, cfg.sessions.extension_rounds, &cfg.sessions, now)
            })?;
            tracing::info!(session = %id, max_rounds = s.max_rounds, cost = %additional_cost, "rounds extended");
            s.deadline
        };
        self.reschedule(id, deadline);
        Ok(Transition::Applied)
    }

    /// `chatting -> rating`. No energy moves.
    pub fn end_chat(&self, id: SessionId) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        {
            let mut s = handle.lock();
            if s.gate(Action::Finish)? == Gate::Stale {
                return Ok(self.stale(id, Action::Finish));
            }
            s.finish()?;
        }
        self.scheduler.cancel(id);
        Ok(Transition::Applied)
    }

    /// `rating -> completed` (passing through `rating` from chatting):
    /// spend the escrow and consume the voucher, if any.
    pub fn complete_and_rate(
        &self,
        id: SessionId,
        score: u8,
        comment: Option<String>,
    ) -> Result<Transition, SessionError> {
        if !(1..=5).contains(&score) {
            return Err(SessionError::InvalidRating(score));
        }
        let handle = self.session_handle(id)?;
        {
            let mut s = handle.lock();
            if s.gate(Action::Rate)? == Gate::Stale {
                return Ok(self.stale(id, Action::Rate));
            }
            if s.phase.is_chatting() {
                s.finish()?;
            }
            let user = s.user.clone();
            let now = self.clock.now();
            let spent = self.ledgers.with_ledger(&user, now, |ledger, _| {
                let escrow = s.complete(Rating { score, comment }, now)?;
                let spent = ledger.spend(escrow, now, Some(id.to_string()));
                if let Some(v) = s.voucher() {
                    self.consume_voucher(v, id);
                }
                Ok::<_, SessionError>(spent)
            })?;
            tracing::info!(session = %id, score, %spent, "session completed");
        }
        self.scheduler.cancel(id);
        Ok(Transition::Applied)
    }

    /// External timeout signal: unlock the escrow, release any voucher and
    /// surface a refund.
    pub fn timeout(&self, id: SessionId) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        let (user, refunded) = {
            let mut s = handle.lock();
            if s.gate(Action::Timeout)? == Gate::Stale {
                return Ok(self.stale(id, Action::Timeout));
            }
            let user = s.user.clone();
            let now = self.clock.now();
            let refunded = self.ledgers.with_ledger(&user, now, |ledger, _| {
                let escrow = s.time_out(now)?;
                let refunded = ledger.unlock(escrow, now, Some(id.to_string()));
                if let Some(v) = s.voucher() {
                    self.release_voucher(v, id);
                }
                Ok::<_, SessionError>(refunded)
            })?;
            (user, refunded)
        };
        tracing::info!(session = %id, %refunded, "session timed out");
        self.scheduler.cancel(id);
        self.emit([Notification::Refund {
            user,
            session: id,
            amount: refunded,
        }]);
        Ok(Transition::Applied)
    }

    /// Abandon a session before rating. The compensating action is always
    /// an unlock.
    pub fn cancel(&self, id: SessionId) -> Result<Transition, SessionError> {
        let handle = self.session_handle(id)?;
        {
            let mut s = handle.lock();
            if s.gate(Action::Cancel)? == Gate::Stale {
                return Ok(self.stale(id, Action::Cancel));
            }
            let user = s.user.clone();
            let now = self.clock.now();
            let refunded = self.ledgers.with_ledger(&user, now, |ledger, _| {
                let escrow = s.cancel(now)?;
                let refunded = ledger.unlock(escrow, now, Some(id.to_string()));
                if let Some(v) = s.voucher() {
                    self.release_voucher(v, id);
                }
                Ok::<_, SessionError>(refunded)
            })?;
            tracing::info!(session = %id, %refunded, "session cancelled");
        }
        self.scheduler.cancel(id);
        Ok(Transition::Applied)
    }

    /// Time out every session whose deadline has passed. Returns the ids
    /// that were closed by this sweep.
    pub fn expire_overdue(&self) -> Vec<SessionId> {
        let now = self.clock.now();
        let handles: Vec<(SessionId, SessionHandle)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();
        let mut overdue: Vec<SessionId> = handles
            .into_iter()
            .filter(|(_, h)| h.lock().is_overdue(now))
            .map(|(id, _)| id)
            .collect();
        overdue.sort();

        let mut expired = Vec::with_capacity(overdue.len());
        for id in overdue {
            match self.timeout(id) {
                Ok(Transition::Applied) => expired.push(id),
                Ok(_) => {}
                Err(err) => tracing::warn!(session = %id, error = %err, "overdue session not expired"),
            }
        }
        expired
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn session(&self, id: SessionId) -> Option<Session> {
        let handle = self.sessions.read().get(&id).map(Arc::clone)?;
        let s = handle.lock().clone();
        Some(s)
    }

    /// Every session of `user`, open and archived, oldest first.
    pub fn sessions_for(&self, user: &UserId) -> Vec<Session> {
        let handles: Vec<SessionHandle> = self.sessions.read().values().map(Arc::clone).collect();
        let mut out: Vec<Session> = handles
            .iter()
            .map(|h| h.lock())
            .filter(|s| &s.user == user)
            .map(|s| Session::clone(&s))
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ManualClock;
    use crate::notify::BufferedSink;
    use crate::session::Phase;
    use rust_decimal_macros::dec;

    struct Harness {
        economy: Economy,
        clock: Arc<ManualClock>,
        sink: Arc<BufferedSink>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(Timestamp(1_000)));
        let sink = Arc::new(BufferedSink::new());
        let economy = Economy::new(EconomyConfig::default(), clock.clone())
            .expect("test: default config")
            .with_sink(sink.clone());
        Harness { economy, clock, sink }
    }

    fn fund(e: &Economy, user: &UserId, fee: Decimal) {
        e.record_trade(user, fee, Decimal::ONE, None).expect("test: trade");
    }

    #[test]
    fn create_session_locks_cost() {
        let h = harness();
        let u = UserId::from("u");
        fund(&h.economy, &u, dec!(50));
        let id = h
            .economy
            .create_session(SessionRequest::new("u", "q", Energy::from_units(10)))
            .expect("test: create");
        let view = h.economy.balance(&u);
        assert_eq!(view.available, Energy::from_units(40));
        assert_eq!(view.locked, Energy::from_units(10));
        assert_eq!(h.economy.session(id).map(|s| s.phase), Some(Phase::Waiting));
    }

    #[test]
    fn insufficient_energy_stores_nothing() {
        let h = harness();
        let err = h
            .economy
            .create_session(SessionRequest::new("broke", "q", Energy::from_units(1)))
            .expect_err("test: must fail");
        assert!(err.is_insufficient_energy());
        assert!(h.economy.sessions_for(&UserId::from("broke")).is_empty());
    }

    #[test]
    fn voice_call_needs_gold() {
        let h = harness();
        let u = UserId::from("u");
        fund(&h.economy, &u, dec!(50));
        let err = h
            .economy
            .create_session(
                SessionRequest::new("u", "q", Energy::from_units(1))
                    .with_kind(crate::tier::SessionCapability::VoiceCall),
            )
            .expect_err("test: bronze cannot call");
        assert!(matches!(err, SessionError::CapabilityLocked { .. }));
        assert_eq!(h.economy.balance(&u).locked, Energy::ZERO);
    }

    #[test]
    fn level_up_is_notified_once() {
        let h = harness();
        let u = UserId::from("u");
        fund(&h.economy, &u, dec!(150));
        fund(&h.economy, &u, dec!(10));
        let events = h.sink.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Notification::LevelUp { from: crate::tier::Tier::Bronze, to: crate::tier::Tier::Silver, .. }
        ));
    }

    #[test]
    fn stale_requests_are_dropped() {
        let h = harness();
        let u = UserId::from("u");
        fund(&h.economy, &u, dec!(50));
        let id = h
            .economy
            .create_session(SessionRequest::new("u", "q", Energy::from_units(10)))
            .expect("test: create");
        h.economy.cancel(id).expect("test: cancel");
        h.clock.advance(60);
        assert_eq!(h.economy.timeout(id), Ok(Transition::Stale));
        assert_eq!(h.economy.cancel(id), Ok(Transition::Stale));
        assert_eq!(h.economy.advance_round(id, "hello"), Ok(None));
        assert_eq!(h.economy.balance(&u).available, Energy::from_units(50));
        assert!(h.sink.drain().iter().all(|n| !matches!(n, Notification::Refund { .. })));
    }

    #[test]
    fn repeat_answers_are_not_counted() {
        let h = harness();
        let economy = h.economy.with_matcher(Arc::new(StaticMatcher {
            answers: vec![
                ResponderAnswer::new("r1", "long"),
                ResponderAnswer::new("r1", "still long"),
                ResponderAnswer::new("r2", "flat"),
            ],
        }));
        let u = UserId::from("u");
        fund(&economy, &u, dec!(20));
        let id = economy
            .create_session(SessionRequest::new("u", "q", Energy::from_units(5)))
            .expect("test: create");
        assert_eq!(economy.match_responders(id), Ok(2));
        assert_eq!(
            economy.record_answer(id, ResponderAnswer::new("r2", "again")),
            Ok(Transition::Ignored)
        );
        assert_eq!(economy.session(id).map(|s| s.candidates.len()), Some(2));
    }

    #[test]
    fn fractional_cost_escrow_matches_locked() {
        let h = harness();
        let u = UserId::from("u");
        fund(&h.economy, &u, dec!(5));
        let third = Energy(Decimal::ONE / dec!(3));
        let id = h
            .economy
            .create_session(SessionRequest::new("u", "q", third).with_responder("r1"))
            .expect("test: create");
        assert_eq!(h.economy.extend_rounds(id, third), Ok(Transition::Applied));
        let s = h.economy.session(id).expect("test: session");
        assert_eq!(s.cost, Energy(dec!(0.33333333)));
        assert_eq!(s.locked_energy, h.economy.balance(&u).locked);
    }

    #[test]
    fn voucher_mismatch_does_not_block_cancel() {
        let h = harness();
        let u = UserId::from("u");
        let v = h.economy.grant_voucher(&u);
        let id = h
            .economy
            .create_session(SessionRequest::new("u", "q", Energy::from_units(5)).with_voucher())
            .expect("test: create");
        // out-of-band consumption leaves the session still holding the id
        assert!(h.economy.vouchers.lock().consume(v, id));
        assert_eq!(h.economy.cancel(id), Ok(Transition::Applied));
        assert!(matches!(
            h.economy.vouchers.lock().get(v).map(|v| v.state),
            Some(crate::voucher::VoucherState::Consumed(s)) if s == id
        ));
        assert_eq!(h.economy.vouchers_available(&u), 0);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let h = harness();
        assert_eq!(h.economy.end_chat(SessionId(77)), Err(SessionError::NotFound(SessionId(77))));
    }
}
