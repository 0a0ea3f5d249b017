// Copyright 2026 Hypermesh Foundation. All rights reserved.
// SoSo Energy Engine - ledger, tiers and consultation sessions

pub mod types;
pub mod tier;
pub mod boost;
pub mod shield;
pub mod fee_window;
pub mod config;
pub mod ledger;
pub mod conservation;
pub mod registry;
pub mod notify;
pub mod collaborators;
pub mod voucher;
pub mod session;
pub mod economy;
pub mod adapter;

pub use collaborators::{Clock, ManualClock, ResponderAnswer, ResponderMatcher, MessageTransport, TimeoutScheduler};
pub use config::{ConfigError, EconomyConfig};
pub use economy::Economy;
pub use ledger::{BalanceView, HistoryPage, LedgerError, Transaction, TxKind, UserLedger};
pub use notify::{BufferedSink, Notification, NotificationSink};
pub use session::{Phase, PaymentChoice, PaymentMethod, Session, SessionError, SessionRequest, Transition};
pub use tier::{SessionCapability, Tier, TierTable};
pub use types::*;

#[cfg(not(target_arch = "wasm32"))]
pub use collaborators::SystemClock;

use serde::Deserialize;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Session request as JS builds it.
#[derive(Deserialize)]
struct JsSessionRequest {
    user: String,
    question: String,
    cost: f64,
    #[serde(default)]
    kind: Option<SessionCapability>,
    #[serde(default)]
    responder: Option<String>,
    #[serde(default)]
    voucher: bool,
}

impl From<JsSessionRequest> for SessionRequest {
    fn from(js: JsSessionRequest) -> Self {
        let mut req = SessionRequest::new(js.user, js.question, adapter::to_energy(js.cost));
        if let Some(kind) = js.kind {
            req = req.with_kind(kind);
        }
        if let Some(r) = js.responder {
            req = req.with_responder(r);
        }
        if js.voucher {
            req = req.with_voucher();
        }
        req
    }
}

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_js<T: serde::Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

/// Browser-facing wrapper. JS owns time: every call takes effect at the
/// last time passed to the constructor or [`set_time`](Self::set_time).
#[wasm_bindgen]
pub struct WasmEconomy {
    economy: Economy,
    clock: Arc<ManualClock>,
    sink: Arc<BufferedSink>,
}

impl WasmEconomy {
    fn build(config: EconomyConfig, now_ms: f64) -> Result<WasmEconomy, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let clock = Arc::new(ManualClock::new(adapter::millis_to_timestamp(now_ms)));
        let sink = Arc::new(BufferedSink::new());
        let economy = Economy::new(config, clock.clone())
            .map_err(js_err)?
            .with_sink(sink.clone());
        Ok(Self { economy, clock, sink })
    }
}

#[wasm_bindgen]
impl WasmEconomy {
    #[wasm_bindgen(constructor)]
    pub fn new(now_ms: f64) -> Result<WasmEconomy, JsValue> {
        Self::build(EconomyConfig::default(), now_ms)
    }

    /// Construct from a TOML economy config.
    pub fn with_config(config_toml: &str, now_ms: f64) -> Result<WasmEconomy, JsValue> {
        let config = EconomyConfig::from_toml_str(config_toml).map_err(js_err)?;
        Self::build(config, now_ms)
    }

    pub fn set_time(&self, now_ms: f64) {
        self.clock.set(adapter::millis_to_timestamp(now_ms));
    }

    pub fn tier_table(&self) -> JsValue {
        to_js(&self.economy.config().tiers)
    }

    // ----- ledger -----

    pub fn record_trade(&self, user: &str, volume: f64, fee_rate: f64) -> Result<JsValue, JsValue> {
        let receipt = self
            .economy
            .record_trade(
                &UserId::from(user),
                adapter::to_decimal(volume),
                adapter::to_decimal(fee_rate),
                None,
            )
            .map_err(js_err)?;
        Ok(to_js(&receipt))
    }

    pub fn set_holdings(&self, user: &str, soso_holding: f64, ssi_staked: f64) {
        self.economy.set_holdings(
            &UserId::from(user),
            adapter::to_decimal(soso_holding),
            adapter::to_decimal(ssi_staked),
        );
    }

    pub fn balance(&self, user: &str) -> JsValue {
        to_js(&self.economy.balance(&UserId::from(user)))
    }

    pub fn history(&self, user: &str, before: Option<f64>, limit: u32) -> JsValue {
        let page = self
            .economy
            .history(&UserId::from(user), before.map(adapter::to_tx_id), limit as usize);
        to_js(&page)
    }

    pub fn grant_voucher(&self, user: &str) -> f64 {
        self.economy.grant_voucher(&UserId::from(user)).0 as f64
    }

    pub fn sweep_decay(&self) -> JsValue {
        to_js(&self.economy.sweep_decay())
    }

    // ----- sessions -----

    pub fn create_session(&self, request: JsValue) -> Result<f64, JsValue> {
        let req: JsSessionRequest = serde_wasm_bindgen::from_value(request).map_err(js_err)?;
        let id = self.economy.create_session(req.into()).map_err(js_err)?;
        Ok(id.0 as f64)
    }

    pub fn resubmit(&self, session: f64) -> Result<JsValue, JsValue> {
        let t = self.economy.resubmit(adapter::to_session_id(session)).map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn record_answer(&self, session: f64, responder: &str, preview: &str) -> Result<JsValue, JsValue> {
        let t = self
            .economy
            .record_answer(adapter::to_session_id(session), ResponderAnswer::new(responder, preview))
            .map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn match_responders(&self, session: f64) -> Result<u32, JsValue> {
        let n = self
            .economy
            .match_responders(adapter::to_session_id(session))
            .map_err(js_err)?;
        Ok(n as u32)
    }

    pub fn select_responder(&self, session: f64, responder: &str) -> Result<JsValue, JsValue> {
        let t = self
            .economy
            .select_responder(adapter::to_session_id(session), &ResponderId::from(responder))
            .map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn skip(&self, session: f64) -> Result<JsValue, JsValue> {
        let t = self.economy.skip(adapter::to_session_id(session)).map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn advance_round(&self, session: f64, message: &str) -> Result<JsValue, JsValue> {
        let receipt = self
            .economy
            .advance_round(adapter::to_session_id(session), message)
            .map_err(js_err)?;
        Ok(to_js(&receipt))
    }

    pub fn extend_rounds(&self, session: f64, additional_cost: f64) -> Result<JsValue, JsValue> {
        let t = self
            .economy
            .extend_rounds(adapter::to_session_id(session), adapter::to_energy(additional_cost))
            .map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn end_chat(&self, session: f64) -> Result<JsValue, JsValue> {
        let t = self.economy.end_chat(adapter::to_session_id(session)).map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn complete_and_rate(&self, session: f64, score: u8, comment: Option<String>) -> Result<JsValue, JsValue> {
        let t = self
            .economy
            .complete_and_rate(adapter::to_session_id(session), score, comment)
            .map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn timeout(&self, session: f64) -> Result<JsValue, JsValue> {
        let t = self.economy.timeout(adapter::to_session_id(session)).map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn cancel(&self, session: f64) -> Result<JsValue, JsValue> {
        let t = self.economy.cancel(adapter::to_session_id(session)).map_err(js_err)?;
        Ok(to_js(&t))
    }

    pub fn expire_overdue(&self) -> JsValue {
        to_js(&self.economy.expire_overdue())
    }

    pub fn session(&self, session: f64) -> JsValue {
        match self.economy.session(adapter::to_session_id(session)) {
            Some(s) => to_js(&s),
            None => JsValue::NULL,
        }
    }

    pub fn sessions_for(&self, user: &str) -> JsValue {
        to_js(&self.economy.sessions_for(&UserId::from(user)))
    }

    /// Notifications produced since the last drain, oldest first.
    pub fn drain_notifications(&self) -> JsValue {
        to_js(&self.sink.drain())
    }
}
