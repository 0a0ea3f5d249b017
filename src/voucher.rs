// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Free trial vouchers. A voucher pays a session's base cost without
//! touching the energy ledger.
//!
//! ```text
//! available --reserve--> reserved --consume--> consumed
//!     ^                     |
//!     +------ release ------+
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{SessionId, Timestamp, UserId, VoucherId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "session")]
pub enum VoucherState {
    Available,
    Reserved(SessionId),
    Consumed(SessionId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub owner: UserId,
    pub granted_at: Timestamp,
    pub state: VoucherState,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VoucherBook {
    next_id: u64,
    vouchers: BTreeMap<u64, Voucher>,
}

impl VoucherBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, owner: UserId, now: Timestamp) -> VoucherId {
        self.next_id += 1;
        let id = VoucherId(self.next_id);
        tracing::info!(%owner, voucher = %id, "trial voucher granted");
        self.vouchers.insert(
            id.0,
            Voucher {
                id,
                owner,
                granted_at: now,
                state: VoucherState::Available,
            },
        );
        id
    }

    /// Reserve the owner's oldest available voucher for `session`.
    pub fn reserve(&mut self, owner: &UserId, session: SessionId) -> Option<VoucherId> {
        let v = self
            .vouchers
            .values_mut()
            .find(|v| &v.owner == owner && v.state == VoucherState::Available)?;
        v.state = VoucherState::Reserved(session);
        Some(v.id)
    }

    /// Return a reservation held by `session`. Returns `false` when the
    /// voucher was not reserved by it.
    pub fn release(&mut self, id: VoucherId, session: SessionId) -> bool {
        match self.vouchers.get_mut(&id.0) {
            Some(v) if v.state == VoucherState::Reserved(session) => {
                v.state = VoucherState::Available;
                true
            }
            _ => false,
        }
    }

    pub fn consume(&mut self, id: VoucherId, session: SessionId) -> bool {
        match self.vouchers.get_mut(&id.0) {
            Some(v) if v.state == VoucherState::Reserved(session) => {
                v.state = VoucherState::Consumed(session);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: VoucherId) -> Option<&Voucher> {
        self.vouchers.get(&id.0)
    }

    pub fn available_for(&self, owner: &UserId) -> usize {
        self.vouchers
            .values()
            .filter(|v| &v.owner == owner && v.state == VoucherState::Available)
            .count()
    }
}
