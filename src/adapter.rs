//! Adapter layer: converts between the JS/simulator f64 world and the
//! engine's Decimal types.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::types::{Energy, SessionId, Timestamp, TxId};

/// Convert f64 to Decimal (lossy but sufficient at the boundary).
/// Non-finite input maps to zero.
pub fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// Convert Decimal to f64.
pub fn from_decimal(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub fn to_energy(v: f64) -> Energy {
    Energy(to_decimal(v))
}

pub fn from_energy(e: Energy) -> f64 {
    from_decimal(e.0)
}

/// JS `Date.now()` milliseconds to engine seconds. Negative or NaN clamps to 0.
pub fn millis_to_timestamp(ms: f64) -> Timestamp {
    Timestamp::from_millis(ms.max(0.0).to_u64().unwrap_or(0))
}

/// Ids cross the JS boundary as plain numbers.
pub fn to_session_id(v: f64) -> SessionId {
    SessionId(v.max(0.0).to_u64().unwrap_or(0))
}

pub fn to_tx_id(v: f64) -> TxId {
    TxId(v.max(0.0).to_u64().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_round_trip_is_close() {
        assert_eq!(to_decimal(0.25), dec!(0.25));
        assert_eq!(from_decimal(dec!(12.5)), 12.5);
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn millis_truncate_to_seconds() {
        assert_eq!(millis_to_timestamp(1_700_000_000_999.0), Timestamp(1_700_000_000));
        assert_eq!(millis_to_timestamp(-5.0), Timestamp(0));
        assert_eq!(millis_to_timestamp(f64::NAN), Timestamp(0));
    }

    #[test]
    fn ids_from_js_numbers() {
        assert_eq!(to_session_id(42.0), SessionId(42));
        assert_eq!(to_tx_id(-1.0), TxId(0));
    }
}
