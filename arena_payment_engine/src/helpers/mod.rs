//! Reference builders for the idempotency keys that every money-moving operation carries.

use chrono::Utc;
use rand::Rng;

/// The entry-fee debit reference for a join. Unique per join attempt; stored on both the ledger entry and the
/// registration so the two can always be tied together.
pub fn match_payment_reference(match_id: i64) -> String {
    format!("MATCH_{match_id}_{}", Utc::now().timestamp_millis())
}

/// Refunds derive their key from the original payment so a retried leave (or a replayed cancellation) can never
/// refund twice.
pub fn refund_reference(original: &str) -> String {
    format!("REFUND_{original}")
}

/// Prize credits are keyed per `(match, user)` so settlement retries are no-ops.
pub fn prize_reference(match_id: i64, user_id: &str) -> String {
    format!("PRIZE_{match_id}_{user_id}")
}

/// A fresh order id for a deposit session. The random suffix keeps ids unique even when one wallet opens several
/// sessions in the same millisecond.
pub fn deposit_order_id(wallet_id: i64) -> String {
    let nonce = rand::thread_rng().gen_range(0x1000..=0xFFFFu32);
    format!("DEP_{wallet_id}_{}_{nonce:04X}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refund_reference_is_derived_from_the_original() {
        assert_eq!(refund_reference("MATCH_7_123"), "REFUND_MATCH_7_123");
    }

    #[test]
    fn prize_reference_is_stable() {
        assert_eq!(prize_reference(42, "user-1"), "PRIZE_42_user-1");
        assert_eq!(prize_reference(42, "user-1"), prize_reference(42, "user-1"));
    }

    #[test]
    fn deposit_order_ids_do_not_collide() {
        let a = deposit_order_id(1);
        let b = deposit_order_id(1);
        assert_ne!(a, b);
        assert!(a.starts_with("DEP_1_"));
    }
}
