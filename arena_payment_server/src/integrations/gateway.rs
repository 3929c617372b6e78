//! The deposit side of the payment-gateway boundary.
//!
//! The gateway model here is a hosted checkout: the server opens a session by handing the customer a redirect URL
//! that carries the order id, and the gateway reports the outcome asynchronously through the signed webhook. The
//! server never assumes success or failure on its own; the pending ledger entry stays pending until the webhook
//! (the source of truth) arrives.

use apg_common::CURRENCY_CODE;
use arena_payment_engine::objects::PendingDeposit;
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct CustomerContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositSession {
    pub order_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct PaymentGateway {
    checkout_url: String,
}

impl PaymentGateway {
    pub fn new(checkout_url: impl Into<String>) -> Self {
        Self { checkout_url: checkout_url.into() }
    }

    /// Builds the hosted-checkout session for a pending deposit. The order id in the URL is what ties the later
    /// webhook back to the pending ledger entry.
    pub fn deposit_session(&self, deposit: &PendingDeposit, contact: &CustomerContact) -> DepositSession {
        let base = self.checkout_url.trim_end_matches('/');
        let mut redirect_url = format!(
            "{base}/pay?orderId={}&amount={}&currency={CURRENCY_CODE}",
            deposit.order_id,
            deposit.amount.value()
        );
        if let Some(phone) = contact.phone.as_deref().filter(|p| p.chars().all(|c| c.is_ascii_digit())) {
            redirect_url.push_str(&format!("&phone={phone}"));
        }
        debug!("💳️ Opened deposit session [{}] for wallet #{}", deposit.order_id, deposit.wallet_id);
        DepositSession { order_id: deposit.order_id.clone(), redirect_url }
    }
}

#[cfg(test)]
mod test {
    use apg_common::Money;

    use super::*;

    #[test]
    fn session_url_carries_the_order_id_and_amount() {
        let gw = PaymentGateway::new("https://pay.example.com/");
        let deposit =
            PendingDeposit { wallet_id: 3, order_id: "DEP_3_1700000000000_AB12".into(), amount: Money::from(50_000) };
        let session = gw.deposit_session(&deposit, &CustomerContact::default());
        assert_eq!(
            session.redirect_url,
            "https://pay.example.com/pay?orderId=DEP_3_1700000000000_AB12&amount=50000&currency=INR"
        );
    }

    #[test]
    fn malformed_phone_numbers_are_left_out() {
        let gw = PaymentGateway::new("https://pay.example.com");
        let deposit = PendingDeposit { wallet_id: 3, order_id: "DEP_3_1_AB12".into(), amount: Money::from(100) };
        let contact = CustomerContact { email: None, phone: Some("not-a-number".into()) };
        let session = gw.deposit_session(&deposit, &contact);
        assert!(!session.redirect_url.contains("phone"));
        let contact = CustomerContact { email: None, phone: Some("9876543210".into()) };
        let session = gw.deposit_session(&deposit, &contact);
        assert!(session.redirect_url.ends_with("&phone=9876543210"));
    }
}
