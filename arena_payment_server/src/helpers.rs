use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the raw request body, base64 encoded. This is the signature scheme the payment gateway uses
/// for its webhook calls.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hmac_is_deterministic_and_key_sensitive() {
        let a = calculate_hmac("secret", b"{\"orderId\":\"DEP_1\"}");
        let b = calculate_hmac("secret", b"{\"orderId\":\"DEP_1\"}");
        let c = calculate_hmac("other", b"{\"orderId\":\"DEP_1\"}");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
