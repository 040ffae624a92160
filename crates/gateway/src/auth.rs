//! Login signing
//!
//! The venue authenticates a websocket session with
//! `base64(HMAC-SHA256(secret, timestamp + method + path + body))`.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;
use crate::error::{GatewayError, Result};
use crate::messages::OpRequest;

type HmacSha256 = Hmac<Sha256>;

const LOGIN_METHOD: &str = "GET";
const LOGIN_PATH: &str = "/users/self/verify";

/// Sign `timestamp + method + path + body` with the account secret
pub fn sign(secret: &str, timestamp: &str, method: &str, path: &str, body: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Authentication(format!("invalid secret key: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the signed login request for `timestamp` (unix seconds)
pub fn login_request(credentials: &Credentials, timestamp: &str) -> Result<OpRequest> {
    let signature = sign(
        &credentials.secret_key,
        timestamp,
        LOGIN_METHOD,
        LOGIN_PATH,
        "",
    )?;
    Ok(OpRequest::new(
        "login",
        vec![serde_json::json!({
            "apiKey": credentials.api_key,
            "passphrase": credentials.passphrase,
            "timestamp": timestamp,
            "sign": signature,
        })],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign("secret", "1700000000", "GET", "/users/self/verify", "").unwrap();
        let b = sign("secret", "1700000000", "GET", "/users/self/verify", "").unwrap();
        assert_eq!(a, b);
        // 32 byte digest -> 44 base64 chars
        assert_eq!(a.len(), 44);

        let other = sign("secret", "1700000001", "GET", "/users/self/verify", "").unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_known_answer_vectors() {
        // RFC 4231 test case 2, split across the prehash parts
        assert_eq!(
            sign("Jefe", "what do ya want ", "for nothing?", "", "").unwrap(),
            "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM="
        );

        let login = sign("secret", "1700000000", "GET", "/users/self/verify", "").unwrap();
        assert_eq!(login, "lhmJXK08fk9SI1ZwFXKFRrPtzfbNOwC+D1xMJJ/1KZg=");
        // Same bytes, other order
        assert_ne!(
            sign("secret", "GET", "1700000000", "/users/self/verify", "").unwrap(),
            login
        );
    }

    #[test]
    fn test_login_request_shape() {
        let creds = Credentials::new("key", "secret", "phrase");
        let request = login_request(&creds, "1700000000").unwrap();
        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();

        assert_eq!(json["op"], "login");
        let arg = &json["args"][0];
        assert_eq!(arg["apiKey"], "key");
        assert_eq!(arg["passphrase"], "phrase");
        assert_eq!(arg["timestamp"], "1700000000");
        assert_eq!(arg["sign"], "lhmJXK08fk9SI1ZwFXKFRrPtzfbNOwC+D1xMJJ/1KZg=");
        assert!(json.get("id").is_none());
    }
}
