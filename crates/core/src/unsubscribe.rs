//! Signed one-click unsubscribe tokens.
//!
//! A token is `base64url(json claims) "." hex(hmac_sha256(secret, encoded claims))`.
//! Claims carry the user, the single channel being unsubscribed and the issue
//! time. The store additionally remembers the most recent token per row, so a
//! token is only redeemable against the rows it was issued for.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::channels::Channel;
use crate::types::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Decoded contents of an unsubscribe token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeClaims {
    pub user_id: UserId,
    pub channel: Channel,
    pub issued_at_epoch_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token is not in '<claims>.<signature>' form")]
    Malformed,

    #[error("Token signature does not match")]
    BadSignature,

    #[error("Token claims could not be decoded: {0}")]
    BadClaims(String),
}

fn mac(secret: &[u8], encoded_claims: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(encoded_claims.as_bytes());
    mac
}

/// Issue a token for `claims`.
pub fn issue(secret: &[u8], claims: &UnsubscribeClaims) -> String {
    // Serializing a struct of strings and integers cannot fail.
    let json = serde_json::to_vec(claims).unwrap_or_default();
    let encoded = URL_SAFE_NO_PAD.encode(json);
    let signature = hex::encode(mac(secret, &encoded).finalize().into_bytes());
    format!("{encoded}.{signature}")
}

/// Verify the signature and decode the claims.
pub fn decode(secret: &[u8], token: &str) -> Result<UnsubscribeClaims, TokenError> {
    let (encoded, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;
    mac(secret, encoded)
        .verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let json = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| TokenError::BadClaims(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| TokenError::BadClaims(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims() -> UnsubscribeClaims {
        UnsubscribeClaims {
            user_id: "u1".into(),
            channel: Channel::Email,
            issued_at_epoch_ms: 1_767_225_600_000,
        }
    }

    #[test]
    fn issued_token_decodes_to_same_claims() {
        let token = issue(SECRET, &claims());
        assert_eq!(decode(SECRET, &token), Ok(claims()));
    }

    #[test]
    fn token_is_url_safe() {
        let token = issue(SECRET, &claims());
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(SECRET, &claims());
        assert_eq!(decode(b"other", &token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = issue(SECRET, &claims());
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = UnsubscribeClaims {
            channel: Channel::Sms,
            ..claims()
        };
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        assert_eq!(
            decode(SECRET, &format!("{forged}.{sig}")),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(decode(SECRET, "not-a-token"), Err(TokenError::Malformed));
        assert_eq!(decode(SECRET, "abc.zz"), Err(TokenError::Malformed));
    }
}
