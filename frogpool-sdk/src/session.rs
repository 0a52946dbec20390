//! Bearer session tokens for the game APIs.
//!
//! A session token binds a wallet address to an issue timestamp:
//!
//! ```text
//! Authorization: Bearer {wallet_address}.{unix_timestamp}.{base64_signature}
//! ```
//!
//! The signature is `HMAC-SHA256("{wallet_address}.{unix_timestamp}", secret)`.
//! WebSocket upgrades cannot carry headers from browsers, so the same token
//! is accepted in the `token` query parameter there.
//!
//! The game server only verifies tokens. They are minted with
//! [`SessionToken::issue`] by the wallet login service that shares the
//! session secret.

/// Query parameter carrying the session token on WebSocket upgrades.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Default maximum age of a session token (in seconds).
pub const DEFAULT_MAX_SESSION_AGE: i64 = 7 * 24 * 60 * 60;

/// Errors produced by session token operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("session expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SessionError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// A parsed (not yet verified) session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub wallet_address: String,
    pub issued_at: i64,
    pub signature: Box<[u8]>,
}

impl SessionToken {
    /// Issue a token for `wallet_address` stamped with the current time.
    pub fn issue(wallet_address: &str, key: &[u8]) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        Self::issue_at(wallet_address, now, key)
    }

    /// Issue a token for `wallet_address` stamped with `issued_at`.
    pub fn issue_at(wallet_address: &str, issued_at: i64, key: &[u8]) -> Self {
        let data = format!("{wallet_address}.{issued_at}");
        let signature = ring::hmac::sign(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
        );
        Self {
            wallet_address: wallet_address.to_owned(),
            issued_at,
            signature: signature.as_ref().to_owned().into_boxed_slice(),
        }
    }

    /// Parse the `{wallet}.{timestamp}.{base64}` wire form.
    ///
    /// This does **not** verify the HMAC; call [`verify`](Self::verify).
    pub fn parse(token: &str) -> Result<Self, SessionError> {
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(issued_at), Some(wallet_address)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::InvalidFormat);
        };
        if wallet_address.is_empty() {
            return Err(SessionError::InvalidFormat);
        }
        let issued_at: i64 = issued_at
            .parse()
            .map_err(|_| SessionError::InvalidFormat)?;
        let signature = fast32::base64::RFC4648_NOPAD
            .decode_str(signature)
            .map_err(|_| SessionError::InvalidBase64)?
            .into_boxed_slice();
        Ok(Self {
            wallet_address: wallet_address.to_owned(),
            issued_at,
            signature,
        })
    }

    /// Verify the HMAC and token age against the current time, consuming
    /// `self` and returning the authenticated wallet address.
    pub fn verify(self, key: &[u8], max_age: i64) -> Result<String, SessionError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.verify_at(key, max_age, now)
    }

    /// Same as [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(self, key: &[u8], max_age: i64, now: i64) -> Result<String, SessionError> {
        let data = format!("{}.{}", self.wallet_address, self.issued_at);
        ring::hmac::verify(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
            self.signature.as_ref(),
        )?;
        if now - self.issued_at > max_age {
            return Err(SessionError::Expired);
        }
        Ok(self.wallet_address)
    }

    /// Format the wire form of the token.
    pub fn to_token_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.wallet_address,
            self.issued_at,
            fast32::base64::RFC4648_NOPAD.encode(&self.signature)
        )
    }
}

/// Parse and verify a token in one step.
pub fn verify_token(token: &str, key: &[u8], max_age: i64) -> Result<String, SessionError> {
    SessionToken::parse(token)?.verify(key, max_age)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"session-secret";

    #[test]
    fn test_issue_then_verify() {
        let token = SessionToken::issue_at("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", 1_000, KEY);
        let wire = token.to_token_string();
        let wallet = SessionToken::parse(&wire)
            .unwrap()
            .verify_at(KEY, 60, 1_030)
            .unwrap();
        assert_eq!(wallet, "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
    }

    #[test]
    fn test_rejects_wrong_key_and_tampering() {
        let wire = SessionToken::issue_at("wallet-a", 1_000, KEY).to_token_string();
        assert!(matches!(
            SessionToken::parse(&wire).unwrap().verify_at(b"other", 60, 1_000),
            Err(SessionError::SignatureMismatch)
        ));

        let forged = wire.replacen("wallet-a", "wallet-b", 1);
        assert!(matches!(
            SessionToken::parse(&forged).unwrap().verify_at(KEY, 60, 1_000),
            Err(SessionError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_rejects_expired() {
        let wire = SessionToken::issue_at("wallet-a", 1_000, KEY).to_token_string();
        assert!(matches!(
            SessionToken::parse(&wire).unwrap().verify_at(KEY, 60, 1_061),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(SessionToken::parse("nodots"), Err(SessionError::InvalidFormat)));
        assert!(matches!(
            SessionToken::parse("wallet.notanumber.AAAA"),
            Err(SessionError::InvalidFormat)
        ));
        assert!(matches!(
            SessionToken::parse(".1000.AAAA"),
            Err(SessionError::InvalidFormat)
        ));
        assert!(matches!(
            SessionToken::parse("wallet.1000.!!!"),
            Err(SessionError::InvalidBase64)
        ));
    }
}
