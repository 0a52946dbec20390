//! Session authentication configuration.

/// Secret and lifetime of the bearer session tokens.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC key shared with the login service that issues tokens.
    pub session_secret: Box<[u8]>,
    /// Maximum token age in seconds.
    pub max_session_age: i64,
}

impl AuthConfig {
    pub fn new(session_secret: impl Into<Box<[u8]>>, max_session_age: i64) -> Self {
        Self {
            session_secret: session_secret.into(),
            max_session_age,
        }
    }

    /// Get the secret key bytes for HMAC verification.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.session_secret
    }
}
