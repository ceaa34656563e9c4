use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use http::HeaderValue;

use crate::error::Result;

/// Username/password pair sent with every request of a session
///
/// Only the basic scheme is produced; servers that insist on a negotiated
/// scheme will answer 401 and the caller sees that status in `code()`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create a new set of credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Get the `Authorization` header value for the basic scheme
    pub fn authorization_header(&self) -> Result<HeaderValue> {
        let credentials = format!("{}:{}", self.username, self.password);
        let encoded = BASE64.encode(credentials.as_bytes());
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
