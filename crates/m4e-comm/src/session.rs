//! Session credentials obtained from a prior REST sign-in.

use std::fmt;

/// Session cookie the server requires on the WebSocket upgrade request.
///
/// Owned by whoever drives the connection and handed to it explicitly; the
/// connection refuses to open a socket without one.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    name: String,
    value: String,
}

impl SessionCredentials {
    /// Creates credentials from a session cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns false when either half of the cookie is missing.
    pub fn is_usable(&self) -> bool {
        !self.name.is_empty() && !self.value.is_empty()
    }

    /// Value of the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_format() {
        let creds = SessionCredentials::new("JSESSIONID", "abc123");
        assert_eq!(creds.cookie_header(), "JSESSIONID=abc123");
        assert!(creds.is_usable());
    }

    #[test]
    fn empty_value_is_unusable() {
        assert!(!SessionCredentials::new("JSESSIONID", "").is_usable());
        assert!(!SessionCredentials::new("", "abc").is_usable());
    }

    #[test]
    fn debug_hides_value() {
        let creds = SessionCredentials::new("JSESSIONID", "secret-token");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("JSESSIONID"));
        assert!(!debug.contains("secret-token"));
    }
}
