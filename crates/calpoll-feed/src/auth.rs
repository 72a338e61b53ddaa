//! Authorization header construction.
//!
//! Basic credentials follow RFC 7617; bearer tokens are sent verbatim.

use base64::Engine;

use crate::config::Credential;

/// Returns the `Authorization` header value for a credential, if any.
pub fn authorization_header(credential: &Credential) -> Option<String> {
    match credential {
        Credential::None => None,
        Credential::Basic { user, pass } => Some(basic_auth(user, pass)),
        Credential::Bearer { token } => Some(format!("Bearer {}", token)),
    }
}

/// Generates a Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}
