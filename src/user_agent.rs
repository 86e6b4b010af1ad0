//! Default User-Agent for media requests.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/mediadl";

/// Default User-Agent for media requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mediadl/{version} (+{PROJECT_UA_URL})")
}
