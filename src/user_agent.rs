//! Default identification header for outbound requests.
//!
//! Every request a run makes (API lookups, proxy probes, document fetches and
//! the snapshot converter) carries the same User-Agent unless the
//! configuration overrides it (RFC 9308 good citizenship).

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/nicksrandall/bibarchive";

/// Default User-Agent used when the configuration does not set one.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bibarchive/{version} (research-tool; +{PROJECT_UA_URL})")
}
