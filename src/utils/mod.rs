//! Request-header helpers and Brazil-local time formatting.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use chrono_tz::America::Sao_Paulo;
use chrono_tz::Tz;

/// Forwarded-for style headers, checked in priority order.
const CLIENT_IP_HEADERS: [&str; 3] = ["x-nf-client-connection-ip", "x-forwarded-for", "x-real-ip"];

/// Caller IP as reported by the edge, or None when no header is present.
///
/// `x-forwarded-for` may carry a proxy chain; only the first (client) entry
/// is used.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    for name in CLIENT_IP_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or(value).trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    None
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Current instant in America/Sao_Paulo.
pub fn sao_paulo_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Sao_Paulo)
}

/// Renders a UTC instant as Brazil-local `(YYYY-MM-DD, HH:MM:SS)` for the
/// audit log line.
pub fn sao_paulo_stamp(instant: DateTime<Utc>) -> (String, String) {
    let local = instant.with_timezone(&Sao_Paulo);
    (
        local.format("%Y-%m-%d").to_string(),
        local.format("%H:%M:%S").to_string(),
    )
}
