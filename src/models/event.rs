//! Inbound event notification and the handler's response shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name used when the client does not send one.
pub const DEFAULT_EVENT_NAME: &str = "GroupJoinIntent";

/// One conversion event as posted by the browser.
///
/// `event_id` is the dedup key and the only required field; everything else
/// is optional browser-tracking context passed through to the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub event_id: String,
    pub event_name: Option<String>,
    pub event_source_url: Option<String>,
    pub fbp: Option<String>,
    pub fbc: Option<String>,
    pub external_id: Option<String>,
    pub custom_data: Option<Map<String, Value>>,
}

/// Acknowledgment returned to the caller on every path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectAck {
    pub fn accepted(count: Option<i64>, status: Option<u16>) -> Self {
        Self {
            ok: true,
            duplicate: None,
            count,
            status,
            error: None,
        }
    }

    pub fn duplicate(count: Option<i64>) -> Self {
        Self {
            ok: true,
            duplicate: Some(true),
            count,
            status: None,
            error: None,
        }
    }

    pub fn error(marker: &str) -> Self {
        Self {
            ok: false,
            duplicate: None,
            count: None,
            status: None,
            error: Some(marker.to_string()),
        }
    }
}
