//! Provider-shaped event payload.
//!
//! Field names follow the Conversions API contract, so serde renames are not
//! needed; what serializes here is exactly what goes over the wire.

use serde::Serialize;
use serde_json::{Map, Value};

use super::event::{InboundEvent, DEFAULT_EVENT_NAME};

/// Request-derived and body-derived signals about the converting user.
#[derive(Debug, Clone, Serialize)]
pub struct UserData {
    pub client_ip_address: Option<String>,
    pub client_user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Vec<String>>,
}

/// One event record inside the provider batch.
#[derive(Debug, Clone, Serialize)]
pub struct CapiEventRecord {
    pub event_name: String,
    pub event_time: i64,
    pub event_id: String,
    pub event_source_url: String,
    pub action_source: &'static str,
    pub user_data: UserData,
    pub custom_data: Map<String, Value>,
}

impl CapiEventRecord {
    /// Builds the outbound record from the inbound event plus the
    /// request-derived caller signals.
    pub fn from_inbound(
        event: &InboundEvent,
        client_ip: Option<String>,
        user_agent: Option<String>,
        event_time: i64,
    ) -> Self {
        Self {
            event_name: event
                .event_name
                .clone()
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            event_time,
            event_id: event.event_id.clone(),
            event_source_url: event.event_source_url.clone().unwrap_or_default(),
            action_source: "website",
            user_data: UserData {
                client_ip_address: client_ip,
                client_user_agent: user_agent,
                fbp: event.fbp.clone(),
                fbc: event.fbc.clone(),
                // Provider convention: external ids travel as a list even
                // when there is only one.
                external_id: event.external_id.clone().map(|id| vec![id]),
            },
            custom_data: event.custom_data.clone().unwrap_or_default(),
        }
    }
}

/// The single-element batch wrapper the events endpoint expects.
#[derive(Debug, Clone, Serialize)]
pub struct CapiPayload {
    pub data: Vec<CapiEventRecord>,
}

impl CapiPayload {
    pub fn single(record: CapiEventRecord) -> Self {
        Self { data: vec![record] }
    }
}
