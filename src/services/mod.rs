pub mod capi_client;
pub mod dedup_service;

pub use capi_client::CapiClient;
pub use dedup_service::{DedupOutcome, DedupService};
