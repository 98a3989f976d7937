pub mod capi;
pub mod event;

pub use capi::{CapiEventRecord, CapiPayload, UserData};
pub use event::{CollectAck, InboundEvent, DEFAULT_EVENT_NAME};
