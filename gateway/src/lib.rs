pub mod generator;
pub mod pipeline;
pub mod server;

pub use dispatch_client::{DispatchClient, DispatchResult, DispatchStatus};

/// Structured incident report submitted by the UI layer.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub zone_id: String,
    pub incident_type: String,
    pub message: String,
}

impl DispatchRequest {
    pub fn new(
        zone_id: impl Into<String>,
        incident_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            incident_type: incident_type.into(),
            message: message.into(),
        }
    }
}
