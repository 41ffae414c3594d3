//! # Data Models
//!
//! Persistence entities and the small domain enums shared by the relay,
//! the outbound client and the HTTP handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod document;
pub mod platform;

pub use document::{DocumentStatus, Entity as Document, FormType, Transition};
pub use platform::Platform;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
    /// Portal project identifier
    pub project: String,
    /// Deployment-specific service identifier
    pub service_id: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "forms-relay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            project: "healthcare-forms".to_string(),
            service_id: "forms-relay".to_string(),
        }
    }
}

impl ServiceInfo {
    pub fn for_deployment(project: &str, service_id: &str) -> Self {
        Self {
            project: project.to_string(),
            service_id: service_id.to_string(),
            ..Self::default()
        }
    }
}
