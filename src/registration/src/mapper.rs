//! Registration document model and the mapping from catalog instances.
//!
//! Field names are part of the wire contract with the data plane and must not change.

use common::CatalogInstance;
use serde::Serialize;

/// Body of a successful registration lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RegistrationResponse {
    pub hosts: Vec<RegistrationHost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationHost {
    pub ip_address: String,
    pub port: u16,
    pub tags: RegistrationHostTags,
}

/// Per-host routing hints. Unset fields are omitted from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RegistrationHostTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub az: Option<String>,
    /// Reserved, no catalog signal maps to it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary: Option<bool>,
    /// Reserved, no catalog signal maps to it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_weight: Option<u32>,
}

impl From<&CatalogInstance> for RegistrationHost {
    fn from(instance: &CatalogInstance) -> Self {
        Self {
            ip_address: instance.address.clone(),
            port: instance.port,
            tags: RegistrationHostTags {
                az: Some(instance.datacenter.clone()).filter(|dc| !dc.is_empty()),
                canary: None,
                load_balancing_weight: None,
            },
        }
    }
}

/// Map catalog instances one-to-one onto registration hosts, keeping catalog order
pub fn map_instances(instances: &[CatalogInstance]) -> Vec<RegistrationHost> {
    instances.iter().map(RegistrationHost::from).collect()
}

impl RegistrationResponse {
    pub fn from_instances(instances: &[CatalogInstance]) -> Self {
        Self {
            hosts: map_instances(instances),
        }
    }

    /// Serialize with two-space indentation and a trailing newline
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        Ok(body)
    }
}
