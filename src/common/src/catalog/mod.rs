//! Service catalog access.
//!
//! The registration service only ever asks one question of the catalog: which
//! instances are registered under a service name. [`CatalogClient`] captures that
//! capability so handlers can run against Consul in production and against an
//! in-memory substitute in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod consul;

pub use consul::ConsulCatalog;

/// A single registered instance of a service, as reported by the catalog.
///
/// Deserializes from the Consul `/v1/catalog/service/:service` entry format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CatalogInstance {
    /// Address of the node the instance runs on
    #[serde(rename = "Address")]
    pub address: String,
    /// Port the service listens on
    #[serde(rename = "ServicePort")]
    pub port: u16,
    /// Datacenter the node belongs to
    #[serde(rename = "Datacenter", default)]
    pub datacenter: String,
    #[serde(rename = "Node", default)]
    pub node: String,
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
    #[serde(rename = "ServiceName", default)]
    pub service_name: String,
    /// Service-specific address, empty when the node address applies
    #[serde(rename = "ServiceAddress", default)]
    pub service_address: String,
    #[serde(rename = "ServiceTags", default, deserialize_with = "null_as_empty")]
    pub service_tags: Vec<String>,
}

impl CatalogInstance {
    pub fn new(address: impl Into<String>, port: u16, datacenter: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port,
            datacenter: datacenter.into(),
            ..Default::default()
        }
    }
}

// Consul reports `"ServiceTags": null` for untagged services
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response code: {status} ({body})")]
    UnexpectedStatus { status: u16, body: String },

    /// The HTTP client could not be constructed from the connection settings
    #[error("{0}")]
    Client(String),

    /// Raised by substitute catalogs that simulate a failing backend
    #[cfg(any(test, feature = "testing"))]
    #[error("{0}")]
    Unavailable(String),
}

/// Query interface to the service catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Return every instance registered under `service`, in catalog order.
    ///
    /// No tag filter is applied.
    async fn query_instances(&self, service: &str) -> Result<Vec<CatalogInstance>, CatalogError>;
}
