use crate::catalog::{CatalogClient, CatalogError, CatalogInstance};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory catalog with fixed contents that records every query it receives.
///
/// Clones share the query log, so a clone handed to a router can be inspected
/// from the test afterwards.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    services: HashMap<String, Vec<CatalogInstance>>,
    failure: Option<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instances` under `service`, replacing earlier entries
    pub fn with_service(mut self, service: &str, instances: Vec<CatalogInstance>) -> Self {
        self.services.insert(service.to_string(), instances);
        self
    }

    /// Make every query fail with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Service names queried so far, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogClient for StaticCatalog {
    async fn query_instances(&self, service: &str) -> Result<Vec<CatalogInstance>, CatalogError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(service.to_string());
        }

        if let Some(message) = &self.failure {
            return Err(CatalogError::Unavailable(message.clone()));
        }

        Ok(self.services.get(service).cloned().unwrap_or_default())
    }
}
