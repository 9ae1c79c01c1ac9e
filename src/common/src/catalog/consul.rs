//! Consul catalog backend

use super::{CatalogClient, CatalogError, CatalogInstance};
use crate::config::ConsulConfig;
use async_trait::async_trait;
use reqwest::{Certificate, Client as HttpClient, Identity};
use url::Url;

/// Reads service instances from the Consul catalog HTTP API.
///
/// The underlying `reqwest` client pools connections and is cheap to clone, so one
/// instance is shared by all request handlers. A client that cannot be built (for
/// example an unreadable CA file) is kept as its error and reported by every query.
#[derive(Clone, Debug)]
pub struct ConsulCatalog {
    http_client: Result<HttpClient, String>,
    config: ConsulConfig,
}

impl ConsulCatalog {
    pub fn new(config: ConsulConfig) -> Self {
        let http_client = build_http_client(&config);
        if let Err(ref e) = http_client {
            log::error!("Failed to build Consul client: {e}");
        }
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &ConsulConfig {
        &self.config
    }

    /// Base URL of the agent, adding a scheme when the address has none
    fn base_url(&self) -> Result<Url, CatalogError> {
        let addr = self.config.addr.trim();
        let with_scheme = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else if self.config.ssl {
            format!("https://{addr}")
        } else {
            format!("http://{addr}")
        };

        Url::parse(&with_scheme).map_err(|e| CatalogError::InvalidAddress {
            address: self.config.addr.clone(),
            reason: e.to_string(),
        })
    }

    /// Build `/v1/catalog/service/<service>`, percent-encoding the service name
    fn service_url(&self, service: &str) -> Result<Url, CatalogError> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidAddress {
                address: self.config.addr.clone(),
                reason: "address cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["v1", "catalog", "service", service]);

        if let Some(dc) = self.config.datacenter.as_deref().filter(|dc| !dc.is_empty()) {
            url.query_pairs_mut().append_pair("dc", dc);
        }
        Ok(url)
    }
}

fn read_pem(kind: &str, path: &str) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error loading {kind} {path}: {e}"))
}

fn build_http_client(config: &ConsulConfig) -> Result<HttpClient, String> {
    let mut builder = HttpClient::builder();

    if !config.ssl_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ref ca_file) = config.ca_file {
        let pem = read_pem("CA file", ca_file)?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|e| format!("Error parsing CA file {ca_file}: {e}"))?;
        builder = builder.add_root_certificate(cert);
    }

    match (&config.cert_file, &config.key_file) {
        (Some(cert_file), Some(key_file)) => {
            let mut pem = read_pem("client key", key_file)?;
            pem.push(b'\n');
            pem.extend(read_pem("client certificate", cert_file)?);
            let identity = Identity::from_pem(&pem)
                .map_err(|e| format!("Error loading client certificate {cert_file}: {e}"))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(
                "Client certificate and client key must be configured together".to_string(),
            );
        }
    }

    builder.build().map_err(|e| e.to_string())
}

#[async_trait]
impl CatalogClient for ConsulCatalog {
    async fn query_instances(&self, service: &str) -> Result<Vec<CatalogInstance>, CatalogError> {
        let http_client = self
            .http_client
            .as_ref()
            .map_err(|e| CatalogError::Client(e.clone()))?;
        let url = self.service_url(service)?;
        log::debug!("Querying Consul catalog: {url}");

        let mut request = http_client.get(url);
        if let Some(ref token) = self.config.token {
            request = request.header("X-Consul-Token", token);
        }
        if let Some(ref auth) = self.config.auth {
            request = match auth.split_once(':') {
                Some((user, password)) => request.basic_auth(user, Some(password)),
                None => request.basic_auth(auth, None::<&str>),
            };
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let instances: Vec<CatalogInstance> = response.json().await?;
        log::debug!(
            "Consul returned {} instance(s) for service {service:?}",
            instances.len()
        );
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn catalog_for(server: &MockServer) -> ConsulCatalog {
        ConsulCatalog::new(ConsulConfig {
            addr: server.base_url(),
            ..Default::default()
        })
    }

    #[test]
    fn test_service_url_defaults_to_http() {
        let catalog = ConsulCatalog::new(ConsulConfig::default());
        let url = catalog.service_url("web").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8500/v1/catalog/service/web");
    }

    #[test]
    fn test_service_url_ssl_and_datacenter() {
        let catalog = ConsulCatalog::new(ConsulConfig {
            addr: "consul.internal:8501".to_string(),
            ssl: true,
            datacenter: Some("dc2".to_string()),
            ..Default::default()
        });
        let url = catalog.service_url("web").unwrap();
        assert_eq!(
            url.as_str(),
            "https://consul.internal:8501/v1/catalog/service/web?dc=dc2"
        );
    }

    #[test]
    fn test_service_url_explicit_scheme_wins() {
        let catalog = ConsulCatalog::new(ConsulConfig {
            addr: "http://10.0.0.1:8500".to_string(),
            ssl: true,
            ..Default::default()
        });
        let url = catalog.service_url("web").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8500/v1/catalog/service/web");
    }

    #[test]
    fn test_service_url_encodes_name() {
        let catalog = ConsulCatalog::new(ConsulConfig::default());

        let url = catalog.service_url("a b/c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8500/v1/catalog/service/a%20b%2Fc"
        );

        let url = catalog.service_url("").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8500/v1/catalog/service/");
    }

    #[test]
    fn test_invalid_address() {
        let catalog = ConsulCatalog::new(ConsulConfig {
            addr: "http://[not-an-ip".to_string(),
            ..Default::default()
        });
        let err = catalog.service_url("web").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_query_instances() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/catalog/service/web");
                then.status(200).json_body(json!([
                    {"Address": "10.0.0.5", "ServicePort": 8500, "Datacenter": "us-east-1a", "ServiceTags": []},
                    {"Address": "10.0.0.6", "ServicePort": 8501, "Datacenter": "us-east-1b", "ServiceTags": null}
                ]));
            })
            .await;

        let instances = catalog_for(&server).query_instances("web").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            instances,
            vec![
                CatalogInstance::new("10.0.0.5", 8500, "us-east-1a"),
                CatalogInstance::new("10.0.0.6", 8501, "us-east-1b"),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_sends_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/catalog/service/web")
                    .header("x-consul-token", "secret");
                then.status(200).json_body(json!([]));
            })
            .await;

        let catalog = ConsulCatalog::new(ConsulConfig {
            addr: server.base_url(),
            token: Some("secret".to_string()),
            ..Default::default()
        });
        let instances = catalog.query_instances("web").await.unwrap();

        mock.assert_async().await;
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn test_query_sends_basic_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/catalog/service/web")
                    // base64("user:pass")
                    .header("authorization", "Basic dXNlcjpwYXNz");
                then.status(200).json_body(json!([]));
            })
            .await;

        let catalog = ConsulCatalog::new(ConsulConfig {
            addr: server.base_url(),
            auth: Some("user:pass".to_string()),
            ..Default::default()
        });
        catalog.query_instances("web").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreadable_ca_file_fails_each_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/catalog/service/web");
                then.status(200).json_body(json!([]));
            })
            .await;

        let catalog = ConsulCatalog::new(ConsulConfig {
            addr: server.base_url(),
            ca_file: Some("/nonexistent/registrar-ca.pem".to_string()),
            ..Default::default()
        });

        for _ in 0..2 {
            let err = catalog.query_instances("web").await.unwrap_err();
            assert!(matches!(err, CatalogError::Client(_)));
            assert!(err.to_string().contains("/nonexistent/registrar-ca.pem"));
        }
        mock.assert_hits_async(0).await;
    }

    #[test]
    fn test_client_cert_requires_key() {
        let err = build_http_client(&ConsulConfig {
            cert_file: Some("/etc/consul/client.pem".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.contains("must be configured together"));
    }

    #[test]
    fn test_skip_verify_builds_client() {
        assert!(
            build_http_client(&ConsulConfig {
                ssl: true,
                ssl_verify: false,
                ..Default::default()
            })
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_query_unexpected_status() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/catalog/service/web");
                then.status(500).body("No cluster leader\n");
            })
            .await;

        let err = catalog_for(&server)
            .query_instances("web")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Unexpected response code: 500 (No cluster leader)"
        );
    }

    #[tokio::test]
    async fn test_query_undecodable_body() {
        let server = MockServer::start_async().await;
        let _m = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/catalog/service/web");
                then.status(200).body("not json");
            })
            .await;

        let err = catalog_for(&server)
            .query_instances("web")
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Transport(_)));
    }
}
