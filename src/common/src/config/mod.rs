use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Listen address used when `ADDRESS` is unset or empty
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

/// Consul agent address used by the client library when `CONSUL_HTTP_ADDR` is unset
pub const DEFAULT_CONSUL_ADDR: &str = "127.0.0.1:8500";

const CONFIG_FILE: &str = "registrar.toml";

/// Connection settings for the Consul catalog.
///
/// Besides the config file and `REGISTRAR__CONSUL__*`, these are read from the
/// variables the Consul client libraries understand: `CONSUL_HTTP_ADDR`,
/// `CONSUL_HTTP_TOKEN`, `CONSUL_HTTP_AUTH`, `CONSUL_HTTP_SSL`,
/// `CONSUL_HTTP_SSL_VERIFY`, `CONSUL_CACERT`, `CONSUL_CLIENT_CERT` and
/// `CONSUL_CLIENT_KEY`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsulConfig {
    /// Agent address, either `host:port` or a full `http(s)://` URL
    pub addr: String,
    /// ACL token sent as `X-Consul-Token`
    pub token: Option<String>,
    /// HTTP basic auth credentials, `user` or `user:password`
    pub auth: Option<String>,
    /// Use https when `addr` carries no scheme
    pub ssl: bool,
    /// Verify the agent's TLS certificate
    pub ssl_verify: bool,
    /// PEM file with an extra CA certificate to trust
    pub ca_file: Option<String>,
    /// PEM client certificate, used together with `key_file`
    pub cert_file: Option<String>,
    /// PEM private key for `cert_file`
    pub key_file: Option<String>,
    /// Datacenter to query; the agent's own datacenter when unset
    pub datacenter: Option<String>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            addr: String::from(DEFAULT_CONSUL_ADDR),
            token: None,
            auth: None,
            ssl: false,
            ssl_verify: true,
            ca_file: None,
            cert_file: None,
            key_file: None,
            datacenter: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Configuration {
    /// Address the HTTP server binds to
    pub address: String,
    /// Catalog connection settings
    pub consul: ConsulConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_ADDRESS),
            consul: ConsulConfig::default(),
        }
    }
}

impl Configuration {
    /// Load configuration from `registrar.toml` and the environment
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::from_figment(Self::figment(Toml::file(CONFIG_FILE)))
    }

    /// Load configuration from an explicit file path and the environment
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Box<figment::Error>> {
        Self::from_figment(Self::figment(Toml::file(path.as_ref())))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        consul_client_env(
            Figment::from(Serialized::defaults(Configuration::default())).merge(file),
        )
        .merge(Env::raw().only(&["address"]))
        .merge(Env::prefixed("REGISTRAR__").split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self, Box<figment::Error>> {
        let mut config: Configuration = figment.extract().map_err(Box::new)?;
        if config.address.is_empty() {
            config.address = String::from(DEFAULT_ADDRESS);
        }
        Ok(config)
    }

    /// Socket address to bind; the port-only form `:8080` means all interfaces
    pub fn bind_address(&self) -> String {
        match self.address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.address.clone(),
        }
    }
}

/// Non-empty value of an environment variable
fn env_value(name: &str) -> Option<String> {
    Env::var(name).filter(|value| !value.is_empty())
}

/// Boolean spellings accepted by Go's `strconv.ParseBool`
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Merge the Consul client variables the way the client library reads them:
/// empty values are ignored and an unparseable boolean is logged and skipped.
fn consul_client_env(mut figment: Figment) -> Figment {
    const STRINGS: [(&str, &str); 6] = [
        ("CONSUL_HTTP_ADDR", "consul.addr"),
        ("CONSUL_HTTP_TOKEN", "consul.token"),
        ("CONSUL_HTTP_AUTH", "consul.auth"),
        ("CONSUL_CACERT", "consul.ca_file"),
        ("CONSUL_CLIENT_CERT", "consul.cert_file"),
        ("CONSUL_CLIENT_KEY", "consul.key_file"),
    ];
    const BOOLS: [(&str, &str); 2] = [
        ("CONSUL_HTTP_SSL", "consul.ssl"),
        ("CONSUL_HTTP_SSL_VERIFY", "consul.ssl_verify"),
    ];

    for (var, key) in STRINGS {
        if let Some(value) = env_value(var) {
            figment = figment.merge(Serialized::default(key, value));
        }
    }

    for (var, key) in BOOLS {
        if let Some(value) = env_value(var) {
            match parse_bool(&value) {
                Some(flag) => figment = figment.merge(Serialized::default(key, flag)),
                None => log::warn!("Could not parse {var}={value:?}, ignoring"),
            }
        }
    }

    figment
}
