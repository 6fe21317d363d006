use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_ROUTE: &str = "/studio/api_special/insuite/mdm_customer/create1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_SERVICE_HEADER: &str = "x-service-key";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which of the two gateway addresses a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Internal,
    External,
}

impl Network {
    /// Reads the `X-Use-Internal` flag: only a case-insensitive `true` means
    /// internal, any other present value means external.
    pub fn from_flag(flag: Option<&str>, default: Network) -> Network {
        match flag {
            None => default,
            Some(v) if v.trim().eq_ignore_ascii_case("true") => Network::Internal,
            Some(_) => Network::External,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Internal => "internal",
            Network::External => "external",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "internal" => Ok(Network::Internal),
            "external" => Ok(Network::External),
            other => Err(format!("expected 'internal' or 'external', got '{}'", other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct InboundGuardSettings {
    pub service_key: String,
    pub header_name: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Everything the bridge needs, loaded once at startup.
#[derive(Clone)]
pub struct BridgeConfig {
    pub client_id: String,
    pub secret_key: String,
    pub database: String,
    pub internal_base_url: String,
    pub external_base_url: String,
    pub api_route: String,
    pub timeout: Duration,
    pub default_network: Network,
    pub host: String,
    pub port: u16,
    pub field_map_path: Option<PathBuf>,
    pub inbound_guard: Option<InboundGuardSettings>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let timeout_secs = parse_or(&get, "INSUITE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let default_network = parse_or(&get, "INSUITE_DEFAULT_NETWORK", Network::Internal)?;
        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;

        let inbound_guard = match get("BRIDGE_SERVICE_KEY") {
            Some(service_key) => Some(InboundGuardSettings {
                service_key,
                header_name: get("BRIDGE_SERVICE_HEADER")
                    .unwrap_or_else(|| DEFAULT_SERVICE_HEADER.to_string()),
                max_requests: parse_or(&get, "BRIDGE_RATE_LIMIT", 100)?,
                window_secs: parse_or(&get, "BRIDGE_RATE_WINDOW_SECS", 60)?,
            }),
            None => None,
        };

        Ok(Self {
            client_id: require("INSUITE_CLIENT_ID")?,
            secret_key: require("INSUITE_SECRET_KEY")?,
            database: require("INSUITE_DATABASE")?,
            internal_base_url: trim_base_url(require("INSUITE_BASE_URL_INTERNAL")?),
            external_base_url: trim_base_url(require("INSUITE_BASE_URL_EXTERNAL")?),
            api_route: get("INSUITE_API_ROUTE").unwrap_or_else(|| DEFAULT_API_ROUTE.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            default_network,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            field_map_path: get("FIELD_MAP_PATH").map(PathBuf::from),
            inbound_guard,
        })
    }

    pub fn base_url(&self, network: Network) -> &str {
        match network {
            Network::Internal => &self.internal_base_url,
            Network::External => &self.external_base_url,
        }
    }

    pub fn endpoint_url(&self, network: Network) -> String {
        format!("{}{}", self.base_url(network), self.api_route)
    }

    /// Client id safe to show in diagnostics.
    pub fn masked_client_id(&self) -> String {
        mask(&self.client_id)
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("client_id", &self.masked_client_id())
            .field("secret_key", &"<redacted>")
            .field("database", &self.database)
            .field("internal_base_url", &self.internal_base_url)
            .field("external_base_url", &self.external_base_url)
            .field("api_route", &self.api_route)
            .field("timeout", &self.timeout)
            .field("default_network", &self.default_network)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("field_map_path", &self.field_map_path)
            .field("inbound_guard", &self.inbound_guard.is_some())
            .finish()
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("INSUITE_CLIENT_ID", "abcdefgh12345678wxyz"),
            ("INSUITE_SECRET_KEY", "shh"),
            ("INSUITE_DATABASE", "tenant_db"),
            ("INSUITE_BASE_URL_INTERNAL", "http://10.0.0.1:32000/"),
            ("INSUITE_BASE_URL_EXTERNAL", "http://203.0.113.5:32000"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<BridgeConfig, ConfigError> {
        BridgeConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.api_route, DEFAULT_API_ROUTE);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.default_network, Network::Internal);
        assert_eq!(config.port, 5001);
        assert!(config.inbound_guard.is_none());
        assert_eq!(
            config.endpoint_url(Network::Internal),
            "http://10.0.0.1:32000/studio/api_special/insuite/mdm_customer/create1"
        );
    }

    #[test]
    fn missing_secret_is_reported() {
        let mut vars = base_vars();
        vars.remove("INSUITE_SECRET_KEY");
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("INSUITE_SECRET_KEY")
        );
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut vars = base_vars();
        vars.insert("INSUITE_TIMEOUT_SECS", "soon");
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name: "INSUITE_TIMEOUT_SECS", .. }
        ));
    }

    #[test]
    fn guard_enabled_by_service_key() {
        let mut vars = base_vars();
        vars.insert("BRIDGE_SERVICE_KEY", "k");
        vars.insert("BRIDGE_RATE_LIMIT", "5");
        let guard = load(&vars).unwrap().inbound_guard.unwrap();
        assert_eq!(guard.header_name, DEFAULT_SERVICE_HEADER);
        assert_eq!(guard.max_requests, 5);
        assert_eq!(guard.window_secs, 60);
    }

    #[test]
    fn network_flag() {
        assert_eq!(Network::from_flag(None, Network::External), Network::External);
        assert_eq!(Network::from_flag(Some("TRUE"), Network::External), Network::Internal);
        assert_eq!(Network::from_flag(Some("false"), Network::Internal), Network::External);
        assert_eq!(Network::from_flag(Some("yes"), Network::Internal), Network::External);
    }

    #[test]
    fn client_id_is_masked_in_debug() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.masked_client_id(), "abcdefgh...wxyz");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("shh"));
        assert!(!debug.contains("12345678"));
    }
}
