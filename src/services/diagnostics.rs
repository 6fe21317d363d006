use crate::config::{BridgeConfig, Network};
use log::debug;
use reqwest::Url;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointProbe {
    pub network: Network,
    pub host: String,
    pub port: u16,
    pub reachable: bool,
    pub error: Option<String>,
}

/// TCP connect check against the host and port of `base_url`.
pub async fn probe_endpoint(network: Network, base_url: &str, limit: Duration) -> EndpointProbe {
    let (host, port) = match host_and_port(base_url) {
        Ok(parts) => parts,
        Err(e) => {
            return EndpointProbe {
                network,
                host: base_url.to_string(),
                port: 0,
                reachable: false,
                error: Some(e),
            }
        }
    };

    debug!("Probing {} endpoint {}:{}", network, host, port);
    let error = match timeout(limit, TcpStream::connect((host.as_str(), port))).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("no answer within {:?}", limit)),
    };

    EndpointProbe {
        network,
        host,
        port,
        reachable: error.is_none(),
        error,
    }
}

/// Probes both configured gateways.
pub async fn probe_all(config: &BridgeConfig, limit: Duration) -> Vec<EndpointProbe> {
    let mut probes = Vec::with_capacity(2);
    for network in [Network::External, Network::Internal] {
        probes.push(probe_endpoint(network, config.base_url(network), limit).await);
    }
    probes
}

/// Which network to use given probe results, external first.
pub fn recommend(probes: &[EndpointProbe]) -> Option<Network> {
    [Network::External, Network::Internal]
        .into_iter()
        .find(|network| probes.iter().any(|p| p.network == *network && p.reachable))
}

fn host_and_port(base_url: &str) -> Result<(String, u16), String> {
    let url = Url::parse(base_url).map_err(|e| format!("invalid URL '{}': {}", base_url, e))?;
    let host = url
        .host_str()
        .ok_or_else(|| format!("URL '{}' has no host", base_url))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| format!("URL '{}' has no port", base_url))?;
    Ok((host, port))
}
