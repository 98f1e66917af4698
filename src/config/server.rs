use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Listen addresses of the two HTTP surfaces: event counters and the
/// exporter's own health metrics.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub exporter_host: String,

    #[serde(default = "default_exporter_port")]
    pub exporter_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            exporter_host: default_host(),
            exporter_port: default_exporter_port(),
        }
    }
}

impl ServerConfig {
    /// Validates listen configuration
    /// # Errors
    /// Returns `Error::Config` when:
    /// - Either port is 0
    /// - A host is not an IP address
    /// - Both servers would bind the same address
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 || self.exporter_port == 0 {
            return Err(invalid("server ports cannot be 0".into()));
        }

        for host in [&self.host, &self.exporter_host] {
            if host.parse::<std::net::IpAddr>().is_err() {
                return Err(invalid(format!("server host {host:?} is not an IP address")));
            }
        }

        if self.host == self.exporter_host && self.port == self.exporter_port {
            return Err(invalid(format!(
                "events and exporter servers both bind {}:{}",
                self.host, self.port
            )));
        }

        Ok(())
    }

    pub fn events_addr(&self) -> Result<std::net::SocketAddr> {
        socket_addr(&self.host, self.port)
    }

    pub fn exporter_addr(&self) -> Result<std::net::SocketAddr> {
        socket_addr(&self.exporter_host, self.exporter_port)
    }
}

fn socket_addr(
    host: &str,
    port: u16,
) -> Result<std::net::SocketAddr> {
    let ip: std::net::IpAddr = host
        .parse()
        .map_err(|e| invalid(format!("server host {host:?} is not an IP address: {e}")))?;
    Ok(std::net::SocketAddr::new(ip, port))
}

fn invalid(msg: String) -> Error {
    Error::Config(ConfigError::Message(msg))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_exporter_port() -> u16 {
    8081
}
