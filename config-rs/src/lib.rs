//! config-rs/lib.rs
//! Shared configuration utilities for the Telemetry Insight services.
//! Provides standardized port/address lookup, `.env` loading and the
//! database URL shared by the store and the telemetry repository.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Variable holding the Postgres connection string
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Load a `.env` file from the working directory if one exists.
///
/// Returns whether a file was loaded. Variables already set in the
/// environment win over the file.
pub fn load_dotenv() -> bool {
    match dotenv::dotenv() {
        Ok(path) => {
            log::debug!("Loaded environment from {}", path.display());
            true
        }
        Err(_) => false,
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "GATEWAY")
/// * `default_port` - The default port to use if not specified in environment
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    match env::var(&var_name) {
        Ok(value) => value.trim().parse::<u16>().unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        }),
        Err(_) => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// `{SERVICE}_SERVICE_ADDR` overrides everything and may be given as
/// `host:port` or `http://host:port`; otherwise the service binds all
/// interfaces on `{SERVICE}_SERVICE_PORT` or the default port.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let trimmed = addr_str
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        match trimmed.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
}

/// Postgres connection string, if configured
pub fn database_url() -> Option<String> {
    env::var(DATABASE_URL_VAR)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Service configuration helper bound to one service name
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    service_name: String,
}

impl ServiceConfig {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_uppercase().replace('-', "_"),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn get_service_port(&self, default_port: u16) -> u16 {
        get_service_port(&self.service_name, default_port)
    }

    pub fn get_bind_address(&self, default_port: u16) -> SocketAddr {
        get_bind_address(&self.service_name, default_port)
    }
}
