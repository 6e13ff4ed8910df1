//! Identification string attached to every outbound call

use crate::config::env_non_empty;

const TRANSPORT_NAME: &str = "reqwest";
const TRANSPORT_VERSION: &str = "0.11";
const HOST_APP_NAME: &str = "Grafana";
const HOST_APP_VERSION_VAR: &str = "GF_VERSION";
const BUILD_HASH_LEN: usize = 8;

/// `<transport>/<version> (<runtime>; <os>;) <plugin>/<version>-<hash> <host-app>/<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub transport: String,
    pub transport_version: String,
    pub runtime_version: String,
    pub os: String,
    pub plugin_name: String,
    pub plugin_version: String,
    pub build_hash: String,
    pub host_app: String,
    pub host_app_version: String,
}

impl UserAgent {
    /// Build information captured at compile time, host version read from the environment
    pub fn detect(plugin_name: &str) -> Self {
        let runtime_version = match option_env!("TWINMAKER_RUSTC_VERSION") {
            Some(version) => format!("rustc-{}", version),
            None => "rustc-unknown".to_string(),
        };

        Self {
            transport: TRANSPORT_NAME.to_string(),
            transport_version: TRANSPORT_VERSION.to_string(),
            runtime_version,
            os: std::env::consts::OS.to_string(),
            plugin_name: plugin_name.to_string(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            build_hash: truncate_hash(option_env!("TWINMAKER_BUILD_HASH").unwrap_or("?")),
            host_app: HOST_APP_NAME.to_string(),
            host_app_version: env_non_empty(HOST_APP_VERSION_VAR).unwrap_or_default(),
        }
    }
}

fn truncate_hash(hash: &str) -> String {
    hash.chars().take(BUILD_HASH_LEN).collect()
}

impl std::fmt::Display for UserAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({}; {};) {}/{}-{} {}/{}",
            self.transport,
            self.transport_version,
            self.runtime_version,
            self.os,
            self.plugin_name,
            self.plugin_version,
            self.build_hash,
            self.host_app,
            self.host_app_version
        )
    }
}
