// Copyright 2026 XLAN relay developers.
// This file is part of xlan-relay.

// xlan-relay is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// xlan-relay is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with xlan-relay.  If not, see <http://www.gnu.org/licenses/>.

//! Relay/client configuration.
//!
//! A plain serde struct with a hand-written `Default` impl supplying the
//! values the binary falls back to when no TOML file is given.

use serde_derive::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a relay acting as a host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_tcp: String,
    pub bind_udp: String,
    pub server_name: String,
    pub password: Option<String>,
    pub max_peers: usize,
    pub ping_interval_ms: u64,
    pub handshake_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            bind_tcp: "0.0.0.0:20000".to_string(),
            bind_udp: "0.0.0.0:20001".to_string(),
            server_name: "xlan-relay".to_string(),
            password: None,
            max_peers: 64,
            ping_interval_ms: 5_000,
            handshake_timeout_ms: 10_000,
        }
    }
}

impl RelayConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Configuration for a relay acting as a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connect_tcp: String,
    pub connect_udp: String,
    pub requested_name: Option<String>,
    pub password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_tcp: "127.0.0.1:20000".to_string(),
            connect_udp: "127.0.0.1:20001".to_string(),
            requested_name: None,
            password: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_config_default_matches_documented_values() {
        let config = RelayConfig::default();
        assert_eq!(config.max_peers, 64);
        assert_eq!(config.ping_interval_ms, 5_000);
        assert_eq!(config.handshake_timeout_ms, 10_000);
        assert_eq!(config.password, None);
    }

    #[test]
    fn relay_config_round_trips_through_toml() {
        let config = RelayConfig {
            bind_tcp: "127.0.0.1:9000".to_string(),
            password: Some("s3cret".to_string()),
            ..RelayConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        let parsed = RelayConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn relay_config_from_partial_toml_fills_defaults() {
        let parsed = RelayConfig::from_toml_str(r#"server_name = "my-house""#).unwrap();
        assert_eq!(parsed.server_name, "my-house");
        assert_eq!(parsed.bind_tcp, RelayConfig::default().bind_tcp);
    }

    #[test]
    fn client_config_default_has_no_requested_name() {
        assert_eq!(ClientConfig::default().requested_name, None);
    }
}
