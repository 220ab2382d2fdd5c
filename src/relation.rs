// Copyright 2025 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The `http` relation interface.
//!
//! A Prometheus server publishes `host` and `port` on the relation. Until
//! both are present the dependency is not considered available.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CharmError, Result};

/// Connection details of the Prometheus server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDetails {
    /// Hostname or address the server is reachable on.
    pub host: String,
    /// Port the server listens on.
    pub port: u16,
}

impl ServerDetails {
    /// Creates server details.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Decodes the remote unit's relation data.
    ///
    /// Returns `Ok(None)` while the remote side has not published both keys.
    pub fn from_relation_data(data: &HashMap<String, String>) -> Result<Option<Self>> {
        let host = match data.get("host").map(|h| h.trim()) {
            Some(host) if !host.is_empty() => host,
            _ => return Ok(None),
        };
        let port = match data.get("port").map(|p| p.trim()) {
            Some(port) if !port.is_empty() => port,
            _ => return Ok(None),
        };

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| CharmError::InvalidRelationData {
                key: "port".to_string(),
                reason: format!("{:?} is not a valid port", port),
            })?;

        Ok(Some(Self::new(host, port)))
    }

    /// Returns the base URL of the server.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_complete_relation_data() {
        let details = ServerDetails::from_relation_data(&data(&[("host", "h"), ("port", "9090")]))
            .unwrap()
            .unwrap();
        assert_eq!(details, ServerDetails::new("h", 9090));
        assert_eq!(details.url(), "http://h:9090");
    }

    #[test]
    fn test_incomplete_relation_data() {
        assert_eq!(ServerDetails::from_relation_data(&data(&[])).unwrap(), None);
        assert_eq!(
            ServerDetails::from_relation_data(&data(&[("host", "h")])).unwrap(),
            None
        );
        assert_eq!(
            ServerDetails::from_relation_data(&data(&[("host", ""), ("port", "9090")])).unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_port() {
        for port in ["ninety", "0", "70000"] {
            let err = ServerDetails::from_relation_data(&data(&[("host", "h"), ("port", port)]))
                .unwrap_err();
            assert!(matches!(err, CharmError::InvalidRelationData { .. }));
        }
    }
}
