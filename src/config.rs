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

//! Configuration structures for the charm.
//!
//! Two kinds of configuration live here:
//! - [`CharmConfig`], the operator-facing options read with `config-get`
//! - [`RuntimeConfig`], how the charm binary itself behaves (polling, names)

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CharmError, Result};

/// Raw charm configuration as returned by the model.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Typed view of the charm options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CharmConfig {
    /// Port the workload listens on inside the pod.
    #[serde(default = "default_advertised_port")]
    pub advertised_port: u16,

    /// Workload log verbosity.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Name of the provisioned Prometheus datasource.
    #[serde(default = "default_datasource_name")]
    pub datasource_name: String,
}

impl CharmConfig {
    /// Parses and validates the raw configuration map.
    ///
    /// Unknown keys are ignored.
    pub fn from_map(map: &ConfigMap) -> Result<Self> {
        let config: CharmConfig = serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(CharmError::MalformedConfig)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.advertised_port == 0 {
            return Err(CharmError::invalid_config("advertised-port", "must not be zero"));
        }
        if self.datasource_name.trim().is_empty() {
            return Err(CharmError::invalid_config("datasource-name", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            advertised_port: default_advertised_port(),
            log_level: LogLevel::default(),
            datasource_name: default_datasource_name(),
        }
    }
}

fn default_advertised_port() -> u16 {
    3000
}

fn default_datasource_name() -> String {
    "prometheus".to_string()
}

/// Workload log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// Returns the value the workload expects.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container image metadata from the OCI image resource.
///
/// Deserialized from the YAML file `resource-get` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Fully qualified image path.
    #[serde(rename = "registrypath")]
    pub image_path: String,

    /// Registry username, for private registries.
    #[serde(rename = "username", default, skip_serializing_if = "Option::is_none")]
    pub repo_username: Option<String>,

    /// Registry password, for private registries.
    #[serde(rename = "password", default, skip_serializing_if = "Option::is_none")]
    pub repo_password: Option<String>,
}

impl ImageMeta {
    /// Creates image metadata for a public image.
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            repo_username: None,
            repo_password: None,
        }
    }

    /// Parses the resource YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let meta: ImageMeta = serde_yaml::from_str(content)?;
        if meta.image_path.trim().is_empty() {
            return Err(CharmError::invalid_config("registrypath", "must not be empty"));
        }
        Ok(meta)
    }
}

/// Configuration for the charm binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// How `config-changed` waits for the pod.
    #[serde(default)]
    pub readiness: ReadinessPolicy,

    /// Name of the OCI image resource.
    #[serde(default = "default_image_resource")]
    pub image_resource: String,

    /// Name of the relation the Prometheus server joins on.
    #[serde(default = "default_relation_name")]
    pub relation_name: String,

    /// Namespace override. Defaults to the model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Kubeconfig file. In-cluster configuration is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessPolicy::default(),
            image_resource: default_image_resource(),
            relation_name: default_relation_name(),
            namespace: None,
            kubeconfig: None,
        }
    }
}

impl RuntimeConfig {
    /// Parses a YAML document and validates it.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values deserialization cannot.
    pub fn validate(&self) -> Result<()> {
        if self.relation_name.trim().is_empty() {
            return Err(CharmError::invalid_config("relationName", "must not be empty"));
        }
        self.readiness.validate()
    }
}

fn default_image_resource() -> String {
    "grafana-image".to_string()
}

fn default_relation_name() -> String {
    "prometheus".to_string()
}

/// Bounds for the readiness loop in `config-changed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessPolicy {
    /// Delay between two observations.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum number of observations per invocation.
    #[serde(default = "default_max_observations")]
    pub max_observations: u32,

    /// Fraction of `poll_interval` added as random jitter.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_observations: default_max_observations(),
            jitter: default_jitter(),
        }
    }
}

impl ReadinessPolicy {
    /// Returns a policy that observes `max_observations` times without waiting.
    pub fn immediate(max_observations: u32) -> Self {
        Self {
            poll_interval: Duration::ZERO,
            max_observations,
            jitter: 0.0,
        }
    }

    /// Returns the delay before the next observation, jitter included.
    pub fn next_interval(&self) -> Duration {
        if self.jitter <= 0.0 || self.poll_interval.is_zero() {
            return self.poll_interval;
        }
        let jitter = rand::thread_rng().gen_range(0.0..self.jitter);
        Duration::from_secs_f64(self.poll_interval.as_secs_f64() * (1.0 + jitter))
    }

    fn validate(&self) -> Result<()> {
        if self.max_observations == 0 {
            return Err(CharmError::invalid_config(
                "readiness.maxObservations",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(CharmError::invalid_config(
                "readiness.jitter",
                format!("must be in [0, 1), got {}", self.jitter),
            ));
        }
        Ok(())
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_observations() -> u32 {
    60
}

fn default_jitter() -> f64 {
    0.1
}

/// Module for duration serialization/deserialization with human-readable format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
