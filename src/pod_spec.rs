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

//! Pod spec types and the pod spec builder.
//!
//! The types serialize to the Juju podspec (version 3) document that
//! `pod-spec-set` accepts. A spec has no identity of its own: it is rebuilt
//! from scratch on every event and replaces the previous one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{CharmConfig, ConfigMap, ImageMeta};
use crate::error::Result;
use crate::relation::ServerDetails;

/// Podspec format version produced by this charm.
pub const POD_SPEC_VERSION: u32 = 3;

/// Path the workload reports health on.
pub const HEALTH_PATH: &str = "/api/health";

/// Directory Grafana reads datasource provisioning files from.
pub const DATASOURCES_MOUNT_PATH: &str = "/etc/grafana/provisioning/datasources";

const DATASOURCES_FILE: &str = "datasources.yaml";

/// The deployment document for the workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub version: u32,
    pub containers: Vec<ContainerSpec>,
}

impl PodSpec {
    /// Serializes the spec to the YAML form `pod-spec-set` reads.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Returns the container with the given name.
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// A single container of the pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image_details: ImageDetails,
    pub ports: Vec<ContainerPort>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_config: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_config: Vec<VolumeConfig>,
    pub kubernetes: ContainerProbes,
}

/// Where to pull the image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetails {
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl From<&ImageMeta> for ImageDetails {
    fn from(meta: &ImageMeta) -> Self {
        Self {
            image_path: meta.image_path.clone(),
            username: meta.repo_username.clone(),
            password: meta.repo_password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub name: String,
    pub container_port: u16,
    pub protocol: String,
}

/// Files mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeConfig {
    pub name: String,
    pub mount_path: String,
    pub files: Vec<VolumeFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProbes {
    pub readiness_probe: Probe,
    pub liveness_probe: Probe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub http_get: HttpGetAction,
    pub initial_delay_seconds: u32,
    pub timeout_seconds: u32,
    pub period_seconds: u32,
    pub failure_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGetAction {
    pub path: String,
    pub port: u16,
}

/// Datasource provisioning document.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasourceProvisioning<'a> {
    api_version: u32,
    datasources: Vec<Datasource<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Datasource<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    access: &'a str,
    url: String,
    is_default: bool,
}

/// Builds the pod spec for the workload.
///
/// `server_details` carries the Prometheus connection once the dependency is
/// available. Without it the spec has no datasource configuration at all.
///
/// Fails when `charm_config` does not validate.
pub fn build_juju_pod_spec(
    app_name: &str,
    charm_config: &ConfigMap,
    image_meta: &ImageMeta,
    server_details: Option<&ServerDetails>,
) -> Result<PodSpec> {
    let config = CharmConfig::from_map(charm_config)?;

    let mut env_config = BTreeMap::new();
    env_config.insert(
        "GF_SERVER_HTTP_PORT".to_string(),
        config.advertised_port.to_string(),
    );
    env_config.insert("GF_LOG_LEVEL".to_string(), config.log_level.to_string());

    let mut volume_config = Vec::new();
    if let Some(server) = server_details {
        env_config.insert("PROMETHEUS_HOST".to_string(), server.host.clone());
        env_config.insert("PROMETHEUS_PORT".to_string(), server.port.to_string());
        volume_config.push(VolumeConfig {
            name: "datasources".to_string(),
            mount_path: DATASOURCES_MOUNT_PATH.to_string(),
            files: vec![VolumeFile {
                path: DATASOURCES_FILE.to_string(),
                content: build_datasources_file(&config, server)?,
            }],
        });
    }

    let container = ContainerSpec {
        name: app_name.to_string(),
        image_details: ImageDetails::from(image_meta),
        ports: vec![ContainerPort {
            name: "http".to_string(),
            container_port: config.advertised_port,
            protocol: "TCP".to_string(),
        }],
        env_config,
        volume_config,
        kubernetes: ContainerProbes {
            readiness_probe: http_probe(config.advertised_port, 10, 10),
            liveness_probe: http_probe(config.advertised_port, 60, 3),
        },
    };

    Ok(PodSpec {
        version: POD_SPEC_VERSION,
        containers: vec![container],
    })
}

fn http_probe(port: u16, initial_delay_seconds: u32, failure_threshold: u32) -> Probe {
    Probe {
        http_get: HttpGetAction {
            path: HEALTH_PATH.to_string(),
            port,
        },
        initial_delay_seconds,
        timeout_seconds: 30,
        period_seconds: 10,
        failure_threshold,
    }
}

fn build_datasources_file(config: &CharmConfig, server: &ServerDetails) -> Result<String> {
    let doc = DatasourceProvisioning {
        api_version: 1,
        datasources: vec![Datasource {
            name: &config.datasource_name,
            kind: "prometheus",
            access: "proxy",
            url: server.url(),
            is_default: true,
        }],
    };
    Ok(serde_yaml::to_string(&doc)?)
}
