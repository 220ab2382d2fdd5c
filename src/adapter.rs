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

//! The boundary between the charm and the operator framework.
//!
//! Handlers only ever talk to the framework through [`FrameworkAdapter`].
//! [`HookToolAdapter`] is the production implementation and forwards every
//! call to the hook tools the Juju agent puts on `PATH`.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ConfigMap, ImageMeta, RuntimeConfig};
use crate::error::{CharmError, Result};
use crate::pod_spec::PodSpec;
use crate::status::UnitStatus;

/// The calls a handler may make against the framework.
///
/// Implementations only forward; they hold no charm logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameworkAdapter: Send + Sync {
    /// Returns the application name.
    async fn get_app_name(&self) -> Result<String>;

    /// Returns the model name, which is also the Kubernetes namespace.
    async fn get_model_name(&self) -> Result<String>;

    /// Returns a snapshot of the charm configuration.
    async fn get_config(&self) -> Result<ConfigMap>;

    /// Returns the workload image metadata.
    async fn get_image_meta(&self) -> Result<ImageMeta>;

    /// Replaces the pod spec of the application.
    async fn set_pod_spec(&self, spec: &PodSpec) -> Result<()>;

    /// Replaces the unit status.
    async fn set_unit_status(&self, status: &UnitStatus) -> Result<()>;

    /// Returns true if this unit is the application leader.
    async fn am_i_leader(&self) -> Result<bool>;
}

/// Adapter backed by the Juju hook tools.
#[derive(Debug, Clone)]
pub struct HookToolAdapter {
    unit_name: String,
    model_name: String,
    image_resource: String,
    tools_dir: Option<PathBuf>,
}

impl HookToolAdapter {
    /// Creates an adapter for the given unit.
    pub fn new(
        unit_name: impl Into<String>,
        model_name: impl Into<String>,
        image_resource: impl Into<String>,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            model_name: model_name.into(),
            image_resource: image_resource.into(),
            tools_dir: None,
        }
    }

    /// Creates an adapter from the hook environment.
    pub fn from_env(config: &RuntimeConfig) -> Result<Self> {
        let unit_name =
            std::env::var("JUJU_UNIT_NAME").map_err(|_| CharmError::MissingEnv("JUJU_UNIT_NAME"))?;
        let model_name = std::env::var("JUJU_MODEL_NAME")
            .map_err(|_| CharmError::MissingEnv("JUJU_MODEL_NAME"))?;
        Ok(Self::new(unit_name, model_name, &config.image_resource))
    }

    /// Resolves hook tools from `dir` instead of `PATH`.
    pub fn with_tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = Some(dir.into());
        self
    }

    /// Returns the unit name, e.g. `grafana/0`.
    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Returns the application part of the unit name.
    pub fn app_name(&self) -> &str {
        self.unit_name
            .split_once('/')
            .map_or(self.unit_name.as_str(), |(app, _)| app)
    }

    /// Reads the remote unit's data on the relation that triggered the hook.
    pub async fn remote_relation_data(&self) -> Result<HashMap<String, String>> {
        let remote_unit = std::env::var("JUJU_REMOTE_UNIT")
            .map_err(|_| CharmError::MissingEnv("JUJU_REMOTE_UNIT"))?;
        let output = self
            .run_tool("relation-get", &["--format=json", "-", remote_unit.as_str()])
            .await?;
        parse_relation_data(&output)
    }

    fn tool_path(&self, tool: &str) -> PathBuf {
        match &self.tools_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    async fn run_tool(&self, tool: &str, args: &[&str]) -> Result<String> {
        tracing::debug!(tool, ?args, "running hook tool");

        let output = Command::new(self.tool_path(tool))
            .args(args)
            .output()
            .await
            .map_err(|e| CharmError::HookTool {
                tool: tool.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CharmError::HookTool {
                tool: tool.to_string(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl FrameworkAdapter for HookToolAdapter {
    async fn get_app_name(&self) -> Result<String> {
        Ok(self.app_name().to_string())
    }

    async fn get_model_name(&self) -> Result<String> {
        Ok(self.model_name.clone())
    }

    async fn get_config(&self) -> Result<ConfigMap> {
        let output = self.run_tool("config-get", &["--format=json"]).await?;
        let value: serde_json::Value = serde_json::from_str(&output)?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            serde_json::Value::Null => Ok(ConfigMap::new()),
            other => Err(CharmError::HookTool {
                tool: "config-get".to_string(),
                reason: format!("expected a JSON object, got {}", other),
            }),
        }
    }

    async fn get_image_meta(&self) -> Result<ImageMeta> {
        let output = self.run_tool("resource-get", &[self.image_resource.as_str()]).await?;
        let path = Path::new(output.trim());
        let content = tokio::fs::read_to_string(path).await?;
        ImageMeta::from_yaml(&content)
    }

    async fn set_pod_spec(&self, spec: &PodSpec) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("pod-spec-")
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(spec.to_yaml()?.as_bytes())?;
        file.flush()?;

        let path = file.path().to_string_lossy().into_owned();
        self.run_tool("pod-spec-set", &["--file", path.as_str()]).await?;
        tracing::info!(unit = %self.unit_name, "pod spec updated");
        Ok(())
    }

    async fn set_unit_status(&self, status: &UnitStatus) -> Result<()> {
        self.run_tool("status-set", &[status.name(), status.message()])
            .await?;
        tracing::info!(unit = %self.unit_name, %status, "unit status updated");
        Ok(())
    }

    async fn am_i_leader(&self) -> Result<bool> {
        let output = self.run_tool("is-leader", &["--format=json"]).await?;
        Ok(serde_json::from_str(output.trim())?)
    }
}

fn parse_relation_data(output: &str) -> Result<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(output)?;
    let map = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(HashMap::new()),
        other => {
            return Err(CharmError::HookTool {
                tool: "relation-get".to_string(),
                reason: format!("expected a JSON object, got {}", other),
            })
        }
    };

    Ok(map
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}
