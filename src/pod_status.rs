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

//! Workload pod readiness, read from the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;

use crate::error::{CharmError, Result};
use crate::event::EventKind;
use crate::status::PodStatus;

/// Label Juju puts on the pods of an application.
pub const APP_LABEL: &str = "juju-app";

/// Annotation Juju puts on a pod to name the unit it runs.
pub const UNIT_ANNOTATION: &str = "juju.io/unit";

/// A source of workload pod observations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PodStatusSource: Send + Sync {
    /// Observes the workload pod once.
    async fn fetch_pod_status(&self) -> Result<PodStatus>;
}

/// Reads the status of a unit's own pod through the Kubernetes API.
#[derive(Clone)]
pub struct KubePodStatusSource {
    pods: Api<Pod>,
    unit_name: String,
}

impl KubePodStatusSource {
    /// Creates a source for the pod of `unit_name` (e.g. `grafana/0`) in
    /// `namespace`.
    pub fn new(client: Client, namespace: &str, unit_name: impl Into<String>) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            unit_name: unit_name.into(),
        }
    }

    fn app_name(&self) -> &str {
        self.unit_name
            .split_once('/')
            .map_or(self.unit_name.as_str(), |(app, _)| app)
    }
}

#[async_trait]
impl PodStatusSource for KubePodStatusSource {
    async fn fetch_pod_status(&self) -> Result<PodStatus> {
        let params = ListParams::default().labels(&format!("{}={}", APP_LABEL, self.app_name()));
        let pods = self.pods.list(&params).await?;

        let status = select_unit_pod(&pods.items, &self.unit_name)
            .map_or(PodStatus::Unknown, pod_status_of);
        tracing::debug!(
            unit = %self.unit_name,
            pods = pods.items.len(),
            ?status,
            "observed workload pod"
        );
        Ok(status)
    }
}

/// Stands in for the pod source on events that never observe pods.
///
/// Every observation fails with [`CharmError::PodsNotObserved`].
#[derive(Debug, Clone, Copy)]
pub struct UnobservedPods(pub EventKind);

#[async_trait]
impl PodStatusSource for UnobservedPods {
    async fn fetch_pod_status(&self) -> Result<PodStatus> {
        Err(CharmError::PodsNotObserved(self.0))
    }
}

/// Picks the pod running `unit_name` out of the application's pods.
///
/// A pod matches on the [`UNIT_ANNOTATION`] or on the StatefulSet name
/// `<app>-<ordinal>`. Pods being deleted never match.
pub fn select_unit_pod<'a>(pods: &'a [Pod], unit_name: &str) -> Option<&'a Pod> {
    let pod_name = unit_name.replace('/', "-");

    pods.iter()
        .filter(|pod| pod.metadata.deletion_timestamp.is_none())
        .find(|pod| {
            let annotated = pod
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(UNIT_ANNOTATION))
                .is_some_and(|unit| unit == unit_name);
            annotated || pod.metadata.name.as_deref() == Some(pod_name.as_str())
        })
}

/// Maps a pod object to its readiness.
///
/// A pod is ready when it is `Running` and its `Ready` condition is `True`.
pub fn pod_status_of(pod: &Pod) -> PodStatus {
    let Some(status) = pod.status.as_ref() else {
        return PodStatus::Pending;
    };

    if status.phase.as_deref() != Some("Running") {
        return PodStatus::Pending;
    }

    let ready = status
        .conditions
        .iter()
        .flatten()
        .any(|c| c.type_ == "Ready" && c.status == "True");

    if ready {
        PodStatus::Ready
    } else {
        PodStatus::Running
    }
}
