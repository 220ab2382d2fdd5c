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

//! Event handlers.
//!
//! Handlers hold no state of their own. Each one reads what it needs from the
//! adapter, runs the builders and pushes the result back. Failures are
//! returned as-is; the hook then fails and the framework retries it.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::FrameworkAdapter;
use crate::config::ReadinessPolicy;
use crate::error::Result;
use crate::event::{ConfigChangedEvent, DependencyAvailableEvent, StartEvent, UpdateStatusEvent};
use crate::pod_spec::build_juju_pod_spec;
use crate::pod_status::PodStatusSource;
use crate::relation::ServerDetails;
use crate::status::{build_unit_status, UnitStatus};

/// Status pushed after a new pod spec has been set.
pub const CONFIGURING_POD_MESSAGE: &str = "Configuring pod";

/// Status non-leader units report instead of touching the pod spec.
pub const WAITING_FOR_LEADER_MESSAGE: &str = "Waiting for leader to configure the pod";

/// Reports unit status until the workload pod is ready.
///
/// Every observation produces exactly one status push. The loop ends when the
/// status becomes active, after `policy.max_observations` observations, or
/// when `cancel` fires. Running out of observations is not an error: the last
/// maintenance status stays in place and the next `update-status` picks up
/// from there.
///
/// Returns the last status pushed.
pub async fn on_config_changed(
    _event: &ConfigChangedEvent,
    adapter: &dyn FrameworkAdapter,
    pods: &dyn PodStatusSource,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
) -> Result<UnitStatus> {
    let mut observations = 0u32;

    loop {
        let pod_status = pods.fetch_pod_status().await?;
        let status = build_unit_status(pod_status);
        adapter.set_unit_status(&status).await?;
        observations += 1;

        if status.is_active() {
            info!(observations, "workload pod is ready");
            return Ok(status);
        }

        if observations >= policy.max_observations {
            warn!(
                observations,
                %status,
                "workload pod not ready yet, giving up until the next event"
            );
            return Ok(status);
        }

        debug!(observations, ?pod_status, "workload pod not ready");

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(observations, "readiness wait cancelled");
                return Ok(status);
            }
            _ = tokio::time::sleep(policy.next_interval()) => {}
        }
    }
}

/// Pushes the initial pod spec, without dependency details.
pub async fn on_start(_event: &StartEvent, adapter: &dyn FrameworkAdapter) -> Result<()> {
    update_pod_spec(adapter, None).await
}

/// Pushes a pod spec wired to the newly available Prometheus server.
pub async fn on_dependency_available(
    event: &DependencyAvailableEvent,
    adapter: &dyn FrameworkAdapter,
) -> Result<()> {
    info!(server = %event.server_details, "prometheus server available");
    update_pod_spec(adapter, Some(&event.server_details)).await
}

/// Takes a single readiness observation.
pub async fn on_update_status(
    _event: &UpdateStatusEvent,
    adapter: &dyn FrameworkAdapter,
    pods: &dyn PodStatusSource,
) -> Result<UnitStatus> {
    let status = build_unit_status(pods.fetch_pod_status().await?);
    adapter.set_unit_status(&status).await?;
    Ok(status)
}

async fn update_pod_spec(
    adapter: &dyn FrameworkAdapter,
    server_details: Option<&ServerDetails>,
) -> Result<()> {
    if !adapter.am_i_leader().await? {
        info!("not the leader, leaving the pod spec alone");
        return adapter
            .set_unit_status(&UnitStatus::waiting(WAITING_FOR_LEADER_MESSAGE))
            .await;
    }

    let app_name = adapter.get_app_name().await?;
    let charm_config = adapter.get_config().await?;
    let image_meta = adapter.get_image_meta().await?;

    let spec = build_juju_pod_spec(&app_name, &charm_config, &image_meta, server_details)?;
    adapter.set_pod_spec(&spec).await?;
    info!(app = %app_name, with_dependency = server_details.is_some(), "pod spec pushed");

    adapter
        .set_unit_status(&UnitStatus::maintenance(CONFIGURING_POD_MESSAGE))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use mockall::Sequence;
    use serde_json::json;

    use crate::adapter::MockFrameworkAdapter;
    use crate::config::{ConfigMap, ImageMeta};
    use crate::error::CharmError;
    use crate::pod_spec::PodSpec;
    use crate::pod_status::MockPodStatusSource;
    use crate::status::PodStatus;

    fn charm_config() -> ConfigMap {
        json!({"advertised-port": 3000, "x": 1})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn leader_adapter(leader: bool) -> MockFrameworkAdapter {
        let mut adapter = MockFrameworkAdapter::new();
        adapter.expect_am_i_leader().returning(move || Ok(leader));
        adapter
            .expect_get_app_name()
            .returning(|| Ok("grafana".to_string()));
        adapter.expect_get_config().returning(|| Ok(charm_config()));
        adapter
            .expect_get_image_meta()
            .returning(|| Ok(ImageMeta::new("img")));
        adapter
    }

    fn pod_sequence(statuses: Vec<PodStatus>) -> MockPodStatusSource {
        let remaining = Arc::new(Mutex::new(statuses));
        let mut pods = MockPodStatusSource::new();
        pods.expect_fetch_pod_status()
            .returning(move || Ok(remaining.lock().unwrap().remove(0)));
        pods
    }

    fn recording_adapter(pushed: Arc<Mutex<Vec<UnitStatus>>>) -> MockFrameworkAdapter {
        let mut adapter = MockFrameworkAdapter::new();
        adapter.expect_set_unit_status().returning(move |status| {
            pushed.lock().unwrap().push(status.clone());
            Ok(())
        });
        adapter
    }

    #[tokio::test]
    async fn test_config_changed_reports_until_ready() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let adapter = recording_adapter(pushed.clone());
        let pods = pod_sequence(vec![PodStatus::Pending, PodStatus::Running, PodStatus::Ready]);

        let last = on_config_changed(
            &ConfigChangedEvent,
            &adapter,
            &pods,
            &ReadinessPolicy::immediate(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed.len(), 3);
        assert!(matches!(pushed[0], UnitStatus::Maintenance(_)));
        assert!(matches!(pushed[1], UnitStatus::Maintenance(_)));
        assert!(pushed[2].is_active());
        assert_eq!(last, pushed[2]);
    }

    #[tokio::test]
    async fn test_config_changed_ready_on_first_observation() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let adapter = recording_adapter(pushed.clone());
        let pods = pod_sequence(vec![PodStatus::Ready]);

        on_config_changed(
            &ConfigChangedEvent,
            &adapter,
            &pods,
            &ReadinessPolicy::immediate(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(*pushed.lock().unwrap(), vec![UnitStatus::active("")]);
    }

    #[tokio::test]
    async fn test_config_changed_is_bounded() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let adapter = recording_adapter(pushed.clone());
        let mut pods = MockPodStatusSource::new();
        pods.expect_fetch_pod_status()
            .times(4)
            .returning(|| Ok(PodStatus::Running));

        let last = on_config_changed(
            &ConfigChangedEvent,
            &adapter,
            &pods,
            &ReadinessPolicy::immediate(4),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(pushed.lock().unwrap().len(), 4);
        assert_eq!(last, UnitStatus::maintenance("Pod is getting ready"));
    }

    #[tokio::test]
    async fn test_config_changed_stops_when_cancelled() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let adapter = recording_adapter(pushed.clone());
        let mut pods = MockPodStatusSource::new();
        pods.expect_fetch_pod_status()
            .times(1)
            .returning(|| Ok(PodStatus::Unknown));

        let policy = ReadinessPolicy {
            poll_interval: Duration::from_secs(3600),
            max_observations: 10,
            jitter: 0.0,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let last = on_config_changed(&ConfigChangedEvent, &adapter, &pods, &policy, &cancel)
            .await
            .unwrap();

        assert_eq!(pushed.lock().unwrap().len(), 1);
        assert_eq!(last, UnitStatus::maintenance("Waiting for pod to appear"));
    }

    #[tokio::test]
    async fn test_config_changed_propagates_adapter_errors() {
        let mut adapter = MockFrameworkAdapter::new();
        adapter.expect_set_unit_status().times(1).returning(|_| {
            Err(CharmError::HookTool {
                tool: "status-set".to_string(),
                reason: "exit status: 1".to_string(),
            })
        });
        let mut pods = MockPodStatusSource::new();
        pods.expect_fetch_pod_status()
            .times(1)
            .returning(|| Ok(PodStatus::Pending));

        let err = on_config_changed(
            &ConfigChangedEvent,
            &adapter,
            &pods,
            &ReadinessPolicy::immediate(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CharmError::HookTool { .. }));
    }

    #[tokio::test]
    async fn test_start_pushes_pod_spec_as_leader() {
        let mut adapter = leader_adapter(true);
        let expected =
            build_juju_pod_spec("grafana", &charm_config(), &ImageMeta::new("img"), None).unwrap();

        let mut seq = Sequence::new();
        adapter
            .expect_set_pod_spec()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |spec: &PodSpec| *spec == expected)
            .returning(|_| Ok(()));
        adapter
            .expect_set_unit_status()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|status: &UnitStatus| matches!(status, UnitStatus::Maintenance(_)))
            .returning(|_| Ok(()));

        on_start(&StartEvent, &adapter).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_leaves_pod_spec_alone_when_not_leader() {
        let mut adapter = leader_adapter(false);
        adapter.expect_set_pod_spec().never();
        adapter
            .expect_set_unit_status()
            .times(1)
            .withf(|status: &UnitStatus| {
                *status == UnitStatus::waiting(WAITING_FOR_LEADER_MESSAGE)
            })
            .returning(|_| Ok(()));

        on_start(&StartEvent, &adapter).await.unwrap();
    }

    #[tokio::test]
    async fn test_dependency_available_pushes_server_details() {
        let mut adapter = leader_adapter(true);
        let event = DependencyAvailableEvent {
            server_details: ServerDetails::new("h", 9090),
        };

        let mut seq = Sequence::new();
        adapter
            .expect_set_pod_spec()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|spec: &PodSpec| {
                let env = &spec.containers[0].env_config;
                env.get("PROMETHEUS_HOST").map(String::as_str) == Some("h")
                    && env.get("PROMETHEUS_PORT").map(String::as_str) == Some("9090")
            })
            .returning(|_| Ok(()));
        adapter
            .expect_set_unit_status()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|status: &UnitStatus| {
                *status == UnitStatus::maintenance(CONFIGURING_POD_MESSAGE)
            })
            .returning(|_| Ok(()));

        on_dependency_available(&event, &adapter).await.unwrap();
    }

    #[tokio::test]
    async fn test_dependency_available_leaves_pod_spec_alone_when_not_leader() {
        let mut adapter = leader_adapter(false);
        adapter.expect_set_pod_spec().never();
        adapter
            .expect_set_unit_status()
            .times(1)
            .returning(|_| Ok(()));

        let event = DependencyAvailableEvent {
            server_details: ServerDetails::new("h", 9090),
        };
        on_dependency_available(&event, &adapter).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_pushing() {
        let mut adapter = MockFrameworkAdapter::new();
        adapter.expect_am_i_leader().returning(|| Ok(true));
        adapter
            .expect_get_app_name()
            .returning(|| Ok("grafana".to_string()));
        adapter.expect_get_config().returning(|| {
            Ok(json!({"advertised-port": "http"}).as_object().cloned().unwrap())
        });
        adapter
            .expect_get_image_meta()
            .returning(|| Ok(ImageMeta::new("img")));
        adapter.expect_set_pod_spec().never();
        adapter.expect_set_unit_status().never();

        let err = on_start(&StartEvent, &adapter).await.unwrap_err();
        assert!(matches!(err, CharmError::MalformedConfig(_)));
    }

    #[tokio::test]
    async fn test_update_status_observes_once() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let adapter = recording_adapter(pushed.clone());
        let mut pods = MockPodStatusSource::new();
        pods.expect_fetch_pod_status()
            .times(1)
            .returning(|| Ok(PodStatus::Running));

        let status = on_update_status(&UpdateStatusEvent, &adapter, &pods)
            .await
            .unwrap();

        assert_eq!(status, UnitStatus::maintenance("Pod is getting ready"));
        assert_eq!(*pushed.lock().unwrap(), vec![status]);
    }
}
