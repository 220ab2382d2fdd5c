//! End-to-end dispatch tests against the public charm API.
//!
//! A recording adapter stands in for the framework and keeps every call in
//! order, so the tests can check what the handlers pushed and when.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use grafana_k8s_charm::event::{ConfigChangedEvent, StartEvent};
use grafana_k8s_charm::pod_status::UnobservedPods;
use grafana_k8s_charm::{
    build_juju_pod_spec, Charm, CharmError, ConfigMap, Event, FrameworkAdapter, HandlerContext,
    ImageMeta, PodSpec, PodStatus, PodStatusSource, ReadinessPolicy, Result, ServerDetails,
    UnitStatus,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SetPodSpec(PodSpec),
    SetUnitStatus(UnitStatus),
}

struct RecordingAdapter {
    leader: bool,
    config: ConfigMap,
    image: ImageMeta,
    calls: Mutex<Vec<Call>>,
}

impl RecordingAdapter {
    fn new(leader: bool, config: serde_json::Value, image: ImageMeta) -> Self {
        Self {
            leader,
            config: config.as_object().cloned().unwrap_or_default(),
            image,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn pod_specs(&self) -> Vec<PodSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetPodSpec(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    fn statuses(&self) -> Vec<UnitStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SetUnitStatus(status) => Some(status),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl FrameworkAdapter for RecordingAdapter {
    async fn get_app_name(&self) -> Result<String> {
        Ok("grafana".to_string())
    }

    async fn get_model_name(&self) -> Result<String> {
        Ok("observability".to_string())
    }

    async fn get_config(&self) -> Result<ConfigMap> {
        Ok(self.config.clone())
    }

    async fn get_image_meta(&self) -> Result<ImageMeta> {
        Ok(self.image.clone())
    }

    async fn set_pod_spec(&self, spec: &PodSpec) -> Result<()> {
        self.calls.lock().unwrap().push(Call::SetPodSpec(spec.clone()));
        Ok(())
    }

    async fn set_unit_status(&self, status: &UnitStatus) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::SetUnitStatus(status.clone()));
        Ok(())
    }

    async fn am_i_leader(&self) -> Result<bool> {
        Ok(self.leader)
    }
}

/// Replays a fixed sequence of observations, then repeats the last one.
struct ScriptedPods {
    remaining: Mutex<VecDeque<PodStatus>>,
    last: PodStatus,
}

impl ScriptedPods {
    fn new(statuses: &[PodStatus]) -> Self {
        Self {
            remaining: Mutex::new(statuses.iter().copied().collect()),
            last: statuses.last().copied().unwrap_or(PodStatus::Unknown),
        }
    }
}

#[async_trait]
impl PodStatusSource for ScriptedPods {
    async fn fetch_pod_status(&self) -> Result<PodStatus> {
        Ok(self.remaining.lock().unwrap().pop_front().unwrap_or(self.last))
    }
}

fn charm(adapter: Arc<RecordingAdapter>, pods: ScriptedPods, policy: ReadinessPolicy) -> Charm {
    Charm::new(HandlerContext::new(adapter, Arc::new(pods), policy))
}

#[tokio::test]
async fn leader_start_pushes_spec_then_maintenance() {
    let adapter = Arc::new(RecordingAdapter::new(
        true,
        json!({"x": 1}),
        ImageMeta::new("img"),
    ));
    let charm = charm(adapter.clone(), ScriptedPods::new(&[]), ReadinessPolicy::immediate(1));

    charm.dispatch(&Event::Start(StartEvent)).await.unwrap();

    let expected = build_juju_pod_spec(
        "grafana",
        json!({"x": 1}).as_object().unwrap(),
        &ImageMeta::new("img"),
        None,
    )
    .unwrap();
    let calls = adapter.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::SetPodSpec(expected));
    assert!(matches!(calls[1], Call::SetUnitStatus(UnitStatus::Maintenance(_))));

    let env = &adapter.pod_specs()[0].containers[0].env_config;
    assert!(!env.contains_key("PROMETHEUS_HOST"));
}

#[tokio::test]
async fn leader_dependency_available_wires_prometheus() {
    let adapter = Arc::new(RecordingAdapter::new(
        true,
        json!({"advertised-port": 3000}),
        ImageMeta::new("grafana/grafana"),
    ));
    let charm = charm(adapter.clone(), ScriptedPods::new(&[]), ReadinessPolicy::immediate(1));

    charm
        .dispatch(&Event::dependency_available(ServerDetails::new("h", 9090)))
        .await
        .unwrap();

    let specs = adapter.pod_specs();
    assert_eq!(specs.len(), 1);
    let container = &specs[0].containers[0];
    assert_eq!(container.env_config["PROMETHEUS_HOST"], "h");
    assert_eq!(container.env_config["PROMETHEUS_PORT"], "9090");
    assert!(container.volume_config[0].files[0]
        .content
        .contains("http://h:9090"));

    let statuses = adapter.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(matches!(statuses[0], UnitStatus::Maintenance(_)));
    assert!(matches!(adapter.calls().last(), Some(Call::SetUnitStatus(_))));
}

#[tokio::test]
async fn non_leader_never_pushes_a_spec() {
    let events = [
        Event::Start(StartEvent),
        Event::dependency_available(ServerDetails::new("h", 9090)),
    ];

    for event in events {
        let adapter = Arc::new(RecordingAdapter::new(
            false,
            json!({}),
            ImageMeta::new("img"),
        ));
        let charm = charm(adapter.clone(), ScriptedPods::new(&[]), ReadinessPolicy::immediate(1));

        charm.dispatch(&event).await.unwrap();

        assert!(adapter.pod_specs().is_empty(), "{:?} pushed a spec", event);
        assert_eq!(adapter.statuses().len(), 1);
        assert!(matches!(adapter.statuses()[0], UnitStatus::Waiting(_)));
    }
}

#[tokio::test]
async fn config_changed_pushes_one_status_per_observation() {
    let adapter = Arc::new(RecordingAdapter::new(true, json!({}), ImageMeta::new("img")));
    let pods = ScriptedPods::new(&[PodStatus::Pending, PodStatus::Running, PodStatus::Ready]);
    let charm = charm(adapter.clone(), pods, ReadinessPolicy::immediate(10));

    charm
        .dispatch(&Event::ConfigChanged(ConfigChangedEvent))
        .await
        .unwrap();

    let statuses = adapter.statuses();
    assert_eq!(statuses.len(), 3);
    assert!(matches!(statuses[0], UnitStatus::Maintenance(_)));
    assert!(matches!(statuses[1], UnitStatus::Maintenance(_)));
    assert!(statuses[2].is_active());
    assert!(adapter.pod_specs().is_empty());
}

#[tokio::test]
async fn config_changed_gives_up_after_max_observations() {
    let adapter = Arc::new(RecordingAdapter::new(true, json!({}), ImageMeta::new("img")));
    let charm = charm(
        adapter.clone(),
        ScriptedPods::new(&[PodStatus::Unknown]),
        ReadinessPolicy::immediate(5),
    );

    charm
        .dispatch(&Event::ConfigChanged(ConfigChangedEvent))
        .await
        .unwrap();

    let statuses = adapter.statuses();
    assert_eq!(statuses.len(), 5);
    assert!(statuses.iter().all(|s| matches!(s, UnitStatus::Maintenance(_))));
}

#[tokio::test]
async fn malformed_config_fails_the_hook() {
    let adapter = Arc::new(RecordingAdapter::new(
        true,
        json!({"log-level": "loud"}),
        ImageMeta::new("img"),
    ));
    let charm = charm(adapter.clone(), ScriptedPods::new(&[]), ReadinessPolicy::immediate(1));

    let err = charm.dispatch(&Event::Start(StartEvent)).await.unwrap_err();
    assert!(matches!(err, CharmError::MalformedConfig(_)));
    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn spec_pushing_events_run_without_a_pod_source() {
    let events = [
        Event::Start(StartEvent),
        Event::dependency_available(ServerDetails::new("h", 9090)),
    ];

    for event in events {
        let adapter = Arc::new(RecordingAdapter::new(true, json!({}), ImageMeta::new("img")));
        let ctx = HandlerContext::new(
            adapter.clone(),
            Arc::new(UnobservedPods(event.kind())),
            ReadinessPolicy::immediate(1),
        );

        Charm::new(ctx).dispatch(&event).await.unwrap();

        assert_eq!(adapter.pod_specs().len(), 1, "{:?}", event);
        assert_eq!(adapter.statuses().len(), 1, "{:?}", event);
    }
}

#[tokio::test]
async fn config_changed_needs_a_pod_source() {
    let adapter = Arc::new(RecordingAdapter::new(true, json!({}), ImageMeta::new("img")));
    let event = Event::ConfigChanged(ConfigChangedEvent);
    let ctx = HandlerContext::new(
        adapter.clone(),
        Arc::new(UnobservedPods(event.kind())),
        ReadinessPolicy::immediate(1),
    );

    let err = Charm::new(ctx).dispatch(&event).await.unwrap_err();
    assert!(matches!(err, CharmError::PodsNotObserved(_)));
    assert!(adapter.statuses().is_empty());
}
