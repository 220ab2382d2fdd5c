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

//! grafana-k8s-charm - hook entry point
//!
//! The Juju agent runs this binary once per hook. It resolves the hook into
//! an event, dispatches it and exits; a non-zero exit marks the hook failed.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grafana_k8s_charm::event::{resolve_hook, Hook};
use grafana_k8s_charm::pod_status::UnobservedPods;
use grafana_k8s_charm::{
    Charm, Event, FrameworkAdapter, HandlerContext, HookToolAdapter, KubePodStatusSource,
    PodStatusSource, RuntimeConfig, ServerDetails,
};

/// Juju Kubernetes charm for Grafana
#[derive(Parser, Debug)]
#[command(name = "grafana-k8s-charm")]
#[command(version)]
#[command(about = "Juju Kubernetes charm for Grafana", long_about = None)]
struct Args {
    /// Hook to run. Falls back to JUJU_DISPATCH_PATH, then to the binary name
    #[arg(long, env = "JUJU_HOOK_NAME")]
    hook: Option<String>,

    /// Path to the runtime configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    log_json: bool,

    /// Path to the kubeconfig file
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Namespace the workload runs in. Defaults to the model name
    #[arg(long)]
    namespace: Option<String>,

    /// Delay between two pod readiness observations
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,

    /// Maximum pod readiness observations per hook
    #[arg(long)]
    max_observations: Option<u32>,
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    humantime::parse_duration(s).map_err(|e| anyhow::anyhow!("invalid duration: {}", e))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.log_json)?;

    let hook_name = hook_name(args.hook.clone())?;
    let config = load_config(args).await?;

    info!(
        hook = %hook_name,
        version = grafana_k8s_charm::VERSION,
        "running hook"
    );

    let adapter = HookToolAdapter::from_env(&config).context("failed to read hook environment")?;

    let event = match resolve_hook(&hook_name, &config.relation_name) {
        Hook::Lifecycle(kind) => match Event::lifecycle(kind) {
            Some(event) => event,
            None => anyhow::bail!("hook {} resolved to {} without details", hook_name, kind),
        },
        Hook::DependencyRelation => {
            let data = adapter
                .remote_relation_data()
                .await
                .context("failed to read relation data")?;
            match ServerDetails::from_relation_data(&data)? {
                Some(details) => Event::dependency_available(details),
                None => {
                    info!(hook = %hook_name, "prometheus server has not published its address yet");
                    return Ok(());
                }
            }
        }
        Hook::Ignored => {
            debug!(hook = %hook_name, "nothing to do for hook");
            return Ok(());
        }
    };

    // Only the events that read pod readiness need a Kubernetes client.
    let pods: Arc<dyn PodStatusSource> = if event.kind().observes_pods() {
        let namespace = match &config.namespace {
            Some(namespace) => namespace.clone(),
            None => adapter.get_model_name().await?,
        };
        let client = create_client(&config).await?;
        Arc::new(KubePodStatusSource::new(client, &namespace, adapter.unit_name()))
    } else {
        Arc::new(UnobservedPods(event.kind()))
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            wait_for_shutdown().await;
            cancel.cancel();
        }
    });

    let ctx = HandlerContext::new(Arc::new(adapter), pods, config.readiness)
        .with_cancellation(cancel);
    let charm = Charm::new(ctx);

    charm
        .dispatch(&event)
        .await
        .with_context(|| format!("hook {} failed", hook_name))?;

    info!(hook = %hook_name, "hook completed");
    Ok(())
}

/// Initializes logging based on the provided level and format.
///
/// Logs go to stderr, which the Juju agent captures in the unit log.
fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid log level: {}", level))?,
        )
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

/// Resolves the hook name from the flag, the dispatch path or argv[0].
fn hook_name(flag: Option<String>) -> anyhow::Result<String> {
    if let Some(hook) = flag.filter(|h| !h.is_empty()) {
        return Ok(hook);
    }

    let from_path = |path: &str| {
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    };

    if let Some(hook) = std::env::var("JUJU_DISPATCH_PATH")
        .ok()
        .and_then(|path| from_path(&path))
    {
        return Ok(hook);
    }

    std::env::args()
        .next()
        .and_then(|arg0| from_path(&arg0))
        .context("cannot determine the hook name")
}

/// Loads the configuration from file or command-line arguments.
async fn load_config(mut args: Args) -> anyhow::Result<RuntimeConfig> {
    let mut config = if let Some(config_path) = args.config.take() {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("failed to read config file: {:?}", config_path))?;

        RuntimeConfig::from_yaml(&content)
            .with_context(|| format!("failed to parse config file: {:?}", config_path))?
    } else {
        RuntimeConfig::default()
    };

    // Override with command-line arguments
    if let Some(kubeconfig) = args.kubeconfig {
        config.kubeconfig = Some(kubeconfig);
    }
    if let Some(namespace) = args.namespace {
        config.namespace = Some(namespace);
    }
    if let Some(interval) = args.poll_interval {
        config.readiness.poll_interval = interval;
    }
    if let Some(max) = args.max_observations {
        config.readiness.max_observations = max;
    }

    config.validate().context("invalid runtime configuration")?;
    Ok(config)
}

/// Creates a Kubernetes client from the configuration.
async fn create_client(config: &RuntimeConfig) -> anyhow::Result<kube::Client> {
    use kube::config::{KubeConfigOptions, Kubeconfig};
    use kube::Config;

    let kube_config = if let Some(kubeconfig_path) = &config.kubeconfig {
        let kubeconfig = Kubeconfig::read_from(kubeconfig_path)
            .with_context(|| format!("failed to read kubeconfig from: {:?}", kubeconfig_path))?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .with_context(|| format!("failed to load kubeconfig from: {:?}", kubeconfig_path))?
    } else {
        Config::infer()
            .await
            .context("failed to infer kubernetes configuration")?
    };

    Ok(kube::Client::try_from(kube_config)?)
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let (mut sigterm, mut sigint) = match (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to install signal handlers");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        info!("received Ctrl+C, shutting down");
    }
}
